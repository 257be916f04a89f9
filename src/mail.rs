//! Submission of a finished worksheet to the teacher by email.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Code;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::MailError;
use crate::feedback::format_qa_pairs;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::QUESTION_COUNT;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP reply codes that mean the relay refused our login.
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// Everything the teacher receives for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub student_name: String,
    pub activity_code: String,
    pub questions: [String; QUESTION_COUNT],
    pub answers: [String; QUESTION_COUNT],
    pub feedback: Option<String>,
    pub comments: String,
    pub recipient: Option<String>,
}

impl Submission {
    pub fn subject(&self) -> String {
        format!("{}학생의 수행평가 답변 제출 - {}", self.student_name, self.activity_code)
    }

    pub fn body(&self) -> String {
        format!(
            "학생 이름: {}\n\n학생이 수행평가 답변을 제출했습니다.\n\n{}\n\nAI 피드백:\n{}\n\n학생의 소감 및 수정 사항:\n{}",
            self.student_name,
            format_qa_pairs(&self.questions, &self.answers),
            self.feedback.as_deref().unwrap_or(""),
            self.comments
        )
    }
}

/// A plain-text message ready for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Authenticated STARTTLS submission through a fixed relay.
///
/// A transport is built per message and dropped when `send` returns, so the
/// SMTP session never outlives one submission.
pub struct SmtpMailer {
    sender: String,
    password: String,
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(sender: String, password: String, host: String, port: u16, timeout: Duration) -> Self {
        Self {
            sender,
            password,
            host,
            port,
            timeout,
        }
    }

    fn message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::InvalidAddress(format!("{}: {}", self.sender, e)))?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::InvalidAddress(format!("{}: {}", mail.to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| MailError::InvalidAddress(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = self.message(mail)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(classify_smtp_error)?
            .port(self.port)
            .credentials(Credentials::new(self.sender.clone(), self.password.clone()))
            .timeout(Some(self.timeout))
            .build();

        transport.send(message).await.map_err(classify_smtp_error)?;
        Ok(())
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> MailError {
    classify_smtp_reply(err.status(), err.to_string())
}

/// Failures without an SMTP reply never reached a working session with the relay.
fn classify_smtp_reply(status: Option<Code>, detail: String) -> MailError {
    match status {
        Some(code) if AUTH_FAILURE_CODES.contains(&code.to_string().as_str()) => MailError::Auth(detail),
        Some(_) => MailError::Rejected(detail),
        None => MailError::Connection(detail),
    }
}

/// Checks the recipient and hands a formatted submission to the mailer.
#[derive(Clone)]
pub struct SubmissionNotifier {
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
}

impl SubmissionNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, retry: RetryPolicy) -> Self {
        Self { mailer, retry }
    }

    /// Refused with `MissingRecipient` before any relay contact when the
    /// worksheet has no teacher email.
    pub async fn notify(&self, submission: &Submission) -> Result<(), MailError> {
        let to = submission
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(MailError::MissingRecipient)?;

        let mail = OutgoingMail {
            to: to.to_string(),
            subject: submission.subject(),
            body: submission.body(),
        };

        with_retry(&self.retry, "submission email", MailError::is_transient, || {
            self.mailer.send(&mail)
        })
        .await?;

        tracing::info!(
            "Submission for {} ({}) sent",
            submission.activity_code,
            submission.student_name
        );
        Ok(())
    }
}
