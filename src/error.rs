//! Error taxonomy for the worksheet workflow.
//!
//! Every failure is caught at the handler that triggered it and turned into
//! an inline message via `user_message()`. Nothing here is fatal to a session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("question store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("question store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service account credentials are invalid: {0}")]
    Credentials(String),

    #[error("failed to sign token assertion: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("question sheet has no `{0}` column")]
    MissingColumn(&'static str),
}

impl StoreError {
    pub fn user_message(&self) -> String {
        String::from("❌ 문제를 불러오는 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.")
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image payload is not a readable JPEG: {0}")]
    Decode(#[from] image::ImageError),
}

impl ImageError {
    pub fn user_message(&self) -> String {
        String::from("⚠️ 이미지를 표시할 수 없습니다.")
    }
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response contained no message")]
    EmptyResponse,
}

impl FeedbackError {
    /// Timeouts, dropped connections, rate limits and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyResponse => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Status { status: 429, .. } => {
                String::from("❌ AI 사용량이 많아 피드백을 받을 수 없습니다. 잠시 후 다시 시도해주세요.")
            }
            _ => format!("❌ AI 피드백을 받는 중 오류가 발생했습니다: {}", self),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("no teacher email on record")]
    MissingRecipient,

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("mail relay rejected the credentials: {0}")]
    Auth(String),

    #[error("could not reach the mail relay: {0}")]
    Connection(String),

    #[error("mail relay rejected the message: {0}")]
    Rejected(String),
}

impl MailError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::MissingRecipient => String::from("❌ 교사의 이메일 주소가 제공되지 않았습니다."),
            Self::InvalidAddress(detail) => format!("❌ 이메일 주소가 올바르지 않습니다: {}", detail),
            Self::Auth(detail) => format!("❌ 메일 서버 인증에 실패했습니다: {}", detail),
            Self::Connection(detail) => format!("❌ 메일 서버에 연결할 수 없습니다: {}", detail),
            Self::Rejected(detail) => {
                format!("❌ 이메일 전송 중 오류가 발생했습니다: {}", detail)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no questions are loaded for this session")]
    NotLoaded,
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotLoaded => String::from("활동 코드를 입력하여 문제를 불러오세요."),
        }
    }
}
