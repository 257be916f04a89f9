#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::{TestServer, TestServerConfig};
use chrono::Duration;

use smart_worksheet::build_router;
use smart_worksheet::error::{FeedbackError, MailError, StoreError};
use smart_worksheet::feedback::{ChatMessage, CompletionClient, FeedbackGenerator, DEFAULT_MODEL};
use smart_worksheet::mail::{Mailer, OutgoingMail, SubmissionNotifier};
use smart_worksheet::retry::RetryPolicy;
use smart_worksheet::session::SessionStore;
use smart_worksheet::state::AppState;
use smart_worksheet::store::{MemoryStore, QuestionRecord, QuestionStore};

/// Completion client that replays canned replies and records requests.
pub struct ScriptedCompletion {
    replies: Mutex<Vec<Result<String, FeedbackError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    pub fn replying(replies: Vec<Result<String, FeedbackError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, FeedbackError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(FeedbackError::EmptyResponse);
        }
        replies.remove(0)
    }
}

/// Mailer that records every attempt and fails while `failure` is set.
#[derive(Default)]
pub struct RecordingMailer {
    pub attempts: Mutex<Vec<OutgoingMail>>,
    pub failure: Mutex<Option<fn() -> MailError>>,
}

impl RecordingMailer {
    pub fn failing_with(failure: fn() -> MailError) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(failure)),
        })
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn attempts(&self) -> Vec<OutgoingMail> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.attempts.lock().unwrap().push(mail.clone());
        match *self.failure.lock().unwrap() {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}

/// Store whose backend is unreachable.
pub struct BrokenStore;

#[async_trait]
impl QuestionStore for BrokenStore {
    async fn find_by_code(&self, _code: &str) -> Result<Option<QuestionRecord>, StoreError> {
        Err(StoreError::Status {
            status: 503,
            body: "backend unavailable".to_string(),
        })
    }
}

/// Memory store that can be switched into failure mid-test.
pub struct FlakyStore {
    inner: MemoryStore,
    pub failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
        })
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuestionStore for FlakyStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<QuestionRecord>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return BrokenStore.find_by_code(code).await;
        }
        self.inner.find_by_code(code).await
    }
}

pub fn record(code: &str, questions: [&str; 3], email: Option<&str>) -> QuestionRecord {
    QuestionRecord {
        activity_code: code.to_string(),
        questions: questions.map(String::from),
        images: [None, None, None],
        teacher_email: email.map(String::from),
    }
}

/// Sheet with the worksheets used across the tests.
pub fn classroom_store() -> MemoryStore {
    MemoryStore::new()
        .with_record(&record("ABC123", ["What is 2+2?", "", ""], Some("teacher@example.com")))
        .with_record(&record("NOMAIL", ["Orphan question", "", ""], None))
        .with_record(&record("GEO7", ["Capital of France?", "Largest ocean?", "Longest river?"], Some("geo@example.com")))
}

pub struct TestApp {
    pub server: TestServer,
    pub completion: Arc<ScriptedCompletion>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn setup_app(
    store: Arc<dyn QuestionStore>,
    completion: Arc<ScriptedCompletion>,
    mailer: Arc<RecordingMailer>,
) -> TestApp {
    let state = AppState::new(
        store,
        FeedbackGenerator::new(completion.clone(), DEFAULT_MODEL.to_string(), RetryPolicy::none()),
        SubmissionNotifier::new(mailer.clone(), RetryPolicy::none()),
        SessionStore::new(Duration::hours(1)),
    );

    let config = TestServerConfig {
        save_cookies: true,
        ..TestServerConfig::default()
    };
    let server = TestServer::new_with_config(build_router(state), config).unwrap();

    TestApp {
        server,
        completion,
        mailer,
    }
}

pub fn default_app() -> TestApp {
    setup_app(
        Arc::new(classroom_store()),
        ScriptedCompletion::replying(vec![Ok("Good job.".to_string())]),
        Arc::new(RecordingMailer::default()),
    )
}
