//! Application state passed to all handlers.

use std::sync::Arc;

use crate::feedback::FeedbackGenerator;
use crate::mail::SubmissionNotifier;
use crate::session::SessionStore;
use crate::store::QuestionStore;

/// External clients are built once at startup and injected here; each call
/// through them acquires its own connection.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuestionStore>,
    pub feedback: FeedbackGenerator,
    pub notifier: SubmissionNotifier,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QuestionStore>,
        feedback: FeedbackGenerator,
        notifier: SubmissionNotifier,
        sessions: SessionStore,
    ) -> Self {
        Self {
            store,
            feedback,
            notifier,
            sessions,
        }
    }
}
