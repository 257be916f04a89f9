//! Per-student worksheet sessions held in memory.
//!
//! Sessions are keyed by the ID in the session cookie. Each one sits behind
//! its own async mutex, so a session runs one action at a time while other
//! sessions proceed independently. Idle sessions expire.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SessionError;
use crate::feedback::DEFAULT_SYSTEM_PROMPT;
use crate::mail::Submission;
use crate::store::{QuestionRecord, QUESTION_COUNT};

/// Probability threshold for session cleanup (0-255, lower = more frequent)
/// Value of 25 means ~10% chance (25/256) on each new session
const SESSION_CLEANUP_THRESHOLD: u8 = 25;

/// Where a worksheet is in the load / feedback / submit flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
  #[default]
  Idle,
  Loaded,
  FeedbackReceived,
  Submitted,
}

/// Student-editable fields posted with every worksheet action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetInput {
  pub student_name: String,
  pub answers: [String; QUESTION_COUNT],
  pub comments: String,
}

#[derive(Debug, Clone)]
pub struct WorksheetSession {
  pub student_name: String,
  /// Code of the currently loaded worksheet, or the last code tried
  pub activity_code: String,
  pub phase: Phase,
  pub record: Option<QuestionRecord>,
  pub answers: [String; QUESTION_COUNT],
  pub system_prompt: String,
  pub feedback: Option<String>,
  pub comments: String,
}

impl Default for WorksheetSession {
  fn default() -> Self {
    Self {
      student_name: String::new(),
      activity_code: String::new(),
      phase: Phase::Idle,
      record: None,
      answers: Default::default(),
      system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
      feedback: None,
      comments: String::new(),
    }
  }
}

impl WorksheetSession {
  pub fn new() -> Self {
    Self::default()
  }

  /// Apply the result of a lookup. A match replaces the worksheet and clears
  /// answers and feedback from any earlier worksheet; a miss drops back to
  /// `Idle` with nothing loaded. Returns whether a worksheet is now loaded.
  pub fn apply_lookup(&mut self, code: &str, found: Option<QuestionRecord>) -> bool {
    self.activity_code = code.to_string();
    self.answers = Default::default();
    self.feedback = None;
    self.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();

    match found {
      Some(record) => {
        self.record = Some(record);
        self.phase = Phase::Loaded;
        true
      }
      None => {
        self.record = None;
        self.phase = Phase::Idle;
        false
      }
    }
  }

  /// Take the posted form. Answers are ignored until a worksheet is loaded.
  pub fn capture(&mut self, input: WorksheetInput) {
    self.student_name = input.student_name;
    self.comments = input.comments;
    if self.record.is_some() {
      self.answers = input.answers;
    }
  }

  pub fn require_loaded(&self) -> Result<&QuestionRecord, SessionError> {
    self.record.as_ref().ok_or(SessionError::NotLoaded)
  }

  pub fn record_feedback(&mut self, text: String) {
    self.feedback = Some(text);
    if self.phase == Phase::Loaded {
      self.phase = Phase::FeedbackReceived;
    }
  }

  /// Snapshot of the session as a submission. Does not require feedback.
  pub fn submission(&self) -> Result<Submission, SessionError> {
    let record = self.require_loaded()?;
    Ok(Submission {
      student_name: self.student_name.clone(),
      activity_code: record.activity_code.clone(),
      questions: record.questions.clone(),
      answers: self.answers.clone(),
      feedback: self.feedback.clone(),
      comments: self.comments.clone(),
      recipient: record.teacher_email.clone(),
    })
  }

  pub fn mark_submitted(&mut self) {
    self.phase = Phase::Submitted;
  }
}

pub type SessionHandle = Arc<tokio::sync::Mutex<WorksheetSession>>;

/// Session entry with last access time for expiration
struct SessionEntry {
  session: SessionHandle,
  last_access: DateTime<Utc>,
}

/// Shared map from session ID to session.
#[derive(Clone)]
pub struct SessionStore {
  sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
  expiry: Duration,
}

impl SessionStore {
  pub fn new(expiry: Duration) -> Self {
    Self {
      sessions: Arc::new(Mutex::new(HashMap::new())),
      expiry,
    }
  }

  /// Get or create a session for the given ID
  pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
    let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
    let now = Utc::now();

    if let Some(entry) = sessions.get_mut(session_id) {
      entry.last_access = now;
      return entry.session.clone();
    }

    // Clean up expired sessions occasionally (~10% chance)
    if rand::random::<u8>() < SESSION_CLEANUP_THRESHOLD {
      self.cleanup_expired(&mut sessions, now);
    }

    let session = SessionHandle::default();
    sessions.insert(
      session_id.to_string(),
      SessionEntry {
        session: session.clone(),
        last_access: now,
      },
    );
    session
  }

  pub fn len(&self) -> usize {
    self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Clean up expired sessions, returning how many were dropped
  fn cleanup_expired(&self, sessions: &mut HashMap<String, SessionEntry>, now: DateTime<Utc>) -> usize {
    // An expiry reaching past the earliest representable time never expires anything
    let Some(cutoff) = now.checked_sub_signed(self.expiry) else {
      return 0;
    };
    let before = sessions.len();
    sessions.retain(|_, entry| entry.last_access > cutoff);
    before - sessions.len()
  }

  /// Drop every session idle for longer than the expiry.
  pub fn purge_expired(&self) -> usize {
    let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
    self.cleanup_expired(&mut sessions, Utc::now())
  }
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
  use rand::Rng;
  let mut rng = rand::rng();
  (0..32)
    .map(|_| {
      let idx = rng.random_range(0..36);
      if idx < 10 {
        (b'0' + idx) as char
      } else {
        (b'a' + idx - 10) as char
      }
    })
    .collect()
}
