pub mod context;
pub mod worksheet;

use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::filters;
use crate::images::decode_data_uri;
use crate::session::{Phase, WorksheetSession};

pub use context::{WorksheetContext, SESSION_COOKIE_NAME};
pub use worksheet::{health, index, load_questions, request_feedback, save_answers, submit_answers};

/// Inline message shown above the worksheet.
pub struct StatusView {
  /// CSS modifier: success, info or error
  pub class: &'static str,
  pub text: String,
}

impl StatusView {
  pub fn success(text: impl Into<String>) -> Self {
    Self { class: "success", text: text.into() }
  }

  pub fn info(text: impl Into<String>) -> Self {
    Self { class: "info", text: text.into() }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self { class: "error", text: text.into() }
  }
}

pub struct ImageView {
  pub src: String,
  pub width: u32,
  pub height: u32,
}

pub struct QuestionView {
  pub number: usize,
  pub text: String,
  pub answer: String,
  pub image: Option<ImageView>,
  pub image_error: Option<String>,
}

#[derive(Template)]
#[template(path = "worksheet.html")]
pub struct WorksheetTemplate {
  pub student_name: String,
  pub activity_code: String,
  pub loaded: bool,
  pub submitted: bool,
  pub questions: Vec<QuestionView>,
  pub feedback: Option<String>,
  pub comments: String,
  pub status: Option<StatusView>,
}

impl WorksheetTemplate {
  pub fn from_session(session: &WorksheetSession, status: Option<StatusView>) -> Self {
    let questions: Vec<QuestionView> = session
      .record
      .as_ref()
      .map(|record| {
        record
          .questions
          .iter()
          .zip(&record.images)
          .zip(&session.answers)
          .enumerate()
          .map(|(i, ((text, image), answer))| question_view(i + 1, text, image.as_deref(), answer))
          .collect()
      })
      .unwrap_or_default();

    Self {
      student_name: session.student_name.clone(),
      activity_code: session.activity_code.clone(),
      loaded: session.record.is_some(),
      submitted: session.phase == Phase::Submitted,
      questions,
      feedback: session.feedback.clone(),
      comments: session.comments.clone(),
      status,
    }
  }
}

fn question_view(number: usize, text: &str, image: Option<&str>, answer: &str) -> QuestionView {
  let (image, image_error) = match image.map(|raw| (raw, decode_data_uri(raw))) {
    Some((raw, Ok(Some(decoded)))) => (
      Some(ImageView {
        src: raw.to_string(),
        width: decoded.width(),
        height: decoded.height(),
      }),
      None,
    ),
    Some((_, Err(e))) => {
      tracing::warn!("Skipping image for question {}: {}", number, e);
      (None, Some(e.user_message()))
    }
    _ => (None, None),
  };

  QuestionView {
    number,
    text: text.to_string(),
    answer: answer.to_string(),
    image,
    image_error,
  }
}

/// Render the worksheet page, carrying the session cookie along.
pub fn render_worksheet(jar: CookieJar, session: &WorksheetSession, status: Option<StatusView>) -> Response {
  let template = WorksheetTemplate::from_session(session, status);
  (jar, Html(template.render().unwrap_or_default())).into_response()
}
