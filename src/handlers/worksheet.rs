//! Worksheet actions: load, save, feedback, submit.
//!
//! Every action re-renders the page with an inline status message. Failures
//! are logged and shown; the session is left as it was so the student can
//! retry.

use axum::{extract::State, response::Response, Form};
use serde::Deserialize;

use super::{render_worksheet, StatusView, WorksheetContext};
use crate::session::{Phase, WorksheetInput};
use crate::state::AppState;

pub const LOAD_SUCCESS: &str = "✅ 문제를 성공적으로 불러왔습니다.";
pub const LOAD_PROMPT: &str = "활동 코드를 입력하여 문제를 불러오세요.";
pub const LOAD_MISS: &str = "입력한 활동 코드에 해당하는 문제가 없습니다. 활동 코드를 확인하여 다시 입력하세요.";
pub const ANSWERS_SAVED: &str = "📝 답변이 저장되었습니다.";
pub const FEEDBACK_DONE: &str = "💬 AI 피드백이 완료되었습니다. 필요시 답변을 수정할 수 있습니다.";
pub const SUBMIT_SUCCESS: &str = "✅ 답변이 성공적으로 제출되었습니다!";

/// The whole worksheet form, posted by the load button.
#[derive(Deserialize)]
pub struct LoadForm {
  #[serde(default)]
  pub activity_code: String,
  #[serde(default)]
  pub student_name: String,
  #[serde(default)]
  pub answer1: String,
  #[serde(default)]
  pub answer2: String,
  #[serde(default)]
  pub answer3: String,
  #[serde(default)]
  pub comments: String,
}

impl LoadForm {
  fn into_parts(self) -> (String, WorksheetInput) {
    let input = WorksheetInput {
      student_name: self.student_name,
      answers: [self.answer1, self.answer2, self.answer3],
      comments: self.comments,
    };
    (self.activity_code, input)
  }
}

#[derive(Deserialize, Default)]
pub struct WorksheetForm {
  #[serde(default)]
  pub student_name: String,
  #[serde(default)]
  pub answer1: String,
  #[serde(default)]
  pub answer2: String,
  #[serde(default)]
  pub answer3: String,
  #[serde(default)]
  pub comments: String,
}

impl From<WorksheetForm> for WorksheetInput {
  fn from(form: WorksheetForm) -> Self {
    WorksheetInput {
      student_name: form.student_name,
      answers: [form.answer1, form.answer2, form.answer3],
      comments: form.comments,
    }
  }
}

/// GET / - Show the worksheet for this session
pub async fn index(ctx: WorksheetContext) -> Response {
  let session = ctx.session.lock().await;
  let status = (session.phase == Phase::Idle).then(|| StatusView::info(LOAD_PROMPT));
  render_worksheet(ctx.jar, &session, status)
}

/// POST /load - Look up questions by activity code
pub async fn load_questions(
  State(state): State<AppState>,
  ctx: WorksheetContext,
  Form(form): Form<LoadForm>,
) -> Response {
  let (code, input) = form.into_parts();
  let mut session = ctx.session.lock().await;
  // Unsaved edits survive a failed lookup
  session.capture(input);

  let code = code.trim();
  if code.is_empty() {
    return render_worksheet(ctx.jar, &session, Some(StatusView::info(LOAD_PROMPT)));
  }

  let status = match state.store.find_by_code(code).await {
    Ok(Some(record)) => {
      tracing::info!("Loaded worksheet {}", code);
      session.apply_lookup(code, Some(record));
      StatusView::success(LOAD_SUCCESS)
    }
    Ok(None) => {
      tracing::info!("No worksheet for activity code {}", code);
      session.apply_lookup(code, None);
      StatusView::info(LOAD_MISS)
    }
    Err(e) => {
      tracing::error!("Question store lookup for {} failed: {}", code, e);
      StatusView::error(e.user_message())
    }
  };

  render_worksheet(ctx.jar, &session, Some(status))
}

/// POST /answers - Keep edits without calling anything external
pub async fn save_answers(ctx: WorksheetContext, Form(form): Form<WorksheetForm>) -> Response {
  let mut session = ctx.session.lock().await;
  session.capture(form.into());

  let status = match session.require_loaded() {
    Ok(_) => StatusView::success(ANSWERS_SAVED),
    Err(e) => StatusView::info(e.user_message()),
  };
  render_worksheet(ctx.jar, &session, Some(status))
}

/// POST /feedback - Ask the completion endpoint to review the answers
pub async fn request_feedback(
  State(state): State<AppState>,
  ctx: WorksheetContext,
  Form(form): Form<WorksheetForm>,
) -> Response {
  let mut session = ctx.session.lock().await;
  session.capture(form.into());

  let questions = match session.require_loaded() {
    Ok(record) => record.questions.clone(),
    Err(e) => return render_worksheet(ctx.jar, &session, Some(StatusView::info(e.user_message()))),
  };

  let result = state
    .feedback
    .generate(&session.system_prompt, &questions, &session.answers)
    .await;

  let status = match result {
    Ok(text) => {
      session.record_feedback(text);
      StatusView::success(FEEDBACK_DONE)
    }
    Err(e) => {
      tracing::error!("Feedback for {} failed: {}", session.activity_code, e);
      StatusView::error(e.user_message())
    }
  };
  render_worksheet(ctx.jar, &session, Some(status))
}

/// POST /submit - Email the worksheet to the teacher
pub async fn submit_answers(
  State(state): State<AppState>,
  ctx: WorksheetContext,
  Form(form): Form<WorksheetForm>,
) -> Response {
  let mut session = ctx.session.lock().await;
  session.capture(form.into());

  let submission = match session.submission() {
    Ok(submission) => submission,
    Err(e) => return render_worksheet(ctx.jar, &session, Some(StatusView::info(e.user_message()))),
  };

  let status = match state.notifier.notify(&submission).await {
    Ok(()) => {
      session.mark_submitted();
      StatusView::success(SUBMIT_SUCCESS)
    }
    Err(e) => {
      tracing::warn!("Submission for {} failed: {}", submission.activity_code, e);
      StatusView::error(e.user_message())
    }
  };
  render_worksheet(ctx.jar, &session, Some(status))
}

/// GET /health
pub async fn health() -> &'static str {
  "ok"
}
