mod common;

use std::sync::Arc;

use axum::http::StatusCode;

use common::{BrokenStore, FlakyStore, RecordingMailer, ScriptedCompletion, classroom_store, default_app, setup_app};
use smart_worksheet::error::{FeedbackError, MailError};
use smart_worksheet::handlers::worksheet::{
    ANSWERS_SAVED, FEEDBACK_DONE, LOAD_MISS, LOAD_PROMPT, LOAD_SUCCESS, SUBMIT_SUCCESS,
};
use smart_worksheet::handlers::SESSION_COOKIE_NAME;

fn answers<'a>(name: &'a str, a: [&'a str; 3], comments: &'a str) -> Vec<(&'static str, &'a str)> {
    vec![
        ("student_name", name),
        ("answer1", a[0]),
        ("answer2", a[1]),
        ("answer3", a[2]),
        ("comments", comments),
    ]
}

#[tokio::test]
async fn test_first_visit_sets_session_cookie_and_prompts_for_code() {
    let app = default_app();

    let response = app.server.get("/").await;
    response.assert_status_ok();
    assert!(!response.cookie(SESSION_COOKIE_NAME).value().is_empty());
    let page = response.text();
    assert!(page.contains("활동 코드 입력"));
    assert!(page.contains(LOAD_PROMPT));
    assert!(page.contains("status-info"));
}

#[tokio::test]
async fn test_loaded_worksheet_drops_the_prompt() {
    let app = default_app();
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await;

    let page = app.server.get("/").await.text();
    assert!(page.contains("Capital of France?"));
    assert!(!page.contains(LOAD_PROMPT));
}

#[tokio::test]
async fn test_health() {
    let app = default_app();
    app.server.get("/health").await.assert_text("ok");
}

#[tokio::test]
async fn test_end_to_end_submission() {
    let app = default_app();

    let loaded = app
        .server
        .post("/load")
        .form(&[("student_name", "김민수"), ("activity_code", "ABC123")])
        .await;
    loaded.assert_status_ok();
    let page = loaded.text();
    assert!(page.contains(LOAD_SUCCESS));
    assert!(page.contains("What is 2+2?"));

    let feedback = app
        .server
        .post("/feedback")
        .form(&answers("김민수", ["4", "", ""], ""))
        .await;
    let page = feedback.text();
    assert!(page.contains(FEEDBACK_DONE));
    assert!(page.contains("Good job."));

    let requests = app.completion.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].role, "system");
    assert_eq!(
        requests[0][1].content,
        "Question 1: What is 2+2?\nAnswer: 4\n\nQuestion 2: \nAnswer: \n\nQuestion 3: \nAnswer: "
    );

    let submitted = app
        .server
        .post("/submit")
        .form(&answers("김민수", ["4", "", ""], "None"))
        .await;
    assert!(submitted.text().contains(SUBMIT_SUCCESS));

    let sent = app.mailer.attempts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "teacher@example.com");
    assert_eq!(sent[0].subject, "김민수학생의 수행평가 답변 제출 - ABC123");
    assert!(sent[0].body.contains("Question 1: What is 2+2?\nAnswer: 4"));
    assert!(sent[0].body.contains("AI 피드백:\nGood job."));
    assert!(sent[0].body.contains("None"));
}

#[tokio::test]
async fn test_unknown_code_is_informational() {
    let app = default_app();

    let response = app
        .server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "ZZZ999")])
        .await;
    response.assert_status_ok();
    let page = response.text();
    assert!(page.contains(LOAD_MISS));
    assert!(page.contains("status-info"));
    assert!(!page.contains("Question 1:"));
}

#[tokio::test]
async fn test_blank_code_skips_lookup() {
    let app = setup_app(
        Arc::new(BrokenStore),
        ScriptedCompletion::replying(vec![]),
        Arc::new(RecordingMailer::default()),
    );

    let page = app
        .server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "   ")])
        .await
        .text();
    assert!(page.contains(LOAD_PROMPT));
    assert!(!page.contains("status-error"));
}

#[tokio::test]
async fn test_store_failure_keeps_loaded_worksheet() {
    let store = FlakyStore::new(classroom_store());
    let app = setup_app(
        store.clone(),
        ScriptedCompletion::replying(vec![]),
        Arc::new(RecordingMailer::default()),
    );
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await;
    app.server
        .post("/answers")
        .form(&answers("Ada", ["Paris", "", ""], ""))
        .await;

    store.fail();
    // The load button posts the whole form, including edits made since the last save
    let mut form = answers("Ada", ["Paris", "Pacific Ocean", ""], "");
    form.push(("activity_code", "ABC123"));
    let page = app.server.post("/load").form(&form).await.text();
    assert!(page.contains("status-error"));
    assert!(!page.contains("backend unavailable"));
    assert!(page.contains("Capital of France?"));
    assert!(page.contains("Paris"));
    assert!(page.contains("Pacific Ocean"));
}

#[tokio::test]
async fn test_reload_is_idempotent_and_clears_answers() {
    let app = default_app();
    let first = app
        .server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await
        .text();

    let saved = app
        .server
        .post("/answers")
        .form(&answers("Ada", ["Paris", "Pacific", "Nile"], ""))
        .await
        .text();
    assert!(saved.contains(ANSWERS_SAVED));
    assert!(saved.contains("Pacific"));

    let second = app
        .server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await
        .text();
    assert_eq!(first, second);
    assert!(!second.contains("Pacific"));
}

#[tokio::test]
async fn test_actions_before_load_are_guarded() {
    let app = default_app();

    let page = app
        .server
        .post("/feedback")
        .form(&answers("Ada", ["x", "", ""], ""))
        .await
        .text();
    assert!(page.contains(LOAD_PROMPT));
    assert_eq!(app.completion.request_count(), 0);

    let page = app
        .server
        .post("/submit")
        .form(&answers("Ada", ["x", "", ""], ""))
        .await
        .text();
    assert!(page.contains(LOAD_PROMPT));
    assert!(app.mailer.attempts().is_empty());
}

#[tokio::test]
async fn test_submit_without_teacher_email_never_contacts_relay() {
    let app = default_app();
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "NOMAIL")])
        .await;

    let page = app
        .server
        .post("/submit")
        .form(&answers("Ada", ["a", "b", "c"], ""))
        .await
        .text();
    assert!(page.contains("교사의 이메일 주소가 제공되지 않았습니다"));
    assert!(app.mailer.attempts().is_empty());
}

#[tokio::test]
async fn test_submit_without_feedback_sends_empty_feedback() {
    let app = default_app();
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "ABC123")])
        .await;

    app.server
        .post("/submit")
        .form(&answers("Ada", ["4", "", ""], "done"))
        .await
        .assert_status_ok();

    let sent = app.mailer.attempts();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("AI 피드백:\n\n\n학생의 소감 및 수정 사항:\ndone"));
    assert_eq!(app.completion.request_count(), 0);
}

#[tokio::test]
async fn test_feedback_failure_leaves_answers() {
    let app = setup_app(
        Arc::new(classroom_store()),
        ScriptedCompletion::replying(vec![Err(FeedbackError::Status {
            status: 500,
            body: "upstream".to_string(),
        })]),
        Arc::new(RecordingMailer::default()),
    );
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await;

    let page = app
        .server
        .post("/feedback")
        .form(&answers("Ada", ["Paris", "", ""], ""))
        .await
        .text();
    assert!(page.contains("status-error"));
    assert!(page.contains("Paris"));
    assert!(!page.contains("AI 피드백:"));
}

#[tokio::test]
async fn test_mail_failure_allows_retry() {
    let app = setup_app(
        Arc::new(classroom_store()),
        ScriptedCompletion::replying(vec![]),
        RecordingMailer::failing_with(|| MailError::Auth("535 bad credentials".to_string())),
    );
    app.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "ABC123")])
        .await;

    let failed = app
        .server
        .post("/submit")
        .form(&answers("Ada", ["4", "", ""], "None"))
        .await
        .text();
    assert!(failed.contains("메일 서버 인증에 실패했습니다"));
    assert!(failed.contains("535 bad credentials"));
    assert!(failed.contains("What is 2+2?"));

    app.mailer.recover();
    let retried = app
        .server
        .post("/submit")
        .form(&answers("Ada", ["4", "", ""], "None"))
        .await
        .text();
    assert!(retried.contains(SUBMIT_SUCCESS));
    assert_eq!(app.mailer.attempts().len(), 2);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let a = default_app();
    a.server
        .post("/load")
        .form(&[("student_name", "Ada"), ("activity_code", "GEO7")])
        .await;

    // A request without the saved cookie starts a new, empty session
    let response = a.server.get("/").clear_cookies().await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(!response.text().contains("Capital of France?"));
}
