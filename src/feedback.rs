//! AI feedback on a student's answers via a chat-completion endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::QUESTION_COUNT;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// System instruction sent with every feedback request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "학생의 답변을 분석하고, 한글로 피드백을 제공해주세요.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// "Question i: <text>\nAnswer: <text>" for each slot, blank-line separated.
///
/// Shared by the feedback request and the submission email.
pub fn format_qa_pairs(
    questions: &[String; QUESTION_COUNT],
    answers: &[String; QUESTION_COUNT],
) -> String {
    questions
        .iter()
        .zip(answers)
        .enumerate()
        .map(|(i, (question, answer))| format!("Question {}: {}\nAnswer: {}", i + 1, question, answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Content of the first choice, untrimmed.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, FeedbackError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, FeedbackError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedbackError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        first_choice(parsed)
    }
}

fn first_choice(response: ChatResponse) -> Result<String, FeedbackError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(FeedbackError::EmptyResponse)
}

/// Builds the prompt for a worksheet and asks the completion endpoint.
#[derive(Clone)]
pub struct FeedbackGenerator {
    client: Arc<dyn CompletionClient>,
    model: String,
    retry: RetryPolicy,
}

impl FeedbackGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, model: String, retry: RetryPolicy) -> Self {
        Self { client, model, retry }
    }

    pub async fn generate(
        &self,
        system_prompt: &str,
        questions: &[String; QUESTION_COUNT],
        answers: &[String; QUESTION_COUNT],
    ) -> Result<String, FeedbackError> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(format_qa_pairs(questions, answers)),
        ];

        tracing::debug!("Requesting feedback from {}", self.model);
        let content = with_retry(&self.retry, "feedback request", FeedbackError::is_transient, || {
            self.client.complete(&self.model, &messages)
        })
        .await?;

        Ok(content.trim().to_string())
    }
}
