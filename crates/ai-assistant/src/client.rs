//! Chat-completion client
//!
//! [`AssistantClient::complete`] is a blocking call. The coordinator runs it
//! on the blocking thread pool and never on a runtime worker.

use crate::constants::{MAX_TOKENS, TEMPERATURE};
use crate::error::ClientError;
use crate::options::{ApiProvider, AssistantOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// One question in, one answer out
pub trait AssistantClient: Send + Sync {
    fn complete(&self, system_prompt: &str, model: &str, question: &str)
        -> Result<String, ClientError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn chat_request<'a>(system_prompt: &'a str, model: &'a str, question: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: system_prompt,
            },
            ChatMessage {
                role: "user",
                content: question,
            },
        ],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Text of the first choice, trimmed
fn parse_completion(body: &str) -> Result<String, ClientError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ClientError::MalformedResponse("no message content in choices".to_string()))
}

/// Prefer the API's own `error.message`, fall back to the raw body
fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// OpenAI-compatible `chat/completions` client over blocking reqwest
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ChatCompletionClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    /// `None` when the entry cannot reach an endpoint
    ///
    /// OpenAI needs an API key. A custom endpoint needs its URL, the key is
    /// sent only when one is configured.
    pub fn from_options(options: &AssistantOptions) -> Option<Self> {
        if options.api_provider == ApiProvider::OpenAi && !options.has_api_key() {
            return None;
        }
        let endpoint = options.endpoint()?;
        Some(Self::new(
            endpoint,
            options.api_key.clone(),
            options.request_timeout(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

impl AssistantClient for ChatCompletionClient {
    fn complete(
        &self,
        system_prompt: &str,
        model: &str,
        question: &str,
    ) -> Result<String, ClientError> {
        debug!(endpoint = %self.endpoint, model, "Sending chat completion request");

        // built per call so the blocking client never lives on a runtime thread
        let http = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.map_reqwest_error(e))?;

        let mut request = http.post(&self.endpoint);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .json(&chat_request(system_prompt, model, question))
            .send()
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        let body = response.text().map_err(|e| self.map_reqwest_error(e))?;
        trace!(status = status.as_u16(), "Chat completion response received");

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: parse_error_message(&body),
            });
        }

        parse_completion(&body)
    }
}
