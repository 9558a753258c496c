//! LLM Client: the text completion port and its HTTP implementation.
//!
//! ARCHITECTURAL RULE: pipeline stages only ever see `dyn CompletionPort`.
//! Nothing outside this module talks to the completion service directly.
//!
//! The production client speaks the OpenAI-compatible chat-completions
//! protocol (LM Studio, vLLM, llama.cpp server and friends).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{GenerationParams, LlmSettings};

pub mod prompts;
pub mod retry;

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion service unreachable: {0}")]
    ConnectionFailure(String),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            CompletionError::Timeout(timeout)
        } else if error.is_decode() {
            CompletionError::MalformedResponse(error.to_string())
        } else {
            CompletionError::ConnectionFailure(error.to_string())
        }
    }
}

/// One prompt plus the sampling parameters and time budget for it.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub params: GenerationParams,
    pub timeout: Duration,
}

/// The text completion port. Implement this to swap backends without
/// touching the segmenter or block processor.
///
/// Carried in `AppState` as `Arc<dyn CompletionPort>`.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    seed: u64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
/// Single-shot: retries and back-off live in [`retry`].
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()?,
            url: settings.url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionPort for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            seed: request.params.seed,
            stream: false,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::from_transport(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CompletionError::ConnectionFailure(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::from_transport(e, request.timeout))?;

        if let Some(usage) = &chat.usage {
            debug!(
                "Completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.text()
            .map(str::to_string)
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".into()))
    }
}

/// Parses model output as JSON of type `T`, tolerating code fences and
/// chatter around the outermost object.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, CompletionError> {
    let text = strip_json_fences(text);
    let candidate = extract_json_object(text).unwrap_or(text);
    serde_json::from_str(candidate).map_err(|e| CompletionError::MalformedResponse(e.to_string()))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Slice from the first `{` to the last `}`, if both exist in that order.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        key: String,
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_ignores_surrounding_chatter() {
        let probe: Probe =
            parse_json("Sure! Here is the result:\n{\"key\": \"value\"}\nHope it helps.").unwrap();
        assert_eq!(probe.key, "value");
    }

    #[test]
    fn test_parse_json_malformed_is_classified() {
        let result: Result<Probe, _> = parse_json("I could not find anything.");
        assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
    }

    #[test]
    fn test_extract_json_object_requires_ordered_braces() {
        assert_eq!(extract_json_object("} nothing {"), None);
        assert_eq!(extract_json_object("x {\"a\":1} y"), Some("{\"a\":1}"));
    }

    #[test]
    fn test_chat_response_text_reads_first_choice() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}}"#,
        )
        .unwrap();
        assert_eq!(chat.text(), Some("{}"));
    }

    #[test]
    fn test_chat_response_without_choices_has_no_text() {
        let chat: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(chat.text(), None);
    }

    #[test]
    fn test_chat_request_serializes_generation_params() {
        let request = ChatRequest {
            model: "google/gemma-3-12b",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 4096,
            temperature: 0.0,
            seed: 42,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }
}
