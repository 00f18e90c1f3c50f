//! OpenAI-compatible chat completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use triage_config::LlmConfig;
use triage_contracts::{
    error::{TriageError, TriageResult},
    llm::{LlmRequest, LlmResponse},
};
use triage_core::traits::LlmProvider;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Request payload for the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpLlmProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
}

impl HttpLlmProvider {
    /// Build a provider from the `[llm]` config section.
    ///
    /// The bearer token is read once, here, from the environment variable
    /// named by `api_key_env`. A missing variable is not an error; requests
    /// are then sent unauthenticated.
    pub fn new(config: &LlmConfig) -> TriageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TriageError::ConfigError {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let api_key = config.api_key_env.as_deref().and_then(|var| match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                warn!(env = var, "LLM API key variable is unset; requests will be unauthenticated");
                None
            }
        });

        let endpoint = completions_url(&config.base_url);
        info!(%endpoint, timeout_secs = config.timeout_secs, "HTTP LLM provider ready");

        Ok(Self {
            client,
            endpoint,
            api_key,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, request: &LlmRequest) -> TriageResult<LlmResponse> {
        let transport = |reason: String| TriageError::Transport {
            model: request.model.clone(),
            reason,
        };

        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(model = %request.model, prompt_bytes = request.prompt.len(), "sending completion request");
        let response = builder.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection"
            } else {
                "request"
            };
            transport(format!("{kind} error: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            return Err(transport(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport(format!("malformed completion envelope: {e}")))?;

        let text = first_text(parsed).ok_or_else(|| transport("completion contained no message".to_string()))?;
        debug!(model = %request.model, reply_bytes = text.len(), "completion received");
        Ok(LlmResponse { text })
    }
}

fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match base.strip_suffix("/v1") {
        Some(root) => format!("{root}{COMPLETIONS_PATH}"),
        None => format!("{base}{COMPLETIONS_PATH}"),
    }
}

fn first_text(response: ChatResponse) -> Option<String> {
    response.choices.into_iter().next()?.message.content
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use triage_config::LlmConfig;
    use triage_contracts::{error::TriageError, llm::LlmRequest};
    use triage_core::traits::LlmProvider;

    use super::*;

    #[test]
    fn test_completions_url_normalised() {
        assert_eq!(completions_url("https://api.openai.com"), "https://api.openai.com/v1/chat/completions");
        assert_eq!(completions_url("http://localhost:8000/"), "http://localhost:8000/v1/chat/completions");
        assert_eq!(completions_url("http://localhost:8000/v1"), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            max_tokens: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] }));
    }

    #[test]
    fn test_reply_text_taken_verbatim() {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "```json\n{\"a\":1}\n```" } }]
        });
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(first_text(parsed).as_deref(), Some("```json\n{\"a\":1}\n```"));
    }

    #[test]
    fn test_empty_choices_have_no_text() {
        let parsed: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(first_text(parsed).is_none());
        let refusal: ChatResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] })).unwrap();
        assert!(first_text(refusal).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            api_key_env: None,
            max_tokens: Some(16),
        };
        let provider = HttpLlmProvider::new(&config).unwrap();

        match provider.complete(&LlmRequest::new("hello", "gpt-4o-mini")).await {
            Err(TriageError::Transport { model, .. }) => assert_eq!(model, "gpt-4o-mini"),
            other => panic!("expected Transport, got {:?}", other),
        }
    }
}
