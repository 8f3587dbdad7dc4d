//! Chat model abstraction and the Ollama implementation.
//!
//! The [`ChatModel`] trait is the conversation engine's only view of the
//! language model: a message list in, completion text and optional
//! tool-call requests out. The Ollama client speaks `/api/chat` with
//! `stream: false` and reuses the embedder's retry ladder.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::tools::ToolSpec;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a model request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Model output: completion text plus any requested tool calls.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Messages → completion, the language model port.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request a completion. `tools` may be empty, in which case the model
    /// cannot request tool calls.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<ChatResponse>;
}

/// Chat model backed by the Ollama `/api/chat` endpoint.
pub struct OllamaChat {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.config.base_url);

        let mut body = serde_json::json!({
            "model": self.config.llm_model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_ctx": self.config.num_ctx,
            },
        });

        if !tools.is_empty() {
            let specs: Vec<serde_json::Value> = tools.iter().map(ToolSpec::to_wire).collect();
            body["tools"] = serde_json::Value::Array(specs);
        }

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama chat error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama chat error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
    }
}

/// Parse the Ollama `/api/chat` response into text and tool calls.
fn parse_chat_response(json: &serde_json::Value) -> Result<ChatResponse> {
    let message = json
        .get("message")
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message"))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments = function
                        .get("arguments")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);
                    Some(ToolCall { name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatResponse { text, tool_calls })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_response() {
        let json = serde_json::json!({
            "message": { "role": "assistant", "content": "An answer." },
            "done": true,
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.text, "An answer.");
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let json = serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "search_novels", "arguments": { "query": "the capital" } } },
                    { "function": { "name": "find_volume", "arguments": { "event_description": "the duel" } } },
                ],
            },
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.tool_calls.len(), 2);
        assert_eq!(resp.tool_calls[0].name, "search_novels");
        assert_eq!(
            resp.tool_calls[0].arguments["query"],
            serde_json::json!("the capital")
        );
    }

    #[test]
    fn test_parse_missing_message_errors() {
        let json = serde_json::json!({ "done": true });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }
}
