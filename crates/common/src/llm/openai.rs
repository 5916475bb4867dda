//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint speaking the `/chat/completions` protocol.
//! Structured calls use `response_format: json_schema` and re-ask the model
//! with the validation error when the reply does not conform.

use super::schema::parse_json_output;
use super::{CompletionService, OutputSchema, Prompt, TextStream};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const SERVICE: &str = "completion";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Completion client for OpenAI-compatible APIs
pub struct OpenAiCompletionService {
    client: reqwest::Client,
    api_key: String,
    config: LlmConfig,
}

impl OpenAiCompletionService {
    /// Create a new client; an API key is required
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "llm.api_key is required for the openai provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            config: config.clone(),
        })
    }

    fn messages(prompt: &Prompt) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system",
                content: prompt.system.clone(),
            },
            ChatMessage {
                role: "user",
                content: prompt.render_user(),
            },
        ]
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout {
                operation: SERVICE.to_string(),
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else {
            AppError::upstream(SERVICE, format!("Request failed: {}", e))
        }
    }

    async fn send(&self, messages: &[ChatMessage], response_format: Option<Value>, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format,
            stream,
        };

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(SERVICE, format!("API error {}: {}", status, body)));
        }

        Ok(response)
    }

    async fn chat(&self, messages: &[ChatMessage], response_format: Option<Value>, mode: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.chat_once(messages, response_format).await;
        metrics::record_completion(start.elapsed().as_secs_f64(), &self.config.model, mode, result.is_ok());
        result
    }

    async fn chat_once(&self, messages: &[ChatMessage], response_format: Option<Value>) -> Result<String> {
        let response = self.send(messages, response_format, false).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::upstream(SERVICE, "Empty response from model"))
    }

    fn response_format(schema: &OutputSchema) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "description": schema.description,
                "schema": schema.schema,
                "strict": true
            }
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.chat(&Self::messages(prompt), None, "text").await
    }

    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        let mut messages = Self::messages(prompt);
        let mut last_reason = String::new();

        for attempt in 0..=self.config.schema_retries {
            let reply = self
                .chat(&messages, Some(Self::response_format(schema)), "structured")
                .await?;

            match parse_json_output(&reply).and_then(|value| schema.validate(&value).map(|_| value)) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    tracing::warn!(
                        schema = %schema.name,
                        attempt = attempt + 1,
                        reason = %reason,
                        "Structured reply rejected, re-asking"
                    );
                    messages.push(ChatMessage {
                        role: "assistant",
                        content: reply,
                    });
                    messages.push(ChatMessage {
                        role: "user",
                        content: format!(
                            "Your previous reply did not match the required JSON schema ({}). \
                             Reply again with only a JSON object matching the schema.",
                            reason
                        ),
                    });
                    last_reason = reason;
                }
            }
        }

        Err(AppError::SchemaViolation {
            schema: schema.name.clone(),
            message: last_reason,
        })
    }

    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let start = Instant::now();
        let response = self.send(&Self::messages(prompt), None, true).await;
        metrics::record_completion(start.elapsed().as_secs_f64(), &self.config.model, "stream", response.is_ok());
        Ok(delta_stream(response?))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// One parsed server-sent-events line
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseLine> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| AppError::upstream(SERVICE, format!("Malformed stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
        .map(SseLine::Delta)
        .unwrap_or(SseLine::Skip))
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

impl SseState {
    fn drain_lines(&mut self) -> Result<()> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match parse_sse_line(&String::from_utf8_lossy(&line))? {
                SseLine::Delta(text) => self.pending.push_back(text),
                SseLine::Done => {
                    self.done = true;
                    self.buffer.clear();
                }
                SseLine::Skip => {}
            }
        }
        Ok(())
    }
}

fn delta_stream(response: reqwest::Response) -> TextStream {
    let state = SseState {
        bytes: response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    if let Err(e) = state.drain_lines() {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(AppError::upstream(SERVICE, format!("Stream interrupted: {}", e))), state));
                }
                None => {
                    state.buffer.push(b'\n');
                    let flushed = state.drain_lines();
                    state.done = true;
                    if let Err(e) = flushed {
                        return Some((Err(e), state));
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseLine::Delta("Hel".to_string()));
    }

    #[test]
    fn test_parse_sse_done_and_noise() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(parse_sse_line("").unwrap(), SseLine::Skip);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), SseLine::Skip);
    }

    #[test]
    fn test_parse_sse_malformed() {
        let err = parse_sse_line("data: {not json").unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiCompletionService::new(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_response_format_is_strict_json_schema() {
        let schema = OutputSchema::new("grade", "d", json!({ "type": "object" }));
        let format = OpenAiCompletionService::response_format(&schema);
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "grade");
        assert_eq!(format["json_schema"]["strict"], true);
    }
}
