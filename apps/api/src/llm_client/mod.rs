/// LLM Client — the single point of entry for all Claude API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module.
///
/// Model: claude-3-haiku-20240307 (hardcoded — do not make configurable to
/// prevent drift). Calls are streaming-only and never retried: a failed
/// upstream call surfaces immediately to the caller.
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
pub const MODEL: &str = "claude-3-haiku-20240307";

/// Token budget for test-case generation runs.
pub const GENERATION_MAX_TOKENS: u32 = 4000;
/// Token budget for assistant chat turns.
pub const CHAT_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No API key available")]
    MissingKey,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stream: bool,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// A per-request client bound to the API key resolved for the caller.
/// Cheap to construct; the underlying `reqwest::Client` is shared app-wide.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }

    /// Opens a one-shot streaming completion. Text fragments arrive on the
    /// returned channel in upstream order; the channel closes after the
    /// upstream stop event or a single terminal error.
    pub async fn stream(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            stream: true,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("LLM stream opened (model: {MODEL}, max_tokens: {max_tokens})");

        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            // Fragments can split an SSE line across reads; buffer until newline.
            let mut buffer = String::new();

            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim_end_matches('\r').to_string();
                            buffer.drain(..=pos);

                            match parse_stream_line(&line) {
                                StreamLine::Delta(text) => {
                                    if tx.send(Ok(text)).await.is_err() {
                                        return; // client went away
                                    }
                                }
                                StreamLine::Stop => return,
                                StreamLine::Ignored => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

enum StreamLine {
    Delta(String),
    Stop,
    Ignored,
}

/// Parses one line of the upstream event stream.
fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamLine::Ignored;
    };

    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
        return StreamLine::Ignored;
    };

    match event["type"].as_str() {
        Some("content_block_delta") => match event["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => StreamLine::Delta(text.to_string()),
            _ => StreamLine::Ignored,
        },
        Some("message_stop") => StreamLine::Stop,
        _ => StreamLine::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_stream_line_delta() {
        let line = r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#;
        match parse_stream_line(line) {
            StreamLine::Delta(text) => assert_eq!(text, "Hi"),
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_parse_stream_line_stop() {
        assert!(matches!(
            parse_stream_line(r#"data: {"type":"message_stop"}"#),
            StreamLine::Stop
        ));
    }

    #[test]
    fn test_parse_stream_line_ignores_noise() {
        assert!(matches!(parse_stream_line(""), StreamLine::Ignored));
        assert!(matches!(
            parse_stream_line("event: content_block_delta"),
            StreamLine::Ignored
        ));
        assert!(matches!(
            parse_stream_line(r#"data: {"type":"ping"}"#),
            StreamLine::Ignored
        ));
        // Empty deltas carry no text and are skipped.
        assert!(matches!(
            parse_stream_line(r#"data: {"type":"content_block_delta","delta":{"text":""}}"#),
            StreamLine::Ignored
        ));
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;

        let body = concat!(
            "data: {\"type\":\"message_start\"}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hello\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\" world\"}}\n\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url(Client::new(), "test-key".to_string(), server.uri());
        let mut rx = client.stream("prompt", 100).await.unwrap();

        let mut fragments = Vec::new();
        while let Some(item) = rx.recv().await {
            fragments.push(item.unwrap());
        }
        assert_eq!(fragments, vec!["Hello".to_string(), " world".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_surfaces_api_error_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::with_base_url(Client::new(), "bad-key".to_string(), server.uri());
        match client.stream("prompt", 100).await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            _ => panic!("expected API error"),
        }
    }
}
