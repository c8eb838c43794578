use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::lib::{AIProcessor, ApiErrorKind, ElectronError, ElectronResult, Message, Role};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug)]
pub struct ChatCompletionProcessor {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
    system_message: String,
}

impl ChatCompletionProcessor {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        system_message: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a default HTTP client: {}", e);
                Client::new()
            });
        Self {
            client,
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            system_message: system_message.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn messages(&self, query: &str, context: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(Message::new(Role::System, self.system_message.as_str()));
        messages.extend_from_slice(context);
        messages.push(Message::new(Role::User, query));
        messages
    }
}

#[async_trait::async_trait]
impl AIProcessor for ChatCompletionProcessor {
    async fn process(&self, query: &str, context: &[Message]) -> ElectronResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: self.messages(query, context),
        };
        debug!("POST {} with model '{}'", self.endpoint(), self.model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ElectronError::api(
                        ApiErrorKind::Network,
                        format!("Could not reach {}. Check your network connection.", self.base_url),
                    )
                } else if e.is_timeout() {
                    ElectronError::api(
                        ApiErrorKind::Network,
                        format!("Request timed out after {} seconds.", REQUEST_TIMEOUT.as_secs()),
                    )
                } else {
                    ElectronError::api(ApiErrorKind::Network, format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ElectronError::api(ApiErrorKind::Network, format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            ElectronError::api(
                ApiErrorKind::InvalidResponse,
                format!("Unexpected response body: {}", e),
            )
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ElectronError::api(ApiErrorKind::InvalidResponse, "Response contained no message")
            })
    }
}

fn status_error(status: StatusCode, body: &str) -> ElectronError {
    let detail = server_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ElectronError::api(
            ApiErrorKind::Authentication,
            format!("{} Check the api_key in your settings.", detail),
        ),
        StatusCode::TOO_MANY_REQUESTS => ElectronError::api(
            ApiErrorKind::RateLimit,
            format!("{} Wait a moment and try again.", detail),
        ),
        _ => ElectronError::api(ApiErrorKind::Status(status.as_u16()), detail),
    }
}

/// Pulls `error.message` (or a plain string `error`) out of an error body.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const OK_BODY: &str = r#"{
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1694268190,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "Hello! How can I help you today?"
            },
            "finish_reason": "stop"
        }]
    }"#;

    fn processor(url: &str) -> ChatCompletionProcessor {
        ChatCompletionProcessor::new("gpt-4o-mini", "test-key", url, "You are Electron.")
    }

    #[tokio::test]
    async fn test_basic_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .create_async()
            .await;

        let reply = processor(&server.url()).process("Hi", &[]).await.unwrap();

        assert_eq!(reply, "Hello! How can I help you today?");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_carries_system_message_and_context() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are Electron."},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "how are you?"}
                ]
            })))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let context = vec![
            Message::new(Role::User, "hi"),
            Message::new(Role::Assistant, "hello"),
        ];
        let result = processor(&format!("{}/", server.url()))
            .process("how are you?", &context)
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Invalid API key."}}"#)
            .create_async()
            .await;

        let err = processor(&server.url()).process("Hi", &[]).await.unwrap_err();

        match err {
            ElectronError::ApiError { kind, message } => {
                assert_eq!(kind, ApiErrorKind::Authentication);
                assert!(message.starts_with("Invalid API key."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_too_many_requests_maps_to_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = processor(&server.url()).process("Hi", &[]).await.unwrap_err();

        assert!(matches!(
            err,
            ElectronError::ApiError {
                kind: ApiErrorKind::RateLimit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body(r#"{"error": "model overloaded"}"#)
            .create_async()
            .await;

        let err = processor(&server.url()).process("Hi", &[]).await.unwrap_err();

        match err {
            ElectronError::ApiError { kind, message } => {
                assert_eq!(kind, ApiErrorKind::Status(503));
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = processor(&server.url()).process("Hi", &[]).await.unwrap_err();

        assert!(matches!(
            err,
            ElectronError::ApiError {
                kind: ApiErrorKind::InvalidResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) is closed on test machines.
        let err = processor("http://127.0.0.1:9").process("Hi", &[]).await.unwrap_err();

        assert!(matches!(
            err,
            ElectronError::ApiError {
                kind: ApiErrorKind::Network,
                ..
            }
        ));
    }
}
