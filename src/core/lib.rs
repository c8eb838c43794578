use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a chat message sent to the completion API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait AIProcessor {
    /// Sends `query` after the prior `context` and returns the assistant's reply.
    async fn process(&self, query: &str, context: &[Message]) -> ElectronResult<String>;
}

pub trait TerminalInterface {
    fn read_line(&mut self, prompt: &str) -> ElectronResult<String>;
    fn display_output(&self, output: &str);
    fn display_error(&self, error: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    Authentication,
    RateLimit,
    Status(u16),
    InvalidResponse,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiErrorKind::Network => write!(f, "network failure"),
            ApiErrorKind::Authentication => write!(f, "authentication failed"),
            ApiErrorKind::RateLimit => write!(f, "rate limited"),
            ApiErrorKind::Status(code) => write!(f, "HTTP {}", code),
            ApiErrorKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ElectronError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("API error ({kind}): {message}")]
    ApiError { kind: ApiErrorKind, message: String },
    #[error("Invalid command: {0}")]
    CommandParseError(String),
    #[error("History error: {0}")]
    HistoryError(String),
    #[error("Input error: {0}")]
    InputError(String),
}

impl ElectronError {
    pub fn api(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        ElectronError::ApiError {
            kind,
            message: message.into(),
        }
    }
}

pub type ElectronResult<T> = Result<T, ElectronError>;
