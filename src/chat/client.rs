/// Study backend HTTP client implementation.
///
/// This module provides `ChatClient` for making synchronous requests to the
/// chat and quiz endpoints, along with its error type and builder.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DEFAULT_CHAT_URL;

/// Errors that can occur when talking to the study backend.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend responses missing the expected field
    #[error("Backend error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Operations offered by the study backend.
///
/// This trait enables mocking in unit tests.
pub trait ChatBackend: Send + Sync {
    /// Asks a question about the given note text and returns the reply.
    fn ask(&self, message: &str, note_text: &str) -> Result<String, ChatError>;

    /// Generates a quiz from the given note text.
    fn quiz(&self, note_text: &str) -> Result<String, ChatError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest<'a> {
    message: &'a str,
    note_text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizRequest<'a> {
    note_text: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    reply: Option<String>,
}

#[derive(Deserialize)]
struct QuizResponse {
    quiz: Option<String>,
}

/// Builder for constructing `ChatClient` instances.
///
/// # Examples
///
/// ```
/// use ssp::chat::ChatClientBuilder;
///
/// let client = ChatClientBuilder::new()
///     .base_url("http://localhost:5000")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.base_url(), "http://localhost:5000");
/// ```
#[derive(Debug, Default)]
pub struct ChatClientBuilder {
    base_url: Option<String>,
}

impl ChatClientBuilder {
    /// Creates a new `ChatClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend base URL. Defaults to [`DEFAULT_CHAT_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the `ChatClient`.
    ///
    /// Only a connect timeout is configured; model replies can take a while
    /// and requests are not cut short.
    pub fn build(self) -> Result<ChatClient, ChatError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        reqwest::Url::parse(&base_url)
            .map_err(|e| ChatError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()
            .map_err(ChatError::Network)?;

        Ok(ChatClient { client, base_url })
    }
}

/// Synchronous client for the study backend's `/chat/ask` and `/chat/quiz`.
///
/// Failed requests are reported once; nothing is retried.
pub struct ChatClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ChatClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, ChatError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Http {
                status: status.as_u16(),
            });
        }

        response.text().map_err(classify)
    }
}

impl ChatBackend for ChatClient {
    fn ask(&self, message: &str, note_text: &str) -> Result<String, ChatError> {
        let body = self.post("/chat/ask", &AskRequest { message, note_text })?;
        let response: AskResponse =
            serde_json::from_str(&body).map_err(ChatError::Serialization)?;
        response.reply.ok_or_else(|| ChatError::Api {
            message: "Missing 'reply' field in response".to_string(),
        })
    }

    fn quiz(&self, note_text: &str) -> Result<String, ChatError> {
        let body = self.post("/chat/quiz", &QuizRequest { note_text })?;
        let response: QuizResponse =
            serde_json::from_str(&body).map_err(ChatError::Serialization)?;
        response.quiz.ok_or_else(|| ChatError::Api {
            message: "Missing 'quiz' field in response".to_string(),
        })
    }
}

fn classify(error: reqwest::Error) -> ChatError {
    if error.is_timeout() {
        ChatError::Timeout(error)
    } else {
        ChatError::Network(error)
    }
}
