/// PostgREST table client.
///
/// This module provides `PostgrestTable`, a synchronous client for a single
/// table exposed over the PostgREST dialect (as served by Supabase), along with
/// the `RemoteTable` trait the note store is written against.
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use thiserror::Error;

use super::row::{NewRow, RemoteRow};
use crate::models::{Note, NoteId};

/// Default name of the remote notes table.
pub const DEFAULT_TABLE: &str = "notes";

/// Errors that can occur when talking to the remote table.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote table was never initialized or failed to initialize.
    #[error("Remote table unavailable")]
    Unavailable,

    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status, with the server's error message if it sent one
    #[error("HTTP error: status {status}: {message}")]
    Http { status: u16, message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Well-formed response that does not contain what was asked for
    #[error("Remote table error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// API key that cannot be sent as a header
    #[error("Invalid API key: {0}")]
    InvalidKey(String),
}

/// Operations the note store needs from a remote table.
///
/// Implemented by [`PostgrestTable`] for real deployments and by in-memory
/// tables in tests.
pub trait RemoteTable: Send + Sync {
    /// Inserts `{title, content, created_at}` for `note` and returns the stored
    /// row, including its server-assigned ID.
    fn insert(&self, note: &Note) -> Result<RemoteRow, RemoteError>;

    /// Returns every row, newest `created_at` first.
    fn list_all(&self) -> Result<Vec<RemoteRow>, RemoteError>;

    /// Looks up a single row.
    fn get_by_id(&self, id: &NoteId) -> Result<Option<RemoteRow>, RemoteError>;

    /// Deletes the row with the given ID. Returns `false` if no row matched.
    fn delete_by_id(&self, id: &NoteId) -> Result<bool, RemoteError>;
}

/// Builder for constructing `PostgrestTable` instances.
///
/// # Examples
///
/// ```
/// use ssp::remote::PostgrestTableBuilder;
///
/// let table = PostgrestTableBuilder::new()
///     .base_url("https://project.supabase.co")
///     .api_key("anon-key")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(table.endpoint(), "https://project.supabase.co/rest/v1/notes");
/// ```
#[derive(Debug, Default)]
pub struct PostgrestTableBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    table: Option<String>,
}

impl PostgrestTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project URL (e.g., "https://project.supabase.co").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the key sent as both `apikey` and bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the table name. Defaults to [`DEFAULT_TABLE`].
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Builds the client.
    ///
    /// Construction does not touch the network; it only validates the URL and
    /// key and prepares the HTTP client. Only a connect timeout is applied.
    pub fn build(self) -> Result<PostgrestTable, RemoteError> {
        let base_url = self
            .base_url
            .ok_or_else(|| RemoteError::InvalidUrl("remote table URL not set".to_string()))?;
        reqwest::Url::parse(&base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let api_key = self.api_key.unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(RemoteError::InvalidKey("API key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&api_key).map_err(|e| RemoteError::InvalidKey(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| RemoteError::InvalidKey(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(RemoteError::Network)?;

        let table = self.table.unwrap_or_else(|| DEFAULT_TABLE.to_string());
        let endpoint = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table);

        Ok(PostgrestTable { client, endpoint })
    }
}

/// Synchronous client for one PostgREST table.
pub struct PostgrestTable {
    client: Client,
    endpoint: String,
}

impl PostgrestTable {
    /// Returns the table endpoint, `{base_url}/rest/v1/{table}`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().map_err(classify)?;
        let status = response.status();
        let body = response.text().map_err(classify)?;

        if !status.is_success() {
            return Err(RemoteError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }

    fn rows(&self, request: RequestBuilder) -> Result<Vec<RemoteRow>, RemoteError> {
        let body = self.send(request)?;
        serde_json::from_str(&body).map_err(RemoteError::Serialization)
    }
}

impl RemoteTable for PostgrestTable {
    fn insert(&self, note: &Note) -> Result<RemoteRow, RemoteError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=representation")
            .json(&[NewRow::from(note)]);

        self.rows(request)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Api {
                message: "insert returned no rows".to_string(),
            })
    }

    fn list_all(&self) -> Result<Vec<RemoteRow>, RemoteError> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.rows(request)
    }

    fn get_by_id(&self, id: &NoteId) -> Result<Option<RemoteRow>, RemoteError> {
        let filter = format!("eq.{}", id);
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("id", filter.as_str())]);
        Ok(self.rows(request)?.into_iter().next())
    }

    fn delete_by_id(&self, id: &NoteId) -> Result<bool, RemoteError> {
        let filter = format!("eq.{}", id);
        // A filter that matches nothing still answers 2xx; the returned rows
        // tell the two apart.
        let request = self
            .client
            .delete(&self.endpoint)
            .header("Prefer", "return=representation")
            .query(&[("id", filter.as_str())]);
        Ok(!self.rows(request)?.is_empty())
    }
}

fn classify(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(error)
    } else {
        RemoteError::Network(error)
    }
}

/// Pulls `message` out of a PostgREST error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn http_error_includes_status_and_message() {
        let error = RemoteError::Http {
            status: 401,
            message: "Invalid API key".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Invalid API key"));
    }

    #[test]
    fn serialization_error_chains_source() {
        let json_error = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let error = RemoteError::Serialization(json_error);

        assert!(error.to_string().contains("Serialization error"));
        assert!(error.source().is_some());
    }

    #[test]
    fn build_requires_base_url() {
        let result = PostgrestTableBuilder::new().api_key("k").build();
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[test]
    fn build_rejects_invalid_url() {
        let result = PostgrestTableBuilder::new()
            .base_url("not-a-valid-url")
            .api_key("k")
            .build();
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[test]
    fn build_rejects_empty_key() {
        let result = PostgrestTableBuilder::new()
            .base_url("https://example.supabase.co")
            .api_key("  ")
            .build();
        assert!(matches!(result, Err(RemoteError::InvalidKey(_))));
    }

    #[test]
    fn build_rejects_key_with_newline() {
        let result = PostgrestTableBuilder::new()
            .base_url("https://example.supabase.co")
            .api_key("bad\nkey")
            .build();
        assert!(matches!(result, Err(RemoteError::InvalidKey(_))));
    }

    #[test]
    fn endpoint_uses_table_name_and_trims_slash() {
        let table = PostgrestTableBuilder::new()
            .base_url("https://example.supabase.co/")
            .api_key("k")
            .table("study_notes")
            .build()
            .unwrap();

        assert_eq!(
            table.endpoint(),
            "https://example.supabase.co/rest/v1/study_notes"
        );
    }

    #[test]
    fn error_message_prefers_postgrest_message_field() {
        let body = r#"{"code":"42P01","message":"relation \"notes\" does not exist"}"#;
        assert_eq!(error_message(body), "relation \"notes\" does not exist");
    }

    #[test]
    fn error_message_falls_back_to_body() {
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn trait_can_be_implemented_by_mock_struct() {
        struct Empty;

        impl RemoteTable for Empty {
            fn insert(&self, _note: &Note) -> Result<RemoteRow, RemoteError> {
                Err(RemoteError::Api {
                    message: "read only".to_string(),
                })
            }
            fn list_all(&self) -> Result<Vec<RemoteRow>, RemoteError> {
                Ok(Vec::new())
            }
            fn get_by_id(&self, _id: &NoteId) -> Result<Option<RemoteRow>, RemoteError> {
                Ok(None)
            }
            fn delete_by_id(&self, _id: &NoteId) -> Result<bool, RemoteError> {
                Ok(false)
            }
        }

        let table: &dyn RemoteTable = &Empty;
        assert!(table.list_all().unwrap().is_empty());
        assert!(table.get_by_id(&NoteId::new("1")).unwrap().is_none());
    }
}
