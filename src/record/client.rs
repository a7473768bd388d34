//! Client for the catch-record REST API.

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::form::{CatchRecord, FormError};
use crate::config::operation_failed;

/// Record submission errors.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid record: {0}")]
    Invalid(#[from] FormError),
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("HTTP {status}{}", message_suffix(.message))]
    Api { status: u16, message: Option<String> },
    #[error("response did not contain a record id")]
    MissingId,
}

pub(crate) fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" – {}", m))
        .unwrap_or_default()
}

impl RecordError {
    /// Generic operation-failed notice with this error appended.
    pub fn user_message(&self, lang: &str) -> String {
        match self {
            RecordError::Invalid(e) => e.user_message(lang).to_string(),
            other => operation_failed(lang, &other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: Option<i64>,
}

/// Client for `/registros`.
#[derive(Clone)]
pub struct RecordClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl RecordClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            client: Client::new(),
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Validate and submit a record, returning the created id.
    pub async fn submit(&self, record: &CatchRecord) -> Result<i64, RecordError> {
        record.validate()?;

        let request = self.client.post(self.url("/registros")).json(record);
        let body = self.send(request).await?;
        let created: CreatedResponse =
            serde_json::from_value(body).map_err(|_| RecordError::MissingId)?;
        let id = created.id.ok_or(RecordError::MissingId)?;

        tracing::info!("Record #{} saved", id);
        Ok(id)
    }

    /// List the signed-in user's records, newest first.
    pub async fn list(&self) -> Result<Vec<Value>, RecordError> {
        let body = self.send(self.client.get(self.url("/registros"))).await?;
        Ok(match body {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RecordError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = parse_body(&response.text().await?);

        if !status.is_success() {
            tracing::warn!("API request failed with HTTP {}", status.as_u16());
            return Err(RecordError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }
}

/// Parse an API response body; empty or non-JSON bodies become `Null`.
pub(crate) fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text).unwrap_or(Value::Null)
    }
}

/// Error text from a failed API response (`message`, else `error`).
pub(crate) fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
