//! Client for a hosted object-detection service (Roboflow-style API).

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::detection::DetectionBatch;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;

/// Detector client errors.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("HTTP {status} – {detail}")]
    ApiError { status: u16, detail: String },
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

/// Configuration for one detector model.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model (project) identifier.
    pub model: String,
    /// Model version.
    pub version: String,
    /// Minimum confidence, in `[0, 1]`.
    pub confidence: f64,
    /// Non-max suppression overlap, in `[0, 1]`.
    pub overlap: f64,
    /// Class filter; empty means all classes.
    pub classes: Vec<String>,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://detect.roboflow.com".to_string(),
            api_key: String::new(),
            model: "ecopesca_app-zpwxc".to_string(),
            version: "2".to_string(),
            confidence: 0.6,
            overlap: 0.5,
            classes: vec!["fish".to_string()],
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl DetectorConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap.clamp(0.0, 1.0);
        self
    }

    /// Replace the class filter.
    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Endpoint URL without the query string.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.version
        )
    }

    /// Query parameters sent with every request.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
            ("confidence", format_fraction(self.confidence)),
            ("overlap", format_fraction(self.overlap)),
        ];
        if !self.classes.is_empty() {
            query.push(("classes", self.classes.join(",")));
        }
        query
    }
}

/// Format a fraction the way the service expects (e.g. `0.6`).
fn format_fraction(value: f64) -> String {
    let text = format!("{:.3}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Client for the external detector.
#[derive(Clone)]
pub struct DetectorClient {
    config: DetectorConfig,
    client: Client,
}

impl DetectorClient {
    /// Create a new DetectorClient with the given configuration.
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection on raw image bytes (JPEG or PNG).
    pub async fn detect_bytes(&self, image: &[u8]) -> Result<DetectionBatch, DetectorError> {
        self.detect_base64(STANDARD.encode(image)).await
    }

    /// Run detection on raw image bytes, mapping any failure to "no detections".
    pub async fn detect_or_empty(&self, image: &[u8]) -> DetectionBatch {
        match self.detect_bytes(image).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("Detection with model {} failed: {}", self.config.model, e);
                DetectionBatch::empty()
            }
        }
    }

    /// Run detection on an already base64-encoded image.
    ///
    /// Retries transport errors and retryable HTTP statuses.
    pub async fn detect_base64(&self, image_base64: String) -> Result<DetectionBatch, DetectorError> {
        let url = self.config.endpoint();
        let mut last_error: Option<DetectorError> = None;
        let max_attempts = self.config.max_retries + 1;

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &image_base64).await {
                Ok(batch) => {
                    tracing::debug!(
                        "Detector returned {} detection(s) on attempt {}",
                        batch.detections.len(),
                        attempt
                    );
                    return Ok(batch);
                }
                Err(e) => {
                    if !Self::is_retryable_error(&e) {
                        return Err(e);
                    }
                    if attempt < max_attempts {
                        tracing::warn!(
                            "Detection request failed (attempt {}/{}): {}; retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(DetectorError::MaxRetriesExceeded(
            max_attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    /// Check if an error is worth retrying (network errors, 5xx, 429).
    fn is_retryable_error(error: &DetectorError) -> bool {
        match error {
            DetectorError::RequestFailed(_) => true,
            DetectorError::ApiError { status, .. } => *status == 429 || (500..=599).contains(status),
            DetectorError::MaxRetriesExceeded(_, _) => false,
        }
    }

    /// Send a single request to the detector.
    async fn send_request(&self, url: &str, image_base64: &str) -> Result<DetectionBatch, DetectorError> {
        let response = self
            .client
            .post(url)
            .query(&self.config.query())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(image_base64.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DetectorError::ApiError {
                status: status.as_u16(),
                detail: Self::error_detail(&body),
            });
        }

        Ok(DetectionBatch::parse(&body))
    }

    /// Extract a short error detail from a failed response body.
    fn error_detail(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                let snippet: String = body.chars().take(200).collect();
                if snippet.is_empty() {
                    "unknown error".to_string()
                } else {
                    snippet
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_config_default() {
        let config = DetectorConfig::default();
        assert_eq!(config.endpoint(), "https://detect.roboflow.com/ecopesca_app-zpwxc/2");
        assert_eq!(config.classes, vec!["fish".to_string()]);
    }

    #[test]
    fn test_query_parameters() {
        let config = DetectorConfig::default()
            .with_api_key("secret")
            .with_base_url("http://localhost:9001/")
            .with_model("coins")
            .with_version("7")
            .with_confidence(0.45)
            .with_classes(["coin", "ruler"]);
        assert_eq!(config.endpoint(), "http://localhost:9001/coins/7");

        let query = config.query();
        assert!(query.contains(&("api_key", "secret".to_string())));
        assert!(query.contains(&("confidence", "0.45".to_string())));
        assert!(query.contains(&("overlap", "0.5".to_string())));
        assert!(query.contains(&("classes", "coin,ruler".to_string())));
    }

    #[test]
    fn test_empty_class_filter_is_omitted() {
        let config = DetectorConfig::default().with_classes(Vec::<String>::new());
        assert!(config.query().iter().all(|(key, _)| *key != "classes"));
    }

    #[test]
    fn test_retryable_errors() {
        let server = DetectorError::ApiError { status: 503, detail: String::new() };
        let limited = DetectorError::ApiError { status: 429, detail: String::new() };
        let auth = DetectorError::ApiError { status: 403, detail: String::new() };
        assert!(DetectorClient::is_retryable_error(&server));
        assert!(DetectorClient::is_retryable_error(&limited));
        assert!(!DetectorClient::is_retryable_error(&auth));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(DetectorClient::error_detail(r#"{"error": "bad key"}"#), "bad key");
        assert_eq!(DetectorClient::error_detail("oops"), "oops");
        assert_eq!(DetectorClient::error_detail(""), "unknown error");
    }
}
