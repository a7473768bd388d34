//! Detector client module for the external object-detection service.

mod client;

pub use client::{
    DetectorClient, DetectorConfig, DetectorError, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
