//! Detection data model shared by the detector client and the estimator.

mod types;

pub use types::{Detection, DetectionBatch, DetectorImage};
