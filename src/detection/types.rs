//! Detection types and boundary validation of detector responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single bounding box reported by the detector.
///
/// Coordinates are centre-based and expressed in the pixel space of the
/// image that was submitted to the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box centre X.
    pub x: f64,
    /// Box centre Y.
    pub y: f64,
    /// Box width in pixels.
    pub width: f64,
    /// Box height in pixels.
    pub height: f64,
    /// Detected category, e.g. "fish" or "coin".
    pub class: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    /// Create a new detection.
    pub fn new(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        class: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            class: class.into(),
            confidence,
        }
    }

    /// Bounding-box area in square pixels.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Bounding-box diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// Longest bounding-box side in pixels.
    pub fn longest_side(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Whether this detection belongs to the given class (case-insensitive).
    pub fn is_class(&self, class: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
    }

    /// Validate a raw JSON prediction into a `Detection`.
    ///
    /// Returns `None` when any numeric field is missing or non-finite, when
    /// the box has a non-positive side, or when confidence is outside `[0, 1]`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let number = |key: &str| value.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());

        let detection = Self {
            x: number("x")?,
            y: number("y")?,
            width: number("width")?,
            height: number("height")?,
            class: value
                .get("class")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())?
                .to_string(),
            confidence: number("confidence")?,
        };

        if detection.width <= 0.0 || detection.height <= 0.0 {
            return None;
        }
        if !(0.0..=1.0).contains(&detection.confidence) {
            return None;
        }

        Some(detection)
    }
}

/// Dimensions of the image the detector actually ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorImage {
    pub width: u32,
    pub height: u32,
}

impl DetectorImage {
    fn from_value(value: &Value) -> Option<Self> {
        let width = value.get("width").and_then(Value::as_u64)?;
        let height = value.get("height").and_then(Value::as_u64)?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width: u32::try_from(width).ok()?,
            height: u32::try_from(height).ok()?,
        })
    }
}

/// Validated detector response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    /// Image size reported by the detector, if present and sane.
    pub image: Option<DetectorImage>,
    /// Predictions that passed validation, in the detector's order.
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    /// An empty batch ("no detections").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate an untyped detector body.
    ///
    /// Malformed predictions are skipped; a missing or non-array
    /// `predictions` field yields an empty batch.
    pub fn from_value(body: &Value) -> Self {
        let image = body.get("image").and_then(DetectorImage::from_value);

        let raw = body
            .get("predictions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let detections: Vec<Detection> = raw.iter().filter_map(Detection::from_value).collect();

        let dropped = raw.len() - detections.len();
        if dropped > 0 {
            tracing::warn!("Dropped {} malformed prediction(s) from detector response", dropped);
        }

        Self { image, detections }
    }

    /// Parse a raw response body, treating malformed JSON as "no detections".
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                tracing::warn!("Detector returned malformed JSON: {}", e);
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections of a given class, in order.
    pub fn of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Detection> + 'a {
        self.detections.iter().filter(move |d| d.is_class(class))
    }
}
