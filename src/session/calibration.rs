//! Per-photo calibration session.
//!
//! The session owns everything tied to one captured photo: the detections,
//! the calibration taps and the last estimate. Capturing a new photo starts a
//! new session id and discards the previous state, so late detector responses
//! for an older photo can be recognised and ignored.

use serde::{Deserialize, Serialize};

use crate::detection::{Detection, DetectionBatch, DetectorImage};
use crate::estimator::{
    estimate_via_reference_object, estimate_via_two_points_with, parse_centimetres,
    select_primary_subject, CalibrationPoint, EstimateError, EstimationResult, LengthEstimate,
    PreviewScale, SizeMetric,
};

/// Monotonically increasing photo identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhotoId(u64);

impl PhotoId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the session derives its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// User taps two points of known distance.
    #[default]
    TwoPoint,
    /// A detected object of known size sets the scale.
    ReferenceObject,
}

/// Which detector model a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Subject,
    Reference,
}

/// Session lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    NoPhoto,
    /// Photo taken, detections still pending.
    PhotoCaptured,
    DetectionsReceived,
    /// Collecting taps; holds the number collected so far (0..=2).
    TwoPointCalibrating(usize),
    /// Waiting for the reference batch before estimating automatically.
    ReferenceObjectAuto,
    Estimated(LengthEstimate),
    Unavailable(EstimateError),
}

/// Estimator parameters used by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    pub mode: CalibrationMode,
    /// Subject class to measure; `None` measures the largest detection.
    pub subject_class: Option<String>,
    /// Class name of the reference object.
    pub reference_class: String,
    /// Real size of the reference object's longest side, in centimetres.
    pub reference_size_cm: f64,
    /// Whether reference detections come from a second detector model.
    pub separate_reference_model: bool,
    /// Subject metric for two-point mode.
    pub two_point_metric: SizeMetric,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::TwoPoint,
            subject_class: Some("fish".to_string()),
            reference_class: "coin".to_string(),
            reference_size_cm: 2.7,
            separate_reference_model: false,
            two_point_metric: SizeMetric::Diagonal,
        }
    }
}

impl EstimatorSettings {
    pub fn with_mode(mut self, mode: CalibrationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_subject_class(mut self, class: Option<String>) -> Self {
        self.subject_class = class;
        self
    }

    pub fn with_reference(mut self, class: impl Into<String>, size_cm: f64) -> Self {
        self.reference_class = class.into();
        self.reference_size_cm = size_cm;
        self
    }

    pub fn with_separate_reference_model(mut self, separate: bool) -> Self {
        self.separate_reference_model = separate;
        self
    }

    pub fn with_two_point_metric(mut self, metric: SizeMetric) -> Self {
        self.two_point_metric = metric;
        self
    }
}

/// State for the photo currently on screen.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    settings: EstimatorSettings,
    last_id: u64,
    photo_id: Option<PhotoId>,
    photo_uri: Option<String>,
    subject_batch: Option<DetectionBatch>,
    reference_batch: Option<DetectionBatch>,
    /// Fallback image size when the detector does not report one.
    image_size: Option<DetectorImage>,
    preview_size: Option<(f64, f64)>,
    points: Vec<CalibrationPoint>,
    phase: SessionPhase,
}

impl CalibrationSession {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            settings,
            last_id: 0,
            photo_id: None,
            photo_uri: None,
            subject_batch: None,
            reference_batch: None,
            image_size: None,
            preview_size: None,
            points: Vec::new(),
            phase: SessionPhase::NoPhoto,
        }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Change the calibration mode, keeping the current photo.
    pub fn set_mode(&mut self, mode: CalibrationMode) {
        self.settings.mode = mode;
        if self.subject_batch.is_some() {
            self.enter_calibration();
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn current_photo(&self) -> Option<PhotoId> {
        self.photo_id
    }

    pub fn photo_uri(&self) -> Option<&str> {
        self.photo_uri.as_deref()
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Subject detections for the current photo.
    pub fn detections(&self) -> &[Detection] {
        self.subject_batch
            .as_ref()
            .map(|b| b.detections.as_slice())
            .unwrap_or_default()
    }

    /// All detections for the current photo, subject batch first.
    pub fn all_detections(&self) -> Vec<Detection> {
        self.subject_batch
            .iter()
            .chain(self.reference_batch.iter())
            .flat_map(|b| b.detections.iter().cloned())
            .collect()
    }

    /// The last successful estimate, if any.
    pub fn estimate(&self) -> Option<LengthEstimate> {
        match self.phase {
            SessionPhase::Estimated(estimate) => Some(estimate),
            _ => None,
        }
    }

    /// Start a new photo session, discarding the previous one.
    pub fn begin_photo(&mut self, photo_uri: Option<String>) -> PhotoId {
        self.last_id += 1;
        let id = PhotoId(self.last_id);
        self.clear();
        self.photo_id = Some(id);
        self.photo_uri = photo_uri;
        self.phase = SessionPhase::PhotoCaptured;
        tracing::debug!("Started photo session {}", id);
        id
    }

    /// Drop the current photo (e.g. when leaving the screen).
    pub fn reset(&mut self) {
        self.clear();
        self.photo_id = None;
        self.phase = SessionPhase::NoPhoto;
    }

    fn clear(&mut self) {
        self.photo_uri = None;
        self.subject_batch = None;
        self.reference_batch = None;
        self.image_size = None;
        self.points.clear();
    }

    /// Record the size of the image sent to the detector.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        self.image_size = Some(DetectorImage { width, height });
    }

    /// Record the on-screen preview size.
    pub fn set_preview_size(&mut self, width: f64, height: f64) {
        self.preview_size = Some((width, height));
    }

    /// Detector image size: reported by the detector, else the recorded one.
    pub fn detector_image(&self) -> Option<DetectorImage> {
        self.subject_batch
            .as_ref()
            .and_then(|b| b.image)
            .or_else(|| self.reference_batch.as_ref().and_then(|b| b.image))
            .or(self.image_size)
    }

    /// Preview-to-detector scale for the current photo.
    pub fn preview_scale(&self) -> PreviewScale {
        match (self.preview_size, self.detector_image()) {
            (Some((w, h)), Some(image)) => PreviewScale::from_sizes(w, h, image.width, image.height),
            _ => PreviewScale::identity(),
        }
    }

    /// Apply a detector batch for `photo_id`.
    ///
    /// Returns `false` and leaves the session untouched when the batch
    /// belongs to a photo other than the current one.
    pub fn receive(&mut self, photo_id: PhotoId, kind: BatchKind, batch: DetectionBatch) -> bool {
        if self.photo_id != Some(photo_id) {
            tracing::info!(
                "Discarding stale {:?} detections for photo {} (current: {:?})",
                kind,
                photo_id,
                self.photo_id.map(|id| id.value())
            );
            return false;
        }

        tracing::debug!(
            "Photo {}: received {} {:?} detection(s)",
            photo_id,
            batch.detections.len(),
            kind
        );
        match kind {
            BatchKind::Subject => self.subject_batch = Some(batch),
            BatchKind::Reference => self.reference_batch = Some(batch),
        }

        if self.subject_batch.is_none() {
            return true;
        }
        match self.phase {
            SessionPhase::PhotoCaptured => {
                self.phase = SessionPhase::DetectionsReceived;
                self.enter_calibration();
            }
            // A reference batch that was still outstanding completes the estimate.
            SessionPhase::ReferenceObjectAuto
                if self.settings.mode == CalibrationMode::ReferenceObject =>
            {
                self.enter_calibration();
            }
            // Calibration already under way or finished; keep it.
            _ => {}
        }
        true
    }

    fn reference_ready(&self) -> bool {
        !self.settings.separate_reference_model || self.reference_batch.is_some()
    }

    fn enter_calibration(&mut self) {
        match self.settings.mode {
            CalibrationMode::TwoPoint => {
                self.phase = SessionPhase::TwoPointCalibrating(self.points.len());
            }
            CalibrationMode::ReferenceObject => {
                self.phase = SessionPhase::ReferenceObjectAuto;
                if self.reference_ready() {
                    // Result is recorded in the phase.
                    let _ = self.estimate_with_reference();
                }
            }
        }
    }

    /// Register a calibration tap in preview coordinates.
    ///
    /// A third tap restarts collection from that tap. Returns `false` if no
    /// detections are available yet or the session is not in two-point mode.
    pub fn tap(&mut self, point: CalibrationPoint) -> bool {
        if self.settings.mode != CalibrationMode::TwoPoint || self.subject_batch.is_none() {
            return false;
        }
        if self.points.len() >= 2 {
            self.points.clear();
        }
        self.points.push(point);
        self.phase = SessionPhase::TwoPointCalibrating(self.points.len());
        true
    }

    /// Estimate with the two collected taps and a typed real distance.
    pub fn estimate_two_points_input(&mut self, real_distance: &str) -> EstimationResult {
        match parse_centimetres(real_distance) {
            Some(distance) => self.estimate_with_two_points(distance),
            None => self.record(Err(EstimateError::InvalidRealDistance)),
        }
    }

    /// Estimate with the two collected taps.
    pub fn estimate_with_two_points(&mut self, real_distance_cm: f64) -> EstimationResult {
        let subject = select_primary_subject(self.detections(), self.settings.subject_class.as_deref());
        let result = estimate_via_two_points_with(
            subject,
            &self.points,
            real_distance_cm,
            self.preview_scale(),
            self.settings.two_point_metric,
        );
        self.record(result)
    }

    /// Estimate from the reference object in the current detections.
    pub fn estimate_with_reference(&mut self) -> EstimationResult {
        let reference_class = self.settings.reference_class.as_str();
        let subject_class = self.settings.subject_class.as_deref();

        let subjects: Vec<Detection> = self
            .detections()
            .iter()
            .filter(|d| !d.is_class(reference_class))
            .filter(|d| subject_class.map_or(true, |class| d.is_class(class)))
            .cloned()
            .collect();

        let references: Vec<Detection> = self
            .subject_batch
            .iter()
            .chain(self.reference_batch.iter())
            .flat_map(|b| b.of_class(reference_class))
            .cloned()
            .collect();

        let result =
            estimate_via_reference_object(&subjects, &references, self.settings.reference_size_cm);
        self.record(result)
    }

    fn record(&mut self, result: EstimationResult) -> EstimationResult {
        self.phase = match result {
            Ok(estimate) => SessionPhase::Estimated(estimate),
            Err(e) => {
                tracing::debug!("Estimation unavailable: {}", e);
                SessionPhase::Unavailable(e)
            }
        };
        result
    }
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(EstimatorSettings::default())
    }
}
