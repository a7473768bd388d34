//! Pixel-to-centimetre length estimation.
//!
//! Two interchangeable calibration strategies are supported:
//! - **Two-point**: the user taps two points of known real distance (e.g. the
//!   0 cm and 10 cm marks of a ruler) on the preview.
//! - **Reference object**: the detector finds an object of known physical
//!   size (e.g. a coin) in the same photo.
//!
//! All functions here are pure. Failures are returned as [`EstimateError`]
//! and never panic or produce `NaN`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::get_messages;
use crate::detection::Detection;

/// Why an estimate could not be produced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateError {
    #[error("no subject detection available")]
    NoSubject,
    #[error("no reference object detection available")]
    NoReference,
    #[error("fewer than two calibration points")]
    MissingCalibrationPoints,
    #[error("degenerate calibration (zero distance or zero scale)")]
    DegenerateCalibration,
    #[error("real distance must be a positive number")]
    InvalidRealDistance,
    #[error("subject is too small to measure at this scale")]
    SubjectTooSmall,
}

impl EstimateError {
    /// Actionable, localised message for the user.
    pub fn user_message(&self, lang: &str) -> &'static str {
        let messages = get_messages(lang);
        match self {
            EstimateError::NoSubject => messages.no_subject,
            EstimateError::NoReference => messages.no_reference,
            EstimateError::MissingCalibrationPoints => messages.tap_two_points,
            EstimateError::DegenerateCalibration => messages.tap_distinct_points,
            EstimateError::InvalidRealDistance => messages.enter_positive_distance,
            EstimateError::SubjectTooSmall => messages.subject_too_small,
        }
    }
}

/// Outcome of an estimation attempt.
pub type EstimationResult = Result<LengthEstimate, EstimateError>;

/// How a bounding box is reduced to a single pixel length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMetric {
    /// `sqrt(width² + height²)`
    #[default]
    Diagonal,
    /// `max(width, height)`
    LongestSide,
}

impl SizeMetric {
    /// Measure a detection with this metric.
    pub fn measure(self, detection: &Detection) -> f64 {
        match self {
            SizeMetric::Diagonal => detection.diagonal(),
            SizeMetric::LongestSide => detection.longest_side(),
        }
    }
}

/// A tap location in preview coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
}

impl CalibrationPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Preview-to-detector scale factors.
///
/// A factor of `0.5` means the preview is drawn at half the detector
/// resolution, so preview coordinates are divided by `0.5` to reach
/// detector space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewScale {
    pub x: f64,
    pub y: f64,
}

impl Default for PreviewScale {
    fn default() -> Self {
        Self::identity()
    }
}

impl PreviewScale {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Preview and detector share the same coordinate space.
    pub fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }

    /// Same factor on both axes.
    pub fn uniform(scale: f64) -> Self {
        Self { x: scale, y: scale }
    }

    /// Derive factors from preview and detector sizes.
    ///
    /// An axis with an unknown (zero) detector size falls back to `1.0`.
    pub fn from_sizes(preview_width: f64, preview_height: f64, detector_width: u32, detector_height: u32) -> Self {
        let axis = |preview: f64, detector: u32| {
            if detector == 0 {
                1.0
            } else {
                preview / detector as f64
            }
        };
        Self {
            x: axis(preview_width, detector_width),
            y: axis(preview_height, detector_height),
        }
    }

    fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }

    /// Convert a preview point to detector-image coordinates.
    pub fn to_detector(&self, point: CalibrationPoint) -> CalibrationPoint {
        CalibrationPoint {
            x: point.x / self.x,
            y: point.y / self.y,
        }
    }
}

/// A successful length estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthEstimate {
    /// Estimated length in centimetres, rounded to one decimal.
    pub length_cm: f64,
    /// Scale used, in pixels per centimetre of detector space.
    pub pixels_per_cm: f64,
    /// Subject size in detector pixels before scaling.
    pub subject_px: f64,
}

/// Round to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a user-entered centimetre value ("10", "10.5" or "10,5").
///
/// Returns `None` unless the value is a positive finite number.
pub fn parse_centimetres(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn finish(subject_px: f64, pixels_per_cm: f64) -> EstimationResult {
    if !pixels_per_cm.is_finite() || pixels_per_cm <= 0.0 {
        return Err(EstimateError::DegenerateCalibration);
    }
    let length_cm = round_to_tenth(subject_px / pixels_per_cm);
    if !length_cm.is_finite() {
        return Err(EstimateError::DegenerateCalibration);
    }
    // Rounds below 0.1 cm.
    if length_cm <= 0.0 {
        return Err(EstimateError::SubjectTooSmall);
    }
    Ok(LengthEstimate {
        length_cm,
        pixels_per_cm,
        subject_px,
    })
}

/// Pick the detection with the largest value of `key`, keeping the first on ties.
fn first_max_by<'a, I, F>(detections: I, key: F) -> Option<&'a Detection>
where
    I: IntoIterator<Item = &'a Detection>,
    F: Fn(&Detection) -> f64,
{
    detections.into_iter().fold(None, |best, candidate| match best {
        Some(current) if key(candidate) <= key(current) => Some(current),
        _ => Some(candidate),
    })
}

/// Select the subject to measure.
///
/// When `subject_class` is given only detections of that class are
/// considered. The detection with the largest box area wins; ties keep the
/// first one seen.
pub fn select_primary_subject<'a>(
    detections: &'a [Detection],
    subject_class: Option<&str>,
) -> Option<&'a Detection> {
    first_max_by(
        detections
            .iter()
            .filter(|d| subject_class.map_or(true, |class| d.is_class(class))),
        Detection::area,
    )
}

/// Estimate subject length from two calibration taps of known distance.
///
/// The taps are converted to detector space *before* measuring the ruler
/// distance. The subject is measured with `metric` (diagonal by default).
pub fn estimate_via_two_points(
    subject: Option<&Detection>,
    calib_points: &[CalibrationPoint],
    real_distance_cm: f64,
    preview_scale: PreviewScale,
) -> EstimationResult {
    estimate_via_two_points_with(subject, calib_points, real_distance_cm, preview_scale, SizeMetric::Diagonal)
}

/// [`estimate_via_two_points`] with an explicit subject metric.
pub fn estimate_via_two_points_with(
    subject: Option<&Detection>,
    calib_points: &[CalibrationPoint],
    real_distance_cm: f64,
    preview_scale: PreviewScale,
    metric: SizeMetric,
) -> EstimationResult {
    let subject = subject.ok_or(EstimateError::NoSubject)?;
    let [first, second] = match calib_points {
        [a, b, ..] => [*a, *b],
        _ => return Err(EstimateError::MissingCalibrationPoints),
    };
    if !real_distance_cm.is_finite() || real_distance_cm <= 0.0 {
        return Err(EstimateError::InvalidRealDistance);
    }
    if !preview_scale.is_valid() {
        return Err(EstimateError::DegenerateCalibration);
    }

    let p1 = preview_scale.to_detector(first);
    let p2 = preview_scale.to_detector(second);
    let ruler_px = (p2.x - p1.x).hypot(p2.y - p1.y);
    if !ruler_px.is_finite() || ruler_px == 0.0 {
        return Err(EstimateError::DegenerateCalibration);
    }

    finish(metric.measure(subject), ruler_px / real_distance_cm)
}

/// Estimate subject length from a detected reference object of known size.
///
/// The highest-confidence reference sets the scale; the subject with the
/// longest box side is measured. Both are measured by longest side.
pub fn estimate_via_reference_object(
    subject_detections: &[Detection],
    reference_detections: &[Detection],
    reference_real_size_cm: f64,
) -> EstimationResult {
    if !reference_real_size_cm.is_finite() || reference_real_size_cm <= 0.0 {
        return Err(EstimateError::InvalidRealDistance);
    }

    let reference = first_max_by(reference_detections, |d| d.confidence).ok_or(EstimateError::NoReference)?;
    let pixels_per_cm = reference.longest_side() / reference_real_size_cm;
    if !pixels_per_cm.is_finite() || pixels_per_cm <= 0.0 {
        return Err(EstimateError::DegenerateCalibration);
    }

    let subject = first_max_by(subject_detections, Detection::longest_side).ok_or(EstimateError::NoSubject)?;

    finish(subject.longest_side(), pixels_per_cm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fish(width: f64, height: f64) -> Detection {
        Detection::new(200.0, 200.0, width, height, "fish", 0.9)
    }

    fn coin(side: f64, confidence: f64) -> Detection {
        Detection::new(50.0, 50.0, side, side * 0.95, "coin", confidence)
    }

    #[test]
    fn test_select_largest_area() {
        let detections = vec![fish(10.0, 10.0), fish(30.0, 20.0), fish(20.0, 30.0), fish(5.0, 5.0)];
        let selected = select_primary_subject(&detections, None).unwrap();
        assert!(std::ptr::eq(selected, &detections[1]));
    }

    #[test]
    fn test_select_filters_class() {
        let detections = vec![coin(500.0, 0.9), fish(30.0, 20.0)];
        let selected = select_primary_subject(&detections, Some("fish")).unwrap();
        assert_eq!(selected.class, "fish");
        assert!(select_primary_subject(&detections, Some("crab")).is_none());
        assert!(select_primary_subject(&[], None).is_none());
    }

    #[test]
    fn test_two_points_scenario_a() {
        // 60x80 box -> 100px diagonal; taps 50px apart represent 10cm
        let subject = fish(60.0, 80.0);
        let points = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(30.0, 40.0)];
        let estimate = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::identity()).unwrap();
        assert_eq!(estimate.length_cm, 20.0);
        assert!((estimate.pixels_per_cm - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_points_scale_applied_before_distance() {
        // Preview at half resolution: 25px on screen is 50px in detector space.
        let subject = fish(60.0, 80.0);
        let points = [CalibrationPoint::new(10.0, 10.0), CalibrationPoint::new(25.0, 30.0)];
        let estimate = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::uniform(0.5)).unwrap();
        assert_eq!(estimate.length_cm, 20.0);

        // Anisotropic scale must be applied per axis before taking the norm.
        let points = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(15.0, 80.0)];
        let estimate = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::new(0.5, 2.0)).unwrap();
        assert_eq!(estimate.length_cm, 20.0);
    }

    #[test]
    fn test_two_points_matches_formula() {
        let subject = fish(123.0, 45.0);
        let points = [CalibrationPoint::new(12.0, 7.0), CalibrationPoint::new(88.0, 61.0)];
        let ruler = (76.0f64).hypot(54.0);
        let expected = round_to_tenth(subject.diagonal() * (7.5 / ruler));
        let estimate = estimate_via_two_points(Some(&subject), &points, 7.5, PreviewScale::identity()).unwrap();
        assert_eq!(estimate.length_cm, expected);
        assert!(estimate.length_cm > 0.0);
    }

    #[test]
    fn test_two_points_is_idempotent() {
        let subject = fish(90.0, 33.0);
        let points = [CalibrationPoint::new(3.0, 4.0), CalibrationPoint::new(70.0, 9.0)];
        let first = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::uniform(0.8));
        let second = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::uniform(0.8));
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_points_tiny_subject() {
        // 0.42px diagonal against 10 px/cm rounds to 0.0 cm
        let subject = fish(0.3, 0.3);
        let points = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(100.0, 0.0)];
        let result = estimate_via_two_points(Some(&subject), &points, 10.0, PreviewScale::identity());
        assert_eq!(result, Err(EstimateError::SubjectTooSmall));
        assert_eq!(
            EstimateError::SubjectTooSmall.user_message("en"),
            "The fish is too small in the photo to measure; move closer or enter the length manually."
        );
    }

    #[test]
    fn test_two_points_failures() {
        let subject = fish(60.0, 80.0);
        let same = [CalibrationPoint::new(5.0, 5.0), CalibrationPoint::new(5.0, 5.0)];
        let apart = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(10.0, 0.0)];

        assert_eq!(
            estimate_via_two_points(Some(&subject), &same, 10.0, PreviewScale::identity()),
            Err(EstimateError::DegenerateCalibration)
        );
        assert_eq!(
            estimate_via_two_points(None, &apart, 10.0, PreviewScale::identity()),
            Err(EstimateError::NoSubject)
        );
        assert_eq!(
            estimate_via_two_points(Some(&subject), &apart[..1], 10.0, PreviewScale::identity()),
            Err(EstimateError::MissingCalibrationPoints)
        );
        for distance in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                estimate_via_two_points(Some(&subject), &apart, distance, PreviewScale::identity()),
                Err(EstimateError::InvalidRealDistance)
            );
        }
        assert_eq!(
            estimate_via_two_points(Some(&subject), &apart, 10.0, PreviewScale::uniform(0.0)),
            Err(EstimateError::DegenerateCalibration)
        );
    }

    #[test]
    fn test_two_points_longest_side_metric() {
        let subject = fish(60.0, 80.0);
        let points = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(40.0, 0.0)];
        let estimate = estimate_via_two_points_with(
            Some(&subject),
            &points,
            10.0,
            PreviewScale::identity(),
            SizeMetric::LongestSide,
        )
        .unwrap();
        assert_eq!(estimate.length_cm, 20.0);
    }

    #[test]
    fn test_reference_scenario_b() {
        let subjects = vec![fish(300.0, 110.0)];
        let references = vec![Detection::new(10.0, 10.0, 40.0, 39.0, "coin", 0.8)];
        let estimate = estimate_via_reference_object(&subjects, &references, 4.268).unwrap();
        assert!((estimate.pixels_per_cm - 9.372).abs() < 0.01);
        assert_eq!(estimate.length_cm, 32.0);
    }

    #[test]
    fn test_reference_picks_best_confidence_and_longest_subject() {
        let subjects = vec![fish(100.0, 90.0), fish(40.0, 200.0), fish(200.0, 10.0)];
        let references = vec![coin(10.0, 0.5), coin(20.0, 0.95), coin(80.0, 0.95)];
        let estimate = estimate_via_reference_object(&subjects, &references, 2.0).unwrap();
        // 20px reference over 2cm -> 10 px/cm; 200px longest side, first seen
        assert_eq!(estimate.pixels_per_cm, 10.0);
        assert_eq!(estimate.length_cm, 20.0);
        assert_eq!(estimate.subject_px, 200.0);
    }

    #[test]
    fn test_reference_is_idempotent() {
        let subjects = vec![fish(300.0, 90.0), fish(120.0, 250.0)];
        let references = vec![coin(40.0, 0.7), coin(55.0, 0.7), coin(30.0, 0.4)];
        let first = estimate_via_reference_object(&subjects, &references, 4.268);
        let second = estimate_via_reference_object(&subjects, &references, 4.268);
        assert!(first.is_ok());
        assert_eq!(first, second);
    }

    #[test]
    fn test_reference_failures() {
        let subjects = vec![fish(100.0, 90.0)];
        let references = vec![coin(20.0, 0.9)];
        assert_eq!(
            estimate_via_reference_object(&subjects, &[], 2.0),
            Err(EstimateError::NoReference)
        );
        assert_eq!(
            estimate_via_reference_object(&[], &references, 2.0),
            Err(EstimateError::NoSubject)
        );
        assert_eq!(
            estimate_via_reference_object(&subjects, &references, 0.0),
            Err(EstimateError::InvalidRealDistance)
        );
        assert_eq!(
            estimate_via_reference_object(&[], &[], 2.0),
            Err(EstimateError::NoReference)
        );
    }

    #[test]
    fn test_preview_scale_from_sizes() {
        let scale = PreviewScale::from_sizes(640.0, 480.0, 1280, 960);
        assert_eq!(scale, PreviewScale::uniform(0.5));
        let unknown = PreviewScale::from_sizes(640.0, 480.0, 0, 0);
        assert_eq!(unknown, PreviewScale::identity());
    }

    #[test]
    fn test_parse_centimetres() {
        assert_eq!(parse_centimetres("10"), Some(10.0));
        assert_eq!(parse_centimetres(" 12,5 "), Some(12.5));
        assert_eq!(parse_centimetres("0"), None);
        assert_eq!(parse_centimetres("-4"), None);
        assert_eq!(parse_centimetres("dez"), None);
        assert_eq!(parse_centimetres("NaN"), None);
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            EstimateError::DegenerateCalibration.user_message("en"),
            "Tap two distinct points on the ruler."
        );
        assert!(!EstimateError::NoSubject.user_message("pt").is_empty());
    }
}
