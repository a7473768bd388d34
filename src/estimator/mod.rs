//! Length estimation from detections and a calibration signal.

mod length;

pub use length::{
    estimate_via_reference_object, estimate_via_two_points, estimate_via_two_points_with,
    parse_centimetres, round_to_tenth, select_primary_subject, CalibrationPoint, EstimateError, EstimationResult,
    LengthEstimate, PreviewScale, SizeMetric,
};
