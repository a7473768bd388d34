//! Photo calibration session and its async controller.

mod calibration;
mod controller;

pub use calibration::{
    BatchKind, CalibrationMode, CalibrationSession, EstimatorSettings, PhotoId, SessionPhase,
};
pub use controller::{DetectionUpdate, SessionController, UpdateOutcome, UpdateSender};
