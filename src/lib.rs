// Copyright 2025 EcoPesca contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # EcoPesca
//!
//! Catch-length estimation for a fishing-log app.
//!
//! A photo is sent to a hosted object detector; the returned bounding boxes
//! are turned into a real-world length using either two calibration taps of
//! known distance (e.g. on a ruler) or a detected reference object of known
//! size (e.g. a coin). The estimate then fills the length field of a catch
//! record that is submitted to the record API with the token obtained from
//! [`AuthClient::login`].
//!
//! ## Two-point example
//!
//! ```rust
//! use ecopesca::{estimate_via_two_points, select_primary_subject, CalibrationPoint, Detection, PreviewScale};
//!
//! let detections = vec![Detection::new(320.0, 240.0, 60.0, 80.0, "fish", 0.91)];
//! let subject = select_primary_subject(&detections, Some("fish"));
//! let taps = [CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(30.0, 40.0)];
//!
//! let estimate = estimate_via_two_points(subject, &taps, 10.0, PreviewScale::identity()).unwrap();
//! assert_eq!(estimate.length_cm, 20.0);
//! ```
//!
//! ## Session example
//!
//! ```rust,no_run
//! use ecopesca::{AppSettings, DetectorClient, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = AppSettings::load();
//!     let detector = DetectorClient::new(settings.detector_config());
//!     let mut controller = SessionController::new(settings.estimator_settings());
//!
//!     let image = std::fs::read("catch.jpg")?;
//!     controller.capture_and_detect(Some("catch.jpg".into()), image, &detector, None);
//!     controller.settle().await;
//!
//!     println!("{:?}", controller.session().phase());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod detection;
pub mod detector;
pub mod estimator;
pub mod record;
pub mod session;
pub mod settings;

pub use auth::{AuthClient, AuthError, AuthSession, NewAccount, User};
pub use detection::{Detection, DetectionBatch, DetectorImage};
pub use detector::{DetectorClient, DetectorConfig, DetectorError};
pub use estimator::{
    estimate_via_reference_object, estimate_via_two_points, select_primary_subject,
    CalibrationPoint, EstimateError, EstimationResult, LengthEstimate, PreviewScale, SizeMetric,
};
pub use record::{CatchRecord, FormError, RecordClient, RecordError};
pub use session::{
    BatchKind, CalibrationMode, CalibrationSession, EstimatorSettings, PhotoId, SessionController,
    SessionPhase,
};
pub use settings::{AppSettings, SettingsError};
