//! Persisted application settings.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::detector::{DetectorConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use crate::estimator::SizeMetric;
use crate::session::{CalibrationMode, EstimatorSettings};

/// Settings persistence errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Record API base URL
    pub api_base_url: String,
    /// Bearer token for the record API
    pub api_token: String,
    /// Language code ("pt" or "en")
    pub lang: String,
    /// Detector base URL
    pub detector_base_url: String,
    /// Detector API key
    pub detector_api_key: String,
    /// Subject detector model and version
    pub detector_model: String,
    pub detector_version: String,
    /// Minimum detection confidence
    pub detector_confidence: f64,
    /// NMS overlap
    pub detector_overlap: f64,
    /// Subject class to measure
    pub subject_class: String,
    /// Optional second model for the reference object (empty = same model)
    pub reference_model: String,
    pub reference_version: String,
    /// Reference object class and size
    pub reference_class: String,
    pub reference_size_cm: f64,
    /// Calibration mode
    pub calibration_mode: CalibrationMode,
    /// Default ruler distance for two-point calibration
    pub default_ruler_cm: f64,
    /// Subject metric used by two-point calibration
    pub two_point_metric: SizeMetric,
    /// Maximum retries for detector requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        let estimator = EstimatorSettings::default();
        Self {
            api_base_url: "http://localhost:3333".to_string(),
            api_token: String::new(),
            lang: "pt".to_string(),
            detector_base_url: detector.base_url,
            detector_api_key: String::new(),
            detector_model: detector.model,
            detector_version: detector.version,
            detector_confidence: detector.confidence,
            detector_overlap: detector.overlap,
            subject_class: "fish".to_string(),
            reference_model: String::new(),
            reference_version: "1".to_string(),
            reference_class: estimator.reference_class,
            reference_size_cm: estimator.reference_size_cm,
            calibration_mode: estimator.mode,
            default_ruler_cm: 10.0,
            two_point_metric: estimator.two_point_metric,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("br", "ecopesca", "ecopesca")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .map(|content| Self::from_json(&content))
            .unwrap_or_default()
    }

    /// Parse settings JSON, backfilling fields older files left blank.
    pub fn from_json(content: &str) -> Self {
        let defaults = Self::default();
        let mut loaded: Self = match serde_json::from_str(content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file: {}", e);
                return defaults;
            }
        };

        if loaded.detector_base_url.is_empty() {
            loaded.detector_base_url = defaults.detector_base_url;
        }
        if loaded.detector_model.is_empty() {
            loaded.detector_model = defaults.detector_model;
        }
        if loaded.detector_version.is_empty() {
            loaded.detector_version = defaults.detector_version;
        }
        if loaded.reference_class.is_empty() {
            loaded.reference_class = defaults.reference_class;
        }
        if loaded.reference_size_cm <= 0.0 {
            loaded.reference_size_cm = defaults.reference_size_cm;
        }
        if loaded.default_ruler_cm <= 0.0 {
            loaded.default_ruler_cm = defaults.default_ruler_cm;
        }

        loaded
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let dir = Self::config_dir().ok_or(SettingsError::NoConfigDir)?;
        fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join("settings.json"), content)?;
        Ok(())
    }

    /// Detector configuration for the subject model.
    pub fn detector_config(&self) -> DetectorConfig {
        let classes = if self.uses_separate_reference_model() || self.subject_class.is_empty() {
            vec![self.subject_class.clone()]
        } else {
            vec![self.subject_class.clone(), self.reference_class.clone()]
        };
        DetectorConfig::default()
            .with_base_url(&self.detector_base_url)
            .with_api_key(&self.detector_api_key)
            .with_model(&self.detector_model)
            .with_version(&self.detector_version)
            .with_confidence(self.detector_confidence)
            .with_overlap(self.detector_overlap)
            .with_classes(classes.into_iter().filter(|c| !c.is_empty()))
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    pub fn uses_separate_reference_model(&self) -> bool {
        !self.reference_model.is_empty()
    }

    /// Detector configuration for the reference model, if one is configured.
    pub fn reference_detector_config(&self) -> Option<DetectorConfig> {
        if !self.uses_separate_reference_model() {
            return None;
        }
        Some(
            self.detector_config()
                .with_model(&self.reference_model)
                .with_version(&self.reference_version)
                .with_classes([self.reference_class.clone()]),
        )
    }

    /// Estimator parameters for a calibration session.
    pub fn estimator_settings(&self) -> EstimatorSettings {
        let subject_class = (!self.subject_class.is_empty()).then(|| self.subject_class.clone());
        EstimatorSettings::default()
            .with_mode(self.calibration_mode)
            .with_subject_class(subject_class)
            .with_reference(&self.reference_class, self.reference_size_cm)
            .with_separate_reference_model(self.uses_separate_reference_model())
            .with_two_point_metric(self.two_point_metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_defaults() {
        let settings = AppSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(AppSettings::from_json(&json), settings);
    }

    #[test]
    fn test_backfill_old_file() {
        let settings = AppSettings::from_json(
            r#"{"detector_model": "", "reference_size_cm": 0, "lang": "en", "calibration_mode": "reference_object"}"#,
        );
        assert_eq!(settings.lang, "en");
        assert_eq!(settings.detector_model, "ecopesca_app-zpwxc");
        assert_eq!(settings.reference_size_cm, 2.7);
        assert_eq!(settings.calibration_mode, CalibrationMode::ReferenceObject);
    }

    #[test]
    fn test_unreadable_file_uses_defaults() {
        assert_eq!(AppSettings::from_json("not json"), AppSettings::default());
    }

    #[test]
    fn test_detector_configs() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.detector_config().classes, vec!["fish", "coin"]);
        assert!(settings.reference_detector_config().is_none());
        assert!(!settings.estimator_settings().separate_reference_model);

        settings.reference_model = "coins".to_string();
        let reference = settings.reference_detector_config().unwrap();
        assert_eq!(reference.model, "coins");
        assert_eq!(reference.classes, vec!["coin"]);
        assert_eq!(settings.detector_config().classes, vec!["fish"]);
        assert!(settings.estimator_settings().separate_reference_model);
    }
}
