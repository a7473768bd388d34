//! Catch record payload and form validation.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::get_messages;
use crate::config::options::{self, day_label, BAIT, DAYS, GEAR, SHIFTS, WEATHER, WIND};
use crate::detection::Detection;
use crate::estimator::{parse_centimetres, LengthEstimate};

/// Form validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("name must have at least 2 characters")]
    NameTooShort,
    #[error("area is required")]
    MissingArea,
    #[error("unknown area: {0}")]
    UnknownArea(String),
    #[error("length must be a positive number")]
    InvalidLength,
    #[error("unknown {field}: {value}")]
    UnknownOption { field: &'static str, value: String },
}

impl FormError {
    /// Localised validation notice.
    pub fn user_message(&self, lang: &str) -> &'static str {
        get_messages(lang).invalid_form
    }
}

/// A fishing-log entry as sent to the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchRecord {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "nomePopular", default)]
    pub popular_name: String,
    /// Estimated or manually entered length.
    #[serde(rename = "tamanho_cm")]
    pub length_cm: Option<f64>,
    pub area: String,
    /// ISO date (YYYY-MM-DD).
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "dia")]
    pub day: String,
    #[serde(rename = "turno")]
    pub shift: String,
    #[serde(rename = "equipamento")]
    pub gear: String,
    #[serde(rename = "isca")]
    pub bait: String,
    #[serde(rename = "condicoes")]
    pub weather: String,
    #[serde(rename = "vento")]
    pub wind: String,
    #[serde(rename = "foto_cm_uri")]
    pub photo_uri: Option<String>,
    #[serde(rename = "deteccoes", default)]
    pub detections: Vec<Detection>,
}

impl CatchRecord {
    /// New record dated today with the first option of every list.
    pub fn new(name: impl Into<String>, area: impl Into<String>) -> Self {
        Self::on_date(name, area, Local::now().date_naive())
    }

    /// New record for a given date; the weekday follows the date.
    pub fn on_date(name: impl Into<String>, area: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            popular_name: String::new(),
            length_cm: None,
            area: area.into(),
            date,
            day: day_label(date).to_string(),
            shift: SHIFTS[0].to_string(),
            gear: GEAR[0].to_string(),
            bait: BAIT[0].to_string(),
            weather: WEATHER[0].to_string(),
            wind: WIND[0].to_string(),
            photo_uri: None,
            detections: Vec::new(),
        }
    }

    pub fn with_popular_name(mut self, popular_name: impl Into<String>) -> Self {
        self.popular_name = popular_name.into();
        self
    }

    pub fn with_shift(mut self, shift: impl Into<String>) -> Self {
        self.shift = shift.into();
        self
    }

    pub fn with_length(mut self, length_cm: f64) -> Self {
        self.length_cm = Some(length_cm);
        self
    }

    /// Fill the length from an estimate.
    pub fn apply_estimate(&mut self, estimate: &LengthEstimate) {
        self.length_cm = Some(estimate.length_cm);
    }

    /// Set the length from manual input; an empty input clears it.
    pub fn set_length_input(&mut self, text: &str) -> Result<(), FormError> {
        if text.trim().is_empty() {
            self.length_cm = None;
            return Ok(());
        }
        self.length_cm = Some(parse_centimetres(text).ok_or(FormError::InvalidLength)?);
        Ok(())
    }

    /// Attach the photo and its raw detections.
    pub fn with_photo(mut self, photo_uri: Option<String>, detections: Vec<Detection>) -> Self {
        self.photo_uri = photo_uri;
        self.detections = detections;
        self
    }

    /// Check the fields the API requires.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.name.trim().chars().count() < 2 {
            return Err(FormError::NameTooShort);
        }
        if self.area.trim().is_empty() {
            return Err(FormError::MissingArea);
        }
        if !options::is_area(&self.area) {
            return Err(FormError::UnknownArea(self.area.clone()));
        }
        if let Some(length) = self.length_cm {
            if !length.is_finite() || length <= 0.0 {
                return Err(FormError::InvalidLength);
            }
        }

        let choices: [(&'static str, &[&str], &str); 6] = [
            ("day", &DAYS[..], self.day.as_str()),
            ("shift", &SHIFTS[..], self.shift.as_str()),
            ("gear", &GEAR[..], self.gear.as_str()),
            ("bait", &BAIT[..], self.bait.as_str()),
            ("weather", &WEATHER[..], self.weather.as_str()),
            ("wind", &WIND[..], self.wind.as_str()),
        ];
        for (field, allowed, value) in choices {
            if !options::is_option(allowed, value) {
                return Err(FormError::UnknownOption {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_new_record_defaults() {
        let record = CatchRecord::on_date("Robalo", "Área 3", date());
        assert_eq!(record.day, "Sábado");
        assert_eq!(record.shift, "Manhã");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let record = CatchRecord::on_date(" R ", "Área 3", date());
        assert_eq!(record.validate(), Err(FormError::NameTooShort));

        let record = CatchRecord::on_date("Robalo", "", date());
        assert_eq!(record.validate(), Err(FormError::MissingArea));

        let record = CatchRecord::on_date("Robalo", "Área 42", date());
        assert!(matches!(record.validate(), Err(FormError::UnknownArea(_))));

        let record = CatchRecord::on_date("Robalo", "Área 1", date()).with_length(-2.0);
        assert_eq!(record.validate(), Err(FormError::InvalidLength));
    }

    #[test]
    fn test_validation_rejects_values_outside_dropdowns() {
        let record = CatchRecord::on_date("Robalo", "Área 1", date()).with_shift("Madrugada");
        assert_eq!(
            record.validate(),
            Err(FormError::UnknownOption {
                field: "shift",
                value: "Madrugada".to_string(),
            })
        );

        let mut record = CatchRecord::on_date("Robalo", "Área 1", date());
        record.wind = "Tempestade".to_string();
        assert!(matches!(
            record.validate(),
            Err(FormError::UnknownOption { field: "wind", .. })
        ));

        record.wind = WIND[4].to_string();
        record.bait = "Camarão vivo".to_string();
        record.gear = "Light".to_string();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_length_input() {
        let mut record = CatchRecord::on_date("Robalo", "Área 1", date());
        record.set_length_input("32,5").unwrap();
        assert_eq!(record.length_cm, Some(32.5));
        assert_eq!(record.set_length_input("abc"), Err(FormError::InvalidLength));
        record.set_length_input("  ").unwrap();
        assert_eq!(record.length_cm, None);
    }

    #[test]
    fn test_payload_field_names() {
        let record = CatchRecord::on_date("Robalo", "Área 1", date())
            .with_popular_name("Robalo-flecha")
            .with_length(32.0)
            .with_photo(
                Some("file:///fish.jpg".to_string()),
                vec![Detection::new(1.0, 2.0, 3.0, 4.0, "fish", 0.8)],
            );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["nome"], "Robalo");
        assert_eq!(json["nomePopular"], "Robalo-flecha");
        assert_eq!(json["tamanho_cm"], 32.0);
        assert_eq!(json["data"], "2026-10-17");
        assert_eq!(json["dia"], "Sábado");
        assert_eq!(json["deteccoes"][0]["class"], "fish");
    }
}
