//! Nutrition analysis result and its schema checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nutrition facts for one identified food.
///
/// Field names follow the wire format (`foodName`, `confidence`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub food_name: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// Kilocalories.
    pub calories: f64,
    /// Grams.
    pub protein: f64,
    /// Grams.
    pub carbs: f64,
    /// Grams.
    pub fats: f64,
}

/// Ways a result can violate the schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("foodName is empty")]
    EmptyFoodName,
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },
}

impl AnalysisResult {
    /// Checks ranges, returning the result unchanged when valid.
    pub fn validate(self) -> Result<Self, SchemaViolation> {
        if self.food_name.trim().is_empty() {
            return Err(SchemaViolation::EmptyFoodName);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaViolation::ConfidenceOutOfRange(self.confidence));
        }
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fats", self.fats),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SchemaViolation::InvalidAmount { field, value });
            }
        }
        Ok(self)
    }
}

/// Result fields as they arrive, before presence checks.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartialResult {
    pub food_name: Option<String>,
    pub confidence: Option<f64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

impl PartialResult {
    /// Requires every field, then validates ranges.
    pub fn complete(self) -> Result<AnalysisResult, SchemaViolation> {
        AnalysisResult {
            food_name: self
                .food_name
                .ok_or(SchemaViolation::MissingField("foodName"))?,
            confidence: self
                .confidence
                .ok_or(SchemaViolation::MissingField("confidence"))?,
            calories: self
                .calories
                .ok_or(SchemaViolation::MissingField("calories"))?,
            protein: self.protein.ok_or(SchemaViolation::MissingField("protein"))?,
            carbs: self.carbs.ok_or(SchemaViolation::MissingField("carbs"))?,
            fats: self.fats.ok_or(SchemaViolation::MissingField("fats"))?,
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> AnalysisResult {
        AnalysisResult {
            food_name: "apple".into(),
            confidence: 0.92,
            calories: 52.0,
            protein: 0.3,
            carbs: 14.0,
            fats: 0.2,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(apple()).unwrap();
        assert_eq!(json["foodName"], "apple");
        assert_eq!(json["calories"], 52.0);
    }

    #[test]
    fn test_valid_result_passes() {
        assert_eq!(apple().validate().unwrap(), apple());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut result = apple();
        result.confidence = 1.5;
        assert!(matches!(
            result.validate(),
            Err(SchemaViolation::ConfidenceOutOfRange(_))
        ));

        let mut result = apple();
        result.fats = -1.0;
        assert!(matches!(
            result.validate(),
            Err(SchemaViolation::InvalidAmount { field: "fats", .. })
        ));
    }

    #[test]
    fn test_missing_field_rejected() {
        let partial: PartialResult =
            serde_json::from_str(r#"{"foodName":"apple","confidence":0.9,"calories":52}"#).unwrap();
        assert_eq!(
            partial.complete(),
            Err(SchemaViolation::MissingField("protein"))
        );
    }
}
