//! Job submission parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::policy::{BlurPolicy, DEFAULT_BLUR_STRENGTH, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PADDING};

/// Largest accepted kernel size.
pub const MAX_BLUR_STRENGTH: u32 = 999;

/// Largest accepted padding, in pixels.
pub const MAX_PADDING: u32 = 10_000;

/// Rejected submission parameter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParameterError {
    /// Offending field name
    pub field: String,
    /// Human-readable explanation
    pub message: String,
}

impl ParameterError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parameters supplied with a blur job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobParameters {
    /// OCR languages forwarded to the detection engine
    #[validate(length(min = 1, max = 16))]
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Gaussian kernel size; must be positive and odd
    #[validate(range(min = 1, max = 999))]
    #[serde(default = "default_blur_strength")]
    pub blur_strength: u32,

    /// Minimum detection confidence
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Run detection on every Nth frame
    #[validate(range(min = 1))]
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Extra pixels around detected text
    #[validate(range(max = 10000))]
    #[serde(default = "default_padding")]
    pub padding: u32,

    /// Words to blur; `None` blurs every detected string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<String>>,
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_blur_strength() -> u32 {
    DEFAULT_BLUR_STRENGTH
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_sample_rate() -> u32 {
    1
}

fn default_padding() -> u32 {
    DEFAULT_PADDING
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            blur_strength: default_blur_strength(),
            confidence: default_confidence(),
            sample_rate: default_sample_rate(),
            padding: default_padding(),
            words: None,
        }
    }
}

impl JobParameters {
    /// Check every field, reporting the first problem found.
    pub fn check(&self) -> Result<(), ParameterError> {
        if let Err(errors) = self.validate() {
            let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            if let Some((field, _)) = fields.first() {
                return Err(ParameterError::new(
                    field.to_string(),
                    range_message(field),
                ));
            }
            return Err(ParameterError::new("parameters", errors.to_string()));
        }

        if self.blur_strength % 2 == 0 {
            return Err(ParameterError::new(
                "blur_strength",
                "blur_strength must be an odd number",
            ));
        }

        if !self.confidence.is_finite() {
            return Err(ParameterError::new("confidence", range_message("confidence")));
        }

        if self.languages.iter().any(|l| l.trim().is_empty()) {
            return Err(ParameterError::new("languages", "languages must not contain blank entries"));
        }

        Ok(())
    }

    /// Blur policy derived from these parameters.
    pub fn blur_policy(&self) -> BlurPolicy {
        BlurPolicy::new(
            self.blur_strength,
            self.confidence,
            self.words.as_ref(),
            self.padding,
        )
    }
}

fn range_message(field: &str) -> String {
    match field {
        "languages" => "languages must contain between 1 and 16 entries".to_string(),
        "blur_strength" => format!("blur_strength must be between 1 and {}", MAX_BLUR_STRENGTH),
        "confidence" => "confidence must be between 0 and 1".to_string(),
        "sample_rate" => "sample_rate must be at least 1".to_string(),
        "padding" => format!("padding must be between 0 and {}", MAX_PADDING),
        other => format!("{} is invalid", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = JobParameters::default();
        assert!(params.check().is_ok());
        assert_eq!(params.blur_strength, 51);
        assert_eq!(params.sample_rate, 1);
        assert_eq!(params.padding, 10);
        assert_eq!(params.languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_even_blur_strength_rejected() {
        let params = JobParameters {
            blur_strength: 50,
            ..Default::default()
        };
        let err = params.check().unwrap_err();
        assert_eq!(err.field, "blur_strength");
        assert!(err.message.contains("odd"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let params = JobParameters {
            confidence: 1.5,
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().field, "confidence");

        let params = JobParameters {
            sample_rate: 0,
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().field, "sample_rate");

        let params = JobParameters {
            blur_strength: 0,
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().field, "blur_strength");
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let params = JobParameters {
            confidence: f64::NAN,
            ..Default::default()
        };
        assert!(params.check().is_err());
    }

    #[test]
    fn test_blur_policy_from_parameters() {
        let params = JobParameters {
            blur_strength: 71,
            confidence: 0.7,
            padding: 20,
            words: Some(vec!["Email".to_string()]),
            ..Default::default()
        };
        let policy = params.blur_policy();

        assert_eq!(policy.strength(), 71);
        assert_eq!(policy.padding, 20);
        assert_eq!(policy.target_words(), Some(&["email".to_string()][..]));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let params: JobParameters = serde_json::from_str(r#"{"sample_rate": 5}"#).unwrap();
        assert_eq!(params.sample_rate, 5);
        assert_eq!(params.blur_strength, 51);
        assert!(params.words.is_none());
    }
}
