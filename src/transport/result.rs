//! Prediction response decoding and interpretation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Decoded body of a successful `/predict` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    /// Formatted percentage, e.g. `"87.50%"`.
    pub confidence: String,
    /// Per-class probabilities in [0, 1], when the service includes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_predictions: Option<BTreeMap<String, f64>>,
}

impl PredictionResult {
    /// Decode and validate a response body.
    pub fn from_json(body: &[u8]) -> ClientResult<Self> {
        let result: Self = serde_json::from_slice(body).map_err(|e| {
            ClientError::transport("decode_response", format!("malformed response body: {}", e))
        })?;
        result.validate()?;
        Ok(result)
    }

    /// Label must be non-empty and confidence must read as a number in [0, 100].
    pub fn validate(&self) -> ClientResult<()> {
        if self.label.trim().is_empty() {
            return Err(ClientError::transport("decode_response", "response label is empty"));
        }
        match self.confidence_value() {
            Some(v) if (0.0..=100.0).contains(&v) => Ok(()),
            _ => Err(ClientError::transport(
                "decode_response",
                format!("confidence '{}' is not a percentage", self.confidence),
            )),
        }
    }

    /// Leading numeric value of the confidence string.
    pub fn confidence_value(&self) -> Option<f64> {
        parse_leading_number(&self.confidence)
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::classify(&self.label)
    }

    /// Label as shown to the user: underscores become spaces.
    pub fn display_label(&self) -> String {
        self.label.replace('_', " ")
    }

    pub fn view(&self) -> ResultView {
        let bar = self.confidence_value().unwrap_or(0.0).clamp(0.0, 100.0);
        ResultView {
            display_label: self.display_label(),
            confidence_text: self.confidence.clone(),
            bar_width_percent: bar,
            verdict: self.verdict(),
        }
    }
}

fn number_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("number prefix pattern is valid")
    })
}

/// Parse the longest numeric prefix after leading whitespace: `"87.5%"` → 87.5,
/// `"n/a"` → `None`.
pub fn parse_leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let m = number_prefix().find(trimmed)?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Three-way label category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Favorable,
    Unfavorable,
    Uncertain,
}

const FAVORABLE_TERMS: [&str; 3] = ["sano", "healthy", "verde"];
const UNFAVORABLE_TERMS: [&str; 2] = ["enfermo", "disease"];

impl Verdict {
    /// Case-insensitive substring match. A label matching both groups, or
    /// neither, is uncertain.
    pub fn classify(label: &str) -> Self {
        let lower = label.to_lowercase();
        let favorable = FAVORABLE_TERMS.iter().any(|t| lower.contains(t));
        let unfavorable = UNFAVORABLE_TERMS.iter().any(|t| lower.contains(t));
        match (favorable, unfavorable) {
            (true, false) => Verdict::Favorable,
            (false, true) => Verdict::Unfavorable,
            _ => Verdict::Uncertain,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Favorable => write!(f, "favorable"),
            Verdict::Unfavorable => write!(f, "unfavorable"),
            Verdict::Uncertain => write!(f, "uncertain"),
        }
    }
}

/// What the result panel shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub display_label: String,
    pub confidence_text: String,
    /// Progress bar width in percent, clamped to [0, 100].
    pub bar_width_percent: f64,
    pub verdict: Verdict,
}

impl ResultView {
    /// CSS width of the confidence bar, e.g. `"87.5%"`.
    pub fn bar_width_css(&self) -> String {
        format!("{}%", self.bar_width_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_examples() {
        assert_eq!(Verdict::classify("Healthy_Leaf"), Verdict::Favorable);
        assert_eq!(Verdict::classify("Leaf_Disease"), Verdict::Unfavorable);
        assert_eq!(Verdict::classify("Unknown"), Verdict::Uncertain);
        assert_eq!(Verdict::classify("Hoja SANA verde"), Verdict::Favorable);
        assert_eq!(Verdict::classify("planta_ENFERMO"), Verdict::Unfavorable);
        assert_eq!(Verdict::classify(""), Verdict::Uncertain);
    }

    #[test]
    fn matching_both_groups_is_uncertain() {
        assert_eq!(Verdict::classify("healthy_or_disease"), Verdict::Uncertain);
    }

    #[test]
    fn confidence_prefix_parsing() {
        assert_eq!(parse_leading_number("87.5%"), Some(87.5));
        assert_eq!(parse_leading_number("  99.99 %"), Some(99.99));
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("1e2%"), Some(100.0));
        assert_eq!(parse_leading_number("%87"), None);
        assert_eq!(parse_leading_number(""), None);
    }

    #[test]
    fn view_drives_bar_width() {
        let result = PredictionResult {
            label: "Healthy_Leaf".into(),
            confidence: "87.5%".into(),
            all_predictions: None,
        };
        let view = result.view();
        assert_eq!(view.display_label, "Healthy Leaf");
        assert_eq!(view.bar_width_percent, 87.5);
        assert_eq!(view.bar_width_css(), "87.5%");
        assert_eq!(view.verdict, Verdict::Favorable);
    }

    #[test]
    fn decode_accepts_extra_predictions() {
        let body = br#"{"label":"enfermo","confidence":"91.20%","all_predictions":{"enfermo":0.912,"sano":0.088}}"#;
        let result = PredictionResult::from_json(body).unwrap();
        assert_eq!(result.verdict(), Verdict::Unfavorable);
        assert_eq!(result.all_predictions.unwrap().len(), 2);
    }

    #[test]
    fn decode_rejects_bad_bodies() {
        for body in [
            &br#"{"label":"","confidence":"50%"}"#[..],
            br#"{"label":"sano","confidence":"abc"}"#,
            br#"{"label":"sano","confidence":"150%"}"#,
            br#"{"error":"No image provided"}"#,
            b"<html>",
        ] {
            let err = PredictionResult::from_json(body).unwrap_err();
            assert_eq!(err.category(), "transport");
        }
    }
}
