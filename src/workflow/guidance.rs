//! Static guidance shown next to a prediction

use std::fmt;

use serde::Serialize;

use crate::dataset::Label;
use crate::inference::PredictionResult;

/// Disclaimer shown with every prediction
pub const DISCLAIMER: &str = "This is an AI screening tool and NOT a medical diagnosis. \
Always consult a qualified healthcare professional.";

/// Coarse confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
}

impl ConfidenceLevel {
    /// High above 0.8, Moderate above 0.6, Low otherwise
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > 0.8 {
            ConfidenceLevel::High
        } else if confidence > 0.6 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Moderate => "Moderate",
            ConfidenceLevel::Low => "Low",
        };
        write!(f, "{}", name)
    }
}

const MONKEYPOX_ADVICE: &[&str] = &[
    "Seek medical attention: contact your healthcare provider or local health department, and call ahead to mention possible monkeypox exposure.",
    "Isolate yourself: stay away from other people and animals and do not share clothing, bedding or personal items.",
    "Cover the lesions with clothing or bandages and wash your hands frequently.",
];

const OTHERS_ADVICE: &[&str] = &[
    "Still consult a healthcare provider if lesions are painful, spreading or do not improve within a few days.",
    "Keep the area clean and dry and avoid scratching.",
    "Seek care promptly after known exposure to monkeypox or recent travel to affected areas.",
];

/// Informational text for one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guidance {
    pub headline: &'static str,
    pub level: ConfidenceLevel,
    pub advice: &'static [&'static str],
}

/// Guidance matching the predicted label and its confidence
pub fn guidance(prediction: &PredictionResult) -> Guidance {
    let level = ConfidenceLevel::from_confidence(prediction.confidence);

    match prediction.predicted_class {
        Label::MonkeyPox => Guidance {
            headline: "Potential monkeypox detection",
            level,
            advice: MONKEYPOX_ADVICE,
        },
        Label::Others => Guidance {
            headline: "The lesion is likely not monkeypox",
            level,
            advice: OTHERS_ADVICE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::from_confidence(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.8), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_confidence(0.61), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_confidence(0.6), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.5), ConfidenceLevel::Low);
    }

    #[test]
    fn test_guidance_follows_label() {
        let mpox = PredictionResult::from_logits(&[3.0, 0.0], Duration::ZERO).unwrap();
        let g = guidance(&mpox);
        assert_eq!(g.level, ConfidenceLevel::High);
        assert!(g.advice.iter().any(|a| a.contains("Isolate")));

        let others = PredictionResult::from_logits(&[0.0, 0.2], Duration::ZERO).unwrap();
        let g = guidance(&others);
        assert_eq!(g.level, ConfidenceLevel::Low);
        assert!(g.headline.contains("not monkeypox"));
    }
}
