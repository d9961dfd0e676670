//! Safety thresholds sent with every generation call, and classification of
//! generation failures into deflections and request errors.

use serde::Serialize;

use folio_core::errors::ChatError;

use crate::llm::GenerationError;

pub const DEFLECTION_MESSAGE: &str = "I'm sorry, but I can't respond to that. Let's keep our conversation professional. Is there anything else you'd like to know?";

const SAFETY_MARKER: &str = "SAFETY";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BlockThreshold {
    #[serde(rename = "BLOCK_LOW_AND_ABOVE")]
    LowAndAbove,
    #[serde(rename = "BLOCK_MEDIUM_AND_ABOVE")]
    MediumAndAbove,
    #[serde(rename = "BLOCK_ONLY_HIGH")]
    OnlyHigh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SafetySettings(Vec<SafetySetting>);

impl SafetySettings {
    /// The fixed set: four harm categories, each blocked at medium and above.
    pub fn standard() -> Self {
        Self(
            [
                HarmCategory::Harassment,
                HarmCategory::HateSpeech,
                HarmCategory::SexuallyExplicit,
                HarmCategory::DangerousContent,
            ]
            .into_iter()
            .map(|category| SafetySetting { category, threshold: BlockThreshold::MediumAndAbove })
            .collect(),
        )
    }

    pub fn settings(&self) -> &[SafetySetting] {
        &self.0
    }
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    /// Safety rejection: answer with this text as a normal reply.
    Deflect(String),
    Propagate(ChatError),
}

#[derive(Clone, Debug, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &GenerationError) -> Classified {
        let description = error.to_string();
        if description.contains(SAFETY_MARKER) {
            return Classified::Deflect(DEFLECTION_MESSAGE.to_string());
        }

        match error {
            GenerationError::MissingCredential => {
                Classified::Propagate(ChatError::Configuration(description))
            }
            _ => Classified::Propagate(ChatError::Generation(description)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Classified, ErrorClassifier, SafetySettings, DEFLECTION_MESSAGE};
    use crate::llm::GenerationError;
    use folio_core::errors::ChatError;

    #[test]
    fn standard_settings_serialize_four_medium_thresholds() {
        let value = serde_json::to_value(SafetySettings::standard()).expect("serialize");
        let settings = value.as_array().expect("array");

        assert_eq!(settings.len(), 4);
        let categories: Vec<&str> =
            settings.iter().filter_map(|entry| entry["category"].as_str()).collect();
        assert_eq!(
            categories,
            [
                "HARM_CATEGORY_HARASSMENT",
                "HARM_CATEGORY_HATE_SPEECH",
                "HARM_CATEGORY_SEXUALLY_EXPLICIT",
                "HARM_CATEGORY_DANGEROUS_CONTENT",
            ]
        );
        assert!(settings.iter().all(|entry| entry["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn safety_block_is_deflected() {
        let classified =
            ErrorClassifier::new().classify(&GenerationError::Blocked { reason: "SAFETY".into() });
        assert_eq!(classified, Classified::Deflect(DEFLECTION_MESSAGE.to_string()));
    }

    #[test]
    fn any_description_mentioning_safety_is_deflected() {
        let classified = ErrorClassifier::new().classify(&GenerationError::Upstream {
            status: 400,
            message: "candidate was blocked due to SAFETY".into(),
        });
        assert!(matches!(classified, Classified::Deflect(_)));
    }

    #[test]
    fn non_safety_block_propagates_as_generation_failure() {
        let classified = ErrorClassifier::new()
            .classify(&GenerationError::Blocked { reason: "RECITATION".into() });
        assert!(matches!(classified, Classified::Propagate(ChatError::Generation(_))));
    }

    #[test]
    fn transport_failure_propagates() {
        let classified =
            ErrorClassifier::new().classify(&GenerationError::Transport("connection reset".into()));

        match classified {
            Classified::Propagate(error) => assert_eq!(error.status(), "internal"),
            other => panic!("expected propagation, got {other:?}"),
        }
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let classified = ErrorClassifier::new().classify(&GenerationError::MissingCredential);
        assert!(matches!(classified, Classified::Propagate(ChatError::Configuration(_))));
    }
}
