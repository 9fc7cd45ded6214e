use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Speaker {
    Patient => "patient",
    Doctor => "doctor",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(FlowAction {
    ContinueGathering => "continue_gathering",
    OfferAnalysis => "offer_analysis",
    EndConversation => "end_conversation",
});

impl Gender {
    /// Display form used in summaries and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }

    /// Lenient mapping for values coming back from the extraction model.
    /// Anything outside the known vocabulary is treated as not extracted,
    /// so a later clean extraction can still set the field.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" | "man" | "boy" => Some(Self::Male),
            "female" | "f" | "woman" | "girl" => Some(Self::Female),
            "other" | "non-binary" | "nonbinary" | "diverse" => Some(Self::Other),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn speaker_round_trip() {
        for (variant, s) in [(Speaker::Patient, "patient"), (Speaker::Doctor, "doctor")] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Speaker::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn flow_action_round_trip() {
        for (variant, s) in [
            (FlowAction::ContinueGathering, "continue_gathering"),
            (FlowAction::OfferAnalysis, "offer_analysis"),
            (FlowAction::EndConversation, "end_conversation"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(FlowAction::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn gender_normalize_accepts_common_forms() {
        assert_eq!(Gender::normalize("Male"), Some(Gender::Male));
        assert_eq!(Gender::normalize("  WOMAN "), Some(Gender::Female));
        assert_eq!(Gender::normalize("f"), Some(Gender::Female));
        assert_eq!(Gender::normalize("non-binary"), Some(Gender::Other));
    }

    #[test]
    fn gender_normalize_rejects_unknown_values() {
        assert_eq!(Gender::normalize("unknown"), None);
        assert_eq!(Gender::normalize(""), None);
        assert_eq!(Gender::normalize("prefer not to say"), None);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Speaker::from_str("clinician").is_err());
        assert!(FlowAction::from_str("OFFER_ANALYSIS").is_err());
        assert!(Gender::from_str("").is_err());
    }

    #[test]
    fn serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&FlowAction::ContinueGathering).unwrap();
        assert_eq!(json, "\"continue_gathering\"");
        let back: Speaker = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(back, Speaker::Doctor);
    }
}
