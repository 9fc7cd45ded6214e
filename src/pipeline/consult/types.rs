use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConsultError;
use crate::models::enums::FlowAction;
use crate::models::{ChatTurn, PatientRecord};

/// Lifecycle of one consultation. One-shot: once ended, a new orchestrator
/// (or a reset) is needed for the next patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    NotStarted,
    Active,
    Ended,
}

impl ConversationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationPhase::NotStarted => "not_started",
            ConversationPhase::Active => "active",
            ConversationPhase::Ended => "ended",
        }
    }
}

/// Facts pulled from one pass over the transcript. All fields optional:
/// an empty value means "not mentioned", never "absent from the patient".
/// `gender` stays a raw string here; it is normalized at merge time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientFacts {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
}

impl PatientFacts {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.symptoms.is_empty()
            && self.medical_history.is_empty()
            && self.medications.is_empty()
            && self.additional_info.is_empty()
    }
}

/// What the conversation should do next, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDecision {
    pub action: FlowAction,
    pub reason: String,
    pub suggested_response: Option<String>,
    pub missing_info: Vec<String>,
}

impl FlowDecision {
    /// The default decision whenever anything is uncertain.
    pub fn continue_gathering(reason: impl Into<String>) -> Self {
        Self {
            action: FlowAction::ContinueGathering,
            reason: reason.into(),
            suggested_response: None,
            missing_info: Vec::new(),
        }
    }
}

/// Result of one persistence attempt. Failure is data, not an error:
/// the gateway never panics and never returns `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    pub id: Option<String>,
    pub message: String,
}

impl SaveOutcome {
    pub fn saved(id: String, message: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Everything one `process_user_input` call produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub action: FlowAction,
    pub reason: String,
    pub conversation_ended: bool,
    pub record: PatientRecord,
    pub extraction_performed: bool,
    pub save_outcome: Option<SaveOutcome>,
}

/// Structured-fact extraction over a transcript (allows stubbing).
pub trait FactExtractor {
    fn extract(&self, transcript: &[ChatTurn]) -> Result<PatientFacts, ConsultError>;
}

/// Conversation flow classification (allows stubbing).
pub trait FlowClassifier {
    fn classify(
        &self,
        record: &PatientRecord,
        latest_message: &str,
    ) -> Result<FlowDecision, ConsultError>;
}

/// Terminal persistence of a finished consultation.
pub trait PersistenceGateway {
    fn save(&self, record: &PatientRecord) -> SaveOutcome;
}
