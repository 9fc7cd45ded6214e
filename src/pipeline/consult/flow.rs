use super::parser::parse_flow_response;
use super::prompt::{build_flow_prompt, FLOW_SYSTEM_PROMPT};
use super::types::{FlowClassifier, FlowDecision};
use super::ConsultError;
use crate::models::enums::FlowAction;
use crate::models::PatientRecord;
use crate::pipeline::LlmClient;

/// Sampling temperature for flow classification.
const FLOW_TEMPERATURE: f32 = 0.1;

/// Phrases a patient uses to wind the conversation down.
const CLOSURE_KEYWORDS: &[&str] = &[
    "goodbye",
    "bye",
    "thank you",
    "thanks",
    "that's all",
    "that is all",
    "that's everything",
    "i'm done",
    "i am done",
];

/// LLM-backed classification of what the conversation should do next.
pub struct LlmFlowClassifier<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> LlmFlowClassifier<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }
}

impl FlowClassifier for LlmFlowClassifier<'_> {
    fn classify(
        &self,
        record: &PatientRecord,
        latest_message: &str,
    ) -> Result<FlowDecision, ConsultError> {
        let prompt = build_flow_prompt(record, latest_message);
        let response = self
            .llm
            .generate(FLOW_SYSTEM_PROMPT, &prompt, FLOW_TEMPERATURE)?;
        parse_flow_response(&response)
    }
}

/// Classify the next step, then clamp the result against hard policy.
///
/// A classifier failure is absorbed here: the conversation falls back to
/// gathering rather than surfacing an error mid-consultation.
pub fn decide(
    classifier: &dyn FlowClassifier,
    record: &PatientRecord,
    latest_message: &str,
) -> FlowDecision {
    let decision = match classifier.classify(record, latest_message) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "flow classification failed, defaulting to gathering");
            FlowDecision::continue_gathering("flow classifier unavailable")
        }
    };
    enforce_policy(decision, record, latest_message)
}

/// The model proposes, policy disposes. Analysis is never offered while a
/// basic field is missing, and the conversation never ends before the
/// patient has said goodbye over a record with at least one symptom.
fn enforce_policy(
    mut decision: FlowDecision,
    record: &PatientRecord,
    latest_message: &str,
) -> FlowDecision {
    match decision.action {
        FlowAction::OfferAnalysis => {
            let missing = record.missing_basic_fields();
            if !missing.is_empty() {
                tracing::debug!(missing = ?missing, "analysis offer blocked, basic fields missing");
                decision.action = FlowAction::ContinueGathering;
                decision.reason = format!("still missing: {}", missing.join(", "));
                decision.missing_info = missing.iter().map(|f| f.to_string()).collect();
            }
        }
        FlowAction::EndConversation => {
            if !(signals_closure(latest_message) && !record.symptoms.is_empty()) {
                tracing::debug!("conversation end blocked, no goodbye over a symptomatic record");
                decision.action = FlowAction::ContinueGathering;
                decision.reason = "patient has not closed the conversation".to_string();
            }
        }
        FlowAction::ContinueGathering => {}
    }
    decision
}

/// Whether the patient's message reads as a goodbye.
pub fn signals_closure(text: &str) -> bool {
    let lower = text.to_lowercase();
    CLOSURE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
