use super::prompt::{build_dialogue_prompt, DIALOGUE_SYSTEM_PROMPT};
use super::types::FlowDecision;
use crate::models::PatientRecord;
use crate::pipeline::LlmClient;

/// Sampling temperature for free-form dialogue.
const DIALOGUE_TEMPERATURE: f32 = 0.75;

/// Opening message for a new consultation. Always templated, never
/// generated, so the first impression does not depend on the model.
const GREETING: &str = r#"Hello! I'm Dr. Amelia Reyes, and I'm so glad you're here today.

I want you to feel completely comfortable sharing what's brought you in. I believe in taking the time to get to know my patients as people first, and then we'll explore what's concerning you.

So let's start with the basics. What's your name? I'd love to know what to call you."#;

/// Keyword-matched empathy openers, checked in order.
const ACKNOWLEDGMENTS: &[(&str, &str)] = &[
    (
        "pain",
        "I can hear that you're experiencing pain, and I want to help you with that.",
    ),
    (
        "hurt",
        "I understand you're hurting, and that must be really difficult.",
    ),
    (
        "sensitivity",
        "Sensitivity like that can be quite uncomfortable, I know.",
    ),
    ("problem", "I can see this is causing you problems."),
    ("issue", "I understand this is concerning you."),
];

const DEFAULT_ACKNOWLEDGMENT: &str = "I hear what you're sharing with me.";

pub fn greeting() -> &'static str {
    GREETING
}

fn acknowledge(user_input: &str) -> &'static str {
    let lower = user_input.to_lowercase();
    ACKNOWLEDGMENTS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, ack)| *ack)
        .unwrap_or(DEFAULT_ACKNOWLEDGMENT)
}

/// Templated ask for one missing basic field, opening with an
/// acknowledgment of whatever the patient just said.
pub fn basic_info_request(record: &PatientRecord, latest_message: &str, field: &str) -> String {
    let acknowledgment = acknowledge(latest_message);
    let name_part = record
        .name
        .as_deref()
        .map(|name| format!("{name}, "))
        .unwrap_or_default();

    match field {
        "name" => format!(
            "{acknowledgment}\n\nBefore we dive deeper into what's going on, I'd love to know your name so I can address you properly. What should I call you?"
        ),
        "age" => format!(
            "{acknowledgment}\n\n{name_part}could you tell me your age? This helps me provide care that's right for you."
        ),
        "gender" => format!(
            "{acknowledgment}\n\n{name_part}what is your gender? This is important for me to understand your health needs properly."
        ),
        _ => acknowledgment.to_string(),
    }
}

/// Reply while the conversation keeps gathering information.
///
/// When the flow decision flags a missing basic field the reply is fully
/// templated. Otherwise the dialogue model writes it, with a templated
/// question as the degraded path so the doctor never goes silent.
pub fn gathering_reply(
    llm: &dyn LlmClient,
    record: &PatientRecord,
    decision: &FlowDecision,
    latest_message: &str,
) -> String {
    if let Some(field) = requested_basic_field(record, decision) {
        return basic_info_request(record, latest_message, field);
    }

    let prompt = build_dialogue_prompt(record, latest_message);
    match llm.generate(DIALOGUE_SYSTEM_PROMPT, &prompt, DIALOGUE_TEMPERATURE) {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!("dialogue model returned an empty reply, using template");
            templated_question(record, latest_message)
        }
        Err(e) => {
            tracing::warn!(error = %e, "dialogue generation failed, using template");
            templated_question(record, latest_message)
        }
    }
}

/// First basic field that is both flagged by the decision and actually
/// missing from the record, in record priority order.
fn requested_basic_field(record: &PatientRecord, decision: &FlowDecision) -> Option<&'static str> {
    record
        .missing_basic_fields()
        .into_iter()
        .find(|field| decision.missing_info.iter().any(|info| info == field))
}

fn templated_question(record: &PatientRecord, latest_message: &str) -> String {
    let acknowledgment = acknowledge(latest_message);
    let question = match record.missing_required_fields().first() {
        Some(&"name") => "Could you please tell me your name?",
        Some(&"age") => "And how old are you?",
        Some(&"gender") => "What is your gender?",
        Some(&"symptoms") => "What symptoms are you experiencing today?",
        _ => "Could you tell me more about how you've been feeling?",
    };
    format!("{acknowledgment} {question}")
}

/// Reply offering to hand over for analysis.
///
/// Re-verifies completeness even though the flow layer already did: if a
/// basic field is somehow still missing, the reply asks for it instead.
pub fn analysis_offer_reply(
    record: &PatientRecord,
    decision: &FlowDecision,
    latest_message: &str,
) -> String {
    if let Some(field) = record.missing_basic_fields().first() {
        return basic_info_request(record, latest_message, field);
    }

    if let Some(suggested) = non_empty(&decision.suggested_response) {
        return suggested;
    }

    let name_suffix = record
        .name
        .as_deref()
        .map(|name| format!(", {name}"))
        .unwrap_or_default();

    format!(
        r#"Thank you for sharing all that information with me{name_suffix}.

I have a good understanding of your situation now. Based on what you've shared, I can connect you with our medical team for proper evaluation and treatment. We have experienced doctors, nurses, and specialists who can provide comprehensive care for your condition.

Would you like me to:
1. Provide some initial guidance and recommendations
2. Connect you with our support team to schedule an appointment with our specialists
3. Discuss treatment options available through our medical facility

What would be most helpful for you right now?"#
    )
}

/// Closing reply once the conversation ends.
pub fn farewell_reply(record: &PatientRecord, decision: &FlowDecision) -> String {
    if let Some(suggested) = non_empty(&decision.suggested_response) {
        return suggested;
    }

    let name = record.name.as_deref().unwrap_or("there");
    format!(
        r#"Thank you so much for sharing with me today, {name}.

It's been a pleasure talking with you. I hope you feel heard and that our conversation has been helpful. Please don't hesitate to seek professional medical care if your symptoms persist or worsen.

Take care of yourself, and I wish you all the best."#
    )
}

fn non_empty(suggested: &Option<String>) -> Option<String> {
    suggested
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
