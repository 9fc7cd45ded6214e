use crate::models::enums::Speaker;
use crate::models::{ChatTurn, PatientRecord};

/// How many trailing turns the flow classifier sees.
pub const RECENT_TURN_WINDOW: usize = 4;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a medical information extraction system. You read an intake conversation between a doctor and a patient and extract ONLY information that was explicitly stated.

RULES:
1. Read BOTH patient and doctor messages. A doctor's confirmation ("so you are 29...") counts as evidence.
2. Never guess or infer. If something was not stated, leave it null or empty.
3. Normalize gender to exactly one of: Male, Female, Other.
4. Age must be a number, not a phrase.
5. List every symptom mentioned, including ones the patient describes in passing.
6. additional_info holds any other stated facts (allergies, lifestyle, symptom onset) as short key/value pairs.

Respond with ONLY a JSON object in this exact shape:
{
  "name": null,
  "age": null,
  "gender": null,
  "symptoms": [],
  "medical_history": [],
  "medications": [],
  "additional_info": {}
}"#;

/// Build the extraction prompt from the full transcript.
pub fn build_extraction_prompt(transcript: &[ChatTurn]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Conversation transcript:\n");
    prompt.push_str(&format_turns(transcript));
    prompt.push_str("\n\nExtract the patient information as JSON.");
    prompt
}

pub const FLOW_SYSTEM_PROMPT: &str = r#"You decide what an intake conversation between a doctor and a patient should do next. The possible actions are:

- CONTINUE_GATHERING: keep collecting information. Choose this whenever basic details (name, age, gender) are missing, symptoms are unclear, or the conversation is still developing.
- OFFER_ANALYSIS: the picture is complete enough to offer next steps.
- END_CONVERSATION: the patient clearly signals they are done AND substantial information has already been gathered.

CRITICAL: NEVER choose OFFER_ANALYSIS while name, age or gender is missing. When in doubt, choose CONTINUE_GATHERING.

Respond with ONLY a JSON object in this exact shape:
{
  "action": "CONTINUE_GATHERING",
  "reason": "why this action",
  "suggested_response": null,
  "missing_info": []
}"#;

/// Build the flow-decision prompt: record summary, recent turns, latest message.
pub fn build_flow_prompt(record: &PatientRecord, latest_message: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Patient information gathered so far:\n");
    prompt.push_str(&record.summary());
    prompt.push_str("\n\nRecent conversation:\n");
    prompt.push_str(&format_recent_turns(
        &record.chat_history,
        RECENT_TURN_WINDOW,
    ));
    prompt.push_str(&format!("\n\nLatest patient message: {latest_message}\n\n"));
    prompt.push_str("Decide the next action as JSON.");
    prompt
}

pub const DIALOGUE_SYSTEM_PROMPT: &str = r#"You are Dr. Amelia Reyes, a warm and experienced physician conducting a patient intake conversation.

HOW YOU SPEAK:
- Acknowledge what the patient shared before asking anything new.
- Ask ONE question at a time. Keep replies to a few sentences.
- Use the patient's name once you know it.
- Plain language, no jargon, no diagnosis, no prescriptions.

WHAT TO ESTABLISH, IN ORDER:
1. Name, age and gender, woven naturally into the conversation.
2. The symptoms: what, where, since when, how severe.
3. Relevant medical history and current medications.

When next steps are needed, refer to "our medical team" rather than naming other providers."#;

/// Build the dialogue prompt: full record summary, full history, latest message.
pub fn build_dialogue_prompt(record: &PatientRecord, latest_message: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Patient information gathered so far:\n");
    prompt.push_str(&record.summary());
    prompt.push_str("\n\nConversation so far:\n");
    prompt.push_str(&format_turns(&record.chat_history));
    prompt.push_str(&format!("\n\nLatest patient message: {latest_message}\n\n"));
    prompt.push_str("Reply as the doctor.");
    prompt
}

/// Render turns as "Patient: ..." / "Doctor: ..." lines.
pub fn format_turns(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let who = match turn.speaker {
                Speaker::Patient => "Patient",
                Speaker::Doctor => "Doctor",
            };
            format!("{}: {}", who, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render only the last `n` turns.
pub fn format_recent_turns(turns: &[ChatTurn], n: usize) -> String {
    let recent: Vec<ChatTurn> = turns.iter().rev().take(n).rev().cloned().collect();
    format_turns(&recent)
}
