use super::fallback::apply_fallback_extraction;
use super::parser::parse_facts_response;
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::types::{FactExtractor, PatientFacts};
use super::ConsultError;
use crate::models::enums::Gender;
use crate::models::{ChatTurn, PatientRecord};
use crate::pipeline::{LlmClient, LlmError};

/// Sampling temperature for structured extraction.
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// One extra attempt on transport errors and malformed completions.
const MAX_LLM_RETRIES: usize = 1;

/// Extraction runs only once there is an exchange to read.
const MIN_TRANSCRIPT_TURNS: usize = 2;

/// Ages outside this band are treated as extraction artifacts.
pub fn is_plausible_age(age: u32) -> bool {
    (1..=120).contains(&age)
}

/// LLM-backed fact extraction over the conversation transcript.
pub struct LlmFactExtractor<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> LlmFactExtractor<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }
}

impl FactExtractor for LlmFactExtractor<'_> {
    fn extract(&self, transcript: &[ChatTurn]) -> Result<PatientFacts, ConsultError> {
        let prompt = build_extraction_prompt(transcript);

        let mut last_error: Option<ConsultError> = None;
        for attempt in 0..=MAX_LLM_RETRIES {
            let response =
                match self
                    .llm
                    .generate(EXTRACTION_SYSTEM_PROMPT, &prompt, EXTRACTION_TEMPERATURE)
                {
                    Ok(resp) => resp,
                    Err(e) if is_retryable(&e) && attempt < MAX_LLM_RETRIES => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            error = %e,
                            "extraction LLM call failed, retrying"
                        );
                        last_error = Some(e.into());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

            match parse_facts_response(&response) {
                Ok(facts) => return Ok(facts),
                Err(e) if attempt < MAX_LLM_RETRIES => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "extraction response parse failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ConsultError::MalformedResponse("extraction failed".into())))
    }
}

fn is_retryable(e: &LlmError) -> bool {
    matches!(
        e,
        LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::HttpClient(_)
    )
}

/// Run extraction over the record's transcript and merge the result.
///
/// Returns whether an LLM extraction succeeded. Failures never escape this
/// function: the deterministic pattern fallback runs instead, and
/// `extraction_performed` stays false on that path.
pub fn extract_and_merge(extractor: &dyn FactExtractor, record: &mut PatientRecord) -> bool {
    if record.chat_history.len() < MIN_TRANSCRIPT_TURNS {
        return false;
    }

    match extractor.extract(&record.chat_history) {
        Ok(facts) => {
            if facts.is_empty() {
                tracing::debug!("extraction pass found no new facts");
            }
            merge_facts(record, &facts);
            record.extraction_performed = true;
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM extraction failed, applying pattern fallback");
            apply_fallback_extraction(record);
            false
        }
    }
}

/// Merge extracted facts into the record.
///
/// The asymmetry is deliberate: a differing extracted name replaces the
/// stored one (patients correct themselves, latest wins), while age and
/// gender keep their first value for the whole conversation.
pub fn merge_facts(record: &mut PatientRecord, facts: &PatientFacts) {
    if let Some(name) = &facts.name {
        match &record.name {
            None => record.name = Some(name.clone()),
            Some(current) if current != name => {
                tracing::info!(from = %current, to = %name, "patient name corrected by extraction");
                record.name = Some(name.clone());
            }
            Some(_) => {}
        }
    }

    if record.age.is_none() {
        if let Some(age) = facts.age.filter(|age| is_plausible_age(*age)) {
            record.age = Some(age);
        }
    }

    if record.gender.is_none() {
        if let Some(gender) = facts.gender.as_deref().and_then(Gender::normalize) {
            record.gender = Some(gender);
        }
    }

    merge_list_case_insensitive(&mut record.symptoms, &facts.symptoms);
    merge_list_exact(&mut record.medical_history, &facts.medical_history);
    merge_list_exact(&mut record.medications, &facts.medications);

    for (key, value) in &facts.additional_info {
        record
            .additional_info
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Append entries not already present, comparing case-insensitively.
fn merge_list_case_insensitive(existing: &mut Vec<String>, incoming: &[String]) {
    for item in incoming {
        let lower = item.to_lowercase();
        if !existing.iter().any(|e| e.to_lowercase() == lower) {
            existing.push(item.clone());
        }
    }
}

/// Append entries not already present, comparing exactly.
fn merge_list_exact(existing: &mut Vec<String>, incoming: &[String]) {
    for item in incoming {
        if !existing.iter().any(|e| e == item) {
            existing.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::enums::Speaker;
    use crate::pipeline::MockLlmClient;

    struct StubExtractor(PatientFacts);

    impl FactExtractor for StubExtractor {
        fn extract(&self, _transcript: &[ChatTurn]) -> Result<PatientFacts, ConsultError> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    impl FactExtractor for FailingExtractor {
        fn extract(&self, _transcript: &[ChatTurn]) -> Result<PatientFacts, ConsultError> {
            Err(ConsultError::MalformedResponse("stub failure".into()))
        }
    }

    /// Fails the first generate call with a connection error, then succeeds.
    struct FailThenSucceedLlmClient {
        response: String,
        calls: AtomicUsize,
    }

    impl LlmClient for FailThenSucceedLlmClient {
        fn generate(
            &self,
            _system: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::Connection("http://localhost:11434".into()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn facts(name: Option<&str>, age: Option<u32>, symptoms: &[&str]) -> PatientFacts {
        PatientFacts {
            name: name.map(str::to_string),
            age,
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn record_with_exchange() -> PatientRecord {
        let mut record = PatientRecord::new();
        record.push_turn(Speaker::Doctor, "Hello, what brings you in?");
        record.push_turn(Speaker::Patient, "I have a headache");
        record
    }

    // ── merge policy ──

    #[test]
    fn name_is_adopted_then_overwritten_on_correction() {
        let mut record = PatientRecord::new();
        merge_facts(&mut record, &facts(Some("Sarah"), None, &[]));
        assert_eq!(record.name.as_deref(), Some("Sarah"));

        merge_facts(&mut record, &facts(Some("Sara"), None, &[]));
        assert_eq!(record.name.as_deref(), Some("Sara"));
    }

    #[test]
    fn age_and_gender_keep_their_first_value() {
        let mut record = PatientRecord::new();
        let mut first = facts(None, Some(29), &[]);
        first.gender = Some("female".to_string());
        merge_facts(&mut record, &first);

        let mut second = facts(None, Some(35), &[]);
        second.gender = Some("male".to_string());
        merge_facts(&mut record, &second);

        assert_eq!(record.age, Some(29));
        assert_eq!(record.gender, Some(Gender::Female));
    }

    #[test]
    fn implausible_ages_are_rejected() {
        let mut record = PatientRecord::new();
        merge_facts(&mut record, &facts(None, Some(0), &[]));
        assert!(record.age.is_none());
        merge_facts(&mut record, &facts(None, Some(500), &[]));
        assert!(record.age.is_none());
        merge_facts(&mut record, &facts(None, Some(120), &[]));
        assert_eq!(record.age, Some(120));
    }

    #[test]
    fn unmappable_gender_is_not_extracted() {
        let mut record = PatientRecord::new();
        let mut unknown = PatientFacts::default();
        unknown.gender = Some("rather not say".to_string());
        merge_facts(&mut record, &unknown);
        assert!(record.gender.is_none());

        let mut clean = PatientFacts::default();
        clean.gender = Some("woman".to_string());
        merge_facts(&mut record, &clean);
        assert_eq!(record.gender, Some(Gender::Female));
    }

    #[test]
    fn symptoms_dedupe_case_insensitively() {
        let mut record = PatientRecord::new();
        merge_facts(&mut record, &facts(None, None, &["Headache", "nausea"]));
        merge_facts(&mut record, &facts(None, None, &["headache", "Fever"]));
        assert_eq!(record.symptoms, vec!["Headache", "nausea", "Fever"]);
    }

    #[test]
    fn history_and_medications_dedupe_exactly() {
        let mut record = PatientRecord::new();
        let mut first = PatientFacts::default();
        first.medical_history = vec!["Migraine".to_string()];
        first.medications = vec!["ibuprofen".to_string()];
        merge_facts(&mut record, &first);

        let mut second = PatientFacts::default();
        // Different casing is a different exact string for these lists
        second.medical_history = vec!["migraine".to_string(), "Migraine".to_string()];
        second.medications = vec!["ibuprofen".to_string()];
        merge_facts(&mut record, &second);

        assert_eq!(record.medical_history, vec!["Migraine", "migraine"]);
        assert_eq!(record.medications, vec!["ibuprofen"]);
    }

    #[test]
    fn additional_info_keys_are_first_write_wins() {
        let mut record = PatientRecord::new();
        let mut first = PatientFacts::default();
        first
            .additional_info
            .insert("allergies".to_string(), "penicillin".to_string());
        merge_facts(&mut record, &first);

        let mut second = PatientFacts::default();
        second
            .additional_info
            .insert("allergies".to_string(), "none".to_string());
        second
            .additional_info
            .insert("smoker".to_string(), "no".to_string());
        merge_facts(&mut record, &second);

        assert_eq!(
            record.additional_info.get("allergies").map(String::as_str),
            Some("penicillin")
        );
        assert_eq!(
            record.additional_info.get("smoker").map(String::as_str),
            Some("no")
        );
    }

    #[test]
    fn merging_the_same_facts_twice_is_idempotent() {
        let mut record = PatientRecord::new();
        let mut all = facts(Some("Sarah"), Some(29), &["headache"]);
        all.gender = Some("female".to_string());
        all.medical_history = vec!["asthma".to_string()];
        all.medications = vec!["salbutamol".to_string()];
        all.additional_info
            .insert("onset".to_string(), "yesterday".to_string());

        merge_facts(&mut record, &all);
        let after_first = record.clone();
        merge_facts(&mut record, &all);

        assert_eq!(record, after_first);
    }

    #[test]
    fn lists_only_grow() {
        let mut record = PatientRecord::new();
        merge_facts(&mut record, &facts(None, None, &["headache", "nausea"]));
        merge_facts(&mut record, &facts(None, None, &[]));
        assert_eq!(record.symptoms, vec!["headache", "nausea"]);
    }

    // ── engine entry ──

    #[test]
    fn short_transcript_is_a_no_op() {
        let mut record = PatientRecord::new();
        record.push_turn(Speaker::Doctor, "Hello, what's your name?");
        let before = record.clone();

        let ran = extract_and_merge(&StubExtractor(facts(Some("Sarah"), None, &[])), &mut record);

        assert!(!ran);
        assert_eq!(record, before);
    }

    #[test]
    fn successful_extraction_merges_and_marks_record() {
        let mut record = record_with_exchange();
        let ran = extract_and_merge(
            &StubExtractor(facts(Some("Sarah"), Some(29), &["headache"])),
            &mut record,
        );

        assert!(ran);
        assert!(record.extraction_performed);
        assert_eq!(record.name.as_deref(), Some("Sarah"));
        assert_eq!(record.symptoms, vec!["headache"]);
    }

    #[test]
    fn failed_extraction_degrades_to_pattern_fallback() {
        let mut record = PatientRecord::new();
        record.push_turn(Speaker::Doctor, "Hello, what's your name?");
        record.push_turn(Speaker::Patient, "my name is sarah");

        let ran = extract_and_merge(&FailingExtractor, &mut record);

        assert!(!ran);
        assert!(!record.extraction_performed);
        assert_eq!(record.name.as_deref(), Some("Sarah"));
    }

    // ── LLM-backed extractor ──

    #[test]
    fn llm_extractor_parses_model_response() {
        let llm = MockLlmClient::new(
            r#"```json
{"name": "Sarah", "age": 29, "gender": "Female", "symptoms": ["headache"]}
```"#,
        );
        let extractor = LlmFactExtractor::new(&llm);
        let facts = extractor.extract(&record_with_exchange().chat_history).unwrap();
        assert_eq!(facts.name.as_deref(), Some("Sarah"));
        assert_eq!(facts.age, Some(29));
    }

    #[test]
    fn llm_extractor_retries_transport_errors_once() {
        let llm = FailThenSucceedLlmClient {
            response: r#"{"name": "Omar"}"#.to_string(),
            calls: AtomicUsize::new(0),
        };
        let extractor = LlmFactExtractor::new(&llm);
        let facts = extractor.extract(&record_with_exchange().chat_history).unwrap();
        assert_eq!(facts.name.as_deref(), Some("Omar"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn llm_extractor_gives_up_on_persistent_garbage() {
        let llm = MockLlmClient::new("I will not produce JSON.");
        let extractor = LlmFactExtractor::new(&llm);
        assert!(extractor.extract(&record_with_exchange().chat_history).is_err());
    }
}
