use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

use super::types::{FlowDecision, PatientFacts};
use super::ConsultError;
use crate::models::enums::FlowAction;

/// Parse the extraction model's response into patient facts.
///
/// Lenient by design: models fence their JSON or not, quote numbers or
/// not, and pad objects with prose. Anything that cannot be coerced is
/// dropped rather than failing the whole extraction.
pub fn parse_facts_response(response: &str) -> Result<PatientFacts, ConsultError> {
    let json_str = extract_json_block(response)?;

    #[derive(Deserialize)]
    struct RawFacts {
        name: Option<serde_json::Value>,
        age: Option<serde_json::Value>,
        gender: Option<serde_json::Value>,
        symptoms: Option<Vec<serde_json::Value>>,
        medical_history: Option<Vec<serde_json::Value>>,
        medications: Option<Vec<serde_json::Value>>,
        additional_info: Option<serde_json::Value>,
    }

    let raw: RawFacts =
        serde_json::from_str(&json_str).map_err(|e| ConsultError::JsonParsing(e.to_string()))?;

    Ok(PatientFacts {
        name: raw.name.as_ref().and_then(coerce_string),
        age: raw.age.as_ref().and_then(coerce_age),
        gender: raw.gender.as_ref().and_then(coerce_string),
        symptoms: coerce_string_list(raw.symptoms.as_deref()),
        medical_history: coerce_string_list(raw.medical_history.as_deref()),
        medications: coerce_string_list(raw.medications.as_deref()),
        additional_info: coerce_string_map(raw.additional_info.as_ref()),
    })
}

/// Parse the flow model's response into a decision.
///
/// Unlike fact parsing, a missing or unrecognized action is an error:
/// the caller falls back to CONTINUE_GATHERING.
pub fn parse_flow_response(response: &str) -> Result<FlowDecision, ConsultError> {
    let json_str = extract_json_block(response)?;

    #[derive(Deserialize)]
    struct RawFlow {
        action: Option<serde_json::Value>,
        reason: Option<serde_json::Value>,
        suggested_response: Option<serde_json::Value>,
        missing_info: Option<Vec<serde_json::Value>>,
    }

    let raw: RawFlow =
        serde_json::from_str(&json_str).map_err(|e| ConsultError::JsonParsing(e.to_string()))?;

    let action_str = raw
        .action
        .as_ref()
        .and_then(coerce_string)
        .ok_or_else(|| ConsultError::MalformedResponse("missing action".into()))?;
    let action = FlowAction::from_str(&action_str.to_lowercase()).map_err(|_| {
        ConsultError::MalformedResponse(format!("unrecognized action: {action_str}"))
    })?;

    Ok(FlowDecision {
        action,
        reason: raw
            .reason
            .as_ref()
            .and_then(coerce_string)
            .unwrap_or_else(|| "no reason given".to_string()),
        suggested_response: raw.suggested_response.as_ref().and_then(coerce_string),
        missing_info: coerce_string_list(raw.missing_info.as_deref()),
    })
}

/// Extract the JSON object from a model response: a fenced ```json block
/// when present, otherwise the outermost brace span.
fn extract_json_block(response: &str) -> Result<String, ConsultError> {
    if let Some(fence_start) = response.find("```json") {
        let content_start = fence_start + 7;
        let fence_len = response[content_start..]
            .find("```")
            .ok_or_else(|| ConsultError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(response[content_start..content_start + fence_len]
            .trim()
            .to_string());
    }

    let start = response
        .find('{')
        .ok_or_else(|| ConsultError::MalformedResponse("No JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ConsultError::MalformedResponse("No JSON object found".into()))?;
    Ok(response[start..=end].to_string())
}

/// String coercion: trims, drops empties and literal nulls, renders
/// numbers as text.
fn coerce_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("null")
                || trimmed.eq_ignore_ascii_case("none")
            {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_age(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string_list(items: Option<&[serde_json::Value]>) -> Vec<String> {
    match items {
        None => vec![],
        Some(arr) => arr.iter().filter_map(coerce_string).collect(),
    }
}

fn coerce_string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(serde_json::Value::Object(obj)) = value {
        for (key, val) in obj {
            let rendered = match val {
                serde_json::Value::String(_) | serde_json::Value::Number(_) => coerce_string(val),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            if let Some(rendered) = rendered {
                map.insert(key.clone(), rendered);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_facts_response() {
        let response = r#"Here is the extraction:

```json
{
  "name": "Sarah",
  "age": 29,
  "gender": "Female",
  "symptoms": ["headache", "nausea"],
  "medical_history": [],
  "medications": [],
  "additional_info": {"symptom_onset": "two days ago"}
}
```"#;
        let facts = parse_facts_response(response).unwrap();
        assert_eq!(facts.name.as_deref(), Some("Sarah"));
        assert_eq!(facts.age, Some(29));
        assert_eq!(facts.gender.as_deref(), Some("Female"));
        assert_eq!(facts.symptoms, vec!["headache", "nausea"]);
        assert_eq!(
            facts.additional_info.get("symptom_onset").map(String::as_str),
            Some("two days ago")
        );
    }

    #[test]
    fn parses_bare_json_with_surrounding_prose() {
        let response = r#"Sure. {"name": null, "age": "29", "symptoms": ["cough"]} Hope that helps."#;
        let facts = parse_facts_response(response).unwrap();
        assert!(facts.name.is_none());
        assert_eq!(facts.age, Some(29));
        assert_eq!(facts.symptoms, vec!["cough"]);
    }

    #[test]
    fn empty_and_null_strings_are_absent() {
        let response = r#"{"name": "  ", "gender": "null", "symptoms": ["", "fever"]}"#;
        let facts = parse_facts_response(response).unwrap();
        assert!(facts.name.is_none());
        assert!(facts.gender.is_none());
        assert_eq!(facts.symptoms, vec!["fever"]);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let facts = parse_facts_response(r#"{"name": "Omar"}"#).unwrap();
        assert_eq!(facts.name.as_deref(), Some("Omar"));
        assert!(facts.age.is_none());
        assert!(facts.symptoms.is_empty());
        assert!(facts.additional_info.is_empty());
    }

    #[test]
    fn additional_info_coerces_scalar_values() {
        let response = r#"{"additional_info": {"onset_days": 3, "smoker": false, "notes": {"x": 1}}}"#;
        let facts = parse_facts_response(response).unwrap();
        assert_eq!(facts.additional_info.get("onset_days").map(String::as_str), Some("3"));
        assert_eq!(facts.additional_info.get("smoker").map(String::as_str), Some("false"));
        assert!(!facts.additional_info.contains_key("notes"));
    }

    #[test]
    fn unparseable_response_is_an_error() {
        assert!(parse_facts_response("I could not comply.").is_err());
        assert!(parse_facts_response("```json\n{\"name\": \"x\"").is_err());
        assert!(parse_facts_response("{not json}").is_err());
    }

    #[test]
    fn parses_flow_response_with_uppercase_action() {
        let response = r#"```json
{"action": "CONTINUE_GATHERING", "reason": "age missing", "suggested_response": null, "missing_info": ["age"]}
```"#;
        let decision = parse_flow_response(response).unwrap();
        assert_eq!(decision.action, FlowAction::ContinueGathering);
        assert_eq!(decision.reason, "age missing");
        assert!(decision.suggested_response.is_none());
        assert_eq!(decision.missing_info, vec!["age"]);
    }

    #[test]
    fn flow_defaults_reason_when_missing() {
        let decision = parse_flow_response(r#"{"action": "offer_analysis"}"#).unwrap();
        assert_eq!(decision.action, FlowAction::OfferAnalysis);
        assert_eq!(decision.reason, "no reason given");
    }

    #[test]
    fn unrecognized_action_is_an_error() {
        let result = parse_flow_response(r#"{"action": "ESCALATE", "reason": "x"}"#);
        assert!(matches!(result, Err(ConsultError::MalformedResponse(_))));

        let result = parse_flow_response(r#"{"reason": "no action at all"}"#);
        assert!(matches!(result, Err(ConsultError::MalformedResponse(_))));
    }
}
