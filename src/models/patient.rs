use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, Speaker};

/// Basic identity fields the consultation must establish before any
/// analysis can be offered, in priority order.
pub const BASIC_FIELDS: [&str; 3] = ["name", "age", "gender"];

/// Required fields for a complete intake. Symptoms come last so the
/// conversation establishes identity before the complaint.
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "age", "gender", "symptoms"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl ChatTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Structured state of one intake conversation. Built up incrementally by
/// the extraction engine; the chat history is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub symptoms: Vec<String>,
    pub medical_history: Vec<String>,
    pub medications: Vec<String>,
    pub additional_info: BTreeMap<String, String>,
    pub chat_history: Vec<ChatTurn>,
    pub created_at: NaiveDateTime,
    pub extraction_performed: bool,
    pub turn_count: u32,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self {
            name: None,
            age: None,
            gender: None,
            symptoms: Vec::new(),
            medical_history: Vec::new(),
            medications: Vec::new(),
            additional_info: BTreeMap::new(),
            chat_history: Vec::new(),
            created_at: Local::now().naive_local(),
            extraction_performed: false,
            turn_count: 0,
        }
    }

    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.chat_history.push(ChatTurn::new(speaker, text));
    }

    fn field_is_missing(&self, field: &str) -> bool {
        match field {
            "name" => self.name.is_none(),
            "age" => self.age.is_none(),
            "gender" => self.gender.is_none(),
            "symptoms" => self.symptoms.is_empty(),
            _ => false,
        }
    }

    /// Basic identity fields still missing, in the fixed priority order
    /// name, age, gender.
    pub fn missing_basic_fields(&self) -> Vec<&'static str> {
        BASIC_FIELDS
            .iter()
            .copied()
            .filter(|field| self.field_is_missing(field))
            .collect()
    }

    /// Missing basics plus `symptoms` when none have been gathered.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| self.field_is_missing(field))
            .collect()
    }

    /// All three basics present and at least one symptom gathered.
    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    /// At least one identifying or clinical fact is present. Gates
    /// persistence at the end of a consultation.
    pub fn has_substantive_information(&self) -> bool {
        self.name.is_some() || self.age.is_some() || !self.symptoms.is_empty()
    }

    /// Human-readable rendering of every populated field except the chat
    /// history. Used verbatim as LLM prompt context and for display.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("Name: {name}"));
        }
        if let Some(age) = self.age {
            parts.push(format!("Age: {age}"));
        }
        if let Some(gender) = &self.gender {
            parts.push(format!("Gender: {}", gender.label()));
        }
        if !self.symptoms.is_empty() {
            parts.push(format!("Symptoms: {}", self.symptoms.join(", ")));
        }
        if !self.medical_history.is_empty() {
            parts.push(format!(
                "Medical History: {}",
                self.medical_history.join(", ")
            ));
        }
        if !self.medications.is_empty() {
            parts.push(format!("Medications: {}", self.medications.join(", ")));
        }
        if !self.additional_info.is_empty() {
            let extras: Vec<String> = self
                .additional_info
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect();
            parts.push(format!("Additional Information: {}", extras.join("; ")));
        }

        if parts.is_empty() {
            "No patient information gathered yet.".to_string()
        } else {
            parts.join("\n")
        }
    }

    /// Pretty-printed JSON export of the full record.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Discard all gathered state and start over with a fresh timestamp.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// A record as persisted at the end of a consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConsultation {
    pub id: Uuid,
    pub record: PatientRecord,
    pub saved_at: NaiveDateTime,
}
