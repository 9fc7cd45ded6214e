use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::Gender;
use crate::models::{ChatTurn, PatientRecord, StoredConsultation};

/// Timestamp format used for all text date columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn insert_consultation(
    conn: &Connection,
    consultation: &StoredConsultation,
) -> Result<(), DatabaseError> {
    let record = &consultation.record;
    conn.execute(
        "INSERT INTO consultations (id, name, age, gender, symptoms, medical_history,
                 medications, additional_info, chat_history, created_at,
                 extraction_performed, turn_count, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            consultation.id.to_string(),
            record.name,
            record.age,
            record.gender.as_ref().map(|g| g.as_str()),
            serde_json::to_string(&record.symptoms)?,
            serde_json::to_string(&record.medical_history)?,
            serde_json::to_string(&record.medications)?,
            serde_json::to_string(&record.additional_info)?,
            serde_json::to_string(&record.chat_history)?,
            record.created_at.format(TIMESTAMP_FORMAT).to_string(),
            record.extraction_performed,
            record.turn_count,
            consultation.saved_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_consultation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<StoredConsultation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, age, gender, symptoms, medical_history, medications,
                additional_info, chat_history, created_at, extraction_performed,
                turn_count, saved_at
         FROM consultations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(ConsultationRow {
                id: row.get(0)?,
                name: row.get(1)?,
                age: row.get(2)?,
                gender: row.get(3)?,
                symptoms: row.get(4)?,
                medical_history: row.get(5)?,
                medications: row.get(6)?,
                additional_info: row.get(7)?,
                chat_history: row.get(8)?,
                created_at: row.get(9)?,
                extraction_performed: row.get(10)?,
                turn_count: row.get(11)?,
                saved_at: row.get(12)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(consultation_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_consultations(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM consultations", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

struct ConsultationRow {
    id: String,
    name: Option<String>,
    age: Option<u32>,
    gender: Option<String>,
    symptoms: String,
    medical_history: String,
    medications: String,
    additional_info: String,
    chat_history: String,
    created_at: String,
    extraction_performed: bool,
    turn_count: u32,
    saved_at: String,
}

fn consultation_from_row(row: ConsultationRow) -> Result<StoredConsultation, DatabaseError> {
    let symptoms: Vec<String> = serde_json::from_str(&row.symptoms)?;
    let medical_history: Vec<String> = serde_json::from_str(&row.medical_history)?;
    let medications: Vec<String> = serde_json::from_str(&row.medications)?;
    let additional_info: BTreeMap<String, String> = serde_json::from_str(&row.additional_info)?;
    let chat_history: Vec<ChatTurn> = serde_json::from_str(&row.chat_history)?;

    Ok(StoredConsultation {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        record: PatientRecord {
            name: row.name,
            age: row.age,
            gender: row.gender.as_deref().map(Gender::from_str).transpose()?,
            symptoms,
            medical_history,
            medications,
            additional_info,
            chat_history,
            created_at: NaiveDateTime::parse_from_str(&row.created_at, TIMESTAMP_FORMAT)
                .unwrap_or_default(),
            extraction_performed: row.extraction_performed,
            turn_count: row.turn_count,
        },
        saved_at: NaiveDateTime::parse_from_str(&row.saved_at, TIMESTAMP_FORMAT)
            .unwrap_or_default(),
    })
}
