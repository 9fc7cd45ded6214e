use chrono::Local;
use rusqlite::Connection;
use uuid::Uuid;

use super::types::{PersistenceGateway, SaveOutcome};
use crate::db::repository;
use crate::models::{PatientRecord, StoredConsultation};

/// Persists finished consultations into SQLite. Refuses records with
/// nothing identifying in them rather than writing empty rows.
pub struct SqliteGateway<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteGateway<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PersistenceGateway for SqliteGateway<'_> {
    fn save(&self, record: &PatientRecord) -> SaveOutcome {
        if !record.has_substantive_information() {
            return SaveOutcome::failed("Insufficient patient information to save");
        }

        let consultation = StoredConsultation {
            id: Uuid::new_v4(),
            record: record.clone(),
            saved_at: Local::now().naive_local(),
        };

        match repository::insert_consultation(self.conn, &consultation) {
            Ok(()) => {
                tracing::info!(id = %consultation.id, "consultation saved");
                SaveOutcome::saved(
                    consultation.id.to_string(),
                    "Patient information saved successfully",
                )
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save consultation");
                SaveOutcome::failed(format!("Error saving patient: {e}"))
            }
        }
    }
}

/// Stands in when no database could be opened. Every save fails softly
/// so the conversation itself is unaffected.
pub struct NullGateway;

impl PersistenceGateway for NullGateway {
    fn save(&self, _record: &PatientRecord) -> SaveOutcome {
        SaveOutcome::failed("No database configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Speaker;

    fn record_with_substance() -> PatientRecord {
        let mut record = PatientRecord::new();
        record.name = Some("Sarah".to_string());
        record.symptoms.push("headache".to_string());
        record.push_turn(Speaker::Doctor, "Hello");
        record.push_turn(Speaker::Patient, "I have a headache");
        record
    }

    #[test]
    fn saves_a_substantive_record_and_returns_its_id() {
        let conn = open_memory_database().unwrap();
        let gateway = SqliteGateway::new(&conn);

        let outcome = gateway.save(&record_with_substance());

        assert!(outcome.success);
        assert_eq!(outcome.message, "Patient information saved successfully");

        let id: Uuid = outcome.id.unwrap().parse().unwrap();
        let stored = repository::get_consultation(&conn, &id).unwrap().unwrap();
        assert_eq!(stored.record.name.as_deref(), Some("Sarah"));
        assert_eq!(stored.record.chat_history.len(), 2);
    }

    #[test]
    fn refuses_a_record_with_no_substance() {
        let conn = open_memory_database().unwrap();
        let gateway = SqliteGateway::new(&conn);

        let mut empty = PatientRecord::new();
        empty.push_turn(Speaker::Doctor, "Hello");

        let outcome = gateway.save(&empty);

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Insufficient patient information to save");
        assert!(outcome.id.is_none());
        assert_eq!(repository::count_consultations(&conn).unwrap(), 0);
    }

    #[test]
    fn age_alone_is_enough_substance() {
        let conn = open_memory_database().unwrap();
        let gateway = SqliteGateway::new(&conn);

        let mut record = PatientRecord::new();
        record.age = Some(52);

        assert!(gateway.save(&record).success);
        assert_eq!(repository::count_consultations(&conn).unwrap(), 1);
    }

    #[test]
    fn null_gateway_always_fails_softly() {
        let outcome = NullGateway.save(&record_with_substance());
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No database configured");
    }
}
