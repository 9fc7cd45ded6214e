//! Medara core: a locally-run medical intake assistant. A consultation
//! conversation is driven turn by turn through extraction, flow control
//! and response generation, and ends in a structured patient record.

pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
