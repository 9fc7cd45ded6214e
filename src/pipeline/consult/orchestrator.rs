use super::extraction::extract_and_merge;
use super::flow;
use super::language::{detect_language, Language, LanguageDetectError};
use super::responder;
use super::types::{
    ConversationPhase, FactExtractor, FlowClassifier, PersistenceGateway, TurnOutcome,
};
use super::ConsultError;
use crate::models::enums::{FlowAction, Speaker};
use crate::models::PatientRecord;
use crate::pipeline::LlmClient;

/// Key under which the detected conversation language is recorded.
const LANGUAGE_KEY: &str = "language";

/// Drives one consultation end to end: turn intake, incremental
/// extraction, flow decisions, reply generation and terminal persistence.
///
/// Collaborators are borrowed as trait objects so any of them can be
/// stubbed out. A turn only errors on phase misuse; collaborator
/// failures degrade inside the pipeline instead of surfacing.
pub struct ConsultationOrchestrator<'a> {
    extractor: &'a dyn FactExtractor,
    classifier: &'a dyn FlowClassifier,
    llm: &'a dyn LlmClient,
    gateway: &'a dyn PersistenceGateway,
    record: PatientRecord,
    phase: ConversationPhase,
    extract_every: u32,
}

impl<'a> ConsultationOrchestrator<'a> {
    pub fn new(
        extractor: &'a dyn FactExtractor,
        classifier: &'a dyn FlowClassifier,
        llm: &'a dyn LlmClient,
        gateway: &'a dyn PersistenceGateway,
    ) -> Self {
        Self {
            extractor,
            classifier,
            llm,
            gateway,
            record: PatientRecord::new(),
            phase: ConversationPhase::NotStarted,
            extract_every: 1,
        }
    }

    /// Run extraction only on every `n`th patient turn. Zero is clamped
    /// to one; the default extracts on every turn.
    pub fn with_extraction_cadence(mut self, n: u32) -> Self {
        self.extract_every = n.max(1);
        self
    }

    pub fn record(&self) -> &PatientRecord {
        &self.record
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    /// Open the consultation. The greeting is always templated and goes
    /// into the chat history as the doctor's first turn.
    pub fn start_conversation(&mut self) -> Result<&'static str, ConsultError> {
        match self.phase {
            ConversationPhase::NotStarted => {}
            ConversationPhase::Active => return Err(ConsultError::AlreadyStarted),
            ConversationPhase::Ended => return Err(ConsultError::AlreadyEnded),
        }

        let greeting = responder::greeting();
        self.record.push_turn(Speaker::Doctor, greeting);
        self.phase = ConversationPhase::Active;
        tracing::info!(phase = self.phase.as_str(), "consultation started");
        Ok(greeting)
    }

    /// Run one full turn: record the message, extract facts, decide the
    /// flow, reply, and persist exactly once if this turn ends the
    /// conversation.
    pub fn process_user_input(&mut self, user_input: &str) -> Result<TurnOutcome, ConsultError> {
        match self.phase {
            ConversationPhase::NotStarted => return Err(ConsultError::NotStarted),
            ConversationPhase::Ended => return Err(ConsultError::AlreadyEnded),
            ConversationPhase::Active => {}
        }

        self.record.push_turn(Speaker::Patient, user_input);
        self.record.turn_count += 1;
        self.tag_language(user_input);

        if self.record.turn_count % self.extract_every == 0 {
            extract_and_merge(self.extractor, &mut self.record);
        }

        let mut decision = flow::decide(self.classifier, &self.record, user_input);

        // The flow layer already clamps this. Re-checking here means a bad
        // decision can never put an analysis offer in front of an
        // incomplete record.
        if decision.action == FlowAction::OfferAnalysis {
            let missing = self.record.missing_basic_fields();
            if !missing.is_empty() {
                tracing::warn!(missing = ?missing, "downgrading analysis offer, basics incomplete");
                decision.action = FlowAction::ContinueGathering;
                decision.missing_info = missing.iter().map(|f| f.to_string()).collect();
            }
        }

        tracing::debug!(
            action = decision.action.as_str(),
            reason = %decision.reason,
            "flow decision"
        );

        let ended = decision.action == FlowAction::EndConversation;
        let reply = match decision.action {
            FlowAction::EndConversation => responder::farewell_reply(&self.record, &decision),
            FlowAction::OfferAnalysis => {
                responder::analysis_offer_reply(&self.record, &decision, user_input)
            }
            FlowAction::ContinueGathering => {
                responder::gathering_reply(self.llm, &self.record, &decision, user_input)
            }
        };
        self.record.push_turn(Speaker::Doctor, reply.as_str());

        let save_outcome = if ended {
            self.phase = ConversationPhase::Ended;
            tracing::info!("consultation ended, saving record");
            Some(self.gateway.save(&self.record))
        } else {
            None
        };

        Ok(TurnOutcome {
            reply,
            action: decision.action,
            reason: decision.reason,
            conversation_ended: ended,
            record: self.record.clone(),
            extraction_performed: self.record.extraction_performed,
            save_outcome,
        })
    }

    /// Force an extraction pass outside the normal cadence. Returns
    /// whether an LLM extraction ran and succeeded.
    pub fn trigger_extraction(&mut self) -> bool {
        extract_and_merge(self.extractor, &mut self.record)
    }

    /// Discard all state so a new consultation can be started.
    pub fn reset(&mut self) {
        self.record.reset();
        self.phase = ConversationPhase::NotStarted;
        tracing::info!(phase = self.phase.as_str(), "consultation reset");
    }

    /// The first message with enough text decides the conversation
    /// language. Inconclusive text falls back to English; too-short
    /// messages leave the question open for the next turn.
    fn tag_language(&mut self, user_input: &str) {
        if self.record.additional_info.contains_key(LANGUAGE_KEY) {
            return;
        }
        match detect_language(user_input) {
            Ok(lang) => {
                tracing::debug!(language = lang.code(), "conversation language detected");
                self.record
                    .additional_info
                    .insert(LANGUAGE_KEY.to_string(), lang.label().to_string());
            }
            Err(LanguageDetectError::Inconclusive) => {
                self.record.additional_info.insert(
                    LANGUAGE_KEY.to_string(),
                    Language::English.label().to_string(),
                );
            }
            Err(LanguageDetectError::TooShort) => {}
        }
    }
}
