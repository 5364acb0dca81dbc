//! Stage Selector: derives the conversation stage from completeness.
//!
//! The threshold alone only ever yields `Collection` or `Generation`.
//! `Refinement` needs a session signal: guidance was already produced, and
//! either nothing new was learned since (completeness unchanged) or the
//! applicant explicitly asked for a revision.

use serde::{Deserialize, Serialize};

use crate::models::message::{Message, MessageStatus};

/// Completeness at or above this switches from collecting facts to generating guidance.
pub const GENERATION_THRESHOLD: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collection,
    Generation,
    Refinement,
}

impl Stage {
    /// Threshold-only stage. Inclusive on the generation side.
    pub fn from_completeness(completeness: u8) -> Self {
        if completeness < GENERATION_THRESHOLD {
            Stage::Collection
        } else {
            Stage::Generation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collection => "collection",
            Stage::Generation => "generation",
            Stage::Refinement => "refinement",
        }
    }
}

/// The most recent guidance successfully produced in this session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedGuidance {
    pub completeness: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuidanceHistory {
    last: Option<GeneratedGuidance>,
}

impl GuidanceHistory {
    pub fn last(&self) -> Option<&GeneratedGuidance> {
        self.last.as_ref()
    }

    /// Records a finished reply. Collection replies are questions, not guidance,
    /// and failed or cancelled replies never count.
    pub fn record(&mut self, stage: Stage, completeness: u8, reply: &Message) {
        if stage == Stage::Collection
            || reply.status() != MessageStatus::Complete
            || reply.content().trim().is_empty()
        {
            return;
        }
        self.last = Some(GeneratedGuidance {
            completeness,
            text: reply.content().to_string(),
        });
    }
}

/// Stage for the current turn. Derived fresh every turn, never cached.
pub fn select_stage(completeness: u8, history: &GuidanceHistory, revise_requested: bool) -> Stage {
    let stage = Stage::from_completeness(completeness);
    if stage != Stage::Generation {
        return stage;
    }
    match history.last() {
        Some(previous) if revise_requested || previous.completeness == completeness => {
            Stage::Refinement
        }
        _ => stage,
    }
}
