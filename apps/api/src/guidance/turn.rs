//! Conversation turn: orchestrates the full pipeline for one user submission.
//!
//! Flow: accept message → resolve attachments (parallel, best-effort) →
//!       classify → merge into profile → select stage → build prompt →
//!       stream reply → record result in the session.
//!
//! The caller holds the session lock for the whole turn, so the merge is
//! atomic with respect to other turns on the same session.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::extraction::DocumentExtractor;
use crate::guidance::assembler::{build_prompt, PromptInput};
use crate::guidance::attachments::{resolve_attachments, AttachmentText};
use crate::guidance::streamer::{ResponseStreamer, StreamEvent, StreamFailure};
use crate::models::attachment::Attachment;
use crate::models::message::Message;
use crate::models::profile::{Profile, ProfileField};
use crate::notify::{Notice, Notifier};
use crate::profile::classifier::classify;
use crate::profile::completeness::{compute_completeness_report, CompletenessReport};
use crate::profile::stage::{select_stage, Stage};
use crate::profile::store::merge;
use crate::session::Session;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Collaborators a turn needs, shared across sessions.
#[derive(Clone)]
pub struct TurnServices {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub notifier: Arc<dyn Notifier>,
    pub streamer: ResponseStreamer,
    pub attachment_timeout: Duration,
    /// How long the observer may leave an event unread before the turn gives up on it.
    pub observer_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Applicant explicitly asked to revise earlier guidance.
    pub revise: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&StreamFailure> for ErrorBody {
    fn from(failure: &StreamFailure) -> Self {
        let error = match failure {
            StreamFailure::Generation(msg) => AppError::Llm(msg.clone()),
            StreamFailure::TimedOut(_) => AppError::Timeout(failure.to_string()),
        };
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// What the caller observes, in order, during one turn.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    Accepted(Message),
    Notice(Notice),
    Profile {
        profile: Profile,
        report: CompletenessReport,
        stage: Stage,
        classified: Vec<ProfileField>,
    },
    /// The assistant message, empty at first and growing with each chunk.
    Message(Message),
    Completed(Message),
    Failed {
        message: Message,
        error: ErrorBody,
    },
    /// `None` when the turn was abandoned before a reply was started.
    Cancelled(Option<Message>),
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Accepted(_) => "accepted",
            TurnEvent::Notice(_) => "notice",
            TurnEvent::Profile { .. } => "profile",
            TurnEvent::Message(_) => "message",
            TurnEvent::Completed(_) => "completed",
            TurnEvent::Failed { .. } => "failed",
            TurnEvent::Cancelled(_) => "cancelled",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            TurnEvent::Accepted(m) | TurnEvent::Message(m) | TurnEvent::Completed(m) => {
                json!({ "message": m })
            }
            TurnEvent::Notice(n) => json!({ "notice": n }),
            TurnEvent::Profile {
                profile,
                report,
                stage,
                classified,
            } => json!({
                "profile": profile,
                "report": report,
                "stage": stage,
                "classified": classified,
            }),
            TurnEvent::Failed { message, error } => json!({ "message": message, "error": error }),
            TurnEvent::Cancelled(m) => json!({ "message": m }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
    Cancelled,
}

// ────────────────────────────────────────────────────────────────────────────
// Turn pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs one turn against a locked session.
///
/// Failures never abort the turn early: attachment failures become
/// placeholders and notices, a generation failure leaves the partial reply in
/// the history. An observer that leaves, or stops reading for longer than
/// `observer_timeout`, cancels the reply stream.
pub async fn process_turn(
    session: &mut Session,
    services: &TurnServices,
    input: TurnInput,
    cancel: CancellationToken,
    events: &mpsc::Sender<TurnEvent>,
) -> TurnOutcome {
    let observer = Observer {
        events,
        cancel: &cancel,
        stall_limit: services.observer_timeout,
    };

    // Superseded while waiting for the session: leave the profile untouched.
    if cancel.is_cancelled() {
        info!("Session {}: turn abandoned before start", session.id);
        observer.publish(TurnEvent::Cancelled(None)).await;
        return TurnOutcome::Cancelled;
    }

    let user_message = Message::user(
        input.text.clone(),
        input.attachments.iter().map(Attachment::to_ref).collect(),
    );
    session.messages.push(user_message.clone());
    observer.publish(TurnEvent::Accepted(user_message)).await;

    // Step 1: attachments, fan-out / fan-in
    let resolved = resolve_attachments(
        services.extractor.as_ref(),
        &input.attachments,
        services.attachment_timeout,
    )
    .await;
    for attachment in &resolved {
        if let AttachmentText::Failed { reason } = &attachment.outcome {
            let notice = Notice::attachment_failed(&attachment.file_name, reason);
            services.notifier.notify(&notice);
            observer.publish(TurnEvent::Notice(notice)).await;
        }
    }

    // Step 2-4: classify, merge, stage
    let classification = classify(&input.text);
    let before = session.profile.completeness();
    session.profile = merge(std::mem::take(&mut session.profile), &classification);
    let completeness = session.profile.completeness();
    let stage = select_stage(completeness, &session.guidance, input.revise);
    info!(
        "Session {}: classified {:?}, completeness {}% -> {}%, stage={}",
        session.id,
        classification.fields().map(|f| f.key()).collect::<Vec<_>>(),
        before,
        completeness,
        stage.as_str()
    );
    observer
        .publish(TurnEvent::Profile {
            profile: session.profile.clone(),
            report: compute_completeness_report(&session.profile),
            stage,
            classified: classification.fields().collect(),
        })
        .await;

    if cancel.is_cancelled() {
        observer.publish(TurnEvent::Cancelled(None)).await;
        return TurnOutcome::Cancelled;
    }

    // Step 5: prompt from a complete, stable snapshot
    let previous_guidance = match stage {
        Stage::Refinement => session.guidance.last().map(|g| g.text.as_str()),
        _ => None,
    };
    let prompt = build_prompt(&PromptInput {
        identity: &session.identity,
        profile: &session.profile,
        stage,
        message: &input.text,
        attachments: &resolved,
        previous_guidance,
    });

    // Step 6: stream the reply
    let mut handle = services.streamer.start(prompt, cancel.clone());
    let mut outcome = TurnOutcome::Cancelled;
    while let Some(event) = handle.next_event().await {
        let turn_event = match event {
            StreamEvent::Started(message) | StreamEvent::Delta(message) => {
                TurnEvent::Message(message)
            }
            StreamEvent::Completed(message) => {
                session.guidance.record(stage, completeness, &message);
                session.messages.push(message.clone());
                outcome = TurnOutcome::Completed;
                TurnEvent::Completed(message)
            }
            StreamEvent::Failed { message, failure } => {
                warn!("Session {}: reply failed: {failure}", session.id);
                let notice = Notice::generation_failed(&failure.to_string());
                services.notifier.notify(&notice);
                observer.publish(TurnEvent::Notice(notice)).await;
                session.messages.push(message.clone());
                outcome = TurnOutcome::Failed;
                TurnEvent::Failed {
                    message,
                    error: ErrorBody::from(&failure),
                }
            }
            StreamEvent::Cancelled(message) => {
                info!("Session {}: reply {} cancelled", session.id, handle.message_id());
                session.messages.push(message.clone());
                outcome = TurnOutcome::Cancelled;
                TurnEvent::Cancelled(Some(message))
            }
        };
        observer.publish(turn_event).await;
    }

    outcome
}

/// Sending side towards whoever watches the turn.
struct Observer<'a> {
    events: &'a mpsc::Sender<TurnEvent>,
    cancel: &'a CancellationToken,
    stall_limit: Duration,
}

impl Observer<'_> {
    /// Delivers an event without ever blocking past cancellation.
    ///
    /// A closed channel or a reader stalled beyond `stall_limit` cancels the
    /// turn. Once cancelled, events are only delivered if there is room.
    async fn publish(&self, event: TurnEvent) {
        if self.cancel.is_cancelled() {
            let _ = self.events.try_send(event);
            return;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                let _ = self.events.try_send(event);
            }
            permit = tokio::time::timeout(self.stall_limit, self.events.reserve()) => match permit {
                Ok(Ok(permit)) => permit.send(event),
                Ok(Err(_)) => self.cancel.cancel(),
                Err(_) => {
                    warn!(
                        "Turn observer stalled for {:?}; abandoning the turn",
                        self.stall_limit
                    );
                    self.cancel.cancel();
                }
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
