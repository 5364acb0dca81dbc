use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::guidance::turn::{process_turn, TurnEvent, TurnInput};
use crate::models::attachment::Attachment;
use crate::models::message::Message;
use crate::models::profile::Profile;
use crate::models::user::Identity;
use crate::profile::completeness::{compute_completeness_report, CompletenessReport};
use crate::profile::stage::Stage;
use crate::session::Session;
use crate::state::AppState;

const TURN_EVENT_BUFFER: usize = 64;
const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub profile: Profile,
    pub report: CompletenessReport,
    pub stage: Stage,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            profile: session.profile.clone(),
            report: compute_completeness_report(&session.profile),
            stage: session.current_stage(),
            messages: session.messages.clone(),
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let handle = state.sessions.create(identity).await;
    let session = handle.lock().await;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&*session))))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.sessions.get(id, &identity).await?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::from(&*session)))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_end_session(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id, &identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/cancel
pub async fn handle_cancel_turn(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let handle = state.sessions.get(id, &identity).await?;
    let cancelled = handle.cancel_active_turn().await;
    info!("Session {id}: cancel requested (active turn: {cancelled})");
    Ok(Json(CancelResponse { cancelled }))
}

/// POST /api/v1/sessions/:id/messages
///
/// Multipart body: `message` (text), optional `revise` flag, any number of
/// file parts. Responds with a server-sent event stream of turn events.
/// Submitting while a turn is still running cancels that turn.
pub async fn handle_post_message(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let handle = state.sessions.get(id, &identity).await?;
    let input = read_turn_input(multipart).await?;
    info!(
        "Session {id}: message received ({} chars, {} attachments)",
        input.text.chars().count(),
        input.attachments.len()
    );

    // Cancel the running turn before queueing on the session lock.
    let ticket = handle.begin_turn().await;
    let (tx, mut rx) = mpsc::channel::<TurnEvent>(TURN_EVENT_BUFFER);
    let services = state.turn.clone();

    tokio::spawn(async move {
        let outcome = {
            let mut session = handle.lock().await;
            process_turn(&mut session, &services, input, ticket.token.clone(), &tx).await
        };
        handle.finish_turn(&ticket).await;
        debug!("Session {}: turn {} ended {:?}", handle.id, ticket.seq, outcome);
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(sse_event(&event));
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keepalive"),
    ))
}

fn sse_event(event: &TurnEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// Reads the turn from a multipart body. Any part with a file name is an attachment.
async fn read_turn_input(mut multipart: Multipart) -> Result<TurnInput, AppError> {
    let mut input = TurnInput::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                input
                    .attachments
                    .push(Attachment::new(file_name, content_type, data));
            }
            None if name == "message" => input.text = field.text().await?,
            None if name == "revise" => input.revise = is_truthy(&field.text().await?),
            None => debug!("Ignoring multipart field '{name}'"),
        }
    }

    if input.text.trim().is_empty() && input.attachments.is_empty() {
        return Err(AppError::Validation(
            "A message or at least one attachment is required".to_string(),
        ));
    }
    Ok(input)
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
