use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{Profile, ProfileField};
use crate::models::user::Identity;
use crate::profile::classifier::{classify, Classification};
use crate::profile::completeness::{compute_completeness_report, CompletenessReport};
use crate::profile::stage::Stage;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    pub report: CompletenessReport,
    pub stage: Stage,
}

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub fields: Vec<ProfileField>,
    pub fragments: Classification,
}

/// GET /api/v1/sessions/:id/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    let handle = state.sessions.get(id, &identity).await?;
    let session = handle.lock().await;
    Ok(Json(ProfileResponse {
        profile: session.profile.clone(),
        report: compute_completeness_report(&session.profile),
        stage: session.current_stage(),
    }))
}

/// POST /api/v1/profile/classify
/// Dry run of the classifier; touches no session.
pub async fn handle_classify(
    _identity: Identity,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let fragments = classify(&req.text);
    Ok(Json(ClassifyResponse {
        fields: fragments.fields().collect(),
        fragments,
    }))
}
