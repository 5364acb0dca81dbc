//! Caller identity, supplied by the upstream authentication service as headers.
//! Read-only: used to personalize prompts and scope session access.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::user::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let id = header(headers, USER_ID_HEADER).ok_or(AppError::Unauthorized)?;
    Ok(Identity {
        id,
        email: header(headers, USER_EMAIL_HEADER).unwrap_or_default(),
        display_name: header(headers, USER_NAME_HEADER),
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
    }
}
