use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Id of the signed-in user, inserted by [`require_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

pub fn generate_session_token(user_id: &str) -> String {
    format!("session_{}_{}", user_id, uuid::Uuid::new_v4().simple())
}

/// Rejects requests without a known `Authorization: Bearer` session token.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(auth) =
        auth.ok_or_else(|| ApiError::Unauthorized("Authorization Bearer token is required".into()))?;
    let token = auth.token();

    let user_id = state
        .sessions
        .get(token)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ApiError::Unauthorized("Session is invalid or expired".into()))?;

    log::info!(
        "Authentication successful for token: {}...{}",
        &token[..4.min(token.len())],
        &token[token.len().saturating_sub(4)..]
    );
    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}
