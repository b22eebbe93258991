//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use bookmarks_core::ports::PortError;
use std::sync::Arc;
use tracing::error;

use crate::web::{auth::session_id_from_headers, state::AppState};

/// Middleware that validates the auth session cookie.
///
/// If valid, inserts the caller's `Identity` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let session = state
        .auth
        .get_auth_session(auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            e => {
                error!("Failed to validate auth session: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    req.extensions_mut().insert(session.identity());
    Ok(next.run(req).await)
}
