//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Bookmark reads and writes travel over the WebSocket; the REST surface is
//! limited to account and session management.

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use axum::{response::Json, Extension};
use bookmarks_core::domain::Identity;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::refresh_handler,
        crate::web::auth::logout_handler,
        me_handler,
    ),
    components(
        schemas(SignupRequest, LoginRequest, AuthResponse, MeResponse)
    ),
    tags(
        (name = "Bookmarks API", description = "Account and session endpoints for the bookmark manager.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The signed-in user, as resolved from the session cookie.
#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    user_id: Uuid,
    email: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the identity behind the current session cookie.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn me_handler(Extension(identity): Extension<Identity>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: identity.user_id,
        email: identity.email,
    })
}
