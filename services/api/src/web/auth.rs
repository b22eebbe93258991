//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, refresh, and logout.
//!
//! A successful signup or login creates an auth session row and hands its id to
//! the browser in the `session` cookie. WebSocket connections read the same
//! cookie at upgrade time.

use crate::adapters::AuthEvent;
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bookmarks_core::ports::PortError;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// Name of the cookie carrying the auth session id.
pub const SESSION_COOKIE: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Extracts the auth session id from the request's `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

fn session_cookie(session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        ttl.num_seconds()
    )
}

fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Creates a fresh auth session for `user_id` and returns its cookie.
async fn issue_session(state: &AppState, user_id: Uuid) -> Result<String, (StatusCode, String)> {
    let ttl = Duration::days(state.config.session_ttl_days);
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + ttl;

    state
        .auth
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    Ok(session_cookie(&auth_session_id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Email and password are required".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    let user = state
        .auth
        .create_user_with_email(email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::AlreadyExists(_) => {
                (StatusCode::CONFLICT, "Email already registered".to_string())
            }
            e => {
                error!("Failed to create user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    let cookie = issue_session(&state, user.user_id).await?;
    info!("New account created for user {}", user.user_id);

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or_default(),
    };
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    let user_creds = state
        .auth
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| {
            if !matches!(e, PortError::NotFound(_)) {
                error!("Failed to get user: {:?}", e);
            }
            invalid()
        })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    let cookie = issue_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/refresh - Extend the current session
///
/// Connected pages holding the same session are told the session was renewed.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Session extended", body = AuthResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    let ttl = Duration::days(state.config.session_ttl_days);
    let session = state
        .auth
        .refresh_auth_session(auth_session_id, Utc::now() + ttl)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "No session found".to_string()),
            e => {
                error!("Failed to refresh auth session: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to refresh session".to_string())
            }
        })?;

    let cookie = session_cookie(&session.id, ttl);
    let response = AuthResponse {
        user_id: session.user_id,
        email: session.email.clone().unwrap_or_default(),
    };
    state.session_hub.publish(AuthEvent::Refreshed(session));

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .auth
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;
    state.session_hub.publish(AuthEvent::Ended {
        session_id: auth_session_id.to_string(),
    });

    Ok((StatusCode::OK, [(header::SET_COOKIE, cleared_cookie())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SessionHub;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use bookmarks_core::domain::{AuthSession, Bookmark, Identity, UserCredentials};
    use bookmarks_core::ports::{AuthStore, BookmarkStore, PortResult};
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryAuth {
        users: Mutex<HashMap<String, UserCredentials>>,
        sessions: Mutex<HashMap<String, AuthSession>>,
    }

    #[async_trait]
    impl AuthStore for MemoryAuth {
        async fn create_user_with_email(&self, email: &str, hashed: &str) -> PortResult<Identity> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(email) {
                return Err(PortError::AlreadyExists(email.to_string()));
            }
            let user_id = Uuid::new_v4();
            users.insert(
                email.to_string(),
                UserCredentials {
                    user_id,
                    email: email.to_string(),
                    hashed_password: hashed.to_string(),
                },
            );
            Ok(Identity {
                user_id,
                email: Some(email.to_string()),
            })
        }

        async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
            self.users
                .lock()
                .unwrap()
                .get(email)
                .cloned()
                .ok_or_else(|| PortError::NotFound(email.to_string()))
        }

        async fn create_auth_session(
            &self,
            session_id: &str,
            user_id: Uuid,
            expires_at: DateTime<Utc>,
        ) -> PortResult<()> {
            self.sessions.lock().unwrap().insert(
                session_id.to_string(),
                AuthSession {
                    id: session_id.to_string(),
                    user_id,
                    email: None,
                    expires_at,
                },
            );
            Ok(())
        }

        async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
            self.sessions
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .ok_or(PortError::Unauthorized)
        }

        async fn refresh_auth_session(
            &self,
            session_id: &str,
            expires_at: DateTime<Utc>,
        ) -> PortResult<AuthSession> {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(session_id).ok_or(PortError::Unauthorized)?;
            session.expires_at = expires_at;
            Ok(session.clone())
        }

        async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
            self.sessions.lock().unwrap().remove(session_id);
            Ok(())
        }
    }

    struct NoBookmarks;

    #[async_trait]
    impl BookmarkStore for NoBookmarks {
        async fn list_bookmarks(&self, _: Uuid) -> PortResult<Vec<Bookmark>> {
            Ok(Vec::new())
        }
        async fn create_bookmark(&self, _: Uuid, _: &str, _: &str) -> PortResult<Bookmark> {
            Err(PortError::Unexpected("read only".into()))
        }
        async fn update_bookmark(&self, _: Uuid, _: Uuid, _: &str, _: &str) -> PortResult<()> {
            Err(PortError::Unexpected("read only".into()))
        }
        async fn delete_bookmark(&self, _: Uuid, _: Uuid) -> PortResult<()> {
            Err(PortError::Unexpected("read only".into()))
        }
    }

    fn app_state(auth: Arc<MemoryAuth>) -> Arc<AppState> {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/bookmarks".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState {
            auth,
            bookmarks: Arc::new(NoBookmarks),
            session_hub: SessionHub::default(),
            config: Arc::new(config),
        })
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn set_cookie(response: &axum::response::Response) -> String {
        response.headers()[header::SET_COOKIE].to_str().unwrap().to_string()
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let headers = cookie_headers("theme=dark; session=abc123; lang=en");
        assert_eq!(session_id_from_headers(&headers), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_session_cookie_is_none() {
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
        assert_eq!(session_id_from_headers(&cookie_headers("session=")), None);
    }

    #[tokio::test]
    async fn signup_then_login_issues_session_cookies() {
        let auth = Arc::new(MemoryAuth::default());
        let state = app_state(auth.clone());

        let signup = signup_handler(
            State(state.clone()),
            Json(SignupRequest {
                email: "ada@example.com".into(),
                password: "hunter2".into(),
            }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(signup.status(), StatusCode::CREATED);
        assert!(set_cookie(&signup).starts_with("session="));

        let login = login_handler(
            State(state),
            Json(LoginRequest {
                email: "ada@example.com".into(),
                password: "hunter2".into(),
            }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(login.status(), StatusCode::OK);
        assert_eq!(auth.sessions.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_conflict() {
        let state = app_state(Arc::new(MemoryAuth::default()));
        let request = || SignupRequest {
            email: "ada@example.com".into(),
            password: "hunter2".into(),
        };

        assert!(signup_handler(State(state.clone()), Json(request())).await.is_ok());
        let err = signup_handler(State(state), Json(request())).await.err().unwrap();
        assert_eq!(err.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = app_state(Arc::new(MemoryAuth::default()));
        signup_handler(
            State(state.clone()),
            Json(SignupRequest {
                email: "ada@example.com".into(),
                password: "hunter2".into(),
            }),
        )
        .await
        .unwrap();

        let err = login_handler(
            State(state),
            Json(LoginRequest {
                email: "ada@example.com".into(),
                password: "letmein".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_the_cookie_and_announces_the_end() {
        let auth = Arc::new(MemoryAuth::default());
        let state = app_state(auth.clone());
        auth.create_auth_session("s1", Uuid::new_v4(), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let mut events = state.session_hub.listen();

        let response = logout_handler(State(state), cookie_headers("session=s1"))
            .await
            .unwrap()
            .into_response();

        assert!(set_cookie(&response).contains("Max-Age=0"));
        assert!(auth.sessions.lock().unwrap().is_empty());
        assert!(matches!(
            events.try_recv().unwrap(),
            AuthEvent::Ended { session_id } if session_id == "s1"
        ));
    }

    #[tokio::test]
    async fn refresh_extends_and_announces_the_session() {
        let auth = Arc::new(MemoryAuth::default());
        let state = app_state(auth.clone());
        let soon = Utc::now() + Duration::minutes(5);
        auth.create_auth_session("s1", Uuid::new_v4(), soon).await.unwrap();
        let mut events = state.session_hub.listen();

        let response = refresh_handler(State(state), cookie_headers("session=s1"))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(auth.sessions.lock().unwrap()["s1"].expires_at > soon);
        assert!(matches!(events.try_recv().unwrap(), AuthEvent::Refreshed(s) if s.id == "s1"));
    }

    #[tokio::test]
    async fn refresh_without_a_session_is_unauthorized() {
        let state = app_state(Arc::new(MemoryAuth::default()));
        let err = refresh_handler(State(state), cookie_headers("session=gone"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
