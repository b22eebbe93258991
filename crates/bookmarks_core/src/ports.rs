//! crates/bookmarks_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! identity providers.

use crate::domain::{AuthSession, Bookmark, Identity, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Push notifications of session changes. `None` means the identity is gone.
pub type SessionChanges = Pin<Box<dyn Stream<Item = Option<Identity>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote, identity-scoped bookmark collection.
///
/// Implementations enforce ownership themselves: a row belonging to another
/// user behaves exactly like a missing row.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All bookmarks owned by `owner`, newest first.
    async fn list_bookmarks(&self, owner: Uuid) -> PortResult<Vec<Bookmark>>;

    /// Inserts a bookmark and returns it with the store-assigned id and timestamp.
    async fn create_bookmark(&self, owner: Uuid, title: &str, url: &str) -> PortResult<Bookmark>;

    async fn update_bookmark(&self, owner: Uuid, id: Uuid, title: &str, url: &str) -> PortResult<()>;

    async fn delete_bookmark(&self, owner: Uuid, id: Uuid) -> PortResult<()>;
}

/// Persistence for accounts and login sessions.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Identity>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Looks up a non-expired auth session.
    async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession>;

    /// Pushes a live session's expiry forward. An unknown or expired session is `Unauthorized`.
    async fn refresh_auth_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The identity provider as seen from one mounted client.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolves the existing session, if any.
    async fn current_identity(&self) -> PortResult<Option<Identity>>;

    /// Registers for session change notifications. Dropping the stream unsubscribes.
    fn subscribe(&self) -> SessionChanges;

    async fn sign_out(&self) -> PortResult<()>;
}

/// Write-only "copy text" capability. Outcome is not reported back.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str);
}
