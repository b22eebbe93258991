//! crates/bookmarks_core/src/store.rs
//!
//! The bookmark store client: identity-scoped CRUD against the remote
//! collection. It performs the remote half of every operation; reconciling the
//! local list with the outcome is the reducer's job (see `app.rs`).

use crate::domain::{Bookmark, Identity};
use crate::ports::{BookmarkStore, PortError, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bounded exponential backoff for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Trims both fields and rejects the pair if either ends up empty.
pub fn validate_fields(title: &str, url: &str) -> Option<(String, String)> {
    let title = title.trim();
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    Some((title.to_string(), url.to_string()))
}

#[derive(Clone)]
pub struct BookmarkClient {
    store: Arc<dyn BookmarkStore>,
    list_retry: RetryPolicy,
}

impl BookmarkClient {
    pub fn new(store: Arc<dyn BookmarkStore>, list_retry: RetryPolicy) -> Self {
        Self { store, list_retry }
    }

    /// Fetches the owner's full collection, newest first. Retried per the
    /// configured policy; `Unauthorized` is never retried.
    pub async fn list(&self, owner: &Identity) -> PortResult<Vec<Bookmark>> {
        let attempts = self.list_retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.store.list_bookmarks(owner.user_id).await {
                Ok(mut bookmarks) => {
                    // Newest first; ties keep the store's order.
                    bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    return Ok(bookmarks);
                }
                Err(PortError::Unauthorized) => return Err(PortError::Unauthorized),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.list_retry.delay_for(attempt);
                    warn!(
                        "Listing bookmarks failed (attempt {}/{}): {}. Retrying in {:?}.",
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Inserts a bookmark with trimmed fields. Callers validate first; an
    /// empty field here is refused without touching the store.
    pub async fn create(&self, owner: &Identity, title: &str, url: &str) -> PortResult<Bookmark> {
        let (title, url) = validate_fields(title, url)
            .ok_or_else(|| PortError::Unexpected("title and url must not be empty".to_string()))?;
        debug!("Creating bookmark '{}' for user {}", title, owner.user_id);
        self.store.create_bookmark(owner.user_id, &title, &url).await
    }

    pub async fn update(&self, owner: &Identity, id: Uuid, title: &str, url: &str) -> PortResult<()> {
        debug!("Updating bookmark {} for user {}", id, owner.user_id);
        self.store.update_bookmark(owner.user_id, id, title, url).await
    }

    pub async fn delete(&self, owner: &Identity, id: Uuid) -> PortResult<()> {
        debug!("Deleting bookmark {} for user {}", id, owner.user_id);
        self.store.delete_bookmark(owner.user_id, id).await
    }
}
