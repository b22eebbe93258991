//! services/api/src/web/state.rs
//!
//! Defines the state shared by every request and connection.

use crate::adapters::SessionHub;
use crate::config::Config;
use bookmarks_core::ports::{AuthStore, BookmarkStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Per-page state lives in each connection's `Controller`, not here.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthStore>,
    pub bookmarks: Arc<dyn BookmarkStore>,
    pub session_hub: SessionHub,
    pub config: Arc<Config>,
}
