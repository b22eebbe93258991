//! crates/bookmarks_core/src/view.rs
//!
//! The view projection: a pure derivation of what the page shows from the
//! application state. Nothing here performs I/O.

use crate::app::AppState;
use crate::domain::{AddForm, Bookmark, Identity, Notice};
use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

/// Records whose title contains `term`, compared case-insensitively.
/// An empty term keeps everything. Order is preserved.
pub fn visible<'a>(all: &'a [Bookmark], term: &str) -> Vec<&'a Bookmark> {
    if term.is_empty() {
        return all.iter().collect();
    }
    let needle = term.to_lowercase();
    all.iter()
        .filter(|b| b.title.to_lowercase().contains(&needle))
        .collect()
}

/// Builds the decorative favicon link for a bookmark, keyed by its host.
/// Falls back to the raw text when it does not parse as a URL.
pub fn favicon_url(service: &str, bookmark_url: &str) -> Option<String> {
    let raw = bookmark_url.trim();
    let domain = Url::parse(raw)
        .ok()
        .or_else(|| Url::parse(&format!("https://{}", raw)).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string());

    let mut link = Url::parse(service).ok()?;
    link.query_pairs_mut().append_pair("domain", &domain);
    Some(link.into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMode {
    Normal,
    Editing { title: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRow {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub favicon_url: Option<String>,
    pub mode: RowMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkList {
    pub identity: Identity,
    pub search_term: String,
    pub add_form: AddForm,
    pub rows: Vec<BookmarkRow>,
    /// Total records held locally, before filtering.
    pub total: usize,
    /// Record awaiting a yes/no delete confirmation.
    pub pending_delete: Option<Uuid>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    SignedOut { notices: Vec<Notice> },
    Bookmarks(BookmarkList),
}

/// Derives the current screen from `state`.
pub fn project(state: &AppState, favicon_service: &str) -> View {
    if state.session.loading {
        return View::Loading;
    }
    let Some(identity) = state.session.identity.clone() else {
        return View::SignedOut {
            notices: state.notices.clone(),
        };
    };

    let rows = visible(&state.bookmarks, &state.search_term)
        .into_iter()
        .map(|b| {
            let mode = match &state.draft {
                Some(draft) if draft.id == b.id => RowMode::Editing {
                    title: draft.title.clone(),
                    url: draft.url.clone(),
                },
                _ => RowMode::Normal,
            };
            BookmarkRow {
                id: b.id,
                title: b.title.clone(),
                url: b.url.clone(),
                created_at: b.created_at,
                favicon_url: favicon_url(favicon_service, &b.url),
                mode,
            }
        })
        .collect();

    View::Bookmarks(BookmarkList {
        identity,
        search_term: state.search_term.clone(),
        add_form: state.add_form.clone(),
        rows,
        total: state.bookmarks.len(),
        pending_delete: state.pending_delete,
        notices: state.notices.clone(),
    })
}
