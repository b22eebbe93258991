//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser page and the API server.
//!
//! The page sends user interactions; the server answers with the full projected
//! screen whenever it changes, plus clipboard requests.

use bookmarks_core::{
    app::Action,
    domain::{Notice, NoticeLevel},
    view::{BookmarkList, BookmarkRow, RowMode, View},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetSearchTerm { term: String },
    SetAddTitle { title: String },
    SetAddUrl { url: String },
    AddBookmark,
    BeginEdit { id: Uuid },
    SetDraftTitle { title: String },
    SetDraftUrl { url: String },
    SaveEdit,
    CancelEdit,
    /// Asks for the yes/no confirmation; nothing is deleted yet.
    RequestDelete { id: Uuid },
    ConfirmDelete { confirmed: bool },
    CopyUrl { id: Uuid },
    SignOut,
    DismissNotice { id: u64 },
}

impl From<ClientMessage> for Action {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::SetSearchTerm { term } => Action::SetSearchTerm(term),
            ClientMessage::SetAddTitle { title } => Action::SetAddTitle(title),
            ClientMessage::SetAddUrl { url } => Action::SetAddUrl(url),
            ClientMessage::AddBookmark => Action::AddBookmark,
            ClientMessage::BeginEdit { id } => Action::BeginEdit(id),
            ClientMessage::SetDraftTitle { title } => Action::SetDraftTitle(title),
            ClientMessage::SetDraftUrl { url } => Action::SetDraftUrl(url),
            ClientMessage::SaveEdit => Action::SaveEdit,
            ClientMessage::CancelEdit => Action::CancelEdit,
            ClientMessage::RequestDelete { id } => Action::RequestDelete(id),
            ClientMessage::ConfirmDelete { confirmed } => Action::ConfirmDelete(confirmed),
            ClientMessage::CopyUrl { id } => Action::CopyUrl(id),
            ClientMessage::SignOut => Action::SignOut,
            ClientMessage::DismissNotice { id } => Action::DismissNotice(id),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The screen to render, sent on connect and after every change.
    View { view: ScreenDto },

    /// Asks the page to put `text` on the system clipboard.
    CopyToClipboard { text: String },

    /// Reports a protocol problem, such as a malformed message.
    Error { message: String },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenDto {
    Loading,
    SignedOut {
        notices: Vec<NoticeDto>,
    },
    Bookmarks {
        user_id: Uuid,
        email: Option<String>,
        search_term: String,
        add_title: String,
        add_url: String,
        rows: Vec<RowDto>,
        total: usize,
        pending_delete: Option<Uuid>,
        notices: Vec<NoticeDto>,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RowDto {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub favicon_url: Option<String>,
    /// Present while the row is being edited.
    pub draft: Option<DraftDto>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DraftDto {
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NoticeDto {
    pub id: u64,
    pub level: &'static str,
    pub message: String,
}

impl From<&Notice> for NoticeDto {
    fn from(notice: &Notice) -> Self {
        Self {
            id: notice.id,
            level: match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Error => "error",
            },
            message: notice.message.clone(),
        }
    }
}

impl From<&BookmarkRow> for RowDto {
    fn from(row: &BookmarkRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            url: row.url.clone(),
            created_at: row.created_at,
            favicon_url: row.favicon_url.clone(),
            draft: match &row.mode {
                RowMode::Normal => None,
                RowMode::Editing { title, url } => Some(DraftDto {
                    title: title.clone(),
                    url: url.clone(),
                }),
            },
        }
    }
}

fn notices(list: &[Notice]) -> Vec<NoticeDto> {
    list.iter().map(NoticeDto::from).collect()
}

impl From<&View> for ScreenDto {
    fn from(view: &View) -> Self {
        match view {
            View::Loading => ScreenDto::Loading,
            View::SignedOut { notices: n } => ScreenDto::SignedOut { notices: notices(n) },
            View::Bookmarks(BookmarkList {
                identity,
                search_term,
                add_form,
                rows,
                total,
                pending_delete,
                notices: n,
            }) => ScreenDto::Bookmarks {
                user_id: identity.user_id,
                email: identity.email.clone(),
                search_term: search_term.clone(),
                add_title: add_form.title.clone(),
                add_url: add_form.url.clone(),
                rows: rows.iter().map(RowDto::from).collect(),
                total: *total,
                pending_delete: *pending_delete,
                notices: notices(n),
            },
        }
    }
}

impl From<&View> for ServerMessage {
    fn from(view: &View) -> Self {
        ServerMessage::View { view: view.into() }
    }
}
