//! crates/bookmarks_core/src/app.rs
//!
//! The application state of one mounted page and its reducer.
//!
//! Every user interaction and every completed remote call is an `Event`.
//! `AppState::apply` folds an event into the state and returns the remote work
//! (`Effect`s) it calls for. The reducer never performs I/O itself, and local
//! records change only after the store has confirmed a write.

use crate::domain::{
    AddForm, Bookmark, EditDraft, Identity, LocalSession, Notice, NoticeLevel,
};
use crate::ports::{PortError, PortResult};
use crate::store::validate_fields;
use tracing::{debug, warn};
use uuid::Uuid;

/// Most notices shown at once.
pub const MAX_NOTICES: usize = 5;

/// Something the user did on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetSearchTerm(String),
    SetAddTitle(String),
    SetAddUrl(String),
    AddBookmark,
    BeginEdit(Uuid),
    SetDraftTitle(String),
    SetDraftUrl(String),
    SaveEdit,
    CancelEdit,
    RequestDelete(Uuid),
    ConfirmDelete(bool),
    CopyUrl(Uuid),
    SignOut,
    DismissNotice(u64),
}

#[derive(Debug)]
pub enum Event {
    /// The page was mounted; triggers the one-time session restore.
    Mounted,
    Action(Action),
    SessionRestored(Option<Identity>),
    SessionChanged(Option<Identity>),
    Listed {
        epoch: u64,
        result: PortResult<Vec<Bookmark>>,
    },
    Created {
        epoch: u64,
        result: PortResult<Bookmark>,
    },
    Updated {
        epoch: u64,
        id: Uuid,
        title: String,
        url: String,
        result: PortResult<()>,
    },
    Deleted {
        epoch: u64,
        id: Uuid,
        result: PortResult<()>,
    },
    SignedOut {
        result: PortResult<()>,
    },
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Event::Action(action)
    }
}

/// Remote work requested by the reducer. Mutating effects carry the identity
/// epoch they were issued under so late answers can be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Restore,
    List {
        owner: Identity,
        epoch: u64,
    },
    Create {
        owner: Identity,
        epoch: u64,
        title: String,
        url: String,
    },
    Update {
        owner: Identity,
        epoch: u64,
        id: Uuid,
        title: String,
        url: String,
    },
    Delete {
        owner: Identity,
        epoch: u64,
        id: Uuid,
    },
    Copy {
        text: String,
    },
    SignOut,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub session: LocalSession,
    /// Local cache of the owner's records, newest first.
    pub bookmarks: Vec<Bookmark>,
    pub search_term: String,
    pub add_form: AddForm,
    pub draft: Option<EditDraft>,
    pub pending_delete: Option<Uuid>,
    pub notices: Vec<Notice>,
    /// Bumped whenever the signed-in user changes.
    pub epoch: u64,
    pub(crate) next_notice_id: u64,
    /// A push notification beat the restore call; its answer is then stale.
    pub(crate) restore_superseded: bool,
}

impl AppState {
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Mounted => vec![Effect::Restore],
            Event::Action(action) => self.apply_action(action),
            Event::SessionRestored(identity) => {
                self.session.loading = false;
                if self.restore_superseded {
                    debug!("Ignoring restored session; a newer change already arrived.");
                    return Vec::new();
                }
                self.set_identity(identity)
            }
            Event::SessionChanged(identity) => {
                if self.session.loading {
                    self.restore_superseded = true;
                }
                self.set_identity(identity)
            }
            Event::Listed { epoch, result } => {
                if self.is_stale(epoch, "list") {
                    return Vec::new();
                }
                match result {
                    Ok(bookmarks) => {
                        self.bookmarks = bookmarks;
                        self.forget_missing();
                    }
                    Err(e) => self.fail("Could not load your bookmarks", &e),
                }
                Vec::new()
            }
            Event::Created { epoch, result } => {
                if self.is_stale(epoch, "create") {
                    return Vec::new();
                }
                match result {
                    Ok(bookmark) => {
                        // Keep anything typed while the insert was in flight.
                        let unchanged = validate_fields(&self.add_form.title, &self.add_form.url)
                            .is_some_and(|(title, url)| title == bookmark.title && url == bookmark.url);
                        if unchanged {
                            self.add_form = AddForm::default();
                        }
                        self.bookmarks.retain(|b| b.id != bookmark.id);
                        self.bookmarks.insert(0, bookmark);
                    }
                    Err(e) => self.fail("Could not add the bookmark", &e),
                }
                Vec::new()
            }
            Event::Updated {
                epoch,
                id,
                title,
                url,
                result,
            } => {
                if self.is_stale(epoch, "update") {
                    return Vec::new();
                }
                match result {
                    Ok(()) => {
                        if let Some(b) = self.bookmarks.iter_mut().find(|b| b.id == id) {
                            b.title = title;
                            b.url = url;
                        }
                        if self.draft.as_ref().is_some_and(|d| d.id == id) {
                            self.draft = None;
                        }
                    }
                    Err(PortError::NotFound(_)) => {
                        self.remove_local(id);
                        self.notify(NoticeLevel::Error, "That bookmark no longer exists.".to_string());
                    }
                    Err(e) => self.fail("Could not save your changes", &e),
                }
                Vec::new()
            }
            Event::Deleted { epoch, id, result } => {
                if self.is_stale(epoch, "delete") {
                    return Vec::new();
                }
                match result {
                    // A missing row is as deleted as it gets.
                    Ok(()) | Err(PortError::NotFound(_)) => self.remove_local(id),
                    Err(e) => self.fail("Could not delete the bookmark", &e),
                }
                Vec::new()
            }
            Event::SignedOut { result } => match result {
                Ok(()) => self.set_identity(None),
                Err(e) => {
                    self.fail("Could not sign out", &e);
                    Vec::new()
                }
            },
        }
    }

    fn apply_action(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::SetSearchTerm(term) => self.search_term = term,
            Action::SetAddTitle(title) => self.add_form.title = title,
            Action::SetAddUrl(url) => self.add_form.url = url,
            Action::AddBookmark => {
                let Some(owner) = self.session.identity.clone() else {
                    return Vec::new();
                };
                let Some((title, url)) = validate_fields(&self.add_form.title, &self.add_form.url)
                else {
                    return Vec::new();
                };
                return vec![Effect::Create {
                    owner,
                    epoch: self.epoch,
                    title,
                    url,
                }];
            }
            Action::BeginEdit(id) => {
                // Single draft slot: starting another edit drops the old one unsaved.
                if let Some(draft) = self.find(id).map(EditDraft::from_bookmark) {
                    self.draft = Some(draft);
                }
            }
            Action::SetDraftTitle(title) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.title = title;
                }
            }
            Action::SetDraftUrl(url) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.url = url;
                }
            }
            Action::SaveEdit => {
                let (Some(owner), Some(draft)) = (self.session.identity.clone(), self.draft.as_ref())
                else {
                    return Vec::new();
                };
                let Some((title, url)) = validate_fields(&draft.title, &draft.url) else {
                    return Vec::new();
                };
                return vec![Effect::Update {
                    owner,
                    epoch: self.epoch,
                    id: draft.id,
                    title,
                    url,
                }];
            }
            Action::CancelEdit => self.draft = None,
            Action::RequestDelete(id) => {
                if self.find(id).is_some() {
                    self.pending_delete = Some(id);
                }
            }
            Action::ConfirmDelete(confirmed) => {
                let Some(id) = self.pending_delete.take() else {
                    return Vec::new();
                };
                if !confirmed {
                    return Vec::new();
                }
                if let Some(owner) = self.session.identity.clone() {
                    return vec![Effect::Delete {
                        owner,
                        epoch: self.epoch,
                        id,
                    }];
                }
            }
            Action::CopyUrl(id) => {
                if let Some(text) = self.find(id).map(|b| b.url.clone()) {
                    self.notify(NoticeLevel::Info, "Link copied!".to_string());
                    return vec![Effect::Copy { text }];
                }
            }
            Action::SignOut => {
                if self.session.identity.is_some() {
                    return vec![Effect::SignOut];
                }
            }
            Action::DismissNotice(id) => self.notices.retain(|n| n.id != id),
        }
        Vec::new()
    }

    fn set_identity(&mut self, identity: Option<Identity>) -> Vec<Effect> {
        let previous = self.session.identity.as_ref().map(|i| i.user_id);
        let next = identity.as_ref().map(|i| i.user_id);
        if previous != next {
            self.epoch += 1;
            self.clear_user_data();
            self.add_form = AddForm::default();
            self.notices.clear();
        }
        self.session.identity = identity.clone();

        match identity {
            Some(owner) => vec![Effect::List {
                owner,
                epoch: self.epoch,
            }],
            None => {
                self.clear_user_data();
                Vec::new()
            }
        }
    }

    fn clear_user_data(&mut self) {
        self.bookmarks.clear();
        self.draft = None;
        self.pending_delete = None;
    }

    fn is_stale(&self, epoch: u64, what: &str) -> bool {
        let stale = epoch != self.epoch || self.session.identity.is_none();
        if stale {
            debug!("Dropping stale {} result from epoch {} (now {}).", what, epoch, self.epoch);
        }
        stale
    }

    fn find(&self, id: Uuid) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.id == id)
    }

    fn remove_local(&mut self, id: Uuid) {
        self.bookmarks.retain(|b| b.id != id);
        self.forget_missing();
    }

    /// Drops the draft and delete prompt if their record is gone.
    fn forget_missing(&mut self) {
        if let Some(id) = self.draft.as_ref().map(|d| d.id) {
            if self.find(id).is_none() {
                self.draft = None;
            }
        }
        if let Some(id) = self.pending_delete {
            if self.find(id).is_none() {
                self.pending_delete = None;
            }
        }
    }

    fn fail(&mut self, what: &str, error: &PortError) {
        warn!("{}: {}", what, error);
        self.notify(NoticeLevel::Error, format!("{}. Please try again.", what));
    }

    /// Raises a notice. Repeating a message replaces its older copy, and only
    /// the newest `MAX_NOTICES` are kept.
    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices
            .retain(|n| !(n.level == level && n.message == message));
        if self.notices.len() >= MAX_NOTICES {
            let excess = self.notices.len() + 1 - MAX_NOTICES;
            self.notices.drain(..excess);
        }
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id: self.next_notice_id,
            level,
            message,
        });
    }
}
