pub mod app;
pub mod controller;
pub mod domain;
pub mod ports;
pub mod session;
pub mod store;
pub mod view;

pub use app::{Action, AppState, Effect, Event};
pub use controller::Controller;
pub use domain::{
    AddForm, AuthSession, Bookmark, EditDraft, Identity, LocalSession, Notice, NoticeLevel,
    UserCredentials,
};
pub use ports::{
    AuthStore, BookmarkStore, Clipboard, PortError, PortResult, SessionChanges, SessionProvider,
};
pub use session::{SessionSubscription, SessionTracker};
pub use store::{validate_fields, BookmarkClient, RetryPolicy};
pub use view::{project, visible, BookmarkList, BookmarkRow, RowMode, View};
