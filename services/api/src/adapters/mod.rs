pub mod clipboard;
pub mod db;
pub mod session;

pub use clipboard::ChannelClipboard;
pub use db::DbAdapter;
pub use session::{AuthEvent, CookieSessionProvider, SessionHub};
