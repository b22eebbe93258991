//! services/api/src/adapters/clipboard.rs
//!
//! The browser clipboard, reached by asking the connected page to copy.

use bookmarks_core::ports::Clipboard;
use tokio::sync::mpsc;
use tracing::warn;

/// Forwards copy requests to the connection's outbound queue.
pub struct ChannelClipboard {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelClipboard {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Clipboard for ChannelClipboard {
    fn write_text(&self, text: &str) {
        if self.tx.send(text.to_string()).is_err() {
            warn!("Clipboard request dropped; connection is closing.");
        }
    }
}
