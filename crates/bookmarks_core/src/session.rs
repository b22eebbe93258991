//! crates/bookmarks_core/src/session.rs
//!
//! The session tracker: restores an existing session once at startup and relays
//! push notifications from the identity provider. It never owns bookmark state;
//! it only signals identity transitions to whoever does.

use crate::domain::Identity;
use crate::ports::{PortResult, SessionChanges, SessionProvider};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SessionTracker {
    provider: Arc<dyn SessionProvider>,
}

impl SessionTracker {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Queries the provider for an existing session.
    ///
    /// A failed lookup is reported as "no session": the user lands on the login
    /// screen and nothing destructive follows from it.
    pub async fn restore(&self) -> Option<Identity> {
        match self.provider.current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Session restore failed, continuing signed out: {}", e);
                None
            }
        }
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            changes: Some(self.provider.subscribe()),
        }
    }

    pub async fn sign_out(&self) -> PortResult<()> {
        self.provider.sign_out().await
    }
}

/// A live registration with the provider. Dropping it unsubscribes.
pub struct SessionSubscription {
    changes: Option<SessionChanges>,
}

impl SessionSubscription {
    /// Waits for the next identity transition.
    ///
    /// Once the provider closes the stream, or after `unsubscribe`, this never
    /// resolves, so it can sit in a `select!` without spinning.
    pub async fn changed(&mut self) -> Option<Identity> {
        if let Some(changes) = self.changes.as_mut() {
            if let Some(identity) = changes.next().await {
                return identity;
            }
            debug!("Session change stream closed by provider.");
            self.changes = None;
        }
        futures::future::pending().await
    }

    pub fn unsubscribe(&mut self) {
        self.changes = None;
    }

    pub fn is_active(&self) -> bool {
        self.changes.is_some()
    }
}
