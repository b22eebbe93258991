//! services/api/src/adapters/session.rs
//!
//! The identity provider as seen by one WebSocket connection. It implements the
//! `SessionProvider` port on top of the auth-session table and a process-wide
//! broadcast hub that announces refreshed and ended sessions.

use async_stream::stream;
use async_trait::async_trait;
use bookmarks_core::domain::{AuthSession, Identity};
use bookmarks_core::ports::{AuthStore, PortError, PortResult, SessionChanges, SessionProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Something that happened to an auth session, anywhere in the process.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// The session's expiry was pushed forward.
    Refreshed(AuthSession),
    /// The session was logged out or revoked.
    Ended { session_id: String },
}

/// Fan-out of auth events to every connected page.
#[derive(Clone)]
pub struct SessionHub {
    tx: broadcast::Sender<AuthEvent>,
}

impl SessionHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: AuthEvent) {
        // No connected pages is not an error.
        let _ = self.tx.send(event);
    }

    pub fn listen(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// A `SessionProvider` bound to the session cookie presented at connect time.
pub struct CookieSessionProvider {
    store: Arc<dyn AuthStore>,
    hub: SessionHub,
    session_id: Option<String>,
}

impl CookieSessionProvider {
    pub fn new(store: Arc<dyn AuthStore>, hub: SessionHub, session_id: Option<String>) -> Self {
        Self {
            store,
            hub,
            session_id,
        }
    }
}

enum Wake {
    Hub(Result<AuthEvent, RecvError>),
    Expired,
}

fn until(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl SessionProvider for CookieSessionProvider {
    async fn current_identity(&self) -> PortResult<Option<Identity>> {
        let Some(session_id) = self.session_id.as_deref() else {
            return Ok(None);
        };
        match self.store.get_auth_session(session_id).await {
            Ok(session) => Ok(Some(session.identity())),
            Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> SessionChanges {
        let Some(session_id) = self.session_id.clone() else {
            return Box::pin(futures::stream::empty());
        };
        // Listen before the first lookup so nothing published in between is missed.
        let mut events = self.hub.listen();
        let store = self.store.clone();

        Box::pin(stream! {
            // `None` when the expiry could not be read; no timer runs then.
            let mut expires_at = match store.get_auth_session(&session_id).await {
                Ok(session) => Some(session.expires_at),
                Err(PortError::Unauthorized) => {
                    yield None;
                    return;
                }
                Err(e) => {
                    warn!("Could not read session expiry: {}", e);
                    None
                }
            };

            loop {
                let expiry = async move {
                    match expires_at {
                        Some(at) => tokio::time::sleep(until(at)).await,
                        None => futures::future::pending().await,
                    }
                };
                let wake = tokio::select! {
                    received = events.recv() => Wake::Hub(received),
                    _ = expiry => Wake::Expired,
                };

                match wake {
                    Wake::Hub(Ok(AuthEvent::Refreshed(session))) if session.id == session_id => {
                        expires_at = Some(session.expires_at);
                        yield Some(session.identity());
                    }
                    Wake::Hub(Ok(AuthEvent::Ended { session_id: ended })) if ended == session_id => {
                        debug!("Auth session ended; notifying page.");
                        yield None;
                        return;
                    }
                    Wake::Hub(Ok(_)) => {}
                    Wake::Hub(Err(RecvError::Lagged(skipped))) => {
                        warn!("Session hub lagged by {} events; revalidating.", skipped);
                        match store.get_auth_session(&session_id).await {
                            Ok(session) => expires_at = Some(session.expires_at),
                            Err(PortError::Unauthorized) => {
                                yield None;
                                return;
                            }
                            Err(e) => warn!("Revalidation failed: {}", e),
                        }
                    }
                    Wake::Hub(Err(RecvError::Closed)) => return,
                    Wake::Expired => {
                        debug!("Auth session expired; notifying page.");
                        yield None;
                        return;
                    }
                }
            }
        })
    }

    async fn sign_out(&self) -> PortResult<()> {
        let Some(session_id) = self.session_id.as_deref() else {
            return Ok(());
        };
        self.store.delete_auth_session(session_id).await?;
        self.hub.publish(AuthEvent::Ended {
            session_id: session_id.to_string(),
        });
        Ok(())
    }
}
