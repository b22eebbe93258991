//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//!
//! One connection is one mounted page. It owns a `Controller` for its whole
//! lifetime, feeds it the page's messages and the controller's own completions,
//! and pushes the projected screen back whenever it changes.

use crate::{
    adapters::{ChannelClipboard, CookieSessionProvider},
    web::{
        auth::session_id_from_headers,
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bookmarks_core::{Action, BookmarkClient, Controller, Event, SessionTracker, View};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
///
/// The route is public: a page without a valid session cookie still connects
/// and is shown the signed-out screen. Browsers from any other origin are
/// refused, since the session cookie would ride along with their upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&headers, &app_state.config.allowed_origin) {
        warn!("Refusing WebSocket upgrade from a foreign origin.");
        return StatusCode::FORBIDDEN.into_response();
    }
    let session_id = session_id_from_headers(&headers).map(str::to_string);
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, session_id))
}

/// A missing `Origin` (non-browser client) is accepted; a present one must match.
pub fn origin_allowed(headers: &HeaderMap, allowed: &str) -> bool {
    match headers.get(header::ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .is_ok_and(|o| o.trim_end_matches('/') == allowed.trim_end_matches('/')),
    }
}

/// Whatever woke the connection loop.
enum Wake {
    Client(Option<Result<Message, axum::Error>>),
    Completion(Event),
    Copy(String),
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, session_id: Option<String>) {
    info!("New WebSocket connection established.");
    let (sender, receiver) = socket.split();

    let (copy_tx, copy_rx) = mpsc::unbounded_channel();
    let provider = CookieSessionProvider::new(
        app_state.auth.clone(),
        app_state.session_hub.clone(),
        session_id,
    );
    let controller = Controller::new(
        SessionTracker::new(Arc::new(provider)),
        BookmarkClient::new(app_state.bookmarks.clone(), app_state.config.list_retry),
        Arc::new(ChannelClipboard::new(copy_tx)),
        app_state.config.favicon_service_url.clone(),
    );

    run_page(controller, copy_rx, sender, receiver).await;
    info!("WebSocket connection closed.");
}

/// Mounts `controller` and serves the page until the client goes away.
async fn run_page<S, R>(
    mut controller: Controller,
    mut copy_rx: mpsc::UnboundedReceiver<String>,
    mut sender: S,
    mut receiver: R,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    // --- 1. Mount the page ---
    controller.mount();
    let mut shown = controller.view();
    if send(&mut sender, &ServerMessage::from(&shown)).await.is_err() {
        controller.unmount();
        return;
    }

    // --- 2. Main Loop ---
    loop {
        let wake = tokio::select! {
            incoming = receiver.next() => Wake::Client(incoming),
            event = controller.next_event() => Wake::Completion(event),
            Some(text) = copy_rx.recv() => Wake::Copy(text),
        };

        match wake {
            Wake::Client(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(msg) => {
                        debug!("Received {:?}", msg);
                        controller.dispatch(Action::from(msg));
                    }
                    Err(e) => {
                        warn!("Failed to parse client message: {}", e);
                        let reply = ServerMessage::Error {
                            message: format!("Unrecognised message: {}", e),
                        };
                        if send(&mut sender, &reply).await.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }
            Wake::Client(Some(Ok(Message::Close(_)))) => {
                info!("Client sent close message.");
                break;
            }
            Wake::Client(Some(Ok(_))) => continue,
            Wake::Client(Some(Err(e))) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            Wake::Client(None) => {
                info!("Client disconnected.");
                break;
            }
            Wake::Completion(event) => controller.dispatch(event),
            Wake::Copy(text) => {
                if send(&mut sender, &ServerMessage::CopyToClipboard { text }).await.is_err() {
                    break;
                }
            }
        }

        if push_view(&mut sender, controller.view(), &mut shown).await.is_err() {
            break;
        }
    }

    // --- 3. Cleanup ---
    controller.unmount();
}

/// Sends `view` if it differs from the screen last sent.
async fn push_view<S>(sender: &mut S, view: View, shown: &mut View) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    if view == *shown {
        return Ok(());
    }
    send(sender, &ServerMessage::from(&view)).await?;
    *shown = view;
    Ok(())
}

async fn send<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| {
        error!("Failed to serialize server message: {}", e);
    })?;
    sender.send(Message::Text(json.into())).await.map_err(|e| {
        debug!("Failed to send to client: {}", e);
    })
}
