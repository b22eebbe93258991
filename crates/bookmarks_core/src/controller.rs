//! crates/bookmarks_core/src/controller.rs
//!
//! The single owner of one page's `AppState`.
//!
//! The host feeds it events one at a time (`dispatch`) and waits on
//! `next_event` for completions and session pushes. Remote calls run as
//! spawned tasks that only report back through a channel, so state is only
//! ever touched by whoever holds the controller.

use crate::app::{AppState, Effect, Event};
use crate::ports::Clipboard;
use crate::session::{SessionSubscription, SessionTracker};
use crate::store::BookmarkClient;
use crate::view::{project, View};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Controller {
    state: AppState,
    tracker: SessionTracker,
    client: BookmarkClient,
    clipboard: Arc<dyn Clipboard>,
    favicon_service: String,
    subscription: Option<SessionSubscription>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions_rx: mpsc::UnboundedReceiver<Event>,
    /// Cancels in-flight reads on teardown. Writes always run to completion.
    teardown: CancellationToken,
}

impl Controller {
    pub fn new(
        tracker: SessionTracker,
        client: BookmarkClient,
        clipboard: Arc<dyn Clipboard>,
        favicon_service: impl Into<String>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            state: AppState::default(),
            tracker,
            client,
            clipboard,
            favicon_service: favicon_service.into(),
            subscription: None,
            completions_tx,
            completions_rx,
            teardown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> View {
        project(&self.state, &self.favicon_service)
    }

    /// Registers for session pushes, then starts the one-time restore.
    pub fn mount(&mut self) {
        self.subscription = Some(self.tracker.subscribe());
        self.dispatch(Event::Mounted);
    }

    /// Applies one event and starts whatever remote work it asks for.
    pub fn dispatch(&mut self, event: impl Into<Event>) {
        let effects = self.state.apply(event.into());
        for effect in effects {
            self.run(effect);
        }
    }

    /// Waits for the next completed remote call or session push.
    ///
    /// Cancel-safe: nothing is lost if the future is dropped before it resolves.
    pub async fn next_event(&mut self) -> Event {
        let completions = &mut self.completions_rx;
        let subscription = &mut self.subscription;
        tokio::select! {
            Some(event) = completions.recv() => event,
            identity = async {
                match subscription.as_mut() {
                    Some(sub) => sub.changed().await,
                    None => futures::future::pending().await,
                }
            } => Event::SessionChanged(identity),
        }
    }

    /// `next_event` followed by `dispatch`.
    pub async fn step(&mut self) {
        let event = self.next_event().await;
        self.dispatch(event);
    }

    /// Unsubscribes from the provider and abandons pending reads.
    pub fn unmount(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        self.teardown.cancel();
    }

    fn run(&self, effect: Effect) {
        debug!("Running effect {:?}", effect);
        match effect {
            Effect::Restore => {
                let tracker = self.tracker.clone();
                self.spawn_read(async move { Event::SessionRestored(tracker.restore().await) });
            }
            Effect::List { owner, epoch } => {
                let client = self.client.clone();
                self.spawn_read(async move {
                    Event::Listed {
                        epoch,
                        result: client.list(&owner).await,
                    }
                });
            }
            Effect::Create {
                owner,
                epoch,
                title,
                url,
            } => {
                let client = self.client.clone();
                self.spawn_write(async move {
                    Event::Created {
                        epoch,
                        result: client.create(&owner, &title, &url).await,
                    }
                });
            }
            Effect::Update {
                owner,
                epoch,
                id,
                title,
                url,
            } => {
                let client = self.client.clone();
                self.spawn_write(async move {
                    let result = client.update(&owner, id, &title, &url).await;
                    Event::Updated {
                        epoch,
                        id,
                        title,
                        url,
                        result,
                    }
                });
            }
            Effect::Delete { owner, epoch, id } => {
                let client = self.client.clone();
                self.spawn_write(async move {
                    Event::Deleted {
                        epoch,
                        id,
                        result: client.delete(&owner, id).await,
                    }
                });
            }
            Effect::Copy { text } => self.clipboard.write_text(&text),
            Effect::SignOut => {
                let tracker = self.tracker.clone();
                self.spawn_write(async move {
                    Event::SignedOut {
                        result: tracker.sign_out().await,
                    }
                });
            }
        }
    }

    fn spawn_read<F>(&self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        let teardown = self.teardown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = teardown.cancelled() => {}
                event = work => {
                    let _ = tx.send(event);
                }
            }
        });
    }

    fn spawn_write<F>(&self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            // The receiver may be gone after unmount; the write still lands.
            let _ = tx.send(work.await);
        });
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Action;
    use crate::domain::{Bookmark, Identity, NoticeLevel};
    use crate::ports::{BookmarkStore, PortError, PortResult, SessionChanges, SessionProvider};
    use crate::store::RetryPolicy;
    use crate::view::RowMode;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use futures::channel::mpsc as push;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    const FAVICONS: &str = "https://www.google.com/s2/favicons";

    /// In-memory collection, scoped per owner like the real table.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Bookmark>>,
        fail_writes: AtomicBool,
        calls: AtomicUsize,
    }

    impl MemoryStore {
        fn seeded(rows: Vec<Bookmark>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        fn check(&self) -> PortResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("connection reset".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BookmarkStore for MemoryStore {
        async fn list_bookmarks(&self, owner: Uuid) -> PortResult<Vec<Bookmark>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.user_id == owner)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        }

        async fn create_bookmark(&self, owner: Uuid, title: &str, url: &str) -> PortResult<Bookmark> {
            self.check()?;
            let row = Bookmark {
                id: Uuid::new_v4(),
                user_id: owner,
                title: title.to_string(),
                url: url.to_string(),
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn update_bookmark(&self, owner: Uuid, id: Uuid, title: &str, url: &str) -> PortResult<()> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|b| b.id == id && b.user_id == owner)
                .ok_or_else(|| PortError::NotFound(id.to_string()))?;
            row.title = title.to_string();
            row.url = url.to_string();
            Ok(())
        }

        async fn delete_bookmark(&self, owner: Uuid, id: Uuid) -> PortResult<()> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|b| !(b.id == id && b.user_id == owner));
            if rows.len() == before {
                return Err(PortError::NotFound(id.to_string()));
            }
            Ok(())
        }
    }

    struct FakeProvider {
        current: Mutex<PortResult<Option<Identity>>>,
        changes: Mutex<Option<push::UnboundedReceiver<Option<Identity>>>>,
        signed_out: AtomicBool,
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn current_identity(&self) -> PortResult<Option<Identity>> {
            match &*self.current.lock().unwrap() {
                Ok(identity) => Ok(identity.clone()),
                Err(e) => Err(PortError::Unexpected(e.to_string())),
            }
        }

        fn subscribe(&self) -> SessionChanges {
            match self.changes.lock().unwrap().take() {
                Some(rx) => Box::pin(rx),
                None => Box::pin(futures::stream::empty()),
            }
        }

        async fn sign_out(&self) -> PortResult<()> {
            self.signed_out.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingClipboard {
        copied: Mutex<Vec<String>>,
    }

    impl Clipboard for RecordingClipboard {
        fn write_text(&self, text: &str) {
            self.copied.lock().unwrap().push(text.to_string());
        }
    }

    struct Harness {
        controller: Controller,
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        clipboard: Arc<RecordingClipboard>,
        push: push::UnboundedSender<Option<Identity>>,
    }

    fn ada() -> Identity {
        Identity {
            user_id: Uuid::from_u128(7),
            email: Some("ada@example.com".into()),
        }
    }

    fn seed() -> Vec<Bookmark> {
        vec![
            Bookmark {
                id: Uuid::from_u128(2),
                user_id: ada().user_id,
                title: "Blog".into(),
                url: "https://blog.example.com".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            Bookmark {
                id: Uuid::from_u128(1),
                user_id: ada().user_id,
                title: "Docs".into(),
                url: "https://docs.example.com".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            },
            Bookmark {
                id: Uuid::from_u128(3),
                user_id: Uuid::from_u128(8),
                title: "Someone else's".into(),
                url: "https://private.example.com".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            },
        ]
    }

    fn harness(current: PortResult<Option<Identity>>) -> Harness {
        let (tx, rx) = push::unbounded();
        let store = Arc::new(MemoryStore::seeded(seed()));
        let provider = Arc::new(FakeProvider {
            current: Mutex::new(current),
            changes: Mutex::new(Some(rx)),
            signed_out: AtomicBool::new(false),
        });
        let clipboard = Arc::new(RecordingClipboard::default());
        let controller = Controller::new(
            SessionTracker::new(provider.clone()),
            BookmarkClient::new(store.clone(), RetryPolicy::none()),
            clipboard.clone(),
            FAVICONS,
        );
        Harness {
            controller,
            store,
            provider,
            clipboard,
            push: tx,
        }
    }

    async fn step(controller: &mut Controller) {
        tokio::time::timeout(Duration::from_secs(1), controller.step())
            .await
            .expect("controller produced no event");
    }

    async fn quiet(controller: &mut Controller) -> bool {
        tokio::time::timeout(Duration::from_millis(50), controller.next_event())
            .await
            .is_err()
    }

    /// Mounted, restored as `ada`, list applied.
    async fn signed_in() -> Harness {
        let mut h = harness(Ok(Some(ada())));
        h.controller.mount();
        step(&mut h.controller).await; // restore
        step(&mut h.controller).await; // list
        h
    }

    fn titles(controller: &Controller) -> Vec<String> {
        controller.state().bookmarks.iter().map(|b| b.title.clone()).collect()
    }

    #[tokio::test]
    async fn mount_restores_then_lists_newest_first() {
        let mut h = harness(Ok(Some(ada())));
        h.controller.mount();
        assert_eq!(h.controller.view(), View::Loading);

        step(&mut h.controller).await;
        step(&mut h.controller).await;

        assert_eq!(titles(&h.controller), vec!["Docs", "Blog"]);
    }

    #[tokio::test]
    async fn search_projects_matching_titles() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::SetSearchTerm("doc".into()));

        let View::Bookmarks(list) = h.controller.view() else {
            panic!("expected the bookmark list");
        };
        assert_eq!(list.rows.len(), 1);
        assert_eq!(list.rows[0].id, Uuid::from_u128(1));
        assert_eq!(list.rows[0].url, "https://docs.example.com");
    }

    #[tokio::test]
    async fn failing_restore_shows_the_login_screen() {
        let mut h = harness(Err(PortError::Unexpected("dns".into())));
        h.controller.mount();
        step(&mut h.controller).await;

        assert!(matches!(h.controller.view(), View::SignedOut { .. }));
        assert!(!h.controller.state().session.loading);
    }

    #[tokio::test]
    async fn add_persists_trimmed_values_and_prepends() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::SetAddTitle("  My Site  ".into()));
        h.controller.dispatch(Action::SetAddUrl("  https://example.com  ".into()));
        h.controller.dispatch(Action::AddBookmark);
        step(&mut h.controller).await;

        let state = h.controller.state();
        assert_eq!(state.bookmarks.len(), 3);
        assert_eq!(state.bookmarks[0].title, "My Site");
        assert_eq!(state.bookmarks[0].url, "https://example.com");
        assert!(state.add_form.title.is_empty());
        assert!(h
            .store
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.title == "My Site" && b.url == "https://example.com"));
    }

    #[tokio::test]
    async fn blank_add_never_calls_the_store() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::SetAddTitle("Docs".into()));
        h.controller.dispatch(Action::SetAddUrl("   ".into()));
        h.controller.dispatch(Action::AddBookmark);

        assert!(quiet(&mut h.controller).await);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.state().bookmarks.len(), 2);
    }

    #[tokio::test]
    async fn failed_write_surfaces_a_notice_and_keeps_local_state() {
        let mut h = signed_in().await;
        h.store.fail_writes.store(true, Ordering::SeqCst);

        h.controller.dispatch(Action::RequestDelete(Uuid::from_u128(1)));
        h.controller.dispatch(Action::ConfirmDelete(true));
        step(&mut h.controller).await;

        let state = h.controller.state();
        assert_eq!(state.bookmarks.len(), 2);
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn confirmed_delete_removes_remotely_and_locally() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::RequestDelete(Uuid::from_u128(1)));
        h.controller.dispatch(Action::ConfirmDelete(true));
        step(&mut h.controller).await;

        assert_eq!(titles(&h.controller), vec!["Blog"]);
        assert!(h.store.rows.lock().unwrap().iter().all(|b| b.id != Uuid::from_u128(1)));
    }

    #[tokio::test]
    async fn declined_delete_touches_nothing() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::RequestDelete(Uuid::from_u128(1)));
        h.controller.dispatch(Action::ConfirmDelete(false));

        assert!(quiet(&mut h.controller).await);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.state().bookmarks.len(), 2);
    }

    #[tokio::test]
    async fn edit_and_save_round_trip() {
        let mut h = signed_in().await;
        let id = Uuid::from_u128(2);
        h.controller.dispatch(Action::BeginEdit(id));
        h.controller.dispatch(Action::SetDraftTitle("Journal".into()));

        let View::Bookmarks(list) = h.controller.view() else {
            panic!("expected the bookmark list");
        };
        assert!(matches!(list.rows[1].mode, RowMode::Editing { .. }));

        h.controller.dispatch(Action::SaveEdit);
        step(&mut h.controller).await;

        assert_eq!(titles(&h.controller), vec!["Docs", "Journal"]);
        assert_eq!(h.controller.state().draft, None);
    }

    #[tokio::test]
    async fn push_sign_out_purges_local_records() {
        let mut h = signed_in().await;
        h.push.unbounded_send(None).unwrap();
        step(&mut h.controller).await;

        assert!(h.controller.state().bookmarks.is_empty());
        assert!(matches!(h.controller.view(), View::SignedOut { .. }));
    }

    #[tokio::test]
    async fn sign_out_action_goes_through_the_provider() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::SignOut);
        step(&mut h.controller).await;

        assert!(h.provider.signed_out.load(Ordering::SeqCst));
        assert!(h.controller.state().bookmarks.is_empty());
    }

    #[tokio::test]
    async fn copy_writes_to_the_clipboard() {
        let mut h = signed_in().await;
        h.controller.dispatch(Action::CopyUrl(Uuid::from_u128(1)));

        assert_eq!(
            *h.clipboard.copied.lock().unwrap(),
            vec!["https://docs.example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn unmount_stops_listening_for_pushes() {
        let mut h = signed_in().await;
        h.controller.unmount();

        assert!(h.push.unbounded_send(None).is_err());
        assert!(quiet(&mut h.controller).await);
    }
}
