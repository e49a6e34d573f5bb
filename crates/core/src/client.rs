//! Task client
//!
//! Wires the session monitor, the mode resolver and the task store together
//! and exposes the operations a front end calls.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::local::{FileExpiringStore, FileGuestFlag};
use crate::mode::{Mode, ModeResolver};
use crate::session::SessionMonitor;
use crate::store::{GuestStorage, TaskStore};
use crate::task::{
    NewTask, RemoteTaskCollection, RestTaskCollection, Task, TaskPatch, TaskPriority,
};
use crate::view::{SortKey, TaskFilter};
use crate::Result;

/// Stand-in remote used when no endpoint is configured
struct UnconfiguredRemote;

impl UnconfiguredRemote {
    fn error() -> Error {
        Error::BackingStore("no remote collection configured (set TASKY_REMOTE_URL)".into())
    }
}

#[async_trait]
impl RemoteTaskCollection for UnconfiguredRemote {
    async fn list(&self, _owner_id: &str) -> Result<Vec<Task>> {
        Err(Self::error())
    }

    async fn insert(&self, _owner_id: &str, _task: &NewTask) -> Result<Task> {
        Err(Self::error())
    }

    async fn update(&self, _id: &str, _owner_id: &str, _patch: &TaskPatch) -> Result<()> {
        Err(Self::error())
    }

    async fn delete(&self, _id: &str, _owner_id: &str) -> Result<()> {
        Err(Self::error())
    }
}

pub struct TaskClient {
    session: Arc<dyn SessionMonitor>,
    resolver: ModeResolver,
    store: TaskStore,
    /// Held from resolving a transition until the store has applied it
    transition: Mutex<()>,
}

impl TaskClient {
    pub fn new(session: Arc<dyn SessionMonitor>, resolver: ModeResolver, store: TaskStore) -> Self {
        Self {
            session,
            resolver,
            store,
            transition: Mutex::new(()),
        }
    }

    /// Build a client persisting guest state under the configured data directory.
    pub fn from_config(config: &ClientConfig, session: Arc<dyn SessionMonitor>) -> Self {
        let remote: Arc<dyn RemoteTaskCollection> = match &config.remote {
            Some(remote) => Arc::new(RestTaskCollection::new(remote.clone())),
            None => Arc::new(UnconfiguredRemote),
        };
        let local = Arc::new(FileExpiringStore::new(config.local_store_path()));
        let flag = Arc::new(FileGuestFlag::new(config.guest_flag_path()));

        let resolver = ModeResolver::new(flag, local.clone(), config.guest_key.clone());
        let store = TaskStore::new(
            remote,
            local,
            GuestStorage {
                key: config.guest_key.clone(),
                ttl_days: config.guest_ttl_days,
            },
        );
        Self::new(session, resolver, store)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn mode(&self) -> Mode {
        self.resolver.current()
    }

    /// Resolve the initial mode from the session monitor and load tasks.
    pub async fn start(&self) -> Result<Mode> {
        self.sync_session().await
    }

    /// Re-read the identity from the session monitor.
    pub async fn sync_session(&self) -> Result<Mode> {
        let _guard = self.transition.lock().await;
        let transition = self.resolver.evaluate(self.session.current())?;
        self.enter(transition).await
    }

    pub async fn continue_as_guest(&self) -> Result<Mode> {
        let _guard = self.transition.lock().await;
        let transition = self.resolver.continue_as_guest()?;
        self.enter(transition).await
    }

    pub async fn back_to_login(&self) -> Result<Mode> {
        let _guard = self.transition.lock().await;
        let transition = self.resolver.back_to_login()?;
        let mode = self.enter(transition).await?;
        self.store.set_status("Back to login page").await;
        Ok(mode)
    }

    pub async fn sign_out(&self) -> Result<Mode> {
        let _guard = self.transition.lock().await;
        self.session.sign_out().await?;
        let transition = self.resolver.sign_out()?;
        let mode = self.enter(transition).await?;
        self.store.set_status("Signed out successfully").await;
        Ok(mode)
    }

    async fn enter(&self, transition: Option<Mode>) -> Result<Mode> {
        match transition {
            Some(mode) => {
                self.store.on_mode_change(mode.clone()).await?;
                Ok(mode)
            }
            None => Ok(self.resolver.current()),
        }
    }

    /// Follow session changes in the background until the monitor goes away.
    pub fn watch(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.session.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                debug!("Session changed, re-resolving mode");
                match self.sync_session().await {
                    Ok(mode) => debug!("Mode after session change: {}", mode),
                    Err(e) if e.is_recovered() => warn!("Recovered while switching mode: {}", e),
                    Err(e) => warn!("Failed to apply session change: {}", e),
                }
            }
            info!("Session monitor closed, stopping watcher");
        })
    }

    pub async fn add(&self, text: &str, priority: TaskPriority) -> Result<Task> {
        self.store.add(text, priority).await
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        self.store.update(id, patch).await
    }

    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<Task> {
        self.store.update(id, TaskPatch::new().completed(completed)).await
    }

    pub async fn delete(&self, id: &str) -> Result<Task> {
        self.store.delete(id).await
    }

    pub async fn view(&self, filter: TaskFilter, sort: SortKey) -> Vec<Task> {
        self.store.view(filter, sort).await
    }

    pub async fn status(&self) -> String {
        self.store.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{ExpiringStore, GuestFlag, MemoryExpiringStore, MemoryGuestFlag};
    use crate::session::{Identity, WatchSession};
    use crate::testing::{settle, FakeRemote};
    use tempfile::TempDir;

    const KEY: &str = "guestTodos";

    struct Fixture {
        client: Arc<TaskClient>,
        session: Arc<WatchSession>,
        remote: Arc<FakeRemote>,
        flag: Arc<MemoryGuestFlag>,
        local: Arc<MemoryExpiringStore>,
    }

    fn fixture(identity: Option<Identity>, guest_flag: bool) -> Fixture {
        let session = Arc::new(WatchSession::new(identity));
        let remote = Arc::new(FakeRemote::new());
        let flag = Arc::new(MemoryGuestFlag::new(guest_flag));
        let local = Arc::new(MemoryExpiringStore::new());

        let resolver = ModeResolver::new(flag.clone(), local.clone(), KEY);
        let store = TaskStore::new(
            remote.clone(),
            local.clone(),
            GuestStorage {
                key: KEY.to_string(),
                ttl_days: 7,
            },
        );
        let client = Arc::new(TaskClient::new(session.clone(), resolver, store));
        Fixture {
            client,
            session,
            remote,
            flag,
            local,
        }
    }

    #[tokio::test]
    async fn test_start_anonymous() {
        let fx = fixture(None, false);
        assert_eq!(fx.client.start().await.unwrap(), Mode::Anonymous);
        assert_eq!(
            fx.client.status().await,
            "Please log in or continue as Guest"
        );
    }

    #[tokio::test]
    async fn test_start_restores_guest_session() {
        let fx = fixture(None, true);
        fx.local
            .write(KEY, r#"[{"id": 1700000000000, "text": "Saved"}]"#, 7)
            .unwrap();

        assert_eq!(fx.client.start().await.unwrap(), Mode::Guest);
        let tasks = fx.client.store().tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "1700000000000");
        assert_eq!(fx.client.status().await, "Guest Mode");
    }

    #[tokio::test]
    async fn test_guest_then_sign_in_does_not_merge() {
        let fx = fixture(None, false);
        fx.client.start().await.unwrap();
        fx.client.continue_as_guest().await.unwrap();

        fx.client.add("Buy milk", TaskPriority::Medium).await.unwrap();
        let tasks = fx.client.store().tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "Buy milk");
        assert_eq!(tasks[0].priority, TaskPriority::Medium);
        assert!(!tasks[0].completed);

        fx.session
            .sign_in(Identity::new("alice").with_email("alice@example.com"));
        let mode = fx.client.sync_session().await.unwrap();

        assert!(matches!(mode, Mode::Authenticated(_)));
        assert!(fx.client.store().tasks().await.is_empty());
        assert!(fx.remote.tasks("alice").is_empty());
        assert!(!fx.flag.is_set().unwrap());
        assert!(fx.local.read(KEY).unwrap().is_none());
        assert_eq!(fx.client.status().await, "Logged in as alice@example.com");
    }

    #[tokio::test]
    async fn test_sign_out_clears_collection_and_stale_flag() {
        let fx = fixture(Some(Identity::new("alice")), false);
        fx.remote
            .seed("alice", vec![Task::new("Remote").with_owner("alice")]);
        fx.client.start().await.unwrap();
        assert_eq!(fx.client.store().tasks().await.len(), 1);

        fx.flag.set().unwrap();
        let mode = fx.client.sign_out().await.unwrap();

        assert_eq!(mode, Mode::Anonymous);
        assert!(fx.client.store().tasks().await.is_empty());
        assert!(!fx.flag.is_set().unwrap());
        assert!(fx.session.current().is_none());
        assert_eq!(fx.client.status().await, "Signed out successfully");
    }

    #[tokio::test]
    async fn test_back_to_login_drops_guest_data() {
        let fx = fixture(None, false);
        fx.client.start().await.unwrap();
        fx.client.continue_as_guest().await.unwrap();
        fx.client.add("Temporary", TaskPriority::Low).await.unwrap();

        assert_eq!(fx.client.back_to_login().await.unwrap(), Mode::Anonymous);
        assert!(fx.client.store().tasks().await.is_empty());
        assert!(fx.local.read(KEY).unwrap().is_none());
        assert_eq!(fx.client.status().await, "Back to login page");

        fx.client.continue_as_guest().await.unwrap();
        assert!(fx.client.store().tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_sync_does_not_reload() {
        let fx = fixture(Some(Identity::new("alice")), false);
        fx.client.start().await.unwrap();
        fx.client.sync_session().await.unwrap();
        fx.client.sync_session().await.unwrap();

        assert_eq!(fx.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_follows_session() {
        let fx = fixture(None, false);
        fx.client.start().await.unwrap();
        fx.remote
            .seed("bob", vec![Task::new("Bob's").with_owner("bob")]);

        let handle = Arc::clone(&fx.client).watch();
        fx.session.sign_in(Identity::new("bob"));

        settle(|| {
            let client = Arc::clone(&fx.client);
            async move { client.store().tasks().await.len() == 1 }
        })
        .await;
        assert!(matches!(fx.client.mode(), Mode::Authenticated(_)));

        handle.abort();
    }

    #[tokio::test]
    async fn test_sign_out_during_watched_sign_in_leaves_store_anonymous() {
        let fx = fixture(None, false);
        fx.client.start().await.unwrap();
        fx.remote
            .seed("bob", vec![Task::new("Bob's").with_owner("bob")]);

        let gate = fx.remote.hold().await;
        let handle = Arc::clone(&fx.client).watch();
        fx.session.sign_in(Identity::new("bob"));
        settle(|| {
            let client = Arc::clone(&fx.client);
            async move { matches!(client.mode(), Mode::Authenticated(_)) }
        })
        .await;

        let client = Arc::clone(&fx.client);
        let signing_out = tokio::spawn(async move { client.sign_out().await });
        drop(gate);
        let mode = signing_out.await.unwrap().unwrap();

        settle(|| {
            let client = Arc::clone(&fx.client);
            async move { client.store().mode().await == client.mode() }
        })
        .await;
        assert_eq!(mode, Mode::Anonymous);
        assert_eq!(fx.client.mode(), Mode::Anonymous);
        assert_eq!(fx.client.store().mode().await, Mode::Anonymous);
        assert!(fx.client.store().tasks().await.is_empty());
        assert_eq!(fx.client.status().await, "Signed out successfully");

        handle.abort();
    }

    #[tokio::test]
    async fn test_from_config_uses_data_dir() {
        let temp = TempDir::new().unwrap();
        let config = ClientConfig {
            data_dir: temp.path().to_path_buf(),
            ..ClientConfig::default()
        };
        let session = Arc::new(WatchSession::default());

        let client = TaskClient::from_config(&config, session.clone());
        client.start().await.unwrap();
        client.continue_as_guest().await.unwrap();
        client.add("On disk", TaskPriority::High).await.unwrap();

        let reopened = TaskClient::from_config(&config, session.clone());
        assert_eq!(reopened.start().await.unwrap(), Mode::Guest);
        assert_eq!(reopened.store().tasks().await[0].text, "On disk");

        session.sign_in(Identity::new("carol"));
        let result = reopened.sync_session().await;
        assert!(matches!(result, Err(Error::BackingStore(_))));
        assert!(reopened.store().tasks().await.is_empty());
    }
}
