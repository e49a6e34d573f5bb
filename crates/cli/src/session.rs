//! File-backed session monitor
//!
//! The real authentication provider is out of scope for the CLI. Signing in
//! records the identity in a small JSON file so later invocations see it.

use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::warn;

use tasky_core::session::{Identity, SessionMonitor, WatchSession};
use tasky_core::Result;

pub struct FileSession {
    path: PathBuf,
    inner: WatchSession,
}

impl FileSession {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let identity = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Identity>(&content) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner: WatchSession::new(identity),
        })
    }

    pub fn sign_in(&self, identity: Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&identity)?)?;
        self.inner.sign_in(identity);
        Ok(())
    }
}

#[async_trait]
impl SessionMonitor for FileSession {
    fn current(&self) -> Option<Identity> {
        self.inner.current()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.inner.sign_out().await
    }
}
