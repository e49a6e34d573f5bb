//! Session identity
//!
//! The authentication provider itself lives outside this crate. It is seen
//! only through [`SessionMonitor`], which reports who is signed in and
//! notifies on every change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::Result;

/// The authenticated principal that scopes all remote records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Email when known, owner id otherwise
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.owner_id)
    }
}

#[async_trait]
pub trait SessionMonitor: Send + Sync {
    /// The identity signed in right now
    fn current(&self) -> Option<Identity>;

    /// Receiver notified on every identity change
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// End the provider session
    async fn sign_out(&self) -> Result<()>;
}

/// Session monitor backed by a watch channel
#[derive(Debug)]
pub struct WatchSession {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for WatchSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WatchSession {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the identity; subscribers are only woken on an actual change.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.tx.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            *current = identity;
            true
        });
    }

    pub fn sign_in(&self, identity: Identity) {
        self.set_identity(Some(identity));
    }
}

#[async_trait]
impl SessionMonitor for WatchSession {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_identity(None);
        Ok(())
    }
}
