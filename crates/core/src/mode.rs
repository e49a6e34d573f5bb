//! Operating mode resolution
//!
//! The mode is derived from two inputs only: the identity reported by the
//! session monitor and the persisted guest flag. A present identity always
//! resolves to [`Mode::Authenticated`], whatever the flag says.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::Error;
use crate::local::{ExpiringStore, GuestFlag};
use crate::session::Identity;
use crate::Result;

/// Which backing store is authoritative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Nobody signed in, guest mode off
    Anonymous,
    /// Tasks live in the expiring local store
    Guest,
    /// Tasks live in the remote collection, scoped to this identity
    Authenticated(Identity),
}

impl Mode {
    pub fn resolve(identity: Option<&Identity>, guest_flag: bool) -> Self {
        match identity {
            Some(identity) => Self::Authenticated(identity.clone()),
            None if guest_flag => Self::Guest,
            None => Self::Anonymous,
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated(identity) => Some(&identity.owner_id),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Guest => "guest",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(identity) => write!(f, "authenticated as {}", identity.display_name()),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    identity: Option<Identity>,
    /// `None` until the first evaluation
    current: Option<Mode>,
}

/// Three-state machine over identity and guest flag
///
/// Every method returns `Some(mode)` when the mode changed and `None` when the
/// inputs resolve to the mode already active.
pub struct ModeResolver {
    flag: Arc<dyn GuestFlag>,
    local: Arc<dyn ExpiringStore>,
    guest_key: String,
    state: Mutex<ResolverState>,
}

impl ModeResolver {
    pub fn new(
        flag: Arc<dyn GuestFlag>,
        local: Arc<dyn ExpiringStore>,
        guest_key: impl Into<String>,
    ) -> Self {
        Self {
            flag,
            local,
            guest_key: guest_key.into(),
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// The active mode, `Anonymous` before the first evaluation
    pub fn current(&self) -> Mode {
        self.lock()
            .ok()
            .and_then(|state| state.current.clone())
            .unwrap_or(Mode::Anonymous)
    }

    /// Re-resolve after the session monitor reported `identity`.
    pub fn evaluate(&self, identity: Option<Identity>) -> Result<Option<Mode>> {
        let mut state = self.lock()?;
        state.identity = identity;
        self.settle(&mut state)
    }

    /// Explicit "continue as guest". Ignored while someone is signed in.
    pub fn continue_as_guest(&self) -> Result<Option<Mode>> {
        let mut state = self.lock()?;
        if state.identity.is_some() {
            debug!("Ignoring guest request while signed in");
            return Ok(None);
        }
        self.flag.set()?;
        self.settle(&mut state)
    }

    /// Explicit "back to login": leave guest mode and drop guest data.
    pub fn back_to_login(&self) -> Result<Option<Mode>> {
        let mut state = self.lock()?;
        self.clear_guest_residue()?;
        self.settle(&mut state)
    }

    /// Forget the identity and any guest residue.
    ///
    /// Ending the provider session is the caller's job; this only updates
    /// the resolver's view so the transition does not wait for the monitor.
    pub fn sign_out(&self) -> Result<Option<Mode>> {
        let mut state = self.lock()?;
        state.identity = None;
        self.clear_guest_residue()?;
        self.settle(&mut state)
    }

    fn settle(&self, state: &mut ResolverState) -> Result<Option<Mode>> {
        let next = Mode::resolve(state.identity.as_ref(), self.flag.is_set()?);
        if state.current.as_ref() == Some(&next) {
            return Ok(None);
        }

        if let Mode::Authenticated(_) = next {
            self.clear_guest_residue()?;
        }

        info!(
            "Mode transition: {} -> {}",
            state
                .current
                .as_ref()
                .map_or_else(|| "unresolved".to_string(), ToString::to_string),
            next
        );
        state.current = Some(next.clone());
        Ok(Some(next))
    }

    fn clear_guest_residue(&self) -> Result<()> {
        self.flag.clear()?;
        self.local.delete(&self.guest_key)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ResolverState>> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("mode resolver lock poisoned".into()))
    }
}
