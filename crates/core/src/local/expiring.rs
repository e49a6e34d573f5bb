//! Key/value storage with a time-to-live
//!
//! Entries are not purged in the background. A read past the expiry simply
//! reports the key as absent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::Error;
use crate::Result;

/// Source of the current time, injectable so expiry can be tested
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Expiring key/value store used as the guest backing store
pub trait ExpiringStore: Send + Sync {
    /// Read a value, `None` if it was never written, deleted, or expired
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Write a value that stays readable for `ttl_days`
    fn write(&self, key: &str, value: &str, ttl_days: u32) -> Result<()>;

    /// Remove a value immediately
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn new(value: &str, ttl_days: u32, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = Duration::try_days(i64::from(ttl_days))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                Error::Storage(format!("TTL of {} days is out of range", ttl_days))
            })?;
        Ok(Self {
            value: value.to_string(),
            expires_at,
        })
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// In-process expiring store
pub struct MemoryExpiringStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Clock,
}

impl Default for MemoryExpiringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExpiringStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("local store lock poisoned".into()))
    }
}

impl ExpiringStore for MemoryExpiringStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let now = (self.clock)();
        Ok(self
            .entries()?
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn write(&self, key: &str, value: &str, ttl_days: u32) -> Result<()> {
        let entry = Entry::new(value, ttl_days, (self.clock)())?;
        self.entries()?.insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Expiring store kept in a single JSON file
///
/// Every write replaces the whole file through a temporary sibling and a
/// rename, so a reader never sees a half-written file.
pub struct FileExpiringStore {
    path: PathBuf,
    clock: Clock,
    lock: Mutex<()>,
}

impl FileExpiringStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, system_clock())
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::Storage("local store lock poisoned".into()))
    }

    fn load(&self) -> Result<HashMap<String, Entry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read local store {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Local store {} is unreadable, starting empty: {}",
                    self.path.display(),
                    e
                );
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, entries: &HashMap<String, Entry>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create directory: {}", e))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to write local store {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        debug!("Saved local store: {}", self.path.display());
        Ok(())
    }
}

impl ExpiringStore for FileExpiringStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard()?;
        let now = (self.clock)();
        Ok(self
            .load()?
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    fn write(&self, key: &str, value: &str, ttl_days: u32) -> Result<()> {
        let _guard = self.guard()?;
        let now = (self.clock)();
        let entry = Entry::new(value, ttl_days, now)?;
        let mut entries = self.load()?;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(key.to_string(), entry);
        self.save(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.guard()?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
