//! Client configuration
//!
//! Read from `TASKY_*` environment variables with defaults for everything.

use std::path::PathBuf;

use crate::error::Error;
use crate::Result;

pub const DEFAULT_DATA_DIR: &str = ".tasky-data";
pub const DEFAULT_TABLE: &str = "todos";
pub const DEFAULT_GUEST_TTL_DAYS: u32 = 7;
pub const MAX_GUEST_TTL_DAYS: u32 = 36_500;
pub const GUEST_TASKS_KEY: &str = "guestTodos";

/// Where the remote record collection lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub data_dir: PathBuf,
    /// `None` leaves the client without a remote; authenticated calls then fail
    pub remote: Option<RemoteConfig>,
    pub guest_ttl_days: u32,
    pub guest_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            remote: None,
            guest_ttl_days: DEFAULT_GUEST_TTL_DAYS,
            guest_key: GUEST_TASKS_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();

        if let Some(dir) = var("TASKY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(raw) = var("TASKY_GUEST_TTL_DAYS") {
            config.guest_ttl_days = raw
                .parse()
                .ok()
                .filter(|days| (1..=MAX_GUEST_TTL_DAYS).contains(days))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "TASKY_GUEST_TTL_DAYS must be a whole number from 1 to {}, got '{}'",
                        MAX_GUEST_TTL_DAYS, raw
                    ))
                })?;
        }

        config.remote = var("TASKY_REMOTE_URL").map(|base_url| RemoteConfig {
            base_url,
            api_key: var("TASKY_REMOTE_KEY"),
            table: var("TASKY_REMOTE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        });

        Ok(config)
    }

    pub fn local_store_path(&self) -> PathBuf {
        self.data_dir.join("local_store.json")
    }

    pub fn guest_flag_path(&self) -> PathBuf {
        self.data_dir.join("guest_mode")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.guest_ttl_days, 7);
        assert_eq!(config.guest_key, "guestTodos");
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_remote_from_env() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TASKY_DATA_DIR", "/tmp/tasky"),
            ("TASKY_REMOTE_URL", "https://db.example.com/rest/v1"),
            ("TASKY_REMOTE_KEY", "anon"),
            ("TASKY_GUEST_TTL_DAYS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/tasky"));
        assert_eq!(config.guest_ttl_days, 3);
        let remote = config.remote.unwrap();
        assert_eq!(remote.base_url, "https://db.example.com/rest/v1");
        assert_eq!(remote.api_key.as_deref(), Some("anon"));
        assert_eq!(remote.table, "todos");
    }

    #[test]
    fn test_invalid_ttl() {
        for raw in ["a week", "0", "-3", "36501", "4000000000"] {
            let result = ClientConfig::from_lookup(lookup(&[("TASKY_GUEST_TTL_DAYS", raw)]));
            assert!(matches!(result, Err(Error::Config(_))), "accepted {raw:?}");
        }

        let config =
            ClientConfig::from_lookup(lookup(&[("TASKY_GUEST_TTL_DAYS", "36500")])).unwrap();
        assert_eq!(config.guest_ttl_days, MAX_GUEST_TTL_DAYS);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[("TASKY_REMOTE_URL", "  ")])).unwrap();
        assert!(config.remote.is_none());
    }
}
