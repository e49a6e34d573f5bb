//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before reaching any backing store
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote record collection rejected or failed a call
    #[error("Backing store error: {0}")]
    BackingStore(String),

    /// Operation attempted while no owner is signed in and guest mode is off
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Guest data could not be parsed; the store was reset to empty
    #[error("Corrupt local data: {0}")]
    CorruptLocalData(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap any remote failure, keeping its message for diagnostics.
    pub fn backing_store(err: impl std::fmt::Display) -> Self {
        Self::BackingStore(err.to_string())
    }

    /// Re-tag an adapter error as a backing store failure.
    pub fn into_backing_store(self) -> Self {
        match self {
            Self::BackingStore(message) => Self::BackingStore(message),
            other => Self::backing_store(other),
        }
    }

    /// Whether the store healed itself before reporting this error.
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::CorruptLocalData(_))
    }
}
