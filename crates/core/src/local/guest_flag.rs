//! Persisted "guest mode active" flag

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;

/// A single persisted boolean, read and written by the mode resolver only
pub trait GuestFlag: Send + Sync {
    fn is_set(&self) -> Result<bool>;
    fn set(&self) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryGuestFlag {
    value: AtomicBool,
}

impl MemoryGuestFlag {
    pub fn new(initial: bool) -> Self {
        Self {
            value: AtomicBool::new(initial),
        }
    }
}

impl GuestFlag for MemoryGuestFlag {
    fn is_set(&self) -> Result<bool> {
        Ok(self.value.load(Ordering::SeqCst))
    }

    fn set(&self) -> Result<()> {
        self.value.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.value.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Flag stored as a marker file containing `true`
#[derive(Debug, Clone)]
pub struct FileGuestFlag {
    path: PathBuf,
}

impl FileGuestFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GuestFlag for FileGuestFlag {
    fn is_set(&self) -> Result<bool> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim() == "true"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, "true")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
