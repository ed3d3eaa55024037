//! Durable local slot for the last-known preferences document.
//!
//! Writes are whole-document replacements; a snapshot older than the TTL is
//! treated as never written, matching the cookie semantics of the original
//! storage medium. Reverting to defaults after expiry is documented
//! behavior, not a bug.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tickerdesk_prefs_core::PreferenceDocument;

pub const DEFAULT_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("persist_io:{message}")]
    Io { message: String },
    #[error("persist_encode:{message}")]
    Encode { message: String },
    #[error("persist_decode:{message}")]
    Decode { message: String },
}

/// On-disk envelope: the document plus the stamp the TTL check runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPreferences {
    pub saved_at: DateTime<Utc>,
    pub preferences: PreferenceDocument,
}

/// Whole-document read/write slot. `load` returns `None` when nothing was
/// ever written or the snapshot has expired; partial writes do not exist.
pub trait PersistentStore: Send + Sync {
    fn load(&self) -> Result<Option<PreferenceDocument>, PersistError>;
    fn store(&self, document: &PreferenceDocument) -> Result<(), PersistError>;
    fn clear(&self) -> Result<(), PersistError>;
}

/// JSON-file adapter with a bounded snapshot lifetime.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    ttl: Duration,
}

impl FilePreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: Duration::days(DEFAULT_TTL_DAYS),
        }
    }

    #[must_use]
    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistentStore for FilePreferenceStore {
    fn load(&self) -> Result<Option<PreferenceDocument>, PersistError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(PersistError::Io {
                    message: error.to_string(),
                });
            }
        };
        let stored: StoredPreferences =
            serde_json::from_str(&raw).map_err(|error| PersistError::Decode {
                message: error.to_string(),
            })?;
        if Utc::now().signed_duration_since(stored.saved_at) > self.ttl {
            return Ok(None);
        }
        Ok(Some(stored.preferences))
    }

    fn store(&self, document: &PreferenceDocument) -> Result<(), PersistError> {
        let stored = StoredPreferences {
            saved_at: Utc::now(),
            preferences: document.clone(),
        };
        let encoded =
            serde_json::to_string_pretty(&stored).map_err(|error| PersistError::Encode {
                message: error.to_string(),
            })?;
        std::fs::write(&self.path, encoded).map_err(|error| PersistError::Io {
            message: error.to_string(),
        })
    }

    fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(PersistError::Io {
                message: error.to_string(),
            }),
        }
    }
}

/// In-memory slot, primarily for tests and headless embedding.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    slot: Mutex<Option<PreferenceDocument>>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seeded(document: PreferenceDocument) -> Self {
        Self {
            slot: Mutex::new(Some(document)),
        }
    }
}

impl PersistentStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<PreferenceDocument>, PersistError> {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slot.clone())
    }

    fn store(&self, document: &PreferenceDocument) -> Result<(), PersistError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(document.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        Ok(())
    }
}
