//! Persisted credentials shared by every screen.
//!
//! # Design
//! - The token store is injected, never looked up globally, so tests can swap it.
//! - Stores are re-read on every request; nothing caches the token in memory between calls,
//!   so clearing it anywhere takes effect on the very next request.
//! - Blank tokens are treated as no token at all.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::TokenStoreError;

/// Credentials persisted after a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Bearer token attached to every request.
    pub auth_token: String,
    /// Identifier of the signed-in user, when the server reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Credentials {
    /// Build credentials from a token and optional user id.
    #[must_use]
    pub fn new(auth_token: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            user_id,
        }
    }

    /// Whether the token is usable.
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.auth_token.trim().is_empty()
    }
}

/// Key-value store holding the session credentials.
pub trait TokenStore: Send + Sync {
    /// Current credentials, if any were stored.
    ///
    /// # Errors
    /// Returns [`TokenStoreError`] when the backing storage cannot be read.
    fn credentials(&self) -> Result<Option<Credentials>, TokenStoreError>;

    /// Persist new credentials, replacing existing ones.
    /// A different token re-arms the session guard's login redirect.
    ///
    /// # Errors
    /// Returns [`TokenStoreError`] when the backing storage cannot be written.
    fn save(&self, credentials: &Credentials) -> Result<(), TokenStoreError>;

    /// Remove stored credentials. Clearing an empty store succeeds.
    ///
    /// # Errors
    /// Returns [`TokenStoreError`] when the backing storage cannot be written.
    fn clear(&self) -> Result<(), TokenStoreError>;

    /// Usable bearer token, ignoring blank values.
    ///
    /// # Errors
    /// Returns [`TokenStoreError`] when the backing storage cannot be read.
    fn auth_token(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self
            .credentials()?
            .filter(Credentials::has_token)
            .map(|credentials| credentials.auth_token))
    }
}

/// JSON file store that survives process restarts.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by the given file; the file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn credentials(&self) -> Result<Option<Credentials>, TokenStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TokenStoreError::Io {
                    operation: "read",
                    source,
                });
            }
        };
        match serde_json::from_slice::<Credentials>(&bytes) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable session file"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| TokenStoreError::Io {
                operation: "create_dir",
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(credentials)
            .map_err(|source| TokenStoreError::Encode { source })?;
        let staging = self.staging_path();
        fs::write(&staging, bytes).map_err(|source| TokenStoreError::Io {
            operation: "write",
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| TokenStoreError::Io {
            operation: "rename",
            source,
        })
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TokenStoreError::Io {
                operation: "remove",
                source,
            }),
        }
    }
}

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryTokenStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(Credentials::new(token, None))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn credentials(&self) -> Result<Option<Credentials>, TokenStoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
