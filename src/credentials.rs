//! Persistence of the authentication token.
//!
//! The controller only ever saves, reads, and erases a single opaque token.
//! [`MemoryCredentialStore`] keeps it for the lifetime of the process;
//! [`FileCredentialStore`] keeps it in a file so a restarted client can
//! resume the session through
//! [`SessionController::verify_session`](crate::SessionController::verify_session).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::Result;

/// Abstraction over token storage so the session logic stays
/// platform-agnostic.
pub trait CredentialStore: Send + Sync + 'static {
    /// Persist `token`, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;
    /// Load the stored token, if any.
    fn read(&self) -> Result<Option<String>>;
    /// Remove the stored token. Erasing an empty store is not an error.
    fn erase(&self) -> Result<()>;
}

/// Share one store between the controller and the application.
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn save(&self, token: &str) -> Result<()> {
        (**self).save(token)
    }

    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn erase(&self) -> Result<()> {
        (**self).erase()
    }
}

/// Keeps the token in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn erase(&self) -> Result<()> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Keeps the token in a single file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, token)?;
        debug!(path = %self.path.display(), "token saved");
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn erase(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "token erased");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_save_read_erase() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.read().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("abc"));
        store.erase().unwrap();
        store.erase().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!(
            "lobby-session-client-test-{}",
            std::process::id()
        ));
        let path = dir.join("token");
        let store = FileCredentialStore::new(&path);
        store.save("tok-1").unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.read().unwrap().as_deref(), Some("tok-1"));

        reopened.erase().unwrap();
        reopened.erase().unwrap();
        assert_eq!(store.read().unwrap(), None);
        let _ = std::fs::remove_dir_all(dir);
    }
}
