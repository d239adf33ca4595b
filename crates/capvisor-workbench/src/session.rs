// SPDX-License-Identifier: Apache-2.0

use crate::client::ClientError;
use capvisor_api::UserView;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Persistent home of the bearer token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Token kept in a single file, written with owner-only permissions on unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$XDG_CONFIG_HOME/capvisor/token`, else `~/.config/capvisor/token`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|v| !v.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join("capvisor").join("token"))
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> ClientError {
    ClientError::Storage(format!("{action} {}: {err}", path.display()))
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw.trim().to_string()).filter(|t| !t.is_empty())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_error("read", &self.path, err)),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, e))?;
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .map_err(|e| storage_error("open", &self.path, e))?;
        std::io::Write::write_all(&mut file, token.as_bytes())
            .map_err(|e| storage_error("write", &self.path, e))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error("remove", &self.path, err)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Bearer token of the signed-in user, mirrored into a [`TokenStore`].
pub struct Session {
    store: Box<dyn TokenStore>,
    token: Option<String>,
    user: Option<UserView>,
}

impl Session {
    /// Restores whatever token the store holds; the user is unknown until the next login.
    pub fn init_from_storage(store: Box<dyn TokenStore>) -> Result<Self, ClientError> {
        let token = store.load()?;
        Ok(Self {
            store,
            token,
            user: None,
        })
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserView> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn sign_in(&mut self, token: String, user: UserView) -> Result<(), ClientError> {
        self.store.save(&token)?;
        self.token = Some(token);
        self.user = Some(user);
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<(), ClientError> {
        self.token = None;
        self.user = None;
        self.store.clear()
    }
}
