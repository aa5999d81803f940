//! Bearer token and signed-in user, persisted between runs.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::api::types::User;

/// Overrides the stored token when set.
pub const TOKEN_ENV: &str = "SENTINEL_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
  token: Option<String>,
  user: Option<User>,
}

/// Shared session state. Clones refer to the same session.
#[derive(Clone, Default)]
pub struct Session {
  state: Arc<RwLock<SessionData>>,
  /// Where the session is persisted; `None` keeps it in memory only
  path: Option<PathBuf>,
}

impl Session {
  /// Load the session from the default location, applying `SENTINEL_TOKEN`.
  pub fn load() -> Result<Self> {
    let session = Self::load_from(Self::default_path()?)?;

    if let Ok(token) = std::env::var(TOKEN_ENV) {
      if !token.trim().is_empty() {
        debug!("using token from {}", TOKEN_ENV);
        session.write().token = Some(token.trim().to_string());
      }
    }

    Ok(session)
  }

  /// Load a session persisted at `path`. A missing file is an empty session.
  pub fn load_from(path: PathBuf) -> Result<Self> {
    let data = if path.exists() {
      let contents = std::fs::read_to_string(&path)
        .map_err(|e| eyre!("Failed to read session file {}: {}", path.display(), e))?;
      serde_json::from_str(&contents)
        .map_err(|e| eyre!("Failed to parse session file {}: {}", path.display(), e))?
    } else {
      SessionData::default()
    };

    Ok(Self {
      state: Arc::new(RwLock::new(data)),
      path: Some(path),
    })
  }

  pub fn in_memory() -> Self {
    Self::default()
  }

  /// In-memory session with a token already set.
  pub fn with_token(token: impl Into<String>) -> Self {
    let session = Self::in_memory();
    session.write().token = Some(token.into());
    session
  }

  pub fn token(&self) -> Option<String> {
    self.read().token.clone()
  }

  pub fn user(&self) -> Option<User> {
    self.read().user.clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.read().token.is_some()
  }

  /// Replace the session after a successful login.
  pub fn store(&self, token: String, user: User) -> Result<()> {
    let data = SessionData {
      token: Some(token),
      user: Some(user),
    };
    self.persist(&data)?;
    *self.write() = data;
    Ok(())
  }

  /// Forget the token and user, in memory and on disk.
  pub fn clear(&self) -> Result<()> {
    *self.write() = SessionData::default();
    match &self.path {
      Some(path) if path.exists() => std::fs::remove_file(path)
        .map_err(|e| eyre!("Failed to remove session file {}: {}", path.display(), e)),
      _ => Ok(()),
    }
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  fn persist(&self, data: &SessionData) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }
    let contents = serde_json::to_string_pretty(data)
      .map_err(|e| eyre!("Failed to serialize session: {}", e))?;
    std::fs::write(path, contents)
      .map_err(|e| eyre!("Failed to write session file {}: {}", path.display(), e))?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| eyre!("Failed to restrict session file permissions: {}", e))?;
    }

    Ok(())
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sentinel").join("session.json"))
  }

  fn read(&self) -> RwLockReadGuard<'_, SessionData> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("authenticated", &self.is_authenticated())
      .field("path", &self.path)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user() -> User {
    User {
      id: "U1".into(),
      email: "csr@agency.test".into(),
      name: "Casey".into(),
      role: "CSR".into(),
      is_active: true,
      last_login: None,
      created_at: "2024-01-01T00:00:00".into(),
    }
  }

  #[test]
  fn test_store_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sentinel").join("session.json");

    let session = Session::load_from(path.clone()).unwrap();
    assert!(!session.is_authenticated());
    session.store("tok".into(), user()).unwrap();

    let reloaded = Session::load_from(path).unwrap();
    assert_eq!(reloaded.token().as_deref(), Some("tok"));
    assert_eq!(reloaded.user().map(|u| u.name), Some("Casey".to_string()));
  }

  #[test]
  fn test_clear_removes_file_and_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let session = Session::load_from(path.clone()).unwrap();
    session.store("tok".into(), user()).unwrap();
    let other = session.clone();

    session.clear().unwrap();
    assert!(other.token().is_none());
    assert!(!path.exists());
    // Clearing twice is fine
    session.clear().unwrap();
  }

  #[test]
  fn test_in_memory_session_writes_nothing() {
    let session = Session::in_memory();
    session.store("tok".into(), user()).unwrap();
    assert!(session.path().is_none());
    assert!(session.is_authenticated());
  }
}
