//! Auth-session state for the signed-in clinician.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login produces an access/refresh token pair. [`AuthContext`] is the one
//! owner of that pair: services ask it for the bearer token, the CLI asks
//! it whether a protected command may run, and a 401 from the backend calls
//! [`AuthContext::invalidate`], which clears the store and fires the
//! registered callback (the login redirect).
//!
//! Persistence sits behind [`SessionStore`] so the token can live in a file
//! for the CLI or in memory for tests and embedders.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    Corrupt(String),
}

/// Token pair issued by `POST /auth/login/`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Durable home for the session between runs.
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read or parsed.
    fn load(&self) -> Result<Option<Session>, SessionError>;

    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    fn clear(&self) -> Result<(), SessionError>;
}

/// JSON file store used by the CLI.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session: Session = serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        if session.access.is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string(session).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { inner: Mutex::new(Some(session)) }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

type InvalidationHook = Box<dyn Fn() + Send + Sync>;

/// Owner of the current session, injected into [`crate::net::ApiClient`].
pub struct AuthContext {
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    on_invalidate: Option<InvalidationHook>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Restore whatever session the store holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: impl SessionStore + 'static) -> Result<Self, SessionError> {
        let current = store.load()?;
        Ok(Self { store: Box::new(store), current: RwLock::new(current), on_invalidate: None })
    }

    /// Context with no session and an in-memory store.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            store: Box::new(MemorySessionStore::default()),
            current: RwLock::new(None),
            on_invalidate: None,
        }
    }

    /// Register the callback fired when the session is invalidated.
    #[must_use]
    pub fn on_invalidate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_invalidate = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Access token for an `Authorization: Bearer` header, if signed in.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access.clone())
    }

    /// Route gate for protected operations.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingSession`] when nobody is signed in.
    pub fn require(&self) -> Result<String, ApiError> {
        self.bearer().ok_or(ApiError::MissingSession)
    }

    /// Persist and adopt a freshly issued session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write; the in-memory
    /// session is left unchanged in that case.
    pub fn establish(&self, session: Session) -> Result<(), SessionError> {
        self.store.save(&session)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        info!("session established");
        Ok(())
    }

    /// Drop the session everywhere and notify the owner.
    pub fn invalidate(&self) {
        let had_session = self.current.write().unwrap_or_else(PoisonError::into_inner).take().is_some();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
        if had_session {
            info!("session invalidated");
        }
        if let Some(hook) = &self.on_invalidate {
            hook();
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
