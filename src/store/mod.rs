//! Session-scoped key/value persistence (C1).
//!
//! A [`Store`] implementation exposes get/set/delete over a flat
//! `(session_id, key)` namespace. Two backends are provided: [`fs`] (one
//! directory per session, durable on every write) and [`memory`]
//! (process-local, used by tests and when explicitly requested).

mod cleanup;
mod fs;
mod memory;

pub use cleanup::{CleanupPolicy, CleanupScheduler};
pub use fs::FsStore;
pub use memory::MemoryStore;

use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}

#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub created: chrono::DateTime<chrono::Utc>,
    pub last_access: chrono::DateTime<chrono::Utc>,
    pub size_bytes: u64,
}

/// A session-scoped key/value store. `Get` returning `Ok(None)` is the
/// valid "not found" case, not an error; write failures surface as `Err`.
pub trait Store: Send + Sync {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, session_id: &str, key: &str, value: &Value) -> Result<(), StoreError>;
    fn delete(&self, session_id: &str, key: &str) -> Result<(), StoreError>;
    fn list_sessions(&self) -> Result<Vec<String>, StoreError>;
    fn session_meta(&self, session_id: &str) -> Result<SessionMeta, StoreError>;
    fn remove_session(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Derive the session id from the current working directory: a stable,
/// deterministic hash of the canonicalized path.
pub fn derive_session_id(cwd: &Path) -> String {
    use std::hash::{Hash, Hasher};

    let canonical = dunce::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Resolve the effective session id: an explicit id wins; otherwise derive
/// one from `cwd`.
pub fn resolve_session_id(explicit: Option<&str>, cwd: &Path) -> String {
    explicit
        .map(str::to_string)
        .unwrap_or_else(|| derive_session_id(cwd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = derive_session_id(dir.path());
        let b = derive_session_id(dir.path());
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_session_id_wins() {
        let dir = tempfile::tempdir().unwrap();
        let id = resolve_session_id(Some("explicit"), dir.path());
        assert_eq!(id, "explicit");
    }
}
