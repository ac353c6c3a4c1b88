use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{SessionMeta, Store, StoreError};

#[derive(Debug, Serialize, Deserialize)]
struct SessionMetaFile {
    created: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

/// Durable store backed by one directory per session under `root`. Every
/// key is a `<key>.json` file; `_meta.json` tracks created/last-access
/// timestamps. All writes are fsync'd on return via [`fs::write`]'s
/// whole-file replace semantics plus a rename would be stronger, but a
/// direct write matches what a single-writer CLI invocation needs.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default root: `<data_dir>/ctxforge/sessions`.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ctxforge")
            .join("sessions")
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    fn key_path(&self, session_id: &str, key: &str) -> PathBuf {
        self.session_dir(session_id).join(format!("{key}.json"))
    }

    fn meta_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("_meta.json")
    }

    fn read_meta(&self, session_id: &str) -> Result<SessionMetaFile, StoreError> {
        let path = self.meta_path(session_id);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_meta(&self, session_id: &str, meta: &SessionMetaFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        fs::write(self.meta_path(session_id), bytes)?;
        Ok(())
    }

    fn touch(&self, session_id: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.session_dir(session_id))?;
        let now = Utc::now();
        let meta = match self.read_meta(session_id) {
            Ok(mut m) => {
                m.last_access = now;
                m
            }
            Err(StoreError::SessionNotFound(_)) => SessionMetaFile {
                created: now,
                last_access: now,
            },
            Err(e) => return Err(e),
        };
        self.write_meta(session_id, &meta)
    }
}

impl Store for FsStore {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.touch(session_id)?;
        let path = self.key_path(session_id, key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, session_id: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        self.touch(session_id)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(self.key_path(session_id, key), bytes)?;
        Ok(())
    }

    fn delete(&self, session_id: &str, key: &str) -> Result<(), StoreError> {
        self.touch(session_id)?;
        match fs::remove_file(self.key_path(session_id, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn session_meta(&self, session_id: &str) -> Result<SessionMeta, StoreError> {
        let meta = self.read_meta(session_id)?;
        let mut size_bytes = 0u64;
        for entry in fs::read_dir(self.session_dir(session_id))? {
            let entry = entry?;
            size_bytes += entry.metadata()?.len();
        }
        Ok(SessionMeta {
            created: meta.created,
            last_access: meta.last_access,
            size_bytes,
        })
    }

    fn remove_session(&self, session_id: &str) -> Result<(), StoreError> {
        let dir = self.session_dir(session_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Helper used by [`super::cleanup`] to enumerate session directories
/// under an arbitrary root without going through a `Store` instance.
pub(super) fn session_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        assert_eq!(store.get("s1", "k").unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        store.set("s1", "k", &Value::from("hello")).unwrap();
        assert_eq!(store.get("s1", "k").unwrap(), Some(Value::from("hello")));
    }

    #[test]
    fn writes_are_visible_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        store.set("s1", "k", &Value::from(1)).unwrap();
        let path = dir.path().join("s1").join("k.json");
        assert!(path.exists());
    }

    #[test]
    fn remove_session_deletes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        store.set("s1", "k", &Value::from(1)).unwrap();
        store.remove_session("s1").unwrap();
        assert!(!dir.path().join("s1").exists());
    }

    #[test]
    fn list_sessions_returns_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        store.set("s1", "k", &Value::from(1)).unwrap();
        store.set("s2", "k", &Value::from(1)).unwrap();
        let mut ids = store.list_sessions().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);
    }
}
