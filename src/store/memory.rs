use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;

use super::{SessionMeta, Store, StoreError};

struct SessionData {
    values: HashMap<String, Value>,
    created: chrono::DateTime<chrono::Utc>,
    last_access: chrono::DateTime<chrono::Utc>,
}

/// Process-local store. Lost on exit; used by tests and when explicitly
/// requested via `--store memory`.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch<'a>(
        sessions: &'a mut HashMap<String, SessionData>,
        session_id: &str,
    ) -> &'a mut SessionData {
        let now = Utc::now();
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| SessionData {
            values: HashMap::new(),
            created: now,
            last_access: now,
        });
        entry.last_access = now;
        entry
    }
}

impl Store for MemoryStore {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = Self::touch(&mut sessions, session_id);
        Ok(session.values.get(key).cloned())
    }

    fn set(&self, session_id: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = Self::touch(&mut sessions, session_id);
        session.values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, session_id: &str, key: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = Self::touch(&mut sessions, session_id);
        session.values.remove(key);
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.keys().cloned().collect())
    }

    fn session_meta(&self, session_id: &str) -> Result<SessionMeta, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let size_bytes = session
            .values
            .values()
            .map(|v| serde_json::to_vec(v).map(|b| b.len() as u64).unwrap_or(0))
            .sum();
        Ok(SessionMeta {
            created: session.created,
            last_access: session.last_access,
            size_bytes,
        })
    }

    fn remove_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none_not_error() {
        let store = MemoryStore::new();
        assert_eq!(store.get("s1", "k").unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store.set("s1", "k", &Value::from(42)).unwrap();
        assert_eq!(store.get("s1", "k").unwrap(), Some(Value::from(42)));
    }

    #[test]
    fn delete_removes_key() {
        let store = MemoryStore::new();
        store.set("s1", "k", &Value::from(1)).unwrap();
        store.delete("s1", "k").unwrap();
        assert_eq!(store.get("s1", "k").unwrap(), None);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = MemoryStore::new();
        store.set("s1", "k", &Value::from(1)).unwrap();
        assert_eq!(store.get("s2", "k").unwrap(), None);
    }
}
