use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use super::fs::session_dirs;
use super::StoreError;

#[derive(Debug, Deserialize)]
struct SessionMetaFile {
    created: chrono::DateTime<Utc>,
    last_access: chrono::DateTime<Utc>,
}

/// Eviction thresholds for [`CleanupScheduler`]. Any field left `None` is
/// not enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupPolicy {
    pub max_age_days: Option<u64>,
    pub max_count: Option<usize>,
    pub max_size_mb: Option<u64>,
}

struct Candidate {
    dir: PathBuf,
    id: String,
    last_access: chrono::DateTime<Utc>,
    age_days: u64,
    size_bytes: u64,
}

/// Sweeps a session store root and removes sessions that violate
/// `policy`, always sparing `exclude_id` regardless of its age, rank, or
/// size. Idempotent: running it again with nothing left to evict is a
/// no-op, and it never errors on a root that doesn't exist yet.
pub struct CleanupScheduler {
    root: PathBuf,
    policy: CleanupPolicy,
}

impl CleanupScheduler {
    pub fn new(root: PathBuf, policy: CleanupPolicy) -> Self {
        Self { root, policy }
    }

    fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let now = Utc::now();
        let mut out = Vec::new();
        for dir in session_dirs(&self.root)? {
            let id = match dir.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            let meta_path = dir.join("_meta.json");
            let meta: SessionMetaFile = match fs::read(&meta_path) {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(m) => m,
                    Err(_) => continue,
                },
                Err(_) => continue,
            };

            let mut size_bytes = 0u64;
            if let Ok(entries) = fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    if let Ok(md) = entry.metadata() {
                        size_bytes += md.len();
                    }
                }
            }

            let age_days = (now - meta.last_access).num_days().max(0) as u64;
            out.push(Candidate {
                dir,
                id,
                last_access: meta.last_access,
                age_days,
                size_bytes,
            });
        }
        Ok(out)
    }

    /// Run one sweep, returning the ids of sessions removed.
    pub fn run(&self, exclude_id: &str) -> Result<Vec<String>, StoreError> {
        let mut candidates = self.candidates()?;
        // Oldest-accessed first, so rank- and size-based eviction drops the
        // least recently used sessions first.
        candidates.sort_by_key(|c| c.last_access);

        let mut to_evict = Vec::new();

        if let Some(max_age) = self.policy.max_age_days {
            for c in &candidates {
                if c.id != exclude_id && c.age_days > max_age {
                    to_evict.push(c.id.clone());
                }
            }
        }

        if let Some(max_count) = self.policy.max_count {
            let survivors: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| c.id == exclude_id || !to_evict.contains(&c.id))
                .collect();
            if survivors.len() > max_count {
                let overflow = survivors.len() - max_count;
                for c in survivors.iter().filter(|c| c.id != exclude_id).take(overflow) {
                    if !to_evict.contains(&c.id) {
                        to_evict.push(c.id.clone());
                    }
                }
            }
        }

        if let Some(max_size_mb) = self.policy.max_size_mb {
            let max_bytes = max_size_mb * 1024 * 1024;
            let mut total: u64 = candidates
                .iter()
                .filter(|c| !to_evict.contains(&c.id))
                .map(|c| c.size_bytes)
                .sum();
            for c in candidates.iter().filter(|c| c.id != exclude_id && !to_evict.contains(&c.id)) {
                if total <= max_bytes {
                    break;
                }
                to_evict.push(c.id.clone());
                total = total.saturating_sub(c.size_bytes);
            }
        }

        for id in &to_evict {
            if let Some(c) = candidates.iter().find(|c| &c.id == id) {
                let _ = fs::remove_dir_all(&c.dir);
            }
        }

        Ok(to_evict)
    }
}

/// Minimum interval between sweeps when a caller wants periodic cleanup
/// rather than a one-shot run. Pure constant; the scheduler itself has no
/// background thread — callers drive `run` from their own loop.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_session(root: &std::path::Path, id: &str, created_days_ago: i64, size: usize) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        let ts = Utc::now() - chrono::Duration::days(created_days_ago);
        let meta = format!(
            r#"{{"created":"{}","last_access":"{}"}}"#,
            ts.to_rfc3339(),
            ts.to_rfc3339()
        );
        fs::write(dir.join("_meta.json"), meta).unwrap();
        let mut f = fs::File::create(dir.join("data.json")).unwrap();
        f.write_all(&vec![b'x'; size]).unwrap();
    }

    #[test]
    fn missing_root_sweeps_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nonexistent");
        let scheduler = CleanupScheduler::new(root, CleanupPolicy::default());
        assert_eq!(scheduler.run("keep").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn evicts_sessions_older_than_max_age() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "old", 30, 10);
        write_session(dir.path(), "new", 1, 10);
        let policy = CleanupPolicy {
            max_age_days: Some(7),
            ..Default::default()
        };
        let scheduler = CleanupScheduler::new(dir.path().to_path_buf(), policy);
        let evicted = scheduler.run("keep").unwrap();
        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(!dir.path().join("old").exists());
        assert!(dir.path().join("new").exists());
    }

    #[test]
    fn exclude_id_is_never_evicted() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "ancient", 90, 10);
        let policy = CleanupPolicy {
            max_age_days: Some(1),
            ..Default::default()
        };
        let scheduler = CleanupScheduler::new(dir.path().to_path_buf(), policy);
        let evicted = scheduler.run("ancient").unwrap();
        assert!(evicted.is_empty());
        assert!(dir.path().join("ancient").exists());
    }

    #[test]
    fn enforces_max_count_by_oldest_access() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "a", 5, 10);
        write_session(dir.path(), "b", 3, 10);
        write_session(dir.path(), "c", 1, 10);
        let policy = CleanupPolicy {
            max_count: Some(2),
            ..Default::default()
        };
        let scheduler = CleanupScheduler::new(dir.path().to_path_buf(), policy);
        let evicted = scheduler.run("keep").unwrap();
        assert_eq!(evicted, vec!["a".to_string()]);
    }

    #[test]
    fn enforces_max_size_by_evicting_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), "a", 5, 1024 * 1024);
        write_session(dir.path(), "b", 3, 1024 * 1024);
        let policy = CleanupPolicy {
            max_size_mb: Some(1),
            ..Default::default()
        };
        let scheduler = CleanupScheduler::new(dir.path().to_path_buf(), policy);
        let evicted = scheduler.run("keep").unwrap();
        assert_eq!(evicted, vec!["a".to_string()]);
    }
}
