//! Product-facing logger (C2): leveled records in a ring buffer plus an
//! optional rotating file sink, distinct from the crate's own internal
//! `log`/`env_logger` diagnostics.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("log file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("timed out waiting for log file to reappear: {0}")]
    FollowTimeout(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(LoggerError::InvalidLevel(other.to_string())),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub time: chrono::DateTime<Utc>,
    pub level: Level,
    pub msg: String,
    #[serde(flatten)]
    pub attrs: serde_json::Map<String, Value>,
}

/// Rotation policy for the file sink: rotate at `max_size_mb`, keeping up
/// to `max_files` historical files (`<name>.1`, `<name>.2`, ...).
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub max_size_mb: u64,
    pub max_files: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_mb: 10,
            max_files: 5,
        }
    }
}

struct FileSink {
    path: PathBuf,
    file: File,
    rotation: RotationPolicy,
}

impl FileSink {
    fn open(path: PathBuf, rotation: RotationPolicy) -> Result<Self, LoggerError> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, rotation })
    }

    fn write_line(&mut self, line: &str) -> Result<(), LoggerError> {
        self.maybe_rotate()?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }

    fn maybe_rotate(&mut self) -> Result<(), LoggerError> {
        let size = self.file.metadata()?.len();
        let max_bytes = self.rotation.max_size_mb * 1024 * 1024;
        if size < max_bytes {
            return Ok(());
        }

        for suffix in (1..self.rotation.max_files).rev() {
            let from = rotated_path(&self.path, suffix);
            let to = rotated_path(&self.path, suffix + 1);
            if from.exists() {
                let _ = fs::rename(&from, &to);
            }
        }
        let first = rotated_path(&self.path, 1);
        fs::rename(&self.path, &first)?;

        // Drop anything beyond max_files.
        let overflow = rotated_path(&self.path, self.rotation.max_files + 1);
        if overflow.exists() {
            let _ = fs::remove_file(overflow);
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

fn rotated_path(base: &Path, suffix: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{suffix}"));
    PathBuf::from(name)
}

/// Leveled ring-buffer logger with an optional durable file sink. The ring
/// buffer is updated synchronously under one internal mutex; file writes
/// are handed off over a channel to a dedicated writer thread so a slow or
/// rotating disk never blocks the caller issuing the log call.
pub struct Logger {
    inner: Mutex<LoggerState>,
    writer_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

struct LoggerState {
    min_level: Level,
    buffer: VecDeque<Record>,
    capacity: usize,
    file_path: Option<PathBuf>,
    writer_tx: Option<Sender<String>>,
}

impl Logger {
    pub fn new(min_level: Level, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LoggerState {
                min_level,
                buffer: VecDeque::with_capacity(capacity),
                capacity,
                file_path: None,
                writer_tx: None,
            }),
            writer_handle: Mutex::new(None),
        }
    }

    /// Opens `path` for append and starts a background writer thread owning
    /// the (possibly rotating) file handle. `log()` calls never touch the
    /// file directly; they just hand a pre-serialized line to the thread.
    pub fn with_file(
        min_level: Level,
        capacity: usize,
        path: PathBuf,
        rotation: RotationPolicy,
    ) -> Result<Self, LoggerError> {
        let mut sink = FileSink::open(path.clone(), rotation)?;
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let handle = std::thread::Builder::new()
            .name("ctxforge-log-writer".to_string())
            .spawn(move || {
                for line in rx {
                    let _ = sink.write_line(&line);
                }
            })
            .map_err(LoggerError::Io)?;

        Ok(Self {
            inner: Mutex::new(LoggerState {
                min_level,
                buffer: VecDeque::with_capacity(capacity),
                capacity,
                file_path: Some(path),
                writer_tx: Some(tx),
            }),
            writer_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn log(&self, level: Level, msg: impl Into<String>, attrs: serde_json::Map<String, Value>) {
        let mut state = self.inner.lock().unwrap();
        if level < state.min_level {
            return;
        }
        let record = Record {
            time: Utc::now(),
            level,
            msg: msg.into(),
            attrs,
        };

        if state.buffer.len() == state.capacity && state.capacity > 0 {
            state.buffer.pop_front();
        }
        if state.capacity > 0 {
            state.buffer.push_back(record.clone());
        }

        if let Some(tx) = state.writer_tx.as_ref() {
            if let Ok(line) = serde_json::to_string(&record) {
                let _ = tx.send(line);
            }
        }
    }

    pub fn debug(&self, msg: impl Into<String>) {
        self.log(Level::Debug, msg, serde_json::Map::new());
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(Level::Info, msg, serde_json::Map::new());
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.log(Level::Warn, msg, serde_json::Map::new());
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(Level::Error, msg, serde_json::Map::new());
    }

    /// Snapshot of the current ring buffer, oldest first.
    pub fn buffer_snapshot(&self) -> Vec<Record> {
        self.inner.lock().unwrap().buffer.iter().cloned().collect()
    }

    /// Path of the file sink, if one is configured. Used by `log tail` to
    /// discover what to read when no explicit `--file` is given.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.inner.lock().unwrap().file_path.clone()
    }
}

impl Drop for Logger {
    /// Closes the writer channel and joins the background thread so no
    /// buffered line is lost before the process exits.
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.lock() {
            state.writer_tx.take();
        }
        if let Ok(mut handle) = self.writer_handle.lock() {
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Read the last `n` lines of `path` via a backward scan, without
/// buffering the whole file.
pub fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>, LoggerError> {
    if !path.exists() {
        return Err(LoggerError::FileNotFound(path.to_path_buf()));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    const CHUNK: u64 = 8192;

    let mut pos = len;
    let mut lines_found = 0usize;
    let mut buf: Vec<u8> = Vec::new();

    while pos > 0 && lines_found <= n {
        let read_size = CHUNK.min(pos);
        pos -= read_size;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; read_size as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        lines_found = buf.iter().filter(|&&b| b == b'\n').count();
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.len() > n {
        lines = lines[lines.len() - n..].to_vec();
    }
    Ok(lines.into_iter().map(String::from).collect())
}

/// State needed to resume a follow loop across polls: byte offset and the
/// file length observed at that offset, used to detect truncation.
pub struct FollowCursor {
    pub offset: u64,
}

pub enum FollowEvent {
    Lines(Vec<String>),
    Reopened,
    Waiting,
}

/// One poll step of `log --follow`: reads any new complete lines since
/// `cursor.offset`, detects rotation/truncation (file shrank), and updates
/// `cursor` in place.
pub fn follow_poll(path: &Path, cursor: &mut FollowCursor) -> Result<FollowEvent, LoggerError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FollowEvent::Waiting),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata()?.len();

    if len < cursor.offset {
        cursor.offset = 0;
        return Ok(FollowEvent::Reopened);
    }
    if len == cursor.offset {
        return Ok(FollowEvent::Waiting);
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(cursor.offset))?;
    let mut new_bytes = Vec::new();
    reader.read_to_end(&mut new_bytes)?;

    // Only consume complete lines; hold back a trailing partial line for
    // the next poll.
    let last_newline = new_bytes.iter().rposition(|&b| b == b'\n');
    let consumed = match last_newline {
        Some(idx) => idx + 1,
        None => return Ok(FollowEvent::Waiting),
    };
    let text = String::from_utf8_lossy(&new_bytes[..consumed]).to_string();
    cursor.offset += consumed as u64;

    let lines: Vec<String> = text.lines().map(String::from).collect();
    Ok(FollowEvent::Lines(lines))
}

/// Poll interval for `log --follow`, per the 100-500ms range.
pub const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Bounded wait for a vanished file to reappear before giving up.
pub const FOLLOW_REAPPEAR_TIMEOUT: Duration = Duration::from_secs(30);

pub fn read_last_lines_plain(path: &Path, n: usize) -> Result<Vec<String>, LoggerError> {
    // Fallback line-oriented reader used by tests to cross-check
    // `tail_lines`'s backward-scan result against a naive implementation.
    let file = File::open(path)?;
    let all: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()?;
    let start = all.len().saturating_sub(n);
    Ok(all[start..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn ring_buffer_drops_oldest_past_capacity() {
        let logger = Logger::new(Level::Debug, 2);
        logger.info("a");
        logger.info("b");
        logger.info("c");
        let snap = logger.buffer_snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].msg, "b");
        assert_eq!(snap[1].msg, "c");
    }

    #[test]
    fn below_min_level_is_dropped() {
        let logger = Logger::new(Level::Warn, 10);
        logger.info("should be dropped");
        logger.error("kept");
        let snap = logger.buffer_snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].msg, "kept");
    }

    #[test]
    fn tail_lines_returns_last_n_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut f = File::create(&path).unwrap();
        for i in 0..20 {
            writeln!(f, "{{\"line\":{i}}}").unwrap();
        }
        drop(f);

        let got = tail_lines(&path, 5).unwrap();
        let expected = read_last_lines_plain(&path, 5).unwrap();
        assert_eq!(got, expected);
        assert_eq!(got.len(), 5);
        assert!(got[4].contains("19"));
    }

    #[test]
    fn tail_on_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");
        assert!(matches!(tail_lines(&path, 5), Err(LoggerError::FileNotFound(_))));
    }

    #[test]
    fn follow_poll_emits_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "first\n").unwrap();
        let mut cursor = FollowCursor { offset: 0 };

        match follow_poll(&path, &mut cursor).unwrap() {
            FollowEvent::Lines(lines) => assert_eq!(lines, vec!["first".to_string()]),
            _ => panic!("expected lines"),
        }

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "second").unwrap();
        drop(f);

        match follow_poll(&path, &mut cursor).unwrap() {
            FollowEvent::Lines(lines) => assert_eq!(lines, vec!["second".to_string()]),
            _ => panic!("expected lines"),
        }
    }

    #[test]
    fn follow_poll_detects_truncation_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let mut cursor = FollowCursor { offset: 14 };

        fs::write(&path, "fresh\n").unwrap();
        match follow_poll(&path, &mut cursor).unwrap() {
            FollowEvent::Reopened => assert_eq!(cursor.offset, 0),
            _ => panic!("expected reopened"),
        }
    }

    #[test]
    fn follow_poll_waits_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");
        let mut cursor = FollowCursor { offset: 0 };
        assert!(matches!(follow_poll(&path, &mut cursor).unwrap(), FollowEvent::Waiting));
    }

    #[test]
    fn file_sink_rotates_past_size_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = Logger::with_file(
            Level::Debug,
            10,
            path.clone(),
            RotationPolicy {
                max_size_mb: 0,
                max_files: 2,
            },
        )
        .unwrap();
        // max_size_mb of 0 means any write triggers rotation on the next write.
        logger.info("one");
        logger.info("two");
        logger.info("three");
        // Writes happen on a background thread; dropping the logger closes
        // the channel and joins the writer so every line has landed.
        drop(logger);
        assert!(path.with_extension("log.1").exists() || rotated_path(&path, 1).exists());
    }
}
