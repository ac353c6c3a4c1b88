//! Layered runtime configuration: built-in defaults, an optional TOML file,
//! then `CTXFORGE_*` environment overrides — mirroring the teacher's own
//! defaults-then-file-then-env config layering, via the `config` crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logger::Level;
use crate::store::CleanupPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fs,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" => Ok(StoreBackend::Fs),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub session_id: Option<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub log_buffer: usize,
    pub clipboard_command: Option<String>,
    pub max_age_days: Option<u64>,
    pub max_count: Option<usize>,
    pub max_size_mb: Option<u64>,
    pub default_max_diff_lines: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Fs,
            session_id: None,
            log_level: "info".to_string(),
            log_file: None,
            log_buffer: 500,
            clipboard_command: None,
            max_age_days: Some(30),
            max_count: Some(200),
            max_size_mb: Some(500),
            default_max_diff_lines: crate::diffsplit::DEFAULT_MAX_LINES as i64,
        }
    }
}

impl AppConfig {
    pub fn log_level_enum(&self) -> Result<Level, crate::logger::LoggerError> {
        self.log_level.parse()
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            max_age_days: self.max_age_days,
            max_count: self.max_count,
            max_size_mb: self.max_size_mb,
        }
    }

    /// Default config file path: `<config_dir>/ctxforge/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ctxforge")
            .join("config.toml")
    }

    /// Loads defaults, layers an optional TOML file (if it exists) and
    /// `CTXFORGE_*` environment variables on top.
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self, config::ConfigError> {
        let path = file_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);

        let defaults = AppConfig::default();
        let mut builder = config::Config::builder()
            .set_default("store_backend", "fs")?
            .set_default("log_level", defaults.log_level.clone())?
            .set_default("log_buffer", defaults.log_buffer as i64)?
            .set_default("max_age_days", defaults.max_age_days.map(|v| v as i64))?
            .set_default("max_count", defaults.max_count.map(|v| v as i64))?
            .set_default("max_size_mb", defaults.max_size_mb.map(|v| v as i64))?
            .set_default("default_max_diff_lines", defaults.default_max_diff_lines)?;

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CTXFORGE")
                .try_parsing(true)
                .separator("_"),
        );

        let built = builder.build()?;
        built.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_any_file_or_env() {
        let config = AppConfig::default();
        assert_eq!(config.log_buffer, 500);
        assert!(matches!(config.store_backend, StoreBackend::Fs));
    }

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert!(matches!("FS".parse::<StoreBackend>().unwrap(), StoreBackend::Fs));
        assert!(matches!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory));
        assert!("bogus".parse::<StoreBackend>().is_err());
    }
}
