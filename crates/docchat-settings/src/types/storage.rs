//! Database and logging settings.

use std::path::{Path, PathBuf};

use docchat_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// `SQLite` database settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Database file. Relative paths resolve against `~/.docchat`; a leading
    /// `~/` expands to `$HOME`.
    pub db_path: String,
    /// Connections kept in the pool.
    pub pool_size: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "database/docchat.db".to_string(),
            pool_size: 8,
        }
    }
}

impl StorageSettings {
    /// Resolve `db_path` against the given home directory.
    #[must_use]
    pub fn resolved_db_path_for_home(&self, home: &Path) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            return home.join(rest);
        }
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            home.join(".docchat").join(path)
        }
    }

    /// Resolve `db_path` against `$HOME`.
    #[must_use]
    pub fn resolved_db_path(&self) -> PathBuf {
        self.resolved_db_path_for_home(&crate::loader::home_dir())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
