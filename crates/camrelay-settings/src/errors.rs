//! Errors raised while loading relay settings.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Settings could not be loaded. Always fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The config file exists but could not be read.
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config is not JSON, or a field has the wrong type.
    #[error("malformed settings{}: {source}", in_file(.path.as_deref()))]
    Json {
        /// Config file, when the bad JSON came from one.
        path: Option<PathBuf>,
        /// Parser error with line and column.
        #[source]
        source: serde_json::Error,
    },
    /// A value parsed but cannot be used.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

impl SettingsError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: Option<&Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.map(Path::to_path_buf),
            source,
        }
    }
}

fn in_file(path: Option<&Path>) -> String {
    path.map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

/// Result alias for settings loading.
pub type Result<T> = std::result::Result<T, SettingsError>;
