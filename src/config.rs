use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Compile options ──────────────────────────────────────────────

/// Switches for one compilation. Missing keys in an options file fall back
/// to the defaults (everything off).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Run the constant folder between checking and code generation.
    pub folding: bool,
    /// Log every run-time entity the encoder elaborates.
    pub show_table: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read options file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid options file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CompileOptions {
    /// Load options from a JSON file such as `{"folding": true}`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
