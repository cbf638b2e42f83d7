use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not a diffsync mirror (no .diffsync/ directory found)")]
    NotInitialized,

    #[error("config error: {0}")]
    Config(String),

    #[error("remote returned HTTP {status} for {url}")]
    RemoteStatus { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("remote repository has no commits")]
    EmptyRepository,

    #[error("checkpoint {target} not found after walking {hops} commits")]
    CheckpointNotFound { target: String, hops: usize },

    #[error("cannot decode path segment '{segment}': {reason}")]
    PathDecode { segment: String, reason: String },

    #[error("refusing to touch path outside the mirror: {0}")]
    UnsafePath(String),

    #[error("diff parse error: {0}")]
    DiffParse(String),

    #[error("hunk edit at line {line} is outside {path:?} ({len} lines)")]
    HunkOutOfRange {
        path: PathBuf,
        line: usize,
        len: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether a failed request may succeed if repeated unchanged.
    ///
    /// Client errors other than rate limiting are final.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Find the mirror root by searching for `.diffsync/` starting from the
/// current directory and walking up. Returns the directory containing
/// `.diffsync/`.
pub fn find_mirror_root() -> Result<PathBuf, SyncError> {
    let mut dir = std::env::current_dir()?;
    loop {
        if dir.join(".diffsync").is_dir() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(SyncError::NotInitialized);
        }
    }
}
