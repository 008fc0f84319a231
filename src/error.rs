use std::path::PathBuf;

use thiserror::Error;

/// Rejected session operations. None of these end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No point clicked")]
    NoPendingClick,

    #[error("Empty ID")]
    EmptyId,

    #[error("Duplicate ID: {0}")]
    DuplicateId(String),

    #[error("No points to export")]
    NothingToExport,

    #[error("Could not write {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read session file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid session file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session file {} declares no sessions", path.display())]
    NoSessions { path: PathBuf },
}
