use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the ifile pipeline.
///
/// Permission errors on individual entries are swallowed by the walker and
/// never surface here; every other filesystem error aborts the walk that
/// encountered it.
#[derive(Debug, Error)]
pub enum Error {
    /// An ignore file contained a pattern the gitignore grammar rejects.
    #[error("bad pattern in {}: {source}", .path.display())]
    BadPattern {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    /// A filesystem operation failed during walking or ifile writeout.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A pre- or post-walk hook returned an error.
    #[error("{kind} hook failed: {message}")]
    Hook { kind: HookKind, message: String },

    /// The filesystem event subscription could not be established or broke.
    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A watch job exceeded its failure budget.
    #[error("walks kept failing for longer than {0:?}; giving up")]
    JobFailed(Duration),
}

/// Which of the two walk hooks failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Pre,
    Post,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre => write!(f, "pre-walk"),
            Self::Post => write!(f, "post-walk"),
        }
    }
}
