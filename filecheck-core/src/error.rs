use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes a host surface can tell apart (exit codes, messages).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path} line {line}: {message}")]
    Parse { path: PathBuf, line: usize, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation cancelled")]
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    FileAccess,
    Parse,
    Configuration,
    Cancelled,
}

impl Error {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess { path: path.into(), source }
    }

    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse { path: path.into(), line, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileAccess { .. } => ErrorKind::FileAccess,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}
