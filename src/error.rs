use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a remote operation. Aborts the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {message}")]
    Connect { addr: String, message: String },

    #[error("{op} {path:?} failed: {message}")]
    Operation {
        op: &'static str,
        path: String,
        message: String,
    },
}

impl TransportError {
    pub fn operation(op: &'static str, path: impl Into<String>, message: impl ToString) -> Self {
        Self::Operation {
            op,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Why a single snapshot line was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("line does not match the snapshot grammar")]
    Malformed,

    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("size {0:?} is out of range")]
    Size(String),

    #[error("unparseable timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot persist snapshot to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot {path} is in use by another instance")]
    Locked { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("email delivery failed: {0}")]
    Email(String),
}
