use std::fmt;

/// Errors that can occur during object storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The requested object was not found.
    NotFound(String),
    /// A create-without-overwrite put hit an existing object.
    AlreadyExists(String),
    /// The store asked us to back off. Transient; safe to retry.
    RateLimited(String),
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The store rejected the request for any other reason.
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Io(_) | Self::Backend(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "object not found: {name}"),
            Self::AlreadyExists(name) => write!(f, "object already exists: {name}"),
            Self::RateLimited(msg) => write!(f, "rate limited by store: {msg}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
