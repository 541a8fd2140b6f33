use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error raised while executing a statement.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The background connection thread failed or has shut down.
    #[error("database connection error: {0}")]
    Connection(tokio_rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        match e {
            tokio_rusqlite::Error::Rusqlite(inner) => StoreError::Sqlite(inner),
            other => StoreError::Connection(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
