//! Connection management.
//!
//! [`Store`] owns a [`tokio_rusqlite::Connection`]: one SQLite connection
//! driven by a dedicated thread. Every `call` closure runs to completion
//! before the next one starts, so a closure is the unit of atomicity for
//! the conditional writes in this crate.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::migrations;

pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) a database file, creating parent directories as needed.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path).await?;
        Self::init(conn, Some(path.to_path_buf())).await
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, None).await
    }

    async fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        let version = conn
            .call(|c| {
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.pragma_update(None, "foreign_keys", "ON")?;
                register_functions(c)?;
                Ok(migrations::run_migrations(c)?)
            })
            .await?;
        tracing::debug!(schema_version = version, "database ready");
        Ok(Self { conn, path })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Filesystem path of the database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// SQL name of the Unicode-aware lowercase function. SQLite's built-in
/// `lower()` only folds ASCII.
pub(crate) const UNICODE_LOWER: &str = "unicode_lower";

fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Default database location: `$XDG_DATA_HOME/geoface/geoface.db`
/// (falling back to `~/.local/share`).
pub fn default_db_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("geoface")
        .join("geoface.db")
}

// --- Column codecs shared by the table modules ---

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_opt_timestamp(
    idx: usize,
    s: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(idx, &s)).transpose()
}

pub(crate) fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_enum<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(|e| {
        conversion_error(
            idx,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        )
    })
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open_in_memory().await.expect("should open");
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/test.db");

        let store = Store::open(&path).await.expect("should open");
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Store::open(&path).await.unwrap());
        let store = Store::open(&path).await.unwrap();
        let version: u32 = store
            .conn()
            .call(|c| Ok(c.pragma_query_value(None, "user_version", |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }
}
