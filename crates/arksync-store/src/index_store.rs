//! SQLite-backed index of a filesystem repository.
//!
//! One row per committed file. The working tree itself lives next to the
//! database; this store only records what has been committed.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use arksync_core::{FileEntry, Sha256Digest};

use crate::error::{RepositoryError, Result};
use crate::migration::{self, now_millis};

/// SQLite index store.
///
/// Thread-safe via internal Mutex. Every async method runs its query under
/// `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteIndexStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndexStore {
    /// Open or create the index database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                RepositoryError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {e}")),
                ))
            })?;
            f(&mut conn)
        })
        .await?
    }

    /// Every committed entry, ordered by path.
    pub async fn all(&self) -> Result<Vec<FileEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path, size, checksum FROM files ORDER BY path")?;
            let entries = stmt
                .query_map([], row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }

    /// Committed paths, ordered.
    pub async fn paths(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path FROM files ORDER BY path")?;
            let paths = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(paths)
        })
        .await
    }

    pub async fn get(&self, path: &str) -> Result<Option<FileEntry>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT path, size, checksum FROM files WHERE path = ?1",
                    params![path],
                    row_to_entry,
                )
                .optional()?)
        })
        .await
    }

    /// Record a new entry. Fails with `DestinationExists` if the path is taken.
    pub async fn insert(&self, entry: FileEntry) -> Result<()> {
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO files (path, size, checksum, indexed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.path,
                    entry.size as i64,
                    entry.checksum.as_bytes().as_slice(),
                    now_millis()
                ],
            )?;
            if inserted == 0 {
                return Err(RepositoryError::DestinationExists(entry.path));
            }
            Ok(())
        })
        .await
    }

    /// Drop an entry. Fails with `FileNotFound` if the path is not indexed.
    pub async fn remove(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
            if removed == 0 {
                return Err(RepositoryError::FileNotFound(path));
            }
            Ok(())
        })
        .await
    }

    /// Re-key an entry from `from` to `to` in one transaction.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM files WHERE path = ?1)",
                params![to],
                |row| row.get(0),
            )?;
            if taken {
                return Err(RepositoryError::DestinationExists(to));
            }
            let updated = tx.execute(
                "UPDATE files SET path = ?1, indexed_at = ?2 WHERE path = ?3",
                params![to, now_millis(), from],
            )?;
            if updated == 0 {
                return Err(RepositoryError::FileNotFound(from));
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileEntry> {
    let checksum: Vec<u8> = row.get("checksum")?;
    let checksum = Sha256Digest::try_from(checksum.as_slice()).map_err(|_| {
        rusqlite::Error::InvalidColumnType(2, "checksum".into(), rusqlite::types::Type::Blob)
    })?;
    let size: i64 = row.get("size")?;

    Ok(FileEntry {
        path: row.get("path")?,
        size: size as u64,
        checksum,
    })
}
