//! sqlite-adapter — SQLite implementation of the ShortUrlRepository port.
//!
//! Purpose
//! - Provide a lightweight, file-based store that survives process restarts.
//! - Implements the `ShortUrlRepository` trait from the `domain` crate.
//! - Allocates short codes from a `counters` row incremented inside the same
//!   transaction as the insert, so codes are gap-free and never reused.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - `original_url` carries a UNIQUE constraint; a conflicting insert from
//!   another connection falls back to reading the winner's row.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use domain::{NormalizedUrl, ShortCode, ShortUrlRecord, ShortUrlRepository, StoreError};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

const COUNTER_NAME: &str = "short_code";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed short URL store.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a database from a connection string such as
    /// `sqlite://./data/shorturls.db` or a plain file path. Parent
    /// directories are created when missing.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let path = database_path(url);
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StoreError::new("io", format!("create {}: {e}", dir.display())))?;
            }
        }
        Self::new(path)
    }

    /// Private in-memory database; nothing is persisted.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new("mutex_poisoned", "sqlite connection mutex poisoned"))
    }
}

/// Strip an optional `sqlite://` or `sqlite:` prefix from a connection string.
pub fn database_path(url: &str) -> PathBuf {
    let trimmed = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(trimmed)
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(BUSY_TIMEOUT).map_err(map_sqerr)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS short_urls (
            short_code INTEGER PRIMARY KEY,
            original_url TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)?;
    Ok(())
}

fn map_sqerr(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) => {
            StoreError::new(err.extended_code.to_string(), format!("sqlite error: {e}"))
        }
        _ => StoreError::new("sqlite", format!("sqlite error: {e}")),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_record(url: String, code: i64) -> Result<ShortUrlRecord, StoreError> {
    let code = u64::try_from(code)
        .ok()
        .and_then(|c| ShortCode::new(c).ok())
        .ok_or_else(|| StoreError::new("corrupt", format!("bad short_code in db: {code}")))?;
    Ok(ShortUrlRecord {
        original_url: url,
        short_code: code,
    })
}

fn select_by_url(conn: &Connection, url: &str) -> Result<Option<ShortUrlRecord>, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT original_url, short_code FROM short_urls WHERE original_url = ?1",
            params![url],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(map_sqerr)?;
    row.map(|(u, c)| row_to_record(u, c)).transpose()
}

impl ShortUrlRepository for SqliteRepo {
    fn find_or_create(&self, url: &NormalizedUrl) -> Result<ShortUrlRecord, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqerr)?;

        if let Some(existing) = select_by_url(&tx, url.as_str())? {
            return Ok(existing);
        }

        tx.execute(
            "INSERT OR IGNORE INTO counters(name, value) VALUES(?1, 0)",
            params![COUNTER_NAME],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            "UPDATE counters SET value = value + 1 WHERE name = ?1",
            params![COUNTER_NAME],
        )
        .map_err(map_sqerr)?;
        let next: i64 = tx
            .query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![COUNTER_NAME],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;

        let inserted = tx.execute(
            "INSERT INTO short_urls(short_code, original_url) VALUES (?1, ?2)",
            params![next, url.as_str()],
        );
        match inserted {
            Ok(_) => {
                tx.commit().map_err(map_sqerr)?;
                debug!(code = next, url = %url.as_str(), "short url inserted");
                row_to_record(url.as_str().to_string(), next)
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost a race against another connection; counter bump is rolled back.
                drop(tx);
                select_by_url(&conn, url.as_str())?
                    .ok_or_else(|| map_sqerr(e))
            }
            Err(e) => Err(map_sqerr(e)),
        }
    }

    fn find_by_code(&self, code: ShortCode) -> Result<Option<ShortUrlRecord>, StoreError> {
        let conn = self.lock()?;
        let code_param = i64::try_from(code.get())
            .map_err(|_| StoreError::new("range", format!("short code out of range: {code}")))?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT original_url, short_code FROM short_urls WHERE short_code = ?1",
                params![code_param],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(map_sqerr)?;
        row.map(|(u, c)| row_to_record(u, c)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let repo = SqliteRepo::new(path).unwrap();
        (repo, dir)
    }

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::from_raw(s)
    }

    #[test]
    fn find_or_create_roundtrip() {
        let (repo, _dir) = tmp_db();
        let rec = repo.find_or_create(&url("https://www.example.com")).unwrap();
        assert_eq!(rec.short_code.get(), 1);
        assert_eq!(rec.original_url, "www.example.com");
        let got = repo.find_by_code(rec.short_code).unwrap().unwrap();
        assert_eq!(got, rec);
    }

    #[test]
    fn duplicate_returns_existing() {
        let (repo, _dir) = tmp_db();
        let a = repo.find_or_create(&url("https://dup.com")).unwrap();
        let b = repo.find_or_create(&url("https://dup.com")).unwrap();
        assert_eq!(a, b);
        let c = repo.find_or_create(&url("https://other.com")).unwrap();
        assert_eq!(c.short_code.get(), 2);
    }

    #[test]
    fn missing_code_is_none() {
        let (repo, _dir) = tmp_db();
        assert!(repo
            .find_by_code(ShortCode::new(999).unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn codes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.db");
        {
            let repo = SqliteRepo::new(&path).unwrap();
            repo.find_or_create(&url("https://a.com")).unwrap();
            repo.find_or_create(&url("https://b.com")).unwrap();
        }
        let repo = SqliteRepo::new(&path).unwrap();
        let b = repo.find_by_code(ShortCode::new(2).unwrap()).unwrap().unwrap();
        assert_eq!(b.original_url, "b.com");
        let c = repo.find_or_create(&url("https://c.com")).unwrap();
        assert_eq!(c.short_code.get(), 3);
        let a = repo.find_or_create(&url("https://a.com")).unwrap();
        assert_eq!(a.short_code.get(), 1);
    }

    #[test]
    fn concurrent_identical_submissions_share_one_record() {
        let (repo, _dir) = tmp_db();
        let repo = Arc::new(repo);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.find_or_create(&url("https://race.com")).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().short_code.get(), 1);
        }
        let next = repo.find_or_create(&url("https://after.com")).unwrap();
        assert_eq!(next.short_code.get(), 2);
    }

    #[test]
    fn from_url_accepts_sqlite_prefix() {
        assert_eq!(database_path("sqlite://./data/x.db"), PathBuf::from("./data/x.db"));
        assert_eq!(database_path("sqlite:y.db"), PathBuf::from("y.db"));
        assert_eq!(database_path("/tmp/z.db"), PathBuf::from("/tmp/z.db"));

        let dir = tempfile::tempdir().unwrap();
        let conn = format!("sqlite://{}", dir.path().join("nested/dir/s.db").display());
        let repo = SqliteRepo::from_url(&conn).unwrap();
        assert_eq!(repo.find_or_create(&url("https://a.com")).unwrap().short_code.get(), 1);
    }

    #[test]
    fn in_memory_database_works() {
        let repo = SqliteRepo::in_memory().unwrap();
        let rec = repo.find_or_create(&url("http://localhost:3000/x")).unwrap();
        assert_eq!(rec.original_url, "localhost:3000/x");
    }
}
