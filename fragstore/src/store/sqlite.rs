//! SQLite backend: one database file per fragment group.
//!
//! # Layout
//!
//! ```text
//! <root>/<tag>.db
//! ├── metadata (key TEXT PRIMARY KEY, value TEXT)
//! ├── data0    (namespace, name, dtype, total, data, PRIMARY KEY (namespace, name))
//! ├── data1
//! └── data{hashmod-1}
//! ```
//!
//! The only secondary index, `data{i}_total`, is built by
//! [`ShardStore::ensure_indexes`] when the group is closed so bulk loads do
//! not pay for incremental index maintenance.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use tracing::{debug, warn};

use super::{ShardStore, StoredRow};
use crate::config::StoreTuning;
use crate::error::{FragmentError, Result, StoreError};

/// Shard store backed by a single SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    writeable: bool,
    tuning: StoreTuning,
}

impl SqliteStore {
    /// Opens (or, if `writeable`, creates) the database at `path` and applies
    /// `tuning` to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DirectoryAccess`] if the parent directory cannot
    /// be created, or [`StoreError::Sqlite`] if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, writeable: bool, tuning: &StoreTuning) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let flags = if writeable {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| StoreError::DirectoryAccess {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };

        let conn = Connection::open_with_flags(&path, flags).map_err(StoreError::from)?;

        // Negative cache_size is in KiB.
        conn.pragma_update(None, "cache_size", -i64::from(tuning.cache_size_kib))
            .map_err(StoreError::from)?;
        conn.pragma_update(None, "synchronous", tuning.synchronous.pragma_value())
            .map_err(StoreError::from)?;
        if writeable {
            // journal_mode answers with the resulting mode.
            conn.pragma_update_and_check(
                None,
                "journal_mode",
                tuning.journal_mode.pragma_value(),
                |row| row.get::<_, String>(0),
            )
            .map_err(StoreError::from)?;
        }

        Ok(Self {
            conn,
            path,
            writeable,
            tuning: tuning.clone(),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the connection was opened read-write.
    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    /// Runs `f` inside `BEGIN`/`COMMIT`, rolling back if it fails.
    fn in_tx<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Connection) -> Result<()>,
    {
        self.begin()?;
        match f(&self.conn) {
            Ok(()) => self.commit(),
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    warn!(path = %self.path.display(), error = %rollback_err, "rollback after failed batch also failed");
                }
                Err(e)
            }
        }
    }

    fn check_shard(&self, shard: u32) -> Result<()> {
        let exists = self
            .conn
            .prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .and_then(|mut stmt| {
                stmt.query_row(params![table_name(shard)], |_| Ok(()))
                    .optional()
            })
            .map_err(StoreError::from)?;
        if exists.is_none() {
            return Err(StoreError::NoSuchShard { shard }.into());
        }
        Ok(())
    }
}

fn table_name(shard: u32) -> String {
    format!("data{shard}")
}

impl ShardStore for SqliteStore {
    fn is_initialized(&self) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
                [],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?;
        Ok(found.is_some())
    }

    fn initialize(&self, metadata: &BTreeMap<String, String>, hashmod: u32) -> Result<()> {
        // page_size only takes effect before the first table exists.
        self.conn
            .pragma_update(None, "page_size", self.tuning.page_size)
            .map_err(StoreError::from)?;
        self.conn
            .pragma_update(None, "encoding", "UTF-8")
            .map_err(StoreError::from)?;

        self.in_tx(|conn| {
            conn.execute(
                "CREATE TABLE metadata (
                    key    TEXT NOT NULL PRIMARY KEY,
                    value  TEXT NOT NULL )",
                [],
            )
            .map_err(StoreError::from)?;

            {
                let mut insert = conn
                    .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
                    .map_err(StoreError::from)?;
                for (key, value) in metadata {
                    insert.execute(params![key, value]).map_err(StoreError::from)?;
                }
            }

            for shard in 0..hashmod {
                conn.execute(
                    &format!(
                        "CREATE TABLE {} (
                            namespace  TEXT NOT NULL,
                            name       TEXT NOT NULL,
                            dtype      TEXT NOT NULL,
                            total      REAL NOT NULL,
                            data       BLOB NOT NULL,
                            PRIMARY KEY (namespace, name) )",
                        table_name(shard)
                    ),
                    [],
                )
                .map_err(StoreError::from)?;
            }
            Ok(())
        })?;

        debug!(path = %self.path.display(), hashmod, "initialized shard tables");
        Ok(())
    }

    fn load_metadata(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM metadata")
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(StoreError::from)?;

        let mut metadata = BTreeMap::new();
        for row in rows {
            let (key, value) = row.map_err(StoreError::from)?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    fn begin(&self) -> Result<()> {
        if self.in_transaction() {
            return Err(StoreError::Transaction {
                reason: "transaction already open".to_string(),
            }
            .into());
        }
        self.conn.execute_batch("BEGIN").map_err(StoreError::from)?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        if !self.in_transaction() {
            return Err(StoreError::Transaction {
                reason: "commit without an open transaction".to_string(),
            }
            .into());
        }
        self.conn.execute_batch("COMMIT").map_err(StoreError::from)?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        if !self.in_transaction() {
            return Err(StoreError::Transaction {
                reason: "rollback without an open transaction".to_string(),
            }
            .into());
        }
        self.conn.execute_batch("ROLLBACK").map_err(StoreError::from)?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn select(&self, shard: u32, namespace: &str, name: &str) -> Result<Option<StoredRow>> {
        self.check_shard(shard)?;
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT dtype, total, data FROM {} WHERE namespace = ?1 AND name = ?2",
                table_name(shard)
            ))
            .map_err(StoreError::from)?;

        let row = stmt
            .query_row(params![namespace, name], |row| {
                Ok(StoredRow {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    dtype: row.get(0)?,
                    total: row.get(1)?,
                    data: row.get(2)?,
                })
            })
            .optional()
            .map_err(StoreError::from)?;
        Ok(row)
    }

    fn insert(&self, shard: u32, row: &StoredRow) -> Result<()> {
        self.check_shard(shard)?;
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "INSERT INTO {} (namespace, name, dtype, total, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                table_name(shard)
            ))
            .map_err(StoreError::from)?;

        match stmt.execute(params![row.namespace, row.name, row.dtype, row.total, row.data]) {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(FragmentError::DuplicateKey {
                    namespace: row.namespace.clone(),
                    name: row.name.clone(),
                    shard,
                }
                .into())
            }
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    fn update(&self, shard: u32, row: &StoredRow) -> Result<bool> {
        self.check_shard(shard)?;
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "UPDATE {} SET dtype = ?1, total = ?2, data = ?3 WHERE namespace = ?4 AND name = ?5",
                table_name(shard)
            ))
            .map_err(StoreError::from)?;

        let changed = stmt
            .execute(params![row.dtype, row.total, row.data, row.namespace, row.name])
            .map_err(StoreError::from)?;
        Ok(changed > 0)
    }

    fn scan(&self, shard: u32) -> Result<Vec<StoredRow>> {
        self.check_shard(shard)?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT namespace, name, dtype, total, data FROM {} ORDER BY namespace, name",
                table_name(shard)
            ))
            .map_err(StoreError::from)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRow {
                    namespace: row.get(0)?,
                    name: row.get(1)?,
                    dtype: row.get(2)?,
                    total: row.get(3)?,
                    data: row.get(4)?,
                })
            })
            .map_err(StoreError::from)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::from)?);
        }
        Ok(out)
    }

    fn ensure_indexes(&self, hashmod: u32) -> Result<()> {
        self.in_tx(|conn| {
            for shard in 0..hashmod {
                let table = table_name(shard);
                conn.execute(
                    &format!("CREATE INDEX IF NOT EXISTS {table}_total ON {table} (total)"),
                    [],
                )
                .map_err(StoreError::from)?;
            }
            Ok(())
        })?;
        debug!(path = %self.path.display(), hashmod, "ensured shard indexes");
        Ok(())
    }
}
