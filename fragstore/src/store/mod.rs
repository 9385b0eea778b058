//! Storage capability used by fragment groups.
//!
//! A fragment group needs very little from its backend: a metadata table of
//! text key/value pairs, `hashmod` shard tables keyed by `(namespace, name)`,
//! explicit transactions and a deferred index step. [`ShardStore`] captures
//! exactly that, so the group logic is independent of the engine doing the
//! byte storage.
//!
//! Two backends are provided:
//!
//! - [`SqliteStore`] - one SQLite database file per fragment group
//! - [`MemoryStore`] - in-process maps, for tests and throwaway datasets

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One persisted fragment row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Series namespace.
    pub namespace: String,
    /// Series name.
    pub name: String,
    /// Element type tag (see [`crate::fragment::Dtype::tag`]).
    pub dtype: String,
    /// Sum of the elements at save time.
    pub total: f64,
    /// Raw little-endian element bytes.
    pub data: Vec<u8>,
}

/// Table-level operations a fragment group performs against its backend.
///
/// All methods take `&self`; a store handle is used from one thread of
/// control at a time and fragments borrow their group while saving.
pub trait ShardStore: fmt::Debug {
    /// Returns true if the metadata table exists.
    ///
    /// # Errors
    ///
    /// Returns a store error if the backend cannot be queried.
    fn is_initialized(&self) -> Result<bool>;

    /// Creates the metadata table with `metadata` and shard tables
    /// `0..hashmod`, inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns a store error if any table cannot be created.
    fn initialize(&self, metadata: &BTreeMap<String, String>, hashmod: u32) -> Result<()>;

    /// Reads every metadata key/value pair.
    ///
    /// # Errors
    ///
    /// Returns a store error if the metadata table cannot be read.
    fn load_metadata(&self) -> Result<BTreeMap<String, String>>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Transaction`] if one is already open.
    fn begin(&self) -> Result<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Transaction`] if none is open.
    fn commit(&self) -> Result<()>;

    /// Discards the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Transaction`] if none is open.
    fn rollback(&self) -> Result<()>;

    /// Returns true while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Looks up the row for `(namespace, name)` in shard table `shard`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup fails. A missing row is `Ok(None)`.
    fn select(&self, shard: u32, namespace: &str, name: &str) -> Result<Option<StoredRow>>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FragmentError::DuplicateKey`] if the identity
    /// already exists in the shard table.
    fn insert(&self, shard: u32, row: &StoredRow) -> Result<()>;

    /// Replaces dtype, total and data of an existing row. Returns false if
    /// no row matched.
    ///
    /// # Errors
    ///
    /// Returns a store error if the update fails.
    fn update(&self, shard: u32, row: &StoredRow) -> Result<bool>;

    /// Returns every row of shard table `shard`, ordered by identity.
    ///
    /// # Errors
    ///
    /// Returns a store error if the scan fails.
    fn scan(&self, shard: u32) -> Result<Vec<StoredRow>>;

    /// Builds indexes deferred from bulk loading. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a store error if an index cannot be built.
    fn ensure_indexes(&self, hashmod: u32) -> Result<()>;
}
