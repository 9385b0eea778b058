//! In-process backend.
//!
//! Clones of a [`MemoryStore`] share one bucket, so a test can "close" a
//! group and reopen the same data by handing a clone to a new group.
//! Transactions snapshot the whole bucket on `begin` and restore it on
//! `rollback`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{ShardStore, StoredRow};
use crate::error::{FragmentError, Result, StoreError};

type ShardTable = BTreeMap<(String, String), StoredRow>;

#[derive(Debug, Clone, Default)]
struct Bucket {
    metadata: Option<BTreeMap<String, String>>,
    shards: Vec<ShardTable>,
    indexed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    bucket: Bucket,
    snapshot: Option<Bucket>,
}

/// Shard store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStore {
    /// Creates an empty, uninitialized bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`ShardStore::ensure_indexes`] has run.
    pub fn is_indexed(&self) -> bool {
        self.inner.borrow().bucket.indexed
    }

    /// Overwrites one metadata entry, bypassing validation.
    ///
    /// Used to simulate buckets written under a different configuration.
    pub fn tamper_metadata(&self, key: &str, value: Option<&str>) {
        let mut inner = self.inner.borrow_mut();
        let metadata = inner.bucket.metadata.get_or_insert_with(BTreeMap::new);
        match value {
            Some(v) => metadata.insert(key.to_string(), v.to_string()),
            None => metadata.remove(key),
        };
    }

    fn with_shard<T>(&self, shard: u32, f: impl FnOnce(&mut ShardTable) -> T) -> Result<T> {
        let mut inner = self.inner.borrow_mut();
        let table = inner
            .bucket
            .shards
            .get_mut(shard as usize)
            .ok_or(StoreError::NoSuchShard { shard })?;
        Ok(f(table))
    }
}

fn no_transaction(what: &str) -> StoreError {
    StoreError::Transaction {
        reason: format!("{what} without an open transaction"),
    }
}

impl ShardStore for MemoryStore {
    fn is_initialized(&self) -> Result<bool> {
        Ok(self.inner.borrow().bucket.metadata.is_some())
    }

    fn initialize(&self, metadata: &BTreeMap<String, String>, hashmod: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.bucket = Bucket {
            metadata: Some(metadata.clone()),
            shards: vec![ShardTable::new(); hashmod as usize],
            indexed: false,
        };
        Ok(())
    }

    fn load_metadata(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.inner.borrow().bucket.metadata.clone().unwrap_or_default())
    }

    fn begin(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.snapshot.is_some() {
            return Err(StoreError::Transaction {
                reason: "transaction already open".to_string(),
            }
            .into());
        }
        inner.snapshot = Some(inner.bucket.clone());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.snapshot.take().ok_or_else(|| no_transaction("commit"))?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let snapshot = inner.snapshot.take().ok_or_else(|| no_transaction("rollback"))?;
        inner.bucket = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.borrow().snapshot.is_some()
    }

    fn select(&self, shard: u32, namespace: &str, name: &str) -> Result<Option<StoredRow>> {
        let key = (namespace.to_string(), name.to_string());
        self.with_shard(shard, |table| table.get(&key).cloned())
    }

    fn insert(&self, shard: u32, row: &StoredRow) -> Result<()> {
        let key = (row.namespace.clone(), row.name.clone());
        let inserted = self.with_shard(shard, |table| {
            if table.contains_key(&key) {
                false
            } else {
                table.insert(key, row.clone());
                true
            }
        })?;

        if !inserted {
            return Err(FragmentError::DuplicateKey {
                namespace: row.namespace.clone(),
                name: row.name.clone(),
                shard,
            }
            .into());
        }
        Ok(())
    }

    fn update(&self, shard: u32, row: &StoredRow) -> Result<bool> {
        let key = (row.namespace.clone(), row.name.clone());
        self.with_shard(shard, |table| match table.get_mut(&key) {
            Some(existing) => {
                *existing = row.clone();
                true
            }
            None => false,
        })
    }

    fn scan(&self, shard: u32) -> Result<Vec<StoredRow>> {
        self.with_shard(shard, |table| table.values().cloned().collect())
    }

    fn ensure_indexes(&self, _hashmod: u32) -> Result<()> {
        self.inner.borrow_mut().bucket.indexed = true;
        Ok(())
    }
}
