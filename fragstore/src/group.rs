//! Fragment groups: one calendar month of every shard of a dataset.
//!
//! A [`FragmentGroup`] owns the store for one time bucket. Opening it
//! connects to the store, initializes the shard tables if the bucket is new
//! (and writeable), and then checks the stored metadata against what the
//! dataset expects. Only after that check passes can fragments be created,
//! fetched or saved.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened --open--> Open { writeable } --close--> Closed
//! ```
//!
//! `open` is only valid from `Unopened` and `close` only from `Open`;
//! `Closed` is terminal. Fragments borrow the group, so it cannot be closed
//! while any are alive.
//!
//! # Metadata contract
//!
//! The metadata record is written once when the bucket is created and must
//! match exactly (same keys, same values) on every later open:
//!
//! | Key                   | Meaning                                |
//! |-----------------------|----------------------------------------|
//! | `schema_version`      | on-disk layout version                 |
//! | `hash`                | shard routing hash algorithm name      |
//! | `hashmod`             | shard count                            |
//! | `fragment_total_zmax` | zero-density (compression) threshold   |
//! | `length`              | elements per fragment (hours in month) |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{SCHEMA_VERSION, StoreTuning};
use crate::dataset::Dataset;
use crate::error::{FragmentError, GroupError, Result};
use crate::fragment::{Dtype, Fragment, FragmentData, FragmentSource};
use crate::hash::{HashAlgorithm, validate_identity};
use crate::month::Month;
use crate::store::{ShardStore, SqliteStore, StoredRow};

/// Metadata a fragment group is created with and validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMetadata {
    /// On-disk layout version.
    pub schema_version: u32,
    /// Shard routing hash algorithm.
    pub hash: HashAlgorithm,
    /// Shard count.
    pub hashmod: u32,
    /// Zero-density threshold.
    pub fragment_total_zmax: f64,
    /// Elements per fragment.
    pub length: usize,
}

impl GroupMetadata {
    /// Returns the metadata as the text key/value pairs that are stored.
    pub fn to_entries(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("fragment_total_zmax".to_string(), self.fragment_total_zmax.to_string()),
            ("hash".to_string(), self.hash.name().to_string()),
            ("hashmod".to_string(), self.hashmod.to_string()),
            ("length".to_string(), self.length.to_string()),
            ("schema_version".to_string(), self.schema_version.to_string()),
        ])
    }

    /// Checks stored metadata against this expected metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::MetadataMismatch`] for the first key (in key
    /// order) whose stored value differs, or
    /// [`GroupError::MetadataKeySetMismatch`] if the key sets differ.
    pub fn validate(&self, stored: &BTreeMap<String, String>) -> Result<()> {
        let expected = self.to_entries();

        for (key, value) in &expected {
            if let Some(found) = stored.get(key)
                && found != value
            {
                return Err(GroupError::MetadataMismatch {
                    key: key.clone(),
                    expected: value.clone(),
                    found: found.clone(),
                }
                .into());
            }
        }

        let missing: Vec<String> = expected
            .keys()
            .filter(|k| !stored.contains_key(*k))
            .cloned()
            .collect();
        let unexpected: Vec<String> = stored
            .keys()
            .filter(|k| !expected.contains_key(*k))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(GroupError::MetadataKeySetMismatch {
                missing,
                unexpected,
            }
            .into());
        }

        Ok(())
    }
}

/// Lifecycle state of a [`FragmentGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Constructed, no store connection yet.
    Unopened,
    /// Connected and validated.
    Open {
        /// Whether saves are allowed.
        writeable: bool,
    },
    /// Closed; the group is unusable.
    Closed,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unopened => f.write_str("unopened"),
            Self::Open { writeable: true } => f.write_str("open (read-write)"),
            Self::Open { writeable: false } => f.write_str("open (read-only)"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// All shards of one dataset for one calendar month.
#[derive(Debug)]
pub struct FragmentGroup {
    dataset: Dataset,
    month: Month,
    tag: String,
    path: PathBuf,
    metadata: GroupMetadata,
    state: GroupState,
    store: Option<Box<dyn ShardStore>>,
}

impl FragmentGroup {
    /// Creates an unopened group for `month` of `dataset`. No I/O.
    pub fn new(dataset: &Dataset, month: Month) -> Self {
        Self {
            dataset: dataset.clone(),
            month,
            tag: month.tag(),
            path: dataset.group_path(month),
            metadata: dataset.expected_metadata(month),
            state: GroupState::Unopened,
            store: None,
        }
    }

    /// Opens the group's SQLite file at [`Self::path`].
    ///
    /// A writeable open creates the file and initializes the shard tables if
    /// needed. A read-only open of a bucket that does not exist fails.
    ///
    /// # Errors
    ///
    /// - [`GroupError::InvalidState`] if the group is not `Unopened`
    /// - [`GroupError::Uninitialized`] for a read-only open of a missing bucket
    /// - [`GroupError::MetadataMismatch`] / [`GroupError::MetadataKeySetMismatch`]
    ///   if the bucket was created under a different configuration
    pub fn open(&mut self, writeable: bool) -> Result<()> {
        self.require_unopened()?;
        if !writeable && !self.path.exists() {
            return Err(GroupError::Uninitialized {
                path: self.path.clone(),
            }
            .into());
        }
        let store = SqliteStore::open(&self.path, writeable, self.tuning())?;
        self.open_with_store(Box::new(store), writeable)
    }

    /// Opens the group on an already-connected store.
    ///
    /// # Errors
    ///
    /// Same as [`Self::open`].
    pub fn open_with_store(&mut self, store: Box<dyn ShardStore>, writeable: bool) -> Result<()> {
        self.require_unopened()?;
        debug!(path = %self.path.display(), tag = %self.tag, writeable, "opening fragment group");

        if !store.is_initialized()? {
            if !writeable {
                return Err(GroupError::Uninitialized {
                    path: self.path.clone(),
                }
                .into());
            }
            info!(tag = %self.tag, hashmod = self.metadata.hashmod, "initializing fragment group");
            store.initialize(&self.metadata.to_entries(), self.metadata.hashmod)?;
        } else {
            debug!(tag = %self.tag, "metadata table exists, skipping init");
        }

        let stored = store.load_metadata()?;
        self.metadata.validate(&stored)?;
        debug!(tag = %self.tag, items = stored.len(), "validated metadata");

        self.store = Some(store);
        self.state = GroupState::Open { writeable };
        Ok(())
    }

    /// Returns the bucket tag (ISO-8601 date of the month's first day).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the month this group holds.
    pub fn month(&self) -> Month {
        self.month
    }

    /// Returns the number of elements in each fragment.
    pub fn length(&self) -> usize {
        self.metadata.length
    }

    /// Returns the expected (and, once open, validated) metadata.
    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    /// Returns the location of the group's store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Returns the shard index of `(namespace, name)`.
    pub fn shard(&self, namespace: &str, name: &str) -> u32 {
        self.dataset.shard(namespace, name)
    }

    /// Creates a zero-filled `f32` fragment. No I/O.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidState`] if the group is not open, or
    /// [`FragmentError::InvalidIdentity`] for a bad identity.
    pub fn create(&self, namespace: &str, name: &str) -> Result<Fragment<'_>> {
        self.create_with_dtype(namespace, name, Dtype::default())
    }

    /// Creates a zero-filled fragment of element type `dtype`. No I/O.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub fn create_with_dtype(&self, namespace: &str, name: &str, dtype: Dtype) -> Result<Fragment<'_>> {
        self.require_open("create")?;
        validate_identity(namespace, name)?;
        Ok(Fragment::new(
            self,
            namespace,
            name,
            FragmentData::zeros(dtype, self.length()),
            FragmentSource::New,
            0.0,
        ))
    }

    /// Loads the stored fragment for `(namespace, name)`.
    ///
    /// # Errors
    ///
    /// - [`FragmentError::NotFound`] if no row exists
    /// - [`FragmentError::UnknownDtype`] / [`FragmentError::CorruptRow`] if
    ///   the row cannot be decoded to this group's length
    pub fn fetch(&self, namespace: &str, name: &str) -> Result<Fragment<'_>> {
        let store = self.require_open("fetch")?;
        validate_identity(namespace, name)?;

        let shard = self.shard(namespace, name);
        let row = store
            .select(shard, namespace, name)?
            .ok_or_else(|| FragmentError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                shard,
            })?;
        self.decode_row(row)
    }

    /// Fetches `(namespace, name)`, or creates a zero-filled `f32` fragment
    /// if it is not stored.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::fetch`] other than not-found.
    pub fn fetch_or_create(&self, namespace: &str, name: &str) -> Result<Fragment<'_>> {
        self.fetch_or_create_with_dtype(namespace, name, Dtype::default())
    }

    /// Like [`Self::fetch_or_create`]; `dtype` is only used when creating.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::fetch`] other than not-found.
    pub fn fetch_or_create_with_dtype(
        &self,
        namespace: &str,
        name: &str,
        dtype: Dtype,
    ) -> Result<Fragment<'_>> {
        match self.fetch(namespace, name) {
            Err(e) if e.is_not_found() => self.create_with_dtype(namespace, name, dtype),
            other => other,
        }
    }

    /// Returns every stored fragment of shard `shard`, ordered by identity.
    ///
    /// # Errors
    ///
    /// Returns a store error if `shard >= hashmod` or a row cannot be decoded.
    pub fn fetch_all(&self, shard: u32) -> Result<Vec<Fragment<'_>>> {
        let store = self.require_open("fetch_all")?;
        store
            .scan(shard)?
            .into_iter()
            .map(|row| self.decode_row(row))
            .collect()
    }

    /// Starts a transaction around a batch of creates and saves.
    ///
    /// # Errors
    ///
    /// Returns an error if the group is not open or a transaction is
    /// already open.
    pub fn begin(&self) -> Result<()> {
        self.require_open("begin")?.begin()
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the group is not open or no transaction is open.
    pub fn commit(&self) -> Result<()> {
        self.require_open("commit")?.commit()
    }

    /// Discards the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the group is not open or no transaction is open.
    pub fn rollback(&self) -> Result<()> {
        self.require_open("rollback")?.rollback()
    }

    /// Finalizes deferred indexes and releases the store.
    ///
    /// An uncommitted transaction is rolled back. Indexes are only built for
    /// writeable groups.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidState`] if the group is not open, or a
    /// store error if index construction fails. The group is closed either
    /// way once the state check passes.
    pub fn close(&mut self) -> Result<()> {
        let writeable = match self.state {
            GroupState::Open { writeable } => writeable,
            state => {
                return Err(GroupError::InvalidState {
                    operation: "close",
                    state: state.to_string(),
                }
                .into());
            }
        };

        let store = self.store.take();
        self.state = GroupState::Closed;
        let Some(store) = store else {
            return Ok(());
        };

        if store.in_transaction() {
            warn!(tag = %self.tag, "closing with an open transaction, rolling back");
            store.rollback()?;
        }
        if writeable {
            store.ensure_indexes(self.metadata.hashmod)?;
        }
        info!(tag = %self.tag, writeable, "closed fragment group");
        Ok(())
    }

    /// Writes a fragment row and returns its shard.
    pub(crate) fn write_row(&self, row: &StoredRow, insert: bool) -> Result<u32> {
        let store = self.require_open("save")?;
        if self.state != (GroupState::Open { writeable: true }) {
            return Err(GroupError::ReadOnly { operation: "save" }.into());
        }

        let shard = self.shard(&row.namespace, &row.name);
        if insert {
            store.insert(shard, row)?;
        } else if !store.update(shard, row)? {
            return Err(FragmentError::NotFound {
                namespace: row.namespace.clone(),
                name: row.name.clone(),
                shard,
            }
            .into());
        }
        Ok(shard)
    }

    fn decode_row(&self, row: StoredRow) -> Result<Fragment<'_>> {
        let corrupt = |reason: String| FragmentError::CorruptRow {
            namespace: row.namespace.clone(),
            name: row.name.clone(),
            reason,
        };

        let dtype: Dtype = row.dtype.parse()?;
        let data = FragmentData::decode(dtype, &row.data).ok_or_else(|| {
            corrupt(format!(
                "{} bytes is not a whole number of '{dtype}' elements",
                row.data.len()
            ))
        })?;
        if data.len() != self.length() {
            return Err(corrupt(format!(
                "expected {} elements, found {}",
                self.length(),
                data.len()
            ))
            .into());
        }

        Ok(Fragment::new(
            self,
            &row.namespace,
            &row.name,
            data,
            FragmentSource::Uncompressed,
            row.total,
        ))
    }

    fn tuning(&self) -> &StoreTuning {
        &self.dataset.config().tuning
    }

    fn require_unopened(&self) -> Result<()> {
        if self.state != GroupState::Unopened {
            return Err(GroupError::InvalidState {
                operation: "open",
                state: self.state.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn require_open(&self, operation: &'static str) -> Result<&dyn ShardStore> {
        match (&self.state, &self.store) {
            (GroupState::Open { .. }, Some(store)) => Ok(store.as_ref()),
            _ => Err(GroupError::InvalidState {
                operation,
                state: self.state.to_string(),
            }
            .into()),
        }
    }
}

/// Returns the expected metadata for a group of `length` elements.
pub(crate) fn expected_metadata(
    hash: HashAlgorithm,
    hashmod: u32,
    fragment_total_zmax: f64,
    length: usize,
) -> GroupMetadata {
    GroupMetadata {
        schema_version: SCHEMA_VERSION,
        hash,
        hashmod,
        fragment_total_zmax,
        length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FragstoreError, StoreError};
    use crate::store::MemoryStore;

    fn january() -> Month {
        Month::new(2015, 1).unwrap()
    }

    fn open_memory(dataset: &Dataset, store: &MemoryStore, writeable: bool) -> FragmentGroup {
        let mut group = FragmentGroup::new(dataset, january());
        group.open_with_store(Box::new(store.clone()), writeable).unwrap();
        group
    }

    #[test]
    fn test_metadata_entries() {
        let meta = expected_metadata(HashAlgorithm::Fnv1a32, 4, 2.0, 744);
        let entries = meta.to_entries();
        assert_eq!(entries["schema_version"], "1");
        assert_eq!(entries["hash"], "fnv1a_32");
        assert_eq!(entries["hashmod"], "4");
        assert_eq!(entries["fragment_total_zmax"], "2");
        assert_eq!(entries["length"], "744");
        assert_eq!(entries.len(), 5);
        assert!(meta.validate(&entries).is_ok());
    }

    #[test]
    fn test_metadata_value_mismatch() {
        let meta = expected_metadata(HashAlgorithm::Fnv1a32, 4, 2.0, 744);
        let mut stored = meta.to_entries();
        stored.insert("hashmod".to_string(), "8".to_string());

        match meta.validate(&stored) {
            Err(FragstoreError::Group(GroupError::MetadataMismatch { key, expected, found })) => {
                assert_eq!(key, "hashmod");
                assert_eq!(expected, "4");
                assert_eq!(found, "8");
            }
            other => panic!("expected MetadataMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_key_set_mismatch() {
        let meta = expected_metadata(HashAlgorithm::Fnv1a32, 4, 2.0, 744);

        let mut extra = meta.to_entries();
        extra.insert("compression".to_string(), "none".to_string());
        match meta.validate(&extra) {
            Err(FragstoreError::Group(GroupError::MetadataKeySetMismatch { missing, unexpected })) => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["compression".to_string()]);
            }
            other => panic!("expected MetadataKeySetMismatch, got {other:?}"),
        }

        let mut fewer = meta.to_entries();
        fewer.remove("length");
        match meta.validate(&fewer) {
            Err(FragstoreError::Group(GroupError::MetadataKeySetMismatch { missing, .. })) => {
                assert_eq!(missing, vec!["length".to_string()]);
            }
            other => panic!("expected MetadataKeySetMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_state_machine() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let store = MemoryStore::new();
        let mut group = FragmentGroup::new(&dataset, january());
        assert_eq!(group.state(), GroupState::Unopened);

        assert!(group.create("a", "b").is_err());
        assert!(group.begin().is_err());
        assert!(group.close().is_err());

        group.open_with_store(Box::new(store.clone()), true).unwrap();
        assert_eq!(group.state(), GroupState::Open { writeable: true });
        assert!(group.open_with_store(Box::new(store.clone()), true).is_err());

        group.close().unwrap();
        assert_eq!(group.state(), GroupState::Closed);
        assert!(store.is_indexed());

        let err = group.fetch("a", "b").unwrap_err();
        assert!(matches!(
            err,
            FragstoreError::Group(GroupError::InvalidState { operation: "fetch", .. })
        ));
        assert!(group.close().is_err());
        assert!(group.open_with_store(Box::new(store), true).is_err());
    }

    #[test]
    fn test_create_is_zero_filled() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        let frag = group.create("aboth", "abov11").unwrap();
        assert_eq!(frag.len(), 744);
        assert_eq!(frag.source(), FragmentSource::New);
        assert_eq!(frag.total(), 0.0);
        assert_eq!(frag.dtype(), Dtype::F32);
        assert_eq!(frag.to_string(), "aboth/abov11 N 0.0 []");
    }

    #[test]
    fn test_save_fetch_round_trip() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        group.begin().unwrap();
        let mut a = group.create("aboth", "abov11").unwrap();
        a.set(0, 11.0).unwrap();
        assert_eq!(a.to_string(), "aboth/abov11 N 0.0 [(0, 11.0)]");
        a.set(2, 22.0).unwrap();
        a.save().unwrap();
        assert_eq!(a.total(), 33.0);
        assert_eq!(a.source(), FragmentSource::Uncompressed);
        group.commit().unwrap();

        let fetched = group.fetch("aboth", "abov11").unwrap();
        assert_eq!(fetched.to_string(), "aboth/abov11 U 33.0 [(0, 11.0), (2, 22.0)]");
        assert_eq!(fetched.shard(), dataset.shard("aboth", "abov11"));
    }

    #[test]
    fn test_resave_updates() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        let mut a = group.create("ns", "x").unwrap();
        a.save().unwrap();
        a.set(5, 1.5).unwrap();
        a.save().unwrap();

        let fetched = group.fetch("ns", "x").unwrap();
        assert_eq!(fetched.total(), 1.5);
        assert_eq!(fetched.get(5), Some(1.5));
    }

    #[test]
    fn test_duplicate_new_save() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        let mut first = group.create("ns", "x").unwrap();
        first.set(0, 1.0).unwrap();
        first.save().unwrap();

        let mut second = group.create("ns", "x").unwrap();
        second.set(0, 9.0).unwrap();
        let err = second.save().unwrap_err();
        assert!(matches!(
            err,
            FragstoreError::Fragment(FragmentError::DuplicateKey { .. })
        ));
        assert_eq!(second.source(), FragmentSource::New);
        assert_eq!(group.fetch("ns", "x").unwrap().total(), 1.0);
    }

    #[test]
    fn test_read_only_rejects_save() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let store = MemoryStore::new();
        {
            let mut group = open_memory(&dataset, &store, true);
            group.close().unwrap();
        }

        let group = open_memory(&dataset, &store, false);
        let mut frag = group.create("ns", "x").unwrap();
        assert!(matches!(
            frag.save(),
            Err(FragstoreError::Group(GroupError::ReadOnly { .. }))
        ));
    }

    #[test]
    fn test_read_only_uninitialized() {
        let dataset = Dataset::new("/unused", 4).unwrap();
        let mut group = FragmentGroup::new(&dataset, january());
        let err = group
            .open_with_store(Box::new(MemoryStore::new()), false)
            .unwrap_err();
        assert!(matches!(err, FragstoreError::Group(GroupError::Uninitialized { .. })));
        assert_eq!(group.state(), GroupState::Unopened);
    }

    #[test]
    fn test_mismatch_on_open() {
        let store = MemoryStore::new();
        {
            let dataset = Dataset::new("/unused", 4).unwrap();
            let mut group = open_memory(&dataset, &store, true);
            group.close().unwrap();
        }

        let dataset = Dataset::new("/unused", 8).unwrap();
        let mut group = FragmentGroup::new(&dataset, january());
        let err = group
            .open_with_store(Box::new(store.clone()), true)
            .unwrap_err();
        assert!(err.is_metadata_mismatch());
        assert_eq!(group.state(), GroupState::Unopened);

        store.tamper_metadata("compression", Some("sparse"));
        let dataset = Dataset::new("/unused", 4).unwrap();
        let mut group = FragmentGroup::new(&dataset, january());
        assert!(matches!(
            group.open_with_store(Box::new(store), true),
            Err(FragstoreError::Group(GroupError::MetadataKeySetMismatch { .. }))
        ));
    }

    #[test]
    fn test_fetch_rejects_wrong_length() {
        let dataset = Dataset::new("/unused", 1).unwrap();
        let store = MemoryStore::new();
        let group = open_memory(&dataset, &store, true);

        store
            .insert(
                0,
                &StoredRow {
                    namespace: "ns".to_string(),
                    name: "short".to_string(),
                    dtype: "f".to_string(),
                    total: 0.0,
                    data: vec![0u8; 8],
                },
            )
            .unwrap();
        assert!(matches!(
            group.fetch("ns", "short"),
            Err(FragstoreError::Fragment(FragmentError::CorruptRow { .. }))
        ));
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let dataset = Dataset::new("/unused", 2).unwrap();
        let store = MemoryStore::new();
        let mut group = open_memory(&dataset, &store, true);

        group.begin().unwrap();
        group.create("ns", "x").unwrap().save().unwrap();
        group.close().unwrap();

        let group = open_memory(&dataset, &store, false);
        assert!(group.fetch("ns", "x").unwrap_err().is_not_found());
        assert!(matches!(
            group.commit(),
            Err(FragstoreError::Store(StoreError::Transaction { .. }))
        ));
    }

    #[test]
    fn test_fetch_all_orders_by_identity() {
        let dataset = Dataset::new("/unused", 1).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        for name in ["c", "a", "b"] {
            group.create("ns", name).unwrap().save().unwrap();
        }
        let names: Vec<String> = group
            .fetch_all(0)
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compressible_threshold() {
        let dataset = Dataset::new("/unused", 2).unwrap();
        let group = open_memory(&dataset, &MemoryStore::new(), true);

        let mut low = group.create("ns", "low").unwrap();
        low.set(0, 2.0).unwrap();
        low.save().unwrap();
        assert!(low.is_compressible());

        let mut high = group.create("ns", "high").unwrap();
        high.set(0, 2.5).unwrap();
        high.save().unwrap();
        assert!(!high.is_compressible());
    }
}
