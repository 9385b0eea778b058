//! Datasets: the top-level handle over a directory of fragment groups.
//!
//! A [`Dataset`] binds a root directory to a shard count. It does no I/O of
//! its own until a month is opened; each month lives in its own file,
//! `<root>/<tag>.db`, where the tag is the ISO-8601 date of the month's first
//! day.
//!
//! ```text
//! root/
//! ├── 2015-01-01.db    <- January 2015, shards data0..data{hashmod-1}
//! ├── 2015-02-01.db
//! └── ...
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use fragstore::{Dataset, Month};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = Dataset::new("./wiki-hourly", 4)?;
//! let mut jan = dataset.open_month(Month::new(2015, 1)?, true)?;
//!
//! jan.begin()?;
//! let mut views = jan.fetch_or_create("en", "Rust_(programming_language)")?;
//! views.set(0, 11.0)?;
//! views.save()?;
//! jan.commit()?;
//! drop(views);
//!
//! jan.close()?;
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};

use crate::config::DatasetConfig;
use crate::error::{Result, StoreError};
use crate::group::{FragmentGroup, GroupMetadata, expected_metadata};
use crate::hash::{HashAlgorithm, shard_of};
use crate::month::Month;
use crate::store::ShardStore;

/// Extension of fragment group files.
const GROUP_FILE_EXTENSION: &str = "db";

/// A collection of hourly series sharded by identity and fragmented by month.
///
/// Cheap to construct and clone; holds only configuration.
#[derive(Debug, Clone)]
pub struct Dataset {
    config: DatasetConfig,
    hash: HashAlgorithm,
}

impl Dataset {
    /// Creates a dataset at `root` with `hashmod` shards and default settings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConfigError::InvalidHashmod`] if `hashmod` is zero.
    pub fn new<P: Into<PathBuf>>(root: P, hashmod: u32) -> Result<Self> {
        Self::from_config(DatasetConfig::new(root, hashmod))
    }

    /// Creates a dataset from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::ConfigError`] if the configuration is invalid.
    pub fn from_config(config: DatasetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hash: HashAlgorithm::default(),
        })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Returns the shard count.
    pub fn hashmod(&self) -> u32 {
        self.config.hashmod
    }

    /// Returns the shard routing hash algorithm.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Returns the shard index of `(namespace, name)` in `[0, hashmod)`.
    ///
    /// Independent of time: the same series maps to the same shard index in
    /// every month.
    pub fn shard(&self, namespace: &str, name: &str) -> u32 {
        shard_of(self.hash, namespace, name, self.config.hashmod)
    }

    /// Returns the file holding `month`'s fragment group.
    pub fn group_path(&self, month: Month) -> PathBuf {
        self.config
            .root
            .join(format!("{}.{GROUP_FILE_EXTENSION}", month.tag()))
    }

    /// Returns the metadata a group for `month` must carry.
    pub fn expected_metadata(&self, month: Month) -> GroupMetadata {
        expected_metadata(
            self.hash,
            self.config.hashmod,
            self.config.fragment_total_zmax,
            month.hours(),
        )
    }

    /// Returns an unopened group for `month`.
    pub fn group(&self, month: Month) -> FragmentGroup {
        FragmentGroup::new(self, month)
    }

    /// Opens the fragment group for `month`.
    ///
    /// # Errors
    ///
    /// See [`FragmentGroup::open`].
    pub fn open_month(&self, month: Month, writeable: bool) -> Result<FragmentGroup> {
        let mut group = self.group(month);
        group.open(writeable)?;
        Ok(group)
    }

    /// Validates `start` as a month address, then opens that month.
    ///
    /// Validation happens before any file is touched.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::MonthError`] for a bad address, otherwise
    /// see [`FragmentGroup::open`].
    pub fn open_month_at<Tz: TimeZone + 'static>(
        &self,
        start: &DateTime<Tz>,
        writeable: bool,
    ) -> Result<FragmentGroup> {
        let month = Month::from_datetime(start)?;
        self.open_month(month, writeable)
    }

    /// Opens the fragment group for `month` on a caller-supplied store.
    ///
    /// # Errors
    ///
    /// See [`FragmentGroup::open_with_store`].
    pub fn open_month_with_store(
        &self,
        month: Month,
        store: Box<dyn ShardStore>,
        writeable: bool,
    ) -> Result<FragmentGroup> {
        let mut group = self.group(month);
        group.open_with_store(store, writeable)?;
        Ok(group)
    }

    /// Lists the tags of fragment groups present under the root, in order.
    ///
    /// Files whose stem is not a first-of-month date are ignored. A missing
    /// root yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DirectoryAccess`] if the root cannot be read.
    pub fn fragment_tags(&self) -> Result<Vec<String>> {
        let root = &self.config.root;
        if !root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(root).map_err(|source| StoreError::DirectoryAccess {
            path: root.clone(),
            source,
        })?;

        let mut tags = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::DirectoryAccess {
                    path: root.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(GROUP_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if NaiveDate::parse_from_str(stem, "%Y-%m-%d").is_ok_and(|d| d.day() == 1) {
                tags.push(stem.to_string());
            }
        }
        tags.sort();
        Ok(tags)
    }

    /// Returns the diagnostic form of every fragment stored for `month`,
    /// shard by shard.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be opened read-only or a row
    /// cannot be decoded.
    pub fn dump(&self, month: Month) -> Result<Vec<String>> {
        let mut group = self.open_month(month, false)?;
        let mut lines = Vec::new();
        for shard in 0..self.hashmod() {
            for fragment in group.fetch_all(shard)? {
                lines.push(fragment.to_string());
            }
        }
        group.close()?;
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, FragstoreError, MonthError};
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_new_does_no_io() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("never_created");
        let dataset = Dataset::new(&root, 4).unwrap();
        assert_eq!(dataset.hashmod(), 4);
        assert_eq!(dataset.root(), root);
        assert!(!root.exists());
    }

    #[test]
    fn test_zero_hashmod_rejected() {
        assert!(matches!(
            Dataset::new("/data", 0),
            Err(FragstoreError::Config(ConfigError::InvalidHashmod))
        ));
    }

    #[test]
    fn test_group_path_and_metadata() {
        let dataset = Dataset::new("/data/wiki", 4).unwrap();
        let jan = Month::new(2015, 1).unwrap();
        assert_eq!(dataset.group_path(jan), PathBuf::from("/data/wiki/2015-01-01.db"));

        let meta = dataset.expected_metadata(jan);
        assert_eq!(meta.length, 744);
        assert_eq!(meta.hashmod, 4);
        assert_eq!(meta.hash, HashAlgorithm::Fnv1a32);
    }

    #[test]
    fn test_shard_independent_of_month() {
        let dataset = Dataset::new("/unused", 7).unwrap();
        let jan = dataset
            .open_month_with_store(Month::new(2015, 1).unwrap(), Box::new(MemoryStore::new()), true)
            .unwrap();
        let feb = dataset
            .open_month_with_store(Month::new(2015, 2).unwrap(), Box::new(MemoryStore::new()), true)
            .unwrap();
        for name in ["a", "b", "c", "abov11"] {
            assert_eq!(jan.shard("aboth", name), feb.shard("aboth", name));
            assert_eq!(jan.shard("aboth", name), dataset.shard("aboth", name));
        }
    }

    #[test]
    fn test_open_month_at_validates_before_io() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ds");
        let dataset = Dataset::new(&root, 4).unwrap();

        let gmt1 = FixedOffset::east_opt(3600).unwrap();
        let gmt = FixedOffset::east_opt(0).unwrap();
        let bad = [
            dataset.open_month_at(&gmt1.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(), true),
            dataset.open_month_at(&gmt.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(), true),
            dataset.open_month_at(&Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 1).unwrap(), true),
            dataset.open_month_at(&Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).unwrap(), true),
        ];
        let kinds: Vec<MonthError> = bad
            .into_iter()
            .map(|r| match r {
                Err(FragstoreError::Month(e)) => e,
                other => panic!("expected month error, got {other:?}"),
            })
            .collect();
        assert!(matches!(kinds[0], MonthError::NonUtc { .. }));
        assert_eq!(kinds[1], MonthError::NonUtc { offset_seconds: 0 });
        assert_eq!(kinds[2], MonthError::NonZeroSubDay);
        assert_eq!(kinds[3], MonthError::NotFirstOfMonth { day: 2 });
        assert!(!root.exists());
    }

    #[test]
    fn test_fragment_tags() {
        let dir = tempdir().unwrap();
        let dataset = Dataset::new(dir.path(), 2).unwrap();
        assert!(dataset.fragment_tags().unwrap().is_empty());

        for month in [Month::new(2015, 2).unwrap(), Month::new(2015, 1).unwrap()] {
            dataset.open_month(month, true).unwrap().close().unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("2015-03-15.db"), "").unwrap();

        assert_eq!(dataset.fragment_tags().unwrap(), vec!["2015-01-01", "2015-02-01"]);
    }

    #[test]
    fn test_fragment_tags_missing_root() {
        let dataset = Dataset::new("/definitely/not/here", 2).unwrap();
        assert!(dataset.fragment_tags().unwrap().is_empty());
    }
}
