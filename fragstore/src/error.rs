//! Error types for the fragstore hourly time-series store.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all fragstore operations.
///
/// Each variant wraps the error enum of one concern so callers can match
/// coarsely (`FragstoreError::Group(_)`) or precisely
/// (`FragstoreError::Fragment(FragmentError::NotFound { .. })`).
#[derive(Error, Debug)]
pub enum FragstoreError {
    /// A calendar month failed validation before any I/O.
    #[error("month error: {0}")]
    Month(#[from] MonthError),

    /// Fragment group lifecycle or metadata validation failed.
    #[error("group error: {0}")]
    Group(#[from] GroupError),

    /// A fragment operation (fetch, save, element access) failed.
    #[error("fragment error: {0}")]
    Fragment(#[from] FragmentError),

    /// The underlying store reported a failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Dataset configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl FragstoreError {
    /// Returns true if this error means a fragment row does not exist.
    ///
    /// A stored all-zero series is not "not found"; only a missing row is.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Fragment(FragmentError::NotFound { .. }))
    }

    /// Returns true if this error is a metadata compatibility failure.
    pub fn is_metadata_mismatch(&self) -> bool {
        matches!(
            self,
            Self::Group(
                GroupError::MetadataMismatch { .. } | GroupError::MetadataKeySetMismatch { .. }
            )
        )
    }
}

/// Errors raised while validating a calendar month used to address a bucket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonthError {
    /// The timestamp is not in the UTC time zone (even at zero offset).
    #[error("time zone must be UTC, found a zone at offset {offset_seconds}s")]
    NonUtc {
        /// Offset from UTC in seconds.
        offset_seconds: i32,
    },

    /// The timestamp is not on the first day of its month.
    #[error("month must have day=1, not {day}")]
    NotFirstOfMonth {
        /// The offending day of month.
        day: u32,
    },

    /// Hour, minute, second or sub-second is non-zero.
    #[error("month must have all sub-day attributes equal to zero")]
    NonZeroSubDay,

    /// The year/month pair is not a representable calendar month.
    #[error("invalid calendar month {year}-{month:02}")]
    OutOfRange {
        /// The year.
        year: i32,
        /// The month number (expected 1..=12).
        month: u32,
    },

    /// A month string could not be parsed.
    #[error("cannot parse month '{input}': expected YYYY-MM or YYYY-MM-01")]
    Parse {
        /// The unparseable input.
        input: String,
    },
}

/// Errors about fragment group lifecycle and compatibility.
#[derive(Error, Debug)]
pub enum GroupError {
    /// Stored metadata has a different value than expected for a key.
    #[error("metadata mismatch at key {key}: expected {expected}, found {found}")]
    MetadataMismatch {
        /// The metadata key.
        key: String,
        /// Value derived from the dataset configuration.
        expected: String,
        /// Value found in the store.
        found: String,
    },

    /// Stored metadata has a different key set than expected.
    #[error("metadata mismatch: key sets differ (missing {missing:?}, unexpected {unexpected:?})")]
    MetadataKeySetMismatch {
        /// Expected keys absent from the store.
        missing: Vec<String>,
        /// Stored keys not in the expected set.
        unexpected: Vec<String>,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("cannot {operation} fragment group in state {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The group's current state.
        state: String,
    },

    /// A write was attempted on a group opened read-only.
    #[error("cannot {operation}: fragment group is read-only")]
    ReadOnly {
        /// The attempted operation.
        operation: &'static str,
    },

    /// A read-only open found no initialized bucket.
    #[error("fragment group at '{}' is not initialized", path.display())]
    Uninitialized {
        /// The bucket location.
        path: PathBuf,
    },
}

/// Errors about individual fragments.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// No row exists for this identity in its shard table.
    #[error("no such fragment {namespace}/{name} in shard {shard}")]
    NotFound {
        /// Series namespace.
        namespace: String,
        /// Series name.
        name: String,
        /// Shard index that was searched.
        shard: u32,
    },

    /// Inserting a new fragment collided with an existing row.
    #[error("fragment {namespace}/{name} already exists in shard {shard}")]
    DuplicateKey {
        /// Series namespace.
        namespace: String,
        /// Series name.
        name: String,
        /// Shard index of the collision.
        shard: u32,
    },

    /// The (namespace, name) pair is not a valid series identity.
    #[error("invalid series identity {namespace:?}/{name:?}: {reason}")]
    InvalidIdentity {
        /// Series namespace.
        namespace: String,
        /// Series name.
        name: String,
        /// Why the identity was rejected.
        reason: &'static str,
    },

    /// A stored row could not be decoded.
    #[error("corrupt row for {namespace}/{name}: {reason}")]
    CorruptRow {
        /// Series namespace.
        namespace: String,
        /// Series name.
        name: String,
        /// Description of the corruption.
        reason: String,
    },

    /// A dtype tag is not one of the known element types.
    #[error("unknown dtype tag '{tag}'")]
    UnknownDtype {
        /// The unrecognized tag.
        tag: String,
    },

    /// Element index is past the end of the fragment.
    #[error("index {index} out of bounds for fragment of length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The fragment length.
        length: usize,
    },
}

/// Errors from the storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The bucket directory could not be created or accessed.
    #[error("failed to access '{}': {source}", path.display())]
    DirectoryAccess {
        /// The path that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A shard table does not exist.
    #[error("no such shard table {shard}")]
    NoSuchShard {
        /// The requested shard index.
        shard: u32,
    },

    /// Transaction control was used out of order.
    #[error("transaction error: {reason}")]
    Transaction {
        /// Description of the misuse.
        reason: String,
    },
}

/// Errors about dataset configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The shard count must be positive.
    #[error("hashmod must be greater than zero")]
    InvalidHashmod,

    /// The zero-density threshold must be finite and non-negative.
    #[error("fragment_total_zmax must be finite and non-negative, got {value}")]
    InvalidZmax {
        /// The rejected threshold.
        value: f64,
    },

    /// The config file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Load {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::config::DatasetConfig`].
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<rusqlite::Error> for FragstoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(e))
    }
}

/// Type alias for `Result<T, FragstoreError>`.
pub type Result<T> = std::result::Result<T, FragstoreError>;
