//! # fragstore
//!
//! Sharded, month-fragmented storage for large collections of hourly time
//! series.
//!
//! Series are identified by a `(namespace, name)` pair and partitioned two
//! ways: by a hash of their identity into a fixed number of **shards**, and
//! by calendar month into **fragments**. All fragments for one month live
//! together in a **fragment group**, one SQLite file per month, with one
//! table per shard.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Shard routing depends only on identity and shard count, never on time
//! - Each month's store records the configuration it was created under and
//!   refuses to open under any other
//! - Whole-row saves with a cached total per fragment
//! - Explicit, caller-scoped transactions for bulk loads; indexes are built
//!   once at close
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fragstore::{Dataset, Month};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = Dataset::new("./hourly", 4)?;
//! let mut jan = dataset.open_month(Month::new(2015, 1)?, true)?;
//!
//! jan.begin()?;
//! let mut a = jan.create("aboth", "abov11")?;
//! a.set(0, 11.0)?;
//! a.set(2, 22.0)?;
//! a.save()?;
//! jan.commit()?;
//!
//! let fetched = jan.fetch("aboth", "abov11")?;
//! assert_eq!(fetched.total(), 33.0);
//! println!("{fetched}"); // aboth/abov11 U 33.0 [(0, 11.0), (2, 22.0)]
//! drop((a, fetched));
//!
//! jan.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Dataset`] - Root directory plus shard count; opens months
//! - [`FragmentGroup`] - One month's store; create, fetch, transactions
//! - [`Fragment`] - One series in one month; mutate then `save`
//! - [`ShardStore`] - Backend capability ([`store::SqliteStore`], [`store::MemoryStore`])
//!
//! ## Modules
//!
//! - [`dataset`] - Dataset handle and month placement
//! - [`group`] - Fragment group lifecycle and metadata validation
//! - [`fragment`] - Fragments, element types and byte encoding
//! - [`store`] - Storage backends
//! - [`hash`] - Shard routing
//! - [`month`] - Month addressing
//! - [`config`] - Dataset configuration and tuning
//! - [`error`] - Error types

pub mod config;
pub mod dataset;
pub mod error;
pub mod fragment;
pub mod group;
pub mod hash;
pub mod month;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::DatasetConfig;
pub use dataset::Dataset;
pub use error::{FragstoreError, Result};
pub use fragment::{Dtype, Fragment, FragmentData, FragmentSource};
pub use group::{FragmentGroup, GroupMetadata, GroupState};
pub use hash::HashAlgorithm;
pub use month::Month;
pub use store::ShardStore;
