//! Shard routing for series identities.
//!
//! A series `(namespace, name)` is routed to a shard by hashing the string
//! `namespace/name` with a fixed, named, non-cryptographic 32-bit hash and
//! reducing it modulo the dataset's shard count. Routing depends only on the
//! identity and the shard count, never on time, so a series lands in the same
//! shard index in every fragment group of a dataset.
//!
//! The hash algorithm's name is recorded in each group's metadata; changing
//! the algorithm makes existing groups fail validation rather than silently
//! misrouting lookups.

use std::fmt;
use std::str::FromStr;

use crate::error::{FragmentError, Result};

/// Separator placed between namespace and name in the hash input.
pub const IDENTITY_SEPARATOR: char = '/';

const FNV1A_32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV1A_32_PRIME: u32 = 0x0100_0193;

/// Hash algorithms available for shard routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// 32-bit FNV-1a.
    #[default]
    Fnv1a32,
}

impl HashAlgorithm {
    /// Returns the name recorded in group metadata.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fnv1a32 => "fnv1a_32",
        }
    }

    /// Hashes `bytes` with this algorithm.
    #[inline]
    pub fn hash(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Fnv1a32 => fnv1a_32(bytes),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fnv1a_32" => Ok(Self::Fnv1a32),
            other => Err(format!("unknown hash algorithm '{other}'")),
        }
    }
}

/// 32-bit FNV-1a over `bytes`.
#[inline]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV1A_32_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV1A_32_PRIME)
    })
}

/// Checks that `(namespace, name)` is a usable series identity.
///
/// The namespace may not contain [`IDENTITY_SEPARATOR`]; otherwise
/// `("a/b", "c")` and `("a", "b/c")` would produce the same hash input.
///
/// # Errors
///
/// Returns [`FragmentError::InvalidIdentity`] if either part is empty or the
/// namespace contains the separator.
pub fn validate_identity(namespace: &str, name: &str) -> Result<()> {
    let reason = if namespace.is_empty() {
        Some("namespace is empty")
    } else if name.is_empty() {
        Some("name is empty")
    } else if namespace.contains(IDENTITY_SEPARATOR) {
        Some("namespace contains '/'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(FragmentError::InvalidIdentity {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

/// Computes the shard index of `(namespace, name)` in `[0, hashmod)`.
///
/// `hashmod` must be positive; [`crate::Dataset`] guarantees this for every
/// caller inside the crate.
pub fn shard_of(algorithm: HashAlgorithm, namespace: &str, name: &str, hashmod: u32) -> u32 {
    debug_assert!(hashmod > 0, "hashmod must be positive");
    let mut key = String::with_capacity(namespace.len() + name.len() + 1);
    key.push_str(namespace);
    key.push(IDENTITY_SEPARATOR);
    key.push_str(name);
    algorithm.hash(key.as_bytes()) % hashmod
}
