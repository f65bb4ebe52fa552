#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bucket;

/// Sizing constants and runtime table settings.
pub mod config;

mod error;

/// A key-value map built on [`HashTable`].
///
/// Keys are hashed once with the map's `BuildHasher`; everything else,
/// including collision handling, is delegated to the table.
pub mod hash_map;

/// The raw table: hash-addressed buckets that hold chains or trees.
///
/// Callers supply the hash and either an equality predicate or, for tables
/// with an order, a comparison for every operation.
pub mod hash_table;

#[cfg(test)]
mod proptests;

pub use bucket::BucketKind;
pub use config::Config;
pub use error::ConfigError;
pub use error::TableError;
pub use hash_map::Entry;
pub use hash_map::HashMap;
#[cfg(feature = "stats")]
pub use hash_table::BucketStats;
pub use hash_table::HashTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used when no other is named.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used when no other is named.
        pub type DefaultHashBuilder = std::hash::RandomState;
    }
}
