/// Errors reported by [`HashTable`](crate::HashTable) and
/// [`HashMap`](crate::HashMap) operations.
///
/// None of these indicate lost data. An insertion that reports
/// [`CapacityExceeded`](TableError::CapacityExceeded) has still stored its
/// value; the table is simply running above its load threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Doubling the bucket array would exceed the configured maximum.
    #[error("cannot grow beyond {max} buckets (currently {buckets})")]
    CapacityExceeded {
        /// Bucket count at the time of the failed growth.
        buckets: usize,
        /// Configured maximum bucket count.
        max: usize,
    },
    /// The new bucket array could not be allocated. The previous array is
    /// still in use.
    #[error("failed to allocate a bucket array of {buckets} buckets")]
    AllocFailed {
        /// Bucket count that was requested.
        buckets: usize,
    },
    /// The table was structurally modified after the cursor was created.
    #[error("table was modified while a cursor was walking it")]
    ConcurrentModification,
}

/// Errors produced when validating a [`Config`](crate::Config).
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The load factor must be finite and strictly positive.
    #[error("load factor must be finite and positive, got {0}")]
    InvalidLoadFactor(f32),
    /// The maximum bucket count must be a non-zero power of two.
    #[error("maximum bucket count must be a non-zero power of two, got {0}")]
    InvalidMaxBuckets(usize),
    /// The initial bucket count rounds up past the maximum.
    #[error("initial bucket count {initial} exceeds the maximum of {max}")]
    InitialExceedsMax {
        /// Requested initial bucket count.
        initial: usize,
        /// Configured maximum bucket count.
        max: usize,
    },
}
