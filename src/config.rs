use crate::error::ConfigError;

/// Bucket count allocated on first insertion when no capacity was requested.
pub const DEFAULT_INITIAL_BUCKETS: usize = 1 << 4;

/// Ratio of live entries to buckets above which the table doubles.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Largest bucket count the table grows to unless configured otherwise.
pub const MAX_BUCKETS: usize = 1 << 30;

/// Chain length at which a bucket is converted to a tree.
pub const TREEIFY_THRESHOLD: usize = 8;

/// Tree size at or below which a bucket is converted back to a chain.
///
/// The gap to [`TREEIFY_THRESHOLD`] keeps a bucket from flipping between
/// representations under insert/remove churn.
pub const UNTREEIFY_THRESHOLD: usize = 6;

/// Smallest bucket count at which chains may become trees. Below it the
/// table grows instead.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// Runtime settings for a [`HashTable`](crate::HashTable).
///
/// # Examples
///
/// ```rust
/// use treebin_hash::Config;
///
/// let config = Config::default().initial_buckets(64).load_factor(0.5);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.threshold_for(64), 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub(crate) initial_buckets: usize,
    pub(crate) load_factor: f32,
    pub(crate) max_buckets: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_buckets: DEFAULT_INITIAL_BUCKETS,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_buckets: MAX_BUCKETS,
        }
    }
}

impl Config {
    /// Sets the bucket count used on first allocation. Rounded up to a power
    /// of two.
    pub fn initial_buckets(mut self, buckets: usize) -> Self {
        self.initial_buckets = buckets;
        self
    }

    /// Sets the load factor.
    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Sets the largest bucket count growth may reach. Must be a power of
    /// two.
    pub fn max_buckets(mut self, buckets: usize) -> Self {
        self.max_buckets = buckets;
        self
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if !self.max_buckets.is_power_of_two() {
            return Err(ConfigError::InvalidMaxBuckets(self.max_buckets));
        }
        if self.rounded_initial_buckets() > self.max_buckets {
            return Err(ConfigError::InitialExceedsMax {
                initial: self.initial_buckets,
                max: self.max_buckets,
            });
        }
        Ok(())
    }

    /// Returns `floor(buckets * load_factor)`.
    pub fn threshold_for(&self, buckets: usize) -> usize {
        let threshold = buckets as f64 * self.load_factor as f64;
        if threshold >= usize::MAX as f64 {
            usize::MAX
        } else {
            threshold as usize
        }
    }

    /// Smallest power-of-two bucket count whose threshold holds `items`,
    /// clamped to `max_buckets`.
    pub(crate) fn buckets_for(&self, items: usize) -> usize {
        let wanted = (items as f64 / self.load_factor as f64).ceil();
        let wanted = if wanted >= self.max_buckets as f64 {
            self.max_buckets
        } else {
            (wanted as usize).max(1)
        };
        let mut buckets = wanted.next_power_of_two().min(self.max_buckets);
        while buckets < self.max_buckets && self.threshold_for(buckets) < items {
            buckets *= 2;
        }
        buckets
    }

    pub(crate) fn rounded_initial_buckets(&self) -> usize {
        self.initial_buckets
            .max(1)
            .checked_next_power_of_two()
            .unwrap_or(usize::MAX)
    }
}
