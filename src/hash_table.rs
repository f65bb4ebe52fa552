use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::bucket;
use crate::bucket::Bucket;
use crate::bucket::BucketKind;
use crate::bucket::Equivalent;
use crate::bucket::Lookup;
use crate::bucket::Order;
use crate::bucket::Ordered;
use crate::bucket::Position;
use crate::bucket::Slot;
use crate::config::Config;
use crate::config::MIN_TREEIFY_CAPACITY;
use crate::config::TREEIFY_THRESHOLD;
use crate::error::ConfigError;
use crate::error::TableError;

/// Folds the high half of the hash into the low half, which is all the
/// bucket mask sees.
#[inline(always)]
fn spread(hash: u64) -> u64 {
    hash ^ (hash >> 32)
}

/// Bucket-level statistics for a table.
///
/// Only compiled with the `stats` feature (or in tests).
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct BucketStats {
    /// Number of elements currently in the table
    pub populated: usize,
    /// Maximum load before the next resize
    pub capacity: usize,
    /// Length of the bucket array
    pub buckets: usize,
    /// Buckets holding at least one entry
    pub occupied_buckets: usize,
    /// Buckets stored as chains
    pub chain_buckets: usize,
    /// Buckets stored as trees
    pub tree_buckets: usize,
    /// Length of the longest chain
    pub longest_chain: usize,
    /// Entry count of the largest tree
    pub largest_tree: usize,
    /// Height of the tallest tree
    pub tallest_tree: usize,
    /// Entries per bucket (populated / buckets)
    pub load_factor: f64,
}

#[cfg(any(test, feature = "stats"))]
impl BucketStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Bucket Statistics ===");
        println!(
            "Population: {}/{} ({:.2} entries per bucket)",
            self.populated, self.capacity, self.load_factor
        );
        println!(
            "Buckets: {}/{} occupied ({} chains, {} trees)",
            self.occupied_buckets, self.buckets, self.chain_buckets, self.tree_buckets
        );
        println!("Longest chain: {}", self.longest_chain);
        println!(
            "Largest tree: {} entries, height {}",
            self.largest_tree, self.tallest_tree
        );
    }
}

/// A hash table that chains colliding entries and turns crowded buckets into
/// red-black trees.
///
/// `HashTable<V>` stores values of type `V`. Like other raw tables it does
/// not hash anything itself: every operation takes the value's hash and an
/// equality predicate. Hashes are spread (`h ^ (h >> 32)`) before they are
/// masked to a bucket index.
///
/// A bucket starts as a chain in insertion order. Once a chain reaches
/// [`TREEIFY_THRESHOLD`] entries it becomes a tree ordered by hash, provided
/// the table has at least [`MIN_TREEIFY_CAPACITY`] buckets; smaller tables
/// double instead. A tree that drops to
/// [`UNTREEIFY_THRESHOLD`](crate::config::UNTREEIFY_THRESHOLD) entries turns
/// back into a chain.
///
/// Lookups in a tree bucket descend by hash, so they stay logarithmic as long
/// as hashes differ. Entries whose full hashes are equal are kept in the
/// order given to [`with_order`](Self::with_order), and the comparator based
/// methods ([`find_by`](Self::find_by), [`entry_by`](Self::entry_by) and
/// friends) descend through them too. Without an order, equal hashes stay in
/// insertion order and a lookup has to scan that run with its predicate.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use siphasher::sip::SipHasher;
/// # use treebin_hash::hash_table::HashTable;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     treebin_hash::hash_table::Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     treebin_hash::hash_table::Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
/// ```
#[derive(Clone)]
pub struct HashTable<V> {
    buckets: Vec<Option<Bucket<V>>>,

    populated: usize,
    threshold: usize,
    generation: u64,

    order: Option<Order<V>>,
    config: Config,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;

        if self.buckets.is_empty() {
            return f
                .debug_struct("HashTable")
                .field("layout", &"unallocated")
                .field("populated", &self.populated)
                .field("capacity", &self.threshold)
                .finish();
        }

        let layout = self
            .buckets
            .chunks(16)
            .map(|row| {
                row.iter()
                    .map(|slot| match slot {
                        None => "...".to_string(),
                        Some(bucket) => match bucket.kind() {
                            BucketKind::Chain => format!("c{:02}", bucket.len()),
                            BucketKind::Tree => format!("t{:02}", bucket.len()),
                        },
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<String>>();

        f.debug_struct("HashTable")
            .field("layout", &layout)
            .field("populated", &self.populated)
            .field("capacity", &self.threshold)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table. Nothing is allocated until the first
    /// insertion, which allocates
    /// [`DEFAULT_INITIAL_BUCKETS`](crate::config::DEFAULT_INITIAL_BUCKETS)
    /// buckets.
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    fn from_config(config: Config) -> Self {
        Self {
            buckets: Vec::new(),
            populated: 0,
            threshold: 0,
            generation: 0,
            order: None,
            config,
        }
    }

    /// Creates a table that can hold at least `capacity` items without
    /// resizing.
    ///
    /// A capacity of zero allocates nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// assert_eq!(table.bucket_count(), 256);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let mut table = Self::new();
        if capacity > 0 {
            table.allocate(table.config.buckets_for(capacity));
        }
        table
    }

    /// Creates an empty table with custom settings.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::Config;
    /// # use treebin_hash::ConfigError;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<u64> =
    ///     HashTable::with_config(Config::default().load_factor(0.5).max_buckets(1 << 10))?;
    /// assert!(table.is_empty());
    ///
    /// let rejected = HashTable::<u64>::with_config(Config::default().load_factor(0.0));
    /// assert!(matches!(rejected, Err(ConfigError::InvalidLoadFactor(_))));
    /// # Ok::<(), ConfigError>(())
    /// ```
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    /// Sets the order used for values with equal hashes inside tree buckets.
    ///
    /// `order` must be a total order that agrees with the equality the
    /// lookups use. Trees that already exist are re-sorted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> =
    ///     HashTable::with_capacity(48).with_order(|a: &u64, b: &u64| a.cmp(b));
    /// for n in 0..100u64 {
    ///     // Every value shares one hash.
    ///     table.entry_by(7, |v| n.cmp(v)).or_insert(n);
    /// }
    /// assert_eq!(table.find_by(7, |v| 42u64.cmp(v)), Some(&42));
    /// assert_eq!(table.find_by(7, |v| 420u64.cmp(v)), None);
    /// ```
    pub fn with_order(mut self, order: fn(&V, &V) -> Ordering) -> Self {
        self.order = Some(order);
        let mut reordered = false;
        for bucket in self.buckets.iter_mut().flatten() {
            reordered |= bucket.kind() == BucketKind::Tree;
            bucket.reorder(Some(order));
        }
        if reordered {
            self.generation = self.generation.wrapping_add(1);
        }
        self
    }

    fn comparing<F: Fn(&V) -> Ordering>(&self, cmp: F) -> Ordered<F> {
        Ordered {
            cmp,
            descend: self.order.is_some(),
        }
    }

    fn allocate(&mut self, buckets: usize) {
        debug_assert!(buckets.is_power_of_two());
        self.buckets.clear();
        self.buckets.resize_with(buckets, || None);
        self.threshold = self.config.threshold_for(buckets);
        self.generation = self.generation.wrapping_add(1);
    }

    #[inline(always)]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash & (self.buckets.len() as u64 - 1)) as usize
    }

    fn locate(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<(usize, Position)> {
        if self.populated == 0 {
            return None;
        }

        let index = self.bucket_index(hash);
        let position = self.buckets[index].as_ref()?.locate(hash, lookup)?;
        Some((index, position))
    }

    fn value(&self, index: usize, position: Position) -> &V {
        match self.buckets[index]
            .as_ref()
            .and_then(|bucket| bucket.get(position))
        {
            Some(value) => value,
            None => unreachable!("stale position {position:?} in bucket {index}"),
        }
    }

    fn value_mut(&mut self, index: usize, position: Position) -> &mut V {
        match self.buckets[index]
            .as_mut()
            .and_then(|bucket| bucket.get_mut(position))
        {
            Some(value) => value,
            None => unreachable!("stale position {position:?} in bucket {index}"),
        }
    }

    /// Returns an iterator over all values in the table.
    ///
    /// Buckets are visited in index order. Within a chain bucket values come
    /// in insertion order, within a tree bucket in hash order and then in the
    /// table's order, if it has one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use siphasher::sip::SipHasher;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// table
    ///     .entry(hash_str("key1"), |s: &String| s == "key1")
    ///     .or_insert("key1".to_string());
    /// table
    ///     .entry(hash_str("key2"), |s: &String| s == "key2")
    ///     .or_insert("key2".to_string());
    ///
    /// assert_eq!(table.iter().count(), 2);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            current: None,
            remaining: self.populated,
        }
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// The bucket array is kept. Values not consumed by the iterator are
    /// dropped when it is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(7, |&v: &u64| v == 7).or_insert(7);
    /// table.entry(9, |&v: &u64| v == 9).or_insert(9);
    ///
    /// let mut values: Vec<u64> = table.drain().collect();
    /// values.sort();
    /// assert_eq!(values, vec![7, 9]);
    /// assert!(table.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V> {
        self.generation = self.generation.wrapping_add(1);
        Drain {
            table: self,
            index: 0,
            current: Vec::new().into_iter(),
        }
    }

    /// Returns a cursor that walks the table without borrowing it and fails
    /// once the table is structurally modified.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::TableError;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.insert_unique(1, 1u64);
    /// table.insert_unique(2, 2u64);
    ///
    /// let mut cursor = table.cursor();
    /// assert!(cursor.next(&table).unwrap().is_some());
    ///
    /// table.insert_unique(3, 3u64);
    /// assert_eq!(cursor.next(&table), Err(TableError::ConcurrentModification));
    /// ```
    pub fn cursor(&self) -> Cursor {
        Cursor {
            generation: self.generation,
            index: 0,
            last: None,
        }
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of elements in the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// assert_eq!(table.len(), 0);
    ///
    /// table.entry(1, |&n: &u64| n == 1).or_insert(1);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of elements the table can hold before it doubles.
    ///
    /// This is `floor(bucket_count * load_factor)`, zero for a table that has
    /// not allocated yet.
    pub fn capacity(&self) -> usize {
        self.threshold
    }

    /// Returns the length of the bucket array. Always zero or a power of two.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Removes all elements from the table, keeping the bucket array.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(1, |&n: &u64| n == 1).or_insert(1);
    /// table.entry(2, |&n: &u64| n == 2).or_insert(2);
    /// let capacity = table.capacity();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        self.buckets.fill_with(|| None);
        self.populated = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Keeps only the values for which `f` returns `true`.
    ///
    /// Tree buckets that fall to
    /// [`UNTREEIFY_THRESHOLD`](crate::config::UNTREEIFY_THRESHOLD) entries or
    /// fewer become chains.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// for n in 0..10u64 {
    ///     table.insert_unique(n, n);
    /// }
    /// table.retain(|n| *n % 2 == 0);
    /// assert_eq!(table.len(), 5);
    /// assert!(table.find(3, |&n| n == 3).is_none());
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        let mut removed = 0;
        for slot in &mut self.buckets {
            if let Some(bucket) = slot {
                removed += bucket.retain(&mut f);
                if bucket.is_empty() {
                    *slot = None;
                }
            }
        }

        if removed > 0 {
            self.populated -= removed;
            self.generation = self.generation.wrapping_add(1);
        }
    }

    /// Shrinks the bucket array to the smallest size whose capacity holds the
    /// current elements.
    ///
    /// An empty table releases its bucket array entirely.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treebin_hash::HashTable;
    ///
    /// let mut table: HashTable<i32> = HashTable::with_capacity(1000);
    /// assert!(table.capacity() >= 1000);
    ///
    /// table.entry(42, |&v| v == 5).or_insert(5);
    /// table.entry(123, |&v| v == 10).or_insert(10);
    ///
    /// table.shrink_to_fit();
    /// assert!(table.capacity() < 1000);
    /// assert!(table.capacity() >= 2);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        if self.populated == 0 {
            self.buckets = Vec::new();
            self.threshold = 0;
            self.generation = self.generation.wrapping_add(1);
            return;
        }

        let wanted = self.config.buckets_for(self.populated);
        if wanted < self.buckets.len() {
            // Keep the current array if the smaller one cannot be allocated.
            let _ = self.rebuild(wanted);
        }
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// Stops short silently if the configured maximum bucket count or the
    /// allocator does not allow it; use [`try_reserve`](Self::try_reserve)
    /// to observe that.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::with_capacity(12);
    /// for i in 0..12u64 {
    ///     table.entry(i, |&n| n == i).or_insert(i);
    /// }
    ///
    /// table.reserve(50);
    /// assert!(table.capacity() >= 62);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        let _ = self.try_reserve(additional);
    }

    /// Reserves capacity for at least `additional` more elements, reporting
    /// why it could not.
    ///
    /// The table grows by doubling, so chains keep their relative order. On
    /// error the table may still have grown part of the way.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TableError> {
        let required = self.populated.saturating_add(additional);
        if required <= self.threshold {
            return Ok(());
        }

        let wanted = self.config.buckets_for(required);
        if self.buckets.is_empty() {
            self.allocate(wanted);
        }
        while self.buckets.len() < wanted {
            self.double()?;
        }

        if self.threshold < required {
            return Err(TableError::CapacityExceeded {
                buckets: self.buckets.len(),
                max: self.config.max_buckets,
            });
        }
        Ok(())
    }

    /// Doubles the bucket array, splitting every bucket between its old index
    /// and `index + old_bucket_count`.
    ///
    /// An unallocated table allocates its initial buckets instead. The table
    /// is left untouched on error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::Config;
    /// # use treebin_hash::TableError;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> =
    ///     HashTable::with_config(Config::default().max_buckets(32)).unwrap();
    /// table.grow().unwrap();
    /// assert_eq!(table.bucket_count(), 16);
    /// table.grow().unwrap();
    /// assert_eq!(table.bucket_count(), 32);
    /// assert_eq!(
    ///     table.grow(),
    ///     Err(TableError::CapacityExceeded {
    ///         buckets: 32,
    ///         max: 32
    ///     })
    /// );
    /// ```
    pub fn grow(&mut self) -> Result<(), TableError> {
        if self.buckets.is_empty() {
            self.allocate(self.config.rounded_initial_buckets());
            return Ok(());
        }
        self.double()
    }

    fn double(&mut self) -> Result<(), TableError> {
        let old_len = self.buckets.len();
        let max = self.config.max_buckets;
        if old_len > max / 2 {
            return Err(TableError::CapacityExceeded {
                buckets: old_len,
                max,
            });
        }

        let new_len = old_len * 2;
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(new_len)
            .map_err(|_| TableError::AllocFailed { buckets: new_len })?;
        buckets.resize_with(new_len, || None);

        let bit = old_len as u64;
        for (index, slot) in core::mem::take(&mut self.buckets).into_iter().enumerate() {
            if let Some(bucket) = slot {
                let (low, high) = bucket.split(bit);
                buckets[index] = low;
                buckets[index + old_len] = high;
            }
        }

        self.buckets = buckets;
        self.threshold = self.config.threshold_for(new_len);
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Moves every entry into a fresh array of `new_len` buckets.
    fn rebuild(&mut self, new_len: usize) -> Result<(), TableError> {
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(new_len)
            .map_err(|_| TableError::AllocFailed { buckets: new_len })?;
        buckets.resize_with(new_len, || None);

        let old = core::mem::replace(&mut self.buckets, buckets);
        for bucket in old.into_iter().flatten() {
            for Slot { hash, value } in bucket.into_slots() {
                let index = self.bucket_index(hash);
                self.place(index, hash, value);
            }
        }

        self.threshold = self.config.threshold_for(new_len);
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Stores an absent entry in bucket `index`, converting the bucket to a
    /// tree once it is long enough and the table is large enough.
    fn place(&mut self, index: usize, hash: u64, value: V) -> Position {
        let can_treeify = self.buckets.len() >= MIN_TREEIFY_CAPACITY;
        let order = self.order;
        if let Some(bucket) = &mut self.buckets[index] {
            let position = bucket.insert(hash, value, order);
            if can_treeify
                && bucket.kind() == BucketKind::Chain
                && bucket.len() >= TREEIFY_THRESHOLD
            {
                return bucket.treeify(position, order);
            }
            return position;
        }

        self.buckets[index] = Some(Bucket::single(hash, value));
        Position::Chain(0)
    }

    /// Makes room for one more entry with the given (spread) hash.
    ///
    /// Growth failures are returned but never prevent the insertion.
    fn prepare_insert(&mut self, hash: u64) -> Result<(), TableError> {
        if self.buckets.is_empty() {
            self.allocate(self.config.rounded_initial_buckets());
        }

        let mut outcome = Ok(());
        if self.populated + 1 > self.threshold {
            outcome = self.double();
        }

        // Below MIN_TREEIFY_CAPACITY a crowded chain is a sign of a small
        // table, not of bad hashes.
        let len = self.buckets.len();
        if len < MIN_TREEIFY_CAPACITY && len <= self.config.max_buckets / 2 {
            let index = self.bucket_index(hash);
            let crowded = self.buckets[index]
                .as_ref()
                .is_some_and(|bucket| bucket.len() + 1 >= TREEIFY_THRESHOLD);
            if crowded {
                let grown = self.double();
                if outcome.is_ok() {
                    outcome = grown;
                }
            }
        }

        outcome
    }

    fn insert_new(&mut self, hash: u64, value: V) -> (&mut V, Result<(), TableError>) {
        let outcome = self.prepare_insert(hash);
        let index = self.bucket_index(hash);
        let position = self.place(index, hash, value);
        self.populated += 1;
        self.generation = self.generation.wrapping_add(1);
        (self.value_mut(index, position), outcome)
    }

    /// Inserts a value that is known not to be in the table, without looking
    /// for an existing match.
    ///
    /// Inserting a duplicate this way leaves both copies in the table.
    pub fn insert_unique(&mut self, hash: u64, value: V) -> &mut V {
        self.insert_new(spread(hash), value).0
    }

    /// Like [`insert_unique`](Self::insert_unique), but reports a failed
    /// resize.
    ///
    /// The value is stored even when an error is returned; the table then
    /// runs above its load threshold.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::Config;
    /// # use treebin_hash::TableError;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> =
    ///     HashTable::with_config(Config::default().max_buckets(16)).unwrap();
    /// for n in 0..12u64 {
    ///     assert!(table.try_insert_unique(n, n).is_ok());
    /// }
    ///
    /// let err = table.try_insert_unique(12, 12).unwrap_err();
    /// assert_eq!(err, TableError::CapacityExceeded { buckets: 16, max: 16 });
    /// assert_eq!(table.find(12, |&n| n == 12), Some(&12));
    /// ```
    pub fn try_insert_unique(&mut self, hash: u64, value: V) -> Result<(), TableError> {
        self.insert_new(spread(hash), value).1
    }

    /// Removes and returns the value matching `hash` and `eq`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use siphasher::sip::SipHasher;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(hash_u64(42), |&n: &u64| n == 42).or_insert(42);
    ///
    /// let removed = table.remove(hash_u64(42), |&n| n == 42);
    /// assert_eq!(removed, Some(42));
    /// assert!(table.is_empty());
    ///
    /// let not_found = table.remove(hash_u64(99), |&n| n == 99);
    /// assert_eq!(not_found, None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let (index, position) = self.locate(spread(hash), &Equivalent(eq))?;
        self.remove_at(index, position)
    }

    /// Removes and returns the value for which `cmp` returns
    /// [`Ordering::Equal`].
    ///
    /// `cmp` compares the sought value against a stored one, consistently
    /// with the order given to [`with_order`](Self::with_order).
    pub fn remove_by(&mut self, hash: u64, cmp: impl Fn(&V) -> Ordering) -> Option<V> {
        let (index, position) = self.locate(spread(hash), &self.comparing(cmp))?;
        self.remove_at(index, position)
    }

    fn remove_at(&mut self, index: usize, position: Position) -> Option<V> {
        let slot = &mut self.buckets[index];
        let value = slot.as_mut()?.remove(position)?;
        if slot.as_ref().is_some_and(Bucket::is_empty) {
            *slot = None;
        }

        self.populated -= 1;
        self.generation = self.generation.wrapping_add(1);
        Some(value)
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use siphasher::sip::SipHasher;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// let hash = hash_str("hello");
    ///
    /// match table.entry(hash, |s: &String| s == "hello") {
    ///     treebin_hash::hash_table::Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     treebin_hash::hash_table::Entry::Occupied(_) => {
    ///         unreachable!("the table starts empty");
    ///     }
    /// }
    ///
    /// let stored = table
    ///     .entry(hash, |s: &String| s == "hello")
    ///     .or_insert("ignored".to_string());
    /// assert_eq!(stored, "hello");
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        let hash = spread(hash);
        let found = self.locate(hash, &Equivalent(eq));
        self.entry_at(hash, found)
    }

    /// Gets an entry for the value for which `cmp` returns
    /// [`Ordering::Equal`].
    ///
    /// `cmp` compares the sought value against a stored one, consistently
    /// with the order given to [`with_order`](Self::with_order). In a table
    /// without an order it only decides equality.
    pub fn entry_by(&mut self, hash: u64, cmp: impl Fn(&V) -> Ordering) -> Entry<'_, V> {
        let hash = spread(hash);
        let found = self.locate(hash, &self.comparing(cmp));
        self.entry_at(hash, found)
    }

    fn entry_at(&mut self, hash: u64, found: Option<(usize, Position)>) -> Entry<'_, V> {
        match found {
            Some((index, position)) => Entry::Occupied(OccupiedEntry {
                table: self,
                index,
                position,
            }),
            None => Entry::Vacant(VacantEntry { table: self, hash }),
        }
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.find(42, |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(99, |&n| n == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        self.find_with(hash, &Equivalent(eq))
    }

    /// Finds the value for which `cmp` returns [`Ordering::Equal`].
    ///
    /// `cmp` compares the sought value against a stored one, consistently
    /// with the order given to [`with_order`](Self::with_order).
    #[inline]
    pub fn find_by(&self, hash: u64, cmp: impl Fn(&V) -> Ordering) -> Option<&V> {
        self.find_with(hash, &self.comparing(cmp))
    }

    fn find_with(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        let hash = spread(hash);
        self.buckets[self.bucket_index(hash)]
            .as_ref()?
            .find(hash, lookup)
    }

    /// Finds a value by hash and equality predicate, returning a mutable
    /// reference.
    ///
    /// Changing the parts of the value that `eq` or the hash depend on leaves
    /// the value unreachable.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        self.find_mut_with(hash, &Equivalent(eq))
    }

    /// Mutable counterpart of [`find_by`](Self::find_by).
    #[inline]
    pub fn find_mut_by(&mut self, hash: u64, cmp: impl Fn(&V) -> Ordering) -> Option<&mut V> {
        let lookup = self.comparing(cmp);
        self.find_mut_with(hash, &lookup)
    }

    fn find_mut_with(&mut self, hash: u64, lookup: &impl Lookup<V>) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let hash = spread(hash);
        let index = self.bucket_index(hash);
        self.buckets[index].as_mut()?.find_mut(hash, lookup)
    }

    /// Returns bucket-level statistics.
    ///
    /// Requires the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn bucket_stats(&self) -> BucketStats {
        let mut stats = BucketStats {
            populated: self.populated,
            capacity: self.threshold,
            buckets: self.buckets.len(),
            occupied_buckets: 0,
            chain_buckets: 0,
            tree_buckets: 0,
            longest_chain: 0,
            largest_tree: 0,
            tallest_tree: 0,
            load_factor: if self.buckets.is_empty() {
                0.0
            } else {
                self.populated as f64 / self.buckets.len() as f64
            },
        };

        for bucket in self.buckets.iter().flatten() {
            stats.occupied_buckets += 1;
            match bucket.kind() {
                BucketKind::Chain => {
                    stats.chain_buckets += 1;
                    stats.longest_chain = stats.longest_chain.max(bucket.len());
                }
                BucketKind::Tree => {
                    stats.tree_buckets += 1;
                    stats.largest_tree = stats.largest_tree.max(bucket.len());
                    stats.tallest_tree = stats.tallest_tree.max(bucket.tree_height());
                }
            }
        }

        stats
    }

    /// Returns the representation of the bucket at `index`, or `None` if it
    /// is empty or out of range.
    ///
    /// Requires the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn bucket_kind(&self, index: usize) -> Option<BucketKind> {
        self.buckets.get(index)?.as_ref().map(Bucket::kind)
    }

    /// Returns the number of entries in the bucket at `index`.
    ///
    /// Requires the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn bucket_len(&self, index: usize) -> usize {
        self.buckets
            .get(index)
            .and_then(Option::as_ref)
            .map_or(0, Bucket::len)
    }

    /// Computes a histogram of bucket lengths.
    ///
    /// Index `i` counts the buckets holding `i` entries, for `i` below
    /// [`TREEIFY_THRESHOLD`]. The last index counts every bucket holding
    /// [`TREEIFY_THRESHOLD`] entries or more.
    ///
    /// Requires the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn bucket_histogram(&self) -> Vec<usize> {
        let mut hist = alloc::vec![0usize; TREEIFY_THRESHOLD + 1];
        for slot in &self.buckets {
            let len = slot.as_ref().map_or(0, Bucket::len);
            hist[len.min(TREEIFY_THRESHOLD)] += 1;
        }
        hist
    }

    /// Pretty-prints the bucket length histogram as a horizontal bar chart.
    ///
    /// Requires the `stats` and `std` features.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_bucket_histogram(&self) {
        let hist = self.bucket_histogram();
        let max = hist.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("bucket histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "bucket histogram ({} entries, {} buckets):",
            self.populated,
            self.buckets.len()
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                7 => Some('▉'),
                _ => None,
            };
            bar.extend(partial);
            bar
        };

        for (len, &count) in hist.iter().enumerate() {
            let label = if len == TREEIFY_THRESHOLD {
                alloc::format!("{len}+")
            } else {
                alloc::format!("{len:>2}")
            };
            println!("{} | {} ({})", label, make_bar(count), count);
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use crate::config::UNTREEIFY_THRESHOLD;

        if self.buckets.is_empty() {
            assert_eq!(self.populated, 0);
            return;
        }

        assert!(self.buckets.len().is_power_of_two());
        assert!(self.buckets.len() <= self.config.max_buckets);
        assert_eq!(self.threshold, self.config.threshold_for(self.buckets.len()));

        let mut counted = 0;
        for (index, slot) in self.buckets.iter().enumerate() {
            let Some(bucket) = slot else {
                continue;
            };
            assert!(!bucket.is_empty(), "empty bucket left at {index}");
            if bucket.kind() == BucketKind::Tree {
                assert!(self.buckets.len() >= MIN_TREEIFY_CAPACITY);
                assert!(bucket.len() > UNTREEIFY_THRESHOLD);
            }
            bucket.check_invariants(self.order);
            for hash in bucket.hashes() {
                assert_eq!(self.bucket_index(hash), index, "entry in wrong bucket");
            }
            counted += bucket.len();
        }
        assert_eq!(counted, self.populated);
    }
}

/// A view into a single entry in the table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
///
/// # Examples
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use siphasher::sip::SipHasher;
/// # use treebin_hash::hash_table::Entry;
/// # use treebin_hash::hash_table::HashTable;
/// #
/// # fn hash_str(s: &str) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     s.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_str("key");
///
/// match table.entry(hash, |s: &String| s == "key") {
///     Entry::Vacant(entry) => {
///         entry.insert("value".to_string());
///     }
///     Entry::Occupied(entry) => {
///         println!("Key already exists with value: {}", entry.get());
///     }
/// }
/// ```
pub enum Entry<'a, V> {
    /// A vacant entry - no value matched
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry - a value matched
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value in the entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    ///
    /// let value = table.entry(5, |s: &String| s == "key").or_insert("key".to_string());
    /// assert_eq!(value, "key");
    ///
    /// let existing = table.entry(5, |s: &String| s == "key").or_insert("other".to_string());
    /// assert_eq!(existing, "key");
    /// ```
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the value in the entry.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to an occupied entry's value and returns it. Returns
    /// `None` for a vacant entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value in the entry.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when no
/// value matched.
///
/// [`entry`]: HashTable::entry
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts a value into the vacant entry and returns a mutable reference
    /// to it.
    ///
    /// The table grows first if the insertion would put it over capacity, or
    /// if the target chain is about to become long while the table is still
    /// small. A growth failure is ignored; see
    /// [`try_insert`](Self::try_insert).
    pub fn insert(self, value: V) -> &'a mut V {
        let VacantEntry { table, hash } = self;
        table.insert_new(hash, value).0
    }

    /// Inserts a value into the vacant entry, reporting a failed resize.
    ///
    /// The value is stored either way.
    pub fn try_insert(self, value: V) -> Result<&'a mut V, TableError> {
        let VacantEntry { table, hash } = self;
        let (value, outcome) = table.insert_new(hash, value);
        outcome.map(|()| value)
    }
}

/// A view into an occupied entry in the table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when a
/// value matched.
///
/// [`entry`]: HashTable::entry
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
    position: Position,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        self.table.value(self.index, self.position)
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        self.table.value_mut(self.index, self.position)
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the table borrow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use treebin_hash::hash_table::Entry;
    /// # use treebin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(3, |s: &String| s == "key").or_insert("key".to_string());
    ///
    /// let value_ref = match table.entry(3, |s: &String| s == "key") {
    ///     Entry::Occupied(entry) => entry.into_mut(),
    ///     Entry::Vacant(_) => unreachable!(),
    /// };
    /// *value_ref = "new_value".to_string();
    /// assert_eq!(table.find(3, |s| s == "new_value").map(String::as_str), Some("new_value"));
    /// ```
    pub fn into_mut(self) -> &'a mut V {
        let OccupiedEntry {
            table,
            index,
            position,
        } = self;
        table.value_mut(index, position)
    }

    /// Removes the entry from the table and returns the value.
    pub fn remove(self) -> V {
        match self.table.remove_at(self.index, self.position) {
            Some(value) => value,
            None => unreachable!("occupied entry without a value"),
        }
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V> {
    buckets: core::slice::Iter<'a, Option<Bucket<V>>>,
    current: Option<bucket::Iter<'a, V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(value);
            }
            self.current = self.buckets.next()?.as_ref().map(Bucket::iter);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`]. The
/// table is empty once the iterator is dropped.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
    current: alloc::vec::IntoIter<Slot<V>>,
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<'a, V> Iterator for Drain<'a, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.current.next() {
                self.table.populated -= 1;
                return Some(slot.value);
            }

            let next = self.table.buckets.get_mut(self.index)?;
            self.index += 1;
            if let Some(bucket) = next.take() {
                self.current = bucket.into_slots().into_iter();
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

/// A detached, fail-fast position in a [`HashTable`].
///
/// Created by [`HashTable::cursor`]. The cursor holds no borrow, so the
/// table may be modified between steps; the next step then reports
/// [`TableError::ConcurrentModification`]. Updating a value in place through
/// [`HashTable::find_mut`] is not a structural modification.
#[derive(Debug, Clone)]
pub struct Cursor {
    generation: u64,
    index: usize,
    last: Option<Position>,
}

impl Cursor {
    /// Advances the cursor and returns the next value, or `Ok(None)` once
    /// every value has been visited.
    pub fn next<'t, V>(&mut self, table: &'t HashTable<V>) -> Result<Option<&'t V>, TableError> {
        if table.generation != self.generation {
            return Err(TableError::ConcurrentModification);
        }

        while let Some(slot) = table.buckets.get(self.index) {
            if let Some((position, value)) =
                slot.as_ref().and_then(|bucket| bucket.next_after(self.last))
            {
                self.last = Some(position);
                return Ok(Some(value));
            }
            self.index += 1;
            self.last = None;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn item(key: u64) -> Item {
        Item {
            key,
            value: key as i32,
        }
    }

    /// Inserts `item(key)` under a caller-chosen raw hash. Hashes below
    /// 2^32 are left unchanged by `spread`, so they pick the bucket directly.
    fn insert_raw(table: &mut HashTable<Item>, hash: u64, key: u64) {
        match table.entry(hash, |v| v.key == key) {
            Entry::Vacant(v) => {
                v.insert(item(key));
            }
            Entry::Occupied(_) => panic!("unexpected occupied for {key}: {table:#?}"),
        }
        table.check_invariants();
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v: &Item| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: (k as i32) * 2,
                    });
                    assert_eq!(
                        table.find(hash, |v| v.key == k),
                        Some(&Item {
                            key: k,
                            value: (k as i32) * 2
                        }),
                        "{:#?}",
                        table
                    );
                }
                Entry::Occupied(_) => panic!("unexpected occupied on first insert: {:#?}", table),
            }
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                }),
                "{:#?}",
                table
            );
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |v| v.key == 999).is_none());
        table.check_invariants();
    }

    #[test]
    fn duplicate_entry_is_occupied() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        let k = 42u64;
        let hash = hash_key(&state, k);

        match table.entry(hash, |v| v.key == k) {
            Entry::Vacant(v) => {
                v.insert(Item { key: k, value: 7 });
            }
            Entry::Occupied(_) => panic!("should be vacant first time"),
        }

        match table.entry(hash, |v| v.key == k) {
            Entry::Occupied(mut occ) => {
                let prev_value = occ.get().value;
                *occ.get_mut() = Item { key: k, value: 11 };
                assert_eq!(prev_value, 7, "{:#?}", table);
            }
            Entry::Vacant(_) => panic!("should be occupied: {}#{:02X} in {:#?}", k, hash, table),
        }
        let found = table.find(hash, |v| v.key == k).unwrap();
        assert_eq!(found.value, 11);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item { key: k, value: 1 });
                }
                _ => unreachable!(),
            }
        }

        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            if let Some(v) = table.find_mut(hash, |v| v.key == k) {
                v.value += 9;
            }
        }
        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            let v = table.find(hash, |v| v.key == k).unwrap();
            assert_eq!(v.value, 10);
        }
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..8u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(item(k));
                }
                _ => unreachable!(),
            }
        }
        assert_eq!(table.len(), 8);
        for k in [0u64, 3, 7] {
            let hash = hash_key(&state, k);
            let removed = table.remove(hash, |v| v.key == k).expect("should remove");
            assert_eq!(removed.key, k);
        }
        assert_eq!(table.len(), 5);
        table.check_invariants();

        let hash = hash_key(&state, 1000);
        assert!(table.remove(hash, |v| v.key == 1000).is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..100000u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(item(k));
                    assert_eq!(table.find(hash, |v| v.key == k), Some(&item(k)));
                }
                _ => unreachable!(),
            }
        }

        assert_eq!(table.len(), 100000);
        for k in 0..100000u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k), Some(&item(k)));
        }
        assert!(table.len() <= table.capacity());
        table.check_invariants();
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<Item> = HashTable::new();
        let hash = 0;
        for k in 0..65u64 {
            insert_raw(&mut table, hash, k);
        }

        assert_eq!(table.len(), 65);
        assert_eq!(table.bucket_kind(0), Some(BucketKind::Tree));
        assert_eq!(table.bucket_len(0), 65);
        for k in 0..65u64 {
            assert_eq!(table.find(hash, |v| v.key == k), Some(&item(k)), "{:#?}", table);
        }

        for k in 0..60u64 {
            assert_eq!(table.remove(hash, |v| v.key == k), Some(item(k)));
            table.check_invariants();
        }
        assert_eq!(table.bucket_kind(0), Some(BucketKind::Chain));
        assert_eq!(table.bucket_len(0), 5);
    }

    #[test]
    fn grows_past_threshold() {
        let mut table: HashTable<Item> = HashTable::new();
        assert_eq!(table.bucket_count(), 0);
        assert_eq!(table.capacity(), 0);

        for k in 0..12u64 {
            insert_raw(&mut table, k, k);
        }
        assert_eq!(table.bucket_count(), 16);
        assert_eq!(table.capacity(), 12);

        insert_raw(&mut table, 12, 12);
        assert_eq!(table.bucket_count(), 32);
        assert_eq!(table.capacity(), 24);
        for k in 0..13u64 {
            assert_eq!(table.find(k, |v| v.key == k), Some(&item(k)));
        }
    }

    #[test]
    fn crowded_chain_treeifies_in_large_table() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        assert_eq!(table.bucket_count(), 64);

        for i in 0..7u64 {
            insert_raw(&mut table, 5 + 64 * i, i);
        }
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Chain));

        insert_raw(&mut table, 5 + 64 * 7, 7);
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));
        assert_eq!(table.bucket_count(), 64);

        assert_eq!(table.remove(5, |v| v.key == 0), Some(item(0)));
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));
        assert_eq!(table.remove(5 + 64, |v| v.key == 1), Some(item(1)));
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Chain));
        assert_eq!(table.bucket_len(5), 6);
        table.check_invariants();
    }

    #[test]
    fn crowded_chain_grows_small_table() {
        let mut table: HashTable<Item> = HashTable::new();
        for i in 0..7u64 {
            insert_raw(&mut table, 5 + 64 * i, i);
        }
        assert_eq!(table.bucket_count(), 16);

        insert_raw(&mut table, 5 + 64 * 7, 7);
        assert_eq!(table.bucket_count(), 32);
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Chain));
        assert_eq!(table.bucket_len(5), 8);

        insert_raw(&mut table, 5 + 64 * 8, 8);
        assert_eq!(table.bucket_count(), 64);
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn tree_splits_on_growth() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        for i in 0..16u64 {
            insert_raw(&mut table, 5 + 64 * i, i);
        }
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));

        table.grow().unwrap();
        table.check_invariants();
        assert_eq!(table.bucket_count(), 128);
        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));
        assert_eq!(table.bucket_kind(69), Some(BucketKind::Tree));
        assert_eq!(table.bucket_len(5), 8);
        assert_eq!(table.bucket_len(69), 8);

        let mut small: HashTable<Item> = HashTable::with_capacity(48);
        for i in 0..12u64 {
            insert_raw(&mut small, 5 + 64 * i, i);
        }
        small.grow().unwrap();
        small.check_invariants();
        assert_eq!(small.bucket_kind(5), Some(BucketKind::Chain));
        assert_eq!(small.bucket_kind(69), Some(BucketKind::Chain));
        for i in 0..12u64 {
            let hash = 5 + 64 * i;
            assert_eq!(small.find(hash, |v| v.key == i), Some(&item(i)));
        }
    }

    #[test]
    fn chain_order_survives_growth() {
        let mut table: HashTable<Item> = HashTable::new();
        for hash in [1u64, 17, 33, 49] {
            insert_raw(&mut table, hash, hash);
        }
        let keys = table.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(keys, vec![1, 17, 33, 49]);

        table.grow().unwrap();
        table.check_invariants();
        let keys = table.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(keys, vec![1, 33, 17, 49]);
    }

    #[test]
    fn capacity_exceeded_keeps_entries() {
        let mut table: HashTable<Item> =
            HashTable::with_config(Config::default().max_buckets(16)).unwrap();
        for k in 0..12u64 {
            assert_eq!(table.try_insert_unique(k, item(k)), Ok(()));
        }

        for k in 12..40u64 {
            assert_eq!(
                table.try_insert_unique(k, item(k)),
                Err(TableError::CapacityExceeded {
                    buckets: 16,
                    max: 16
                })
            );
        }
        table.check_invariants();
        assert_eq!(table.len(), 40);
        assert_eq!(table.bucket_count(), 16);
        assert_eq!(table.capacity(), 12);
        for k in 0..40u64 {
            assert_eq!(table.find(k, |v| v.key == k), Some(&item(k)));
        }
        assert!(table.try_reserve(100).is_err());
    }

    #[test]
    fn crowded_chain_at_max_buckets_stays_a_chain() {
        let mut table: HashTable<Item> =
            HashTable::with_config(Config::default().max_buckets(16)).unwrap();
        for k in 0..10u64 {
            let entry = table.entry(3, |v| v.key == k);
            match entry {
                Entry::Vacant(v) => assert!(v.try_insert(item(k)).is_ok()),
                Entry::Occupied(_) => unreachable!(),
            }
        }
        table.check_invariants();
        assert_eq!(table.bucket_kind(3), Some(BucketKind::Chain));
        assert_eq!(table.bucket_len(3), 10);
    }

    #[test]
    fn cursor_walks_every_value() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..100u64 {
            table.insert_unique(hash_key(&state, k), item(k));
        }
        for k in 0..20u64 {
            insert_raw(&mut table, 7, 1000 + k);
        }

        let mut cursor = table.cursor();
        let mut seen = Vec::new();
        while let Some(value) = cursor.next(&table).unwrap() {
            seen.push(value.key);
        }
        let iterated = table.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(seen, iterated);
        assert_eq!(seen.len(), 120);
        assert_eq!(cursor.next(&table), Ok(None));
    }

    #[test]
    fn cursor_detects_modification() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..4u64 {
            insert_raw(&mut table, k, k);
        }

        let mut cursor = table.cursor();
        assert!(cursor.next(&table).unwrap().is_some());

        if let Some(v) = table.find_mut(1, |v| v.key == 1) {
            v.value = 100;
        }
        assert!(cursor.next(&table).unwrap().is_some());

        table.remove(3, |v| v.key == 3);
        assert_eq!(cursor.next(&table), Err(TableError::ConcurrentModification));

        let mut cursor = table.cursor();
        insert_raw(&mut table, 9, 9);
        assert_eq!(cursor.next(&table), Err(TableError::ConcurrentModification));
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 10..20u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: (k as i32) + 1,
                    });
                }
                _ => unreachable!(),
            }
        }
        let collected: Vec<u64> = table.iter().map(|v| v.key).collect();
        assert_eq!(collected.len(), 10, "{:#?}", table);
        for k in 10..20u64 {
            assert!(collected.contains(&k));
        }

        let drained: Vec<Item> = table.drain().collect();
        assert_eq!(drained.len(), 10);
        assert_eq!(table.len(), 0);
        table.check_invariants();

        for k in 10..20u64 {
            let hash = hash_key(&state, k);
            assert!(table.find(hash, |v| v.key == k).is_none());
        }
    }

    #[test]
    fn partial_drain_empties_table() {
        let mut table: HashTable<Item> = HashTable::with_capacity(64);
        for k in 0..40u64 {
            insert_raw(&mut table, k % 4, k);
        }

        let first = table.drain().take(3).count();
        assert_eq!(first, 3);
        assert!(table.is_empty());
        table.check_invariants();
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn retain_untreeifies() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        for k in 0..20u64 {
            insert_raw(&mut table, 9, k);
        }
        for k in 0..20u64 {
            insert_raw(&mut table, 10 + k, 100 + k);
        }
        assert_eq!(table.bucket_kind(9), Some(BucketKind::Tree));

        table.retain(|v| v.key < 5 || v.key >= 110);
        table.check_invariants();
        assert_eq!(table.len(), 15);
        assert_eq!(table.bucket_kind(9), Some(BucketKind::Chain));
        assert_eq!(table.bucket_kind(10), None);
        assert_eq!(table.find(9, |v| v.key == 4), Some(&item(4)));
        assert_eq!(table.find(9, |v| v.key == 5), None);
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct StringItem {
        key: String,
        value: i32,
    }

    fn hash_string_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    #[test]
    fn insert_and_find_string_keys() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::new();
        let keys = ["hello", "world", "foo", "bar", "baz"];

        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            match table.entry(hash, |v: &StringItem| v.key == *k) {
                Entry::Vacant(v) => {
                    v.insert(StringItem {
                        key: k.to_string(),
                        value: i as i32,
                    });
                }
                Entry::Occupied(_) => panic!("unexpected occupied on first insert"),
            }
        }

        assert_eq!(table.len(), keys.len());

        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == *k),
                Some(&StringItem {
                    key: k.to_string(),
                    value: i as i32
                })
            );
        }

        let miss_hash = hash_string_key(&state, "not found");
        assert!(table.find(miss_hash, |v| v.key == "not found").is_none());
    }

    #[test]
    fn occupied_entry_remove() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::new();
        let keys = ["a", "b", "c", "d", "e"];
        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            table.entry(hash, |v| v.key == *k).or_insert(StringItem {
                key: k.to_string(),
                value: i as i32,
            });
        }

        let hash_c = hash_string_key(&state, "c");
        let removed = match table.entry(hash_c, |v| v.key == "c") {
            Entry::Occupied(entry) => entry.remove(),
            Entry::Vacant(_) => unreachable!(),
        };
        assert_eq!(removed.value, 2);
        assert_eq!(table.len(), 4);
        assert!(table.find(hash_c, |v| v.key == "c").is_none());
    }

    #[test]
    fn entry_or_insert_with() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::new();
        let key = "unique_key";
        let hash = hash_string_key(&state, key);

        let value_ref = table
            .entry(hash, |v| v.key == key)
            .or_insert_with(|| StringItem {
                key: key.to_string(),
                value: 42,
            });
        assert_eq!(value_ref.value, 42);

        let existing_ref = table
            .entry(hash, |v| v.key == key)
            .or_insert_with(|| StringItem {
                key: key.to_string(),
                value: 100,
            });
        assert_eq!(existing_ref.value, 42);

        let modified = table
            .entry(hash, |v| v.key == key)
            .and_modify(|v| v.value += 1)
            .map(|v| v.value);
        assert_eq!(modified, Some(43));
        assert!(table.entry(0, |v| v.key == "missing").and_modify(|_| ()).is_none());

        assert_eq!(table.len(), 1);
    }

    #[test]
    fn vacant_insert_returns_stored_value_across_treeify() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        for i in 0..7u64 {
            insert_raw(&mut table, 5 + 64 * i, i);
        }

        let stored = match table.entry(5 + 64 * 7, |v| v.key == 7) {
            Entry::Vacant(v) => v.insert(item(7)),
            Entry::Occupied(_) => unreachable!(),
        };
        stored.value = -7;

        assert_eq!(table.bucket_kind(5), Some(BucketKind::Tree));
        assert_eq!(
            table.find(5 + 64 * 7, |v| v.key == 7),
            Some(&Item { key: 7, value: -7 })
        );
    }

    fn by_key(a: &Item, b: &Item) -> Ordering {
        a.key.cmp(&b.key)
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn ordered_lookups_descend_equal_hash_trees() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48).with_order(by_key);
        // Odd multiplier, so this visits every key below 4096 once.
        for i in 0..4096u64 {
            let k = i.wrapping_mul(2_654_435_761) % 4096;
            match table.entry_by(7, |v| k.cmp(&v.key)) {
                Entry::Vacant(v) => {
                    v.insert(item(k));
                }
                Entry::Occupied(_) => panic!("duplicate key {k}"),
            }
        }
        table.check_invariants();
        assert_eq!(table.bucket_kind(7), Some(BucketKind::Tree));
        assert_eq!(table.bucket_len(7), 4096);

        // A left-leaning red-black tree of 4096 nodes is at most 24 tall.
        for k in [0u64, 1, 1234, 4095, 4096, 10_000] {
            let calls = core::cell::Cell::new(0);
            let found = table.find_by(7, |v| {
                calls.set(calls.get() + 1);
                k.cmp(&v.key)
            });
            assert_eq!(found.map(|v| v.key), (k < 4096).then_some(k));
            assert!(calls.get() <= 24, "{} comparisons for {k}", calls.get());
        }

        if let Some(v) = table.find_mut_by(7, |v| 99u64.cmp(&v.key)) {
            v.value = -99;
        }
        assert_eq!(table.find_by(7, |v| 99u64.cmp(&v.key)).map(|v| v.value), Some(-99));

        for k in (0..4096u64).step_by(3) {
            assert_eq!(table.remove_by(7, |v| k.cmp(&v.key)).map(|v| v.key), Some(k));
        }
        assert_eq!(table.remove_by(7, |v| 3u64.cmp(&v.key)), None);
        table.check_invariants();
        assert_eq!(table.len(), 4096 - 1366);
    }

    #[test]
    fn comparator_lookups_without_order_scan() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        for k in (0..20u64).rev() {
            table.insert_unique(7, item(k));
        }
        assert_eq!(table.bucket_kind(7), Some(BucketKind::Tree));

        // Insertion order is descending, so only equality can be trusted.
        for k in 0..20u64 {
            assert_eq!(table.find_by(7, |v| k.cmp(&v.key)), Some(&item(k)));
        }
        assert_eq!(table.find_by(7, |v| 20u64.cmp(&v.key)), None);
        assert_eq!(table.remove_by(7, |v| 4u64.cmp(&v.key)), Some(item(4)));
        table.check_invariants();
    }

    #[test]
    fn with_order_resorts_existing_trees() {
        let mut table: HashTable<Item> = HashTable::with_capacity(48);
        for k in (0..20u64).rev() {
            table.insert_unique(7, item(k));
        }
        let before = table.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(before, (0..20).rev().collect::<Vec<_>>());

        let mut table = table.with_order(by_key);
        table.check_invariants();
        let after = table.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(after, (0..20).collect::<Vec<_>>());

        let calls = core::cell::Cell::new(0);
        assert_eq!(
            table.find_by(7, |v| {
                calls.set(calls.get() + 1);
                13u64.cmp(&v.key)
            }),
            Some(&item(13))
        );
        assert!(calls.get() <= 10, "{} comparisons", calls.get());

        table.insert_unique(7, item(100));
        table.entry_by(7, |v| 50u64.cmp(&v.key)).or_insert(item(50));
        table.check_invariants();
        assert_eq!(table.iter().last().map(|v| v.key), Some(100));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    #[cfg(feature = "std")]
    fn histogram_output() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(10000);
        for k in 0..table.capacity() as u64 {
            table.insert_unique(hash_key(&state, k), item(k));
        }
        for k in 0..32u64 {
            table.insert_unique(1, item(100_000 + k));
        }

        table.print_bucket_histogram();
        let stats = table.bucket_stats();
        stats.print();
        assert!(stats.tree_buckets >= 1);
        assert!(stats.largest_tree >= 32);
        assert_eq!(
            table.bucket_histogram().iter().sum::<usize>(),
            table.bucket_count()
        );
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut original: HashTable<StringItem> = HashTable::with_capacity(10);

        let test_data = [
            ("hello", 1),
            ("world", 2),
            ("rust", 3),
            ("clone", 4),
            ("test", 5),
        ];

        for (key, value) in test_data.iter() {
            let hash = hash_string_key(&state, key);
            original
                .entry(hash, |v| v.key == *key)
                .or_insert(StringItem {
                    key: key.to_string(),
                    value: *value,
                });
        }

        let cloned = original.clone();

        assert_eq!(original.len(), cloned.len());
        assert_eq!(cloned.len(), test_data.len());

        let hash = hash_string_key(&state, "hello");
        if let Some(item) = original.find_mut(hash, |v| v.key == "hello") {
            item.value = 999;
        }

        let original_hello = original.find(hash, |v| v.key == "hello").unwrap();
        assert_eq!(original_hello.value, 999);

        let cloned_hello = cloned.find(hash, |v| v.key == "hello").unwrap();
        assert_eq!(cloned_hello.value, 1);
    }

    #[test]
    fn test_clone_with_collisions() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);

        let hash = 0u64;
        let num_items = 200u64;
        for k in 0..num_items {
            table.insert_unique(hash, item(k));
        }

        let cloned = table.clone();
        cloned.check_invariants();
        assert_eq!(cloned.bucket_kind(0), Some(BucketKind::Tree));

        for k in 0..num_items {
            assert_eq!(cloned.find(hash, |v| v.key == k), Some(&item(k)));
        }

        if let Some(item) = table.find_mut(hash, |v| v.key == 0) {
            item.value = -999;
        }

        assert_eq!(table.find(hash, |v| v.key == 0).unwrap().value, -999);
        assert_eq!(cloned.find(hash, |v| v.key == 0).unwrap().value, 0);
    }

    #[test]
    fn test_shrink_to_fit_empty_table() {
        let mut table: HashTable<Item> = HashTable::with_capacity(100);
        assert!(table.capacity() > 0);

        table.shrink_to_fit();

        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.bucket_count(), 0);

        insert_raw(&mut table, 3, 3);
        assert_eq!(table.bucket_count(), 16);
    }

    #[test]
    fn test_shrink_to_fit_after_removals() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(1000);

        for i in 0..200 {
            let hash = hash_key(&state, i);
            table.entry(hash, |v| v.key == i).or_insert(item(i));
        }

        let initial_capacity = table.capacity();
        for i in 0..190 {
            let hash = hash_key(&state, i);
            table.remove(hash, |v| v.key == i);
        }

        assert_eq!(table.len(), 10);
        assert_eq!(table.capacity(), initial_capacity);

        table.shrink_to_fit();
        table.check_invariants();

        assert_eq!(table.len(), 10);
        assert_eq!(table.capacity(), 12);

        for i in 190..200 {
            let hash = hash_key(&state, i);
            assert_eq!(table.find(hash, |v| v.key == i), Some(&item(i)));
        }
    }

    #[test]
    fn test_shrink_to_fit_with_collisions() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(100);
        let base_hash = hash_key(&state, 42);

        for i in 0..50 {
            table
                .entry(base_hash, |v| v.key == 1000 + i)
                .or_insert(item(1000 + i));
        }
        for i in 0..40 {
            table.remove(base_hash, |v| v.key == 1000 + i);
        }

        assert_eq!(table.len(), 10);
        table.shrink_to_fit();
        table.check_invariants();
        assert_eq!(table.bucket_count(), 16);
        assert_eq!(table.bucket_stats().tree_buckets, 0);

        for i in 40..50 {
            let found = table.find(base_hash, |v| v.key == 1000 + i);
            assert_eq!(found, Some(&item(1000 + i)));
        }
    }

    #[test]
    fn test_shrink_to_fit_no_change_when_optimal() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();

        for i in 0..50 {
            let hash = hash_key(&state, i);
            table.entry(hash, |v| v.key == i).or_insert(item(i));
        }

        table.shrink_to_fit();
        let optimal_capacity = table.capacity();
        let generation = table.generation;

        table.shrink_to_fit();
        assert_eq!(table.len(), 50);
        assert_eq!(optimal_capacity, table.capacity());
        assert_eq!(generation, table.generation);
    }

    #[test]
    fn reserve_grows_by_doubling() {
        let mut table: HashTable<Item> = HashTable::new();
        table.reserve(0);
        assert_eq!(table.bucket_count(), 0);

        for hash in [1u64, 17, 33, 49] {
            insert_raw(&mut table, hash, hash);
        }
        table.reserve(100);
        table.check_invariants();
        assert!(table.capacity() >= 104);
        assert_eq!(table.bucket_count(), 256);
        assert_eq!(table.iter().map(|v| v.key).collect::<Vec<_>>(), vec![1, 17, 33, 49]);
    }

    #[test]
    fn clear_keeps_buckets() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..30u64 {
            insert_raw(&mut table, k, k);
        }
        let buckets = table.bucket_count();
        table.clear();
        table.check_invariants();
        assert!(table.is_empty());
        assert_eq!(table.bucket_count(), buckets);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn debug_renders_layout() {
        let mut table: HashTable<Item> = HashTable::new();
        assert!(alloc::format!("{table:?}").contains("unallocated"));

        insert_raw(&mut table, 0, 0);
        insert_raw(&mut table, 16, 16);
        let rendered = alloc::format!("{table:?}");
        assert!(rendered.contains("c02"), "{rendered}");
        assert!(rendered.contains("buckets: 16"), "{rendered}");
    }
}
