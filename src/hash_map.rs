use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::config::Config;
use crate::error::ConfigError;
use crate::error::TableError;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

/// A hash map backed by a tree-binned [`HashTable`].
///
/// `HashMap<K, V, S>` stores key-value pairs where keys implement
/// `Hash + Ord` and uses a configurable hasher builder `S` to hash keys. Each
/// key is hashed once on insertion; the hash is cached next to the pair.
///
/// Colliding keys share a bucket. Buckets that collect many keys are kept as
/// red-black trees ordered by hash and then by key, so even a flood of keys
/// with identical hashes costs a logarithmic number of key comparisons
/// rather than a linear scan.
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use treebin_hash::DefaultHashBuilder;
/// use treebin_hash::HashMap;
///
/// let mut map: HashMap<&str, u32, DefaultHashBuilder> = HashMap::new();
/// map.insert("a", 1);
/// map.insert("b", 2);
/// assert_eq!(map.insert("a", 3), Some(1));
/// assert_eq!(map.get("a"), Some(&3));
/// assert_eq!(map.len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S> {
    table: HashTable<(K, V)>,
    hash_builder: S,
}

fn key_order<K: Ord, V>(a: &(K, V), b: &(K, V)) -> Ordering {
    a.0.cmp(&b.0)
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.table.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher,
{
    /// Creates a new hash map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash map with the specified capacity and hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_capacity_and_hasher(100, SimpleHasher);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity).with_order(key_order),
            hash_builder,
        }
    }

    /// Creates an empty map with custom table settings.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use treebin_hash::Config;
    /// use treebin_hash::DefaultHashBuilder;
    /// use treebin_hash::HashMap;
    ///
    /// let map = HashMap::<u32, u32, _>::with_config_and_hasher(
    ///     Config::default().initial_buckets(64),
    ///     DefaultHashBuilder::default(),
    /// )
    /// .unwrap();
    /// assert!(map.is_empty());
    ///
    /// let err = HashMap::<u32, u32, _>::with_config_and_hasher(
    ///     Config::default().max_buckets(48),
    ///     DefaultHashBuilder::default(),
    /// );
    /// assert!(err.is_err());
    /// # }
    /// ```
    pub fn with_config_and_hasher(config: Config, hash_builder: S) -> Result<Self, ConfigError> {
        Ok(Self {
            table: HashTable::with_config(config)?.with_order(key_order),
            hash_builder,
        })
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the number of elements in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of elements the map can hold before it resizes.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the length of the underlying bucket array.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Removes all elements from the map.
    ///
    /// This operation preserves the map's allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the capacity of the map as much as possible.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_capacity_and_hasher(100, SimpleHasher);
    /// map.insert(1, "one");
    /// map.insert(2, "two");
    /// assert!(map.capacity() >= 100);
    ///
    /// map.shrink_to_fit();
    ///
    /// assert!(map.capacity() >= 2);
    /// assert!(map.capacity() < 100);
    /// assert_eq!(map.len(), 2);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Reserves capacity for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Reserves capacity for at least `additional` more elements, reporting
    /// a failure to do so.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TableError> {
        self.table.try_reserve(additional)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned.
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned. The stored key is not replaced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry_by(hash, |(k, _)| key.cmp(k)) {
            TableEntry::Occupied(mut entry) => {
                let old_value = core::mem::replace(&mut entry.get_mut().1, value);
                Some(old_value)
            }
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Like [`insert`](Self::insert), but reports when the map could not
    /// grow to keep its load factor.
    ///
    /// The pair is stored even when an error is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use treebin_hash::Config;
    /// use treebin_hash::DefaultHashBuilder;
    /// use treebin_hash::HashMap;
    /// use treebin_hash::TableError;
    ///
    /// let mut map = HashMap::with_config_and_hasher(
    ///     Config::default().initial_buckets(4).max_buckets(4),
    ///     DefaultHashBuilder::default(),
    /// )
    /// .unwrap();
    /// assert_eq!(map.try_insert(1, "a"), Ok(None));
    /// assert_eq!(map.try_insert(2, "b"), Ok(None));
    /// assert_eq!(map.try_insert(3, "c"), Ok(None));
    /// assert_eq!(
    ///     map.try_insert(4, "d"),
    ///     Err(TableError::CapacityExceeded { buckets: 4, max: 4 })
    /// );
    /// assert_eq!(map.get(&4), Some(&"d"));
    /// assert_eq!(map.try_insert(4, "e"), Ok(Some("d")));
    /// # }
    /// ```
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, TableError> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry_by(hash, |(k, _)| key.cmp(k)) {
            TableEntry::Occupied(mut entry) => {
                Ok(Some(core::mem::replace(&mut entry.get_mut().1, value)))
            }
            TableEntry::Vacant(entry) => entry.try_insert((key, value)).map(|_| None),
        }
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find_by(hash, |(k, _)| key.cmp(k.borrow()))
            .map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find_mut_by(hash, |(k, _)| key.cmp(k.borrow()))
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map contains a value for the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was previously in the map.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table.remove_by(hash, |(k, _)| key.cmp(k.borrow()))
    }

    /// Gets the given key's corresponding entry in the map for in-place
    /// manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    ///
    /// map.entry(1).or_insert("a");
    /// map.entry(2).or_insert("b");
    ///
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), Some(&"b"));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry_by(hash, |(k, _)| key.cmp(k)) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Keeps only the pairs for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|(k, v)| f(k, v));
    }

    /// Returns an iterator over the key-value pairs of the map.
    ///
    /// Pairs sharing a chain bucket come out in insertion order; beyond that
    /// the order is unspecified.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Clears the map, returning all key-value pairs as an iterator.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns a detached cursor that fails once the map is structurally
    /// modified.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use treebin_hash::DefaultHashBuilder;
    /// use treebin_hash::HashMap;
    /// use treebin_hash::TableError;
    ///
    /// let mut map: HashMap<u32, u32, DefaultHashBuilder> = HashMap::new();
    /// map.insert(1, 10);
    /// map.insert(2, 20);
    ///
    /// let mut cursor = map.cursor();
    /// let mut sum = 0;
    /// while let Some((_, v)) = cursor.next(&map).unwrap() {
    ///     sum += v;
    /// }
    /// assert_eq!(sum, 30);
    ///
    /// let mut cursor = map.cursor();
    /// map.remove(&1);
    /// assert_eq!(cursor.next(&map), Err(TableError::ConcurrentModification));
    /// # }
    /// ```
    pub fn cursor(&self) -> Cursor {
        Cursor {
            inner: self.table.cursor(),
        }
    }

    /// Returns bucket-level statistics of the underlying table.
    ///
    /// Requires the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn bucket_stats(&self) -> crate::hash_table::BucketStats {
        self.table.bucket_stats()
    }

    /// Pretty-prints the bucket length histogram of the underlying table.
    ///
    /// Requires the `stats` and `std` features.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_bucket_histogram(&self) {
        self.table.print_bucket_histogram();
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.table.check_invariants();
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher + Default,
{
    /// Creates a new hash map using the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use treebin_hash::HashMap;
    /// #
    /// # #[derive(Default)]
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, SimpleHasher> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash map with the specified capacity using the default
    /// hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V> Entry<'a, K, V>
where
    V: Default,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V> {
    entry: crate::hash_table::VacantEntry<'a, (K, V)>,
    key: K,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V> {
    entry: crate::hash_table::OccupiedEntry<'a, (K, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value in the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V> {
    inner: crate::hash_table::Drain<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Drain<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A detached, fail-fast position in a [`HashMap`].
///
/// Created by [`HashMap::cursor`].
#[derive(Debug, Clone)]
pub struct Cursor {
    inner: crate::hash_table::Cursor,
}

impl Cursor {
    /// Advances the cursor and returns the next pair, or `Ok(None)` once
    /// every pair has been visited.
    pub fn next<'m, K, V, S>(
        &mut self,
        map: &'m HashMap<K, V, S>,
    ) -> Result<Option<(&'m K, &'m V)>, TableError> {
        Ok(self.inner.next(&map.table)?.map(|(k, v)| (k, v)))
    }
}
