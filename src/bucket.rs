//! Per-bucket storage.
//!
//! A bucket holds either an insertion-ordered [`Chain`] or, once it collects
//! [`TREEIFY_THRESHOLD`](crate::config::TREEIFY_THRESHOLD) entries in a large
//! enough table, a red-black [`Tree`]. The variant is chosen when the
//! bucket is converted and matched at every operation.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::config::UNTREEIFY_THRESHOLD;

mod chain;
mod tree;

pub(crate) use chain::Chain;
pub(crate) use tree::Tree;

/// Total order over values with equal hashes, used to arrange tree buckets.
pub(crate) type Order<V> = fn(&V, &V) -> Ordering;

/// How a lookup recognizes its entry.
pub(crate) trait Lookup<V> {
    fn matches(&self, value: &V) -> bool;

    /// Where the sought entry sits relative to `value`, if that is known.
    /// `None` makes tree lookups scan the whole run of equal hashes.
    fn direction(&self, value: &V) -> Option<Ordering>;
}

/// Lookup by an equality predicate.
pub(crate) struct Equivalent<F>(pub(crate) F);

impl<V, F: Fn(&V) -> bool> Lookup<V> for Equivalent<F> {
    fn matches(&self, value: &V) -> bool {
        (self.0)(value)
    }

    fn direction(&self, _: &V) -> Option<Ordering> {
        None
    }
}

/// Lookup by comparing the sought entry against stored values. Only a
/// comparison that agrees with the table's [`Order`] may steer a tree
/// descent; otherwise it just decides equality.
pub(crate) struct Ordered<F> {
    pub(crate) cmp: F,
    pub(crate) descend: bool,
}

#[cfg(test)]
impl<F> Ordered<F> {
    pub(crate) fn new(cmp: F) -> Self {
        Ordered { cmp, descend: true }
    }
}

impl<V, F: Fn(&V) -> Ordering> Lookup<V> for Ordered<F> {
    fn matches(&self, value: &V) -> bool {
        (self.cmp)(value).is_eq()
    }

    fn direction(&self, value: &V) -> Option<Ordering> {
        self.descend.then(|| (self.cmp)(value))
    }
}

/// A stored value together with its spread hash, computed once on insertion.
#[derive(Clone)]
pub(crate) struct Slot<V> {
    pub(crate) hash: u64,
    pub(crate) value: V,
}

fn tree_order<V>(a: &Slot<V>, b: &Slot<V>, order: Option<Order<V>>) -> Ordering {
    a.hash
        .cmp(&b.hash)
        .then_with(|| order.map_or(Ordering::Equal, |order| order(&a.value, &b.value)))
}

/// Representation currently used by a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Entries kept in insertion order and scanned linearly.
    Chain,
    /// Entries kept in a balanced tree ordered by hash.
    Tree,
}

/// Location of an entry inside a bucket: a chain index or an in-order tree
/// rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Chain(usize),
    Tree(usize),
}

#[derive(Clone)]
pub(crate) enum Bucket<V> {
    Chain(Chain<V>),
    Tree(Tree<V>),
}

impl<V> Bucket<V> {
    pub(crate) fn single(hash: u64, value: V) -> Self {
        Bucket::Chain(Chain::single(hash, value))
    }

    /// Houses entries already in tree order: small groups go back to a
    /// chain.
    fn from_tree_slots(slots: Vec<Slot<V>>) -> Option<Self> {
        match slots.len() {
            0 => None,
            n if n <= UNTREEIFY_THRESHOLD => Some(Bucket::Chain(Chain::from_slots(slots))),
            _ => Some(Bucket::Tree(Tree::from_sorted(slots))),
        }
    }

    pub(crate) fn kind(&self) -> BucketKind {
        match self {
            Bucket::Chain(_) => BucketKind::Chain,
            Bucket::Tree(_) => BucketKind::Tree,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Bucket::Chain(chain) => chain.len(),
            Bucket::Tree(tree) => tree.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn find(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<&V> {
        match self {
            Bucket::Chain(chain) => chain.find(hash, |value| lookup.matches(value)),
            Bucket::Tree(tree) => tree.find(hash, lookup),
        }
    }

    pub(crate) fn find_mut(&mut self, hash: u64, lookup: &impl Lookup<V>) -> Option<&mut V> {
        match self {
            Bucket::Chain(chain) => chain.find_mut(hash, |value| lookup.matches(value)),
            Bucket::Tree(tree) => tree.find_mut(hash, lookup),
        }
    }

    pub(crate) fn locate(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<Position> {
        match self {
            Bucket::Chain(chain) => chain
                .position(hash, |value| lookup.matches(value))
                .map(Position::Chain),
            Bucket::Tree(tree) => tree.locate(hash, lookup).map(Position::Tree),
        }
    }

    pub(crate) fn get(&self, position: Position) -> Option<&V> {
        match (self, position) {
            (Bucket::Chain(chain), Position::Chain(index)) => chain.get(index),
            (Bucket::Tree(tree), Position::Tree(rank)) => tree.get(rank),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, position: Position) -> Option<&mut V> {
        match (self, position) {
            (Bucket::Chain(chain), Position::Chain(index)) => chain.get_mut(index),
            (Bucket::Tree(tree), Position::Tree(rank)) => tree.get_mut(rank),
            _ => None,
        }
    }

    /// Stores an entry known to be absent: tail append for a chain, ordered
    /// insert for a tree.
    pub(crate) fn insert(&mut self, hash: u64, value: V, order: Option<Order<V>>) -> Position {
        match self {
            Bucket::Chain(chain) => Position::Chain(chain.insert(hash, value) - 1),
            Bucket::Tree(tree) => Position::Tree(tree.insert(hash, value, order)),
        }
    }

    /// Converts a chain into a tree and translates `position` to the entry's
    /// rank in the new tree.
    pub(crate) fn treeify(&mut self, position: Position, order: Option<Order<V>>) -> Position {
        let Bucket::Chain(chain) = self else {
            return position;
        };
        let chain = core::mem::replace(chain, Chain::new());
        let mut slots = chain.into_slots().into_iter().enumerate().collect::<Vec<_>>();
        // Stable, so ties keep chain order.
        slots.sort_by(|(_, a), (_, b)| tree_order(a, b, order));

        let moved = match position {
            Position::Chain(index) => slots.iter().position(|&(i, _)| i == index),
            Position::Tree(_) => None,
        };
        *self = Bucket::Tree(Tree::from_sorted(slots.into_iter().map(|(_, slot)| slot)));
        moved.map_or(position, Position::Tree)
    }

    /// Re-sorts a tree bucket after the table's order changed.
    pub(crate) fn reorder(&mut self, order: Option<Order<V>>) {
        if let Bucket::Tree(tree) = self {
            let mut slots = core::mem::replace(tree, Tree::new()).into_slots();
            slots.sort_by(|a, b| tree_order(a, b, order));
            *tree = Tree::from_sorted(slots);
        }
    }

    /// Removes the entry at `position`. A tree that shrinks to
    /// [`UNTREEIFY_THRESHOLD`] entries is turned back into a chain.
    pub(crate) fn remove(&mut self, position: Position) -> Option<V> {
        match (&mut *self, position) {
            (Bucket::Chain(chain), Position::Chain(index)) => {
                chain.remove(index).map(|slot| slot.value)
            }
            (Bucket::Tree(tree), Position::Tree(rank)) => {
                let value = tree.remove(rank)?;
                if tree.len() <= UNTREEIFY_THRESHOLD {
                    self.untreeify();
                }
                Some(value)
            }
            _ => None,
        }
    }

    fn untreeify(&mut self) {
        if let Bucket::Tree(tree) = self {
            let tree = core::mem::replace(tree, Tree::new());
            *self = Bucket::Chain(Chain::from_slots(tree.into_slots()));
        }
    }

    /// Splits the bucket for a table that doubles from `bit` buckets.
    ///
    /// Entries with `hash & bit` clear stay at the same index, the rest move
    /// to `index + bit`. Chains split stably into chains. Trees are
    /// linearized in order and each half is rebuilt as a tree, or as a chain
    /// if it has at most [`UNTREEIFY_THRESHOLD`] entries.
    pub(crate) fn split(self, bit: u64) -> (Option<Self>, Option<Self>) {
        match self {
            Bucket::Chain(chain) => {
                let (low, high) = chain.split(bit);
                let house = |chain: Chain<V>| (chain.len() > 0).then_some(Bucket::Chain(chain));
                (house(low), house(high))
            }
            Bucket::Tree(tree) => {
                let (low, high): (Vec<_>, Vec<_>) = tree
                    .into_slots()
                    .into_iter()
                    .partition(|slot| slot.hash & bit == 0);
                (Self::from_tree_slots(low), Self::from_tree_slots(high))
            }
        }
    }

    /// Drops entries rejected by `f`, returning how many were removed. A tree
    /// is only rebuilt when something was dropped.
    pub(crate) fn retain(&mut self, f: &mut impl FnMut(&mut V) -> bool) -> usize {
        match self {
            Bucket::Chain(chain) => chain.retain(f),
            Bucket::Tree(tree) => {
                let mut keep = Vec::with_capacity(tree.len());
                tree.mark(f, &mut keep);
                let removed = keep.iter().filter(|&&kept| !kept).count();
                if removed == 0 {
                    return 0;
                }

                let slots = core::mem::replace(tree, Tree::new())
                    .into_slots()
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(slot, kept)| kept.then_some(slot))
                    .collect();
                *self = Self::from_tree_slots(slots).unwrap_or_else(|| Bucket::Chain(Chain::new()));
                removed
            }
        }
    }

    /// The entry following `after` in this bucket's iteration order.
    pub(crate) fn next_after(&self, after: Option<Position>) -> Option<(Position, &V)> {
        match self {
            Bucket::Chain(chain) => {
                let index = match after {
                    Some(Position::Chain(index)) => index + 1,
                    _ => 0,
                };
                chain.get(index).map(|value| (Position::Chain(index), value))
            }
            Bucket::Tree(tree) => {
                let rank = match after {
                    Some(Position::Tree(rank)) => rank + 1,
                    _ => 0,
                };
                tree.get(rank).map(|value| (Position::Tree(rank), value))
            }
        }
    }

    pub(crate) fn into_slots(self) -> Vec<Slot<V>> {
        match self {
            Bucket::Chain(chain) => chain.into_slots(),
            Bucket::Tree(tree) => tree.into_slots(),
        }
    }

    pub(crate) fn iter(&self) -> Iter<'_, V> {
        match self {
            Bucket::Chain(chain) => Iter::Chain(chain.iter()),
            Bucket::Tree(tree) => Iter::Tree(tree.iter()),
        }
    }

    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn tree_height(&self) -> usize {
        match self {
            Bucket::Chain(_) => 0,
            Bucket::Tree(tree) => tree.height(),
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self, order: Option<Order<V>>) {
        if let Bucket::Tree(tree) = self {
            tree.check_invariants(order);
        }
    }

    #[cfg(test)]
    pub(crate) fn hashes(&self) -> Vec<u64> {
        match self {
            Bucket::Chain(chain) => chain.iter().map(|slot| slot.hash).collect(),
            Bucket::Tree(tree) => tree.hashes(),
        }
    }
}

/// Iterator over the values of one bucket.
pub(crate) enum Iter<'a, V> {
    Chain(core::slice::Iter<'a, Slot<V>>),
    Tree(tree::Iter<'a, V>),
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Chain(iter) => iter.next().map(|slot| &slot.value),
            Iter::Tree(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Iter::Chain(iter) => iter.size_hint(),
            Iter::Tree(iter) => iter.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::config::TREEIFY_THRESHOLD;

    fn chain_bucket(hashes: &[u64]) -> Bucket<u64> {
        let mut bucket = Bucket::single(hashes[0], 0);
        for (i, &hash) in hashes.iter().enumerate().skip(1) {
            bucket.insert(hash, i as u64, None);
        }
        bucket
    }

    fn values(bucket: &Bucket<u64>) -> Vec<u64> {
        bucket.iter().copied().collect()
    }

    fn equal_to(target: u64) -> Equivalent<impl Fn(&u64) -> bool> {
        Equivalent(move |&v: &u64| v == target)
    }

    fn descending(a: &u64, b: &u64) -> Ordering {
        b.cmp(a)
    }

    #[test]
    fn treeify_tracks_appended_entry() {
        let hashes = (0..TREEIFY_THRESHOLD as u64).map(|i| 5 + 64 * i).collect::<Vec<_>>();
        let mut bucket = chain_bucket(&hashes[..TREEIFY_THRESHOLD - 1]);
        let position = bucket.insert(hashes[TREEIFY_THRESHOLD - 1], 77, None);
        assert_eq!(position, Position::Chain(TREEIFY_THRESHOLD - 1));

        let position = bucket.treeify(position, None);
        assert_eq!(bucket.kind(), BucketKind::Tree);
        assert_eq!(bucket.get(position), Some(&77));
        bucket.check_invariants(None);
    }

    #[test]
    fn treeify_sorts_equal_hashes_by_order() {
        let mut bucket = chain_bucket(&[4; 7]);
        let position = bucket.insert(4, 3, None);
        let position = bucket.treeify(position, Some(descending));
        bucket.check_invariants(Some(descending));
        assert_eq!(values(&bucket), vec![6, 5, 4, 3, 3, 2, 1, 0]);
        // Ties keep chain order, so the appended 3 follows the first one.
        assert_eq!(position, Position::Tree(4));
        assert_eq!(
            bucket.locate(4, &Ordered::new(|v: &u64| v.cmp(&5))),
            Some(Position::Tree(1))
        );
    }

    #[test]
    fn reorder_resorts_existing_trees() {
        let mut bucket = chain_bucket(&[4; 8]);
        bucket.treeify(Position::Chain(0), None);
        assert_eq!(values(&bucket), (0..8).collect::<Vec<_>>());

        bucket.reorder(Some(descending));
        bucket.check_invariants(Some(descending));
        assert_eq!(values(&bucket), (0..8).rev().collect::<Vec<_>>());
        assert_eq!(bucket.insert(4, 9, Some(descending)), Position::Tree(0));
    }

    #[test]
    fn tree_removal_reverts_to_chain() {
        let mut bucket = chain_bucket(&[3; 8]);
        bucket.treeify(Position::Chain(0), None);
        assert_eq!(bucket.kind(), BucketKind::Tree);

        let position = bucket.locate(3, &equal_to(4)).expect("present");
        assert_eq!(bucket.remove(position), Some(4));
        assert_eq!(bucket.kind(), BucketKind::Tree);

        let position = bucket.locate(3, &equal_to(0)).expect("present");
        assert_eq!(bucket.remove(position), Some(0));
        assert_eq!(bucket.kind(), BucketKind::Chain);
        assert_eq!(values(&bucket), vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn chain_split_keeps_insertion_order() {
        let bucket = chain_bucket(&[1, 17, 33, 49]);
        let (low, high) = bucket.split(16);
        let low = low.expect("low half");
        let high = high.expect("high half");
        assert_eq!(values(&low), vec![0, 2]);
        assert_eq!(values(&high), vec![1, 3]);
    }

    #[test]
    fn chain_split_leaves_empty_half_vacant() {
        let bucket = chain_bucket(&[1, 33, 65]);
        let (low, high) = bucket.split(16);
        assert!(low.is_some());
        assert!(high.is_none());
    }

    #[test]
    fn tree_split_untreeifies_small_halves() {
        // 16 entries alternate on the 64 bit: 8 stay, 8 move.
        let hashes = (0..16u64).map(|i| 5 + 64 * i).collect::<Vec<_>>();
        let mut bucket = chain_bucket(&hashes);
        bucket.treeify(Position::Chain(0), None);

        let (low, high) = bucket.clone().split(64);
        assert_eq!(low.as_ref().map(Bucket::kind), Some(BucketKind::Tree));
        assert_eq!(high.as_ref().map(Bucket::kind), Some(BucketKind::Tree));
        assert_eq!(low.map(|b| b.len()), Some(8));

        // Drop to 12 entries: 6 per half, both become chains.
        for v in [0u64, 1, 2, 3] {
            let position = bucket.locate(5 + 64 * v, &equal_to(v)).expect("present");
            bucket.remove(position);
        }
        let (low, high) = bucket.split(64);
        let low = low.expect("low half");
        let high = high.expect("high half");
        assert_eq!(low.kind(), BucketKind::Chain);
        assert_eq!(high.kind(), BucketKind::Chain);
        assert_eq!(values(&low), vec![4, 6, 8, 10, 12, 14]);
        assert_eq!(values(&high), vec![5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn next_after_walks_both_kinds() {
        let mut bucket = chain_bucket(&[9, 9, 9, 9, 9, 9, 9, 9]);
        let mut seen = Vec::new();
        let mut after = None;
        while let Some((position, &value)) = bucket.next_after(after) {
            seen.push(value);
            after = Some(position);
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());

        bucket.treeify(Position::Chain(0), None);
        seen.clear();
        after = None;
        while let Some((position, &value)) = bucket.next_after(after) {
            seen.push(value);
            after = Some(position);
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn retain_on_tree_rehouses_entries() {
        let mut bucket = chain_bucket(&[2; 10]);
        bucket.treeify(Position::Chain(0), None);
        assert_eq!(bucket.retain(&mut |v: &mut u64| *v >= 2), 2);
        assert_eq!(bucket.kind(), BucketKind::Tree);
        assert_eq!(bucket.retain(&mut |v: &mut u64| *v >= 5), 3);
        assert_eq!(bucket.kind(), BucketKind::Chain);
        assert_eq!(values(&bucket), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn retain_keeping_everything_leaves_tree_in_place() {
        // A front insert gives a shape that rebuilding from sorted slots
        // would not reproduce.
        let mut tree = Tree::from_sorted((1..10u64).map(|i| Slot { hash: i, value: i }));
        tree.insert(0, 0, None);
        let red_ranks = tree.red_ranks();
        assert_eq!(red_ranks, vec![0, 6]);
        assert_eq!(
            Tree::from_sorted(tree.clone().into_slots()).red_ranks(),
            vec![5, 8]
        );

        let mut bucket = Bucket::Tree(tree);
        let mut visited = 0;
        let removed = bucket.retain(&mut |v: &mut u64| {
            visited += 1;
            *v += 100;
            true
        });
        assert_eq!(removed, 0);
        assert_eq!(visited, 10);
        assert_eq!(values(&bucket), (100..110).collect::<Vec<_>>());
        let Bucket::Tree(tree) = &bucket else {
            panic!("bucket should still be a tree");
        };
        assert_eq!(tree.red_ranks(), red_ranks);
        bucket.check_invariants(None);
    }
}
