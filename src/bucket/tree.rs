//! Left-leaning red-black tree used for buckets that collect too many
//! entries.
//!
//! Entries are kept in hash order. Within a run of equal hashes they follow
//! the table's [`Order`] when it has one, and insertion order otherwise.
//! Every node records the size of its subtree, so an entry's position is its
//! in-order rank and exact accesses never compare values.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;

use super::Lookup;
use super::Order;
use super::Slot;

type Link<V> = Option<Box<Node<V>>>;

#[derive(Clone)]
struct Node<V> {
    hash: u64,
    value: V,
    red: bool,
    size: usize,
    left: Link<V>,
    right: Link<V>,
}

#[derive(Clone)]
pub(crate) struct Tree<V> {
    root: Link<V>,
}

impl<V> Tree<V> {
    pub(crate) fn new() -> Self {
        Tree { root: None }
    }

    /// Builds a tree from slots that are already in tree order.
    pub(crate) fn from_sorted(slots: impl IntoIterator<Item = Slot<V>>) -> Self {
        let mut tree = Tree::new();
        for (rank, slot) in slots.into_iter().enumerate() {
            tree.insert_at(rank, slot.hash, slot.value);
        }
        tree
    }

    pub(crate) fn len(&self) -> usize {
        size(&self.root)
    }

    /// Inserts an absent entry after every entry that does not order after
    /// it, returning its rank.
    pub(crate) fn insert(&mut self, hash: u64, value: V, order: Option<Order<V>>) -> usize {
        let mut rank = 0;
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            let before = match hash.cmp(&node.hash) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => order.is_some_and(|order| order(&value, &node.value).is_lt()),
            };
            if before {
                link = node.left.as_deref();
            } else {
                rank += size(&node.left) + 1;
                link = node.right.as_deref();
            }
        }

        self.insert_at(rank, hash, value);
        rank
    }

    fn insert_at(&mut self, rank: usize, hash: u64, value: V) {
        let mut root = insert_at(self.root.take(), rank, hash, value);
        root.red = false;
        self.root = Some(root);
    }

    /// Rank of the entry matching `lookup`.
    pub(crate) fn locate(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<usize> {
        locate_in(self.root.as_deref(), 0, hash, lookup)
    }

    pub(crate) fn find(&self, hash: u64, lookup: &impl Lookup<V>) -> Option<&V> {
        self.get(self.locate(hash, lookup)?)
    }

    pub(crate) fn find_mut(&mut self, hash: u64, lookup: &impl Lookup<V>) -> Option<&mut V> {
        let rank = self.locate(hash, lookup)?;
        self.get_mut(rank)
    }

    pub(crate) fn get(&self, mut rank: usize) -> Option<&V> {
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            let left = size(&node.left);
            match rank.cmp(&left) {
                Ordering::Less => link = node.left.as_deref(),
                Ordering::Equal => return Some(&node.value),
                Ordering::Greater => {
                    rank -= left + 1;
                    link = node.right.as_deref();
                }
            }
        }
        None
    }

    pub(crate) fn get_mut(&mut self, rank: usize) -> Option<&mut V> {
        node_mut(&mut self.root, rank).map(|node| &mut node.value)
    }

    /// Removes the entry at `rank`, rebalancing on the way back up.
    pub(crate) fn remove(&mut self, rank: usize) -> Option<V> {
        // The top-down deletion below assumes the rank is in range.
        if rank >= self.len() {
            return None;
        }

        let mut root = self.root.take()?;
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }

        let (root, removed) = delete(root, rank);
        self.root = root.map(|mut root| {
            root.red = false;
            root
        });
        removed
    }

    /// Calls `f` on every value in order, recording whether it is kept.
    pub(crate) fn mark(&mut self, f: &mut impl FnMut(&mut V) -> bool, keep: &mut Vec<bool>) {
        fn walk<V>(link: &mut Link<V>, f: &mut impl FnMut(&mut V) -> bool, keep: &mut Vec<bool>) {
            if let Some(node) = link {
                walk(&mut node.left, f, keep);
                keep.push(f(&mut node.value));
                walk(&mut node.right, f, keep);
            }
        }
        walk(&mut self.root, f, keep);
    }

    /// Consumes the tree, returning its entries in order.
    pub(crate) fn into_slots(self) -> Vec<Slot<V>> {
        let mut slots = Vec::with_capacity(self.len());
        drain_in_order(self.root, &mut slots);
        slots
    }

    pub(crate) fn iter(&self) -> Iter<'_, V> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn height(&self) -> usize {
        fn height<V>(link: Option<&Node<V>>) -> usize {
            match link {
                Some(node) => 1 + height(node.left.as_deref()).max(height(node.right.as_deref())),
                None => 0,
            }
        }
        height(self.root.as_deref())
    }

    #[cfg(test)]
    pub(crate) fn hashes(&self) -> Vec<u64> {
        fn walk<V>(link: Option<&Node<V>>, out: &mut Vec<u64>) {
            if let Some(node) = link {
                walk(node.left.as_deref(), out);
                out.push(node.hash);
                walk(node.right.as_deref(), out);
            }
        }
        let mut out = Vec::with_capacity(self.len());
        walk(self.root.as_deref(), &mut out);
        out
    }

    /// In-order ranks of the red nodes.
    #[cfg(test)]
    pub(crate) fn red_ranks(&self) -> Vec<usize> {
        fn walk<V>(link: Option<&Node<V>>, offset: usize, out: &mut Vec<usize>) {
            if let Some(node) = link {
                let rank = offset + size(&node.left);
                walk(node.left.as_deref(), offset, out);
                if node.red {
                    out.push(rank);
                }
                walk(node.right.as_deref(), rank + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(self.root.as_deref(), 0, &mut out);
        out
    }

    /// Verifies the red-black shape, subtree sizes and entry order, returning
    /// the black height.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, order: Option<Order<V>>) -> usize {
        fn check<V>(link: Option<&Node<V>>) -> (usize, usize) {
            let Some(node) = link else {
                return (1, 0);
            };
            assert!(!is_red(&node.right), "red right link");
            if node.red {
                assert!(!is_red(&node.left), "two reds in a row");
            }

            let (left_black, left_len) = check(node.left.as_deref());
            let (right_black, right_len) = check(node.right.as_deref());
            assert_eq!(left_black, right_black, "unequal black height");
            assert_eq!(node.size, left_len + right_len + 1, "stale subtree size");
            (left_black + usize::from(!node.red), node.size)
        }

        if let Some(root) = self.root.as_deref() {
            assert!(!root.red, "red root");
        }
        let (black_height, _) = check(self.root.as_deref());

        let hashes = self.hashes();
        let values = self.iter().collect::<Vec<_>>();
        for i in 1..hashes.len() {
            assert!(hashes[i - 1] <= hashes[i], "hashes out of order");
            if let Some(order) = order
                && hashes[i - 1] == hashes[i]
            {
                assert!(
                    order(values[i - 1], values[i]).is_le(),
                    "equal hashes out of order"
                );
            }
        }
        black_height
    }
}

fn size<V>(link: &Link<V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn resize<V>(h: &mut Node<V>) {
    h.size = size(&h.left) + size(&h.right) + 1;
}

fn is_red<V>(link: &Link<V>) -> bool {
    link.as_ref().is_some_and(|node| node.red)
}

fn is_left_red<V>(link: &Link<V>) -> bool {
    link.as_ref().is_some_and(|node| is_red(&node.left))
}

fn rotate_left<V>(mut h: Box<Node<V>>) -> Box<Node<V>> {
    let Some(mut x) = h.right.take() else {
        return h;
    };
    h.right = x.left.take();
    x.red = h.red;
    h.red = true;
    resize(&mut h);
    x.left = Some(h);
    resize(&mut x);
    x
}

fn rotate_right<V>(mut h: Box<Node<V>>) -> Box<Node<V>> {
    let Some(mut x) = h.left.take() else {
        return h;
    };
    h.left = x.right.take();
    x.red = h.red;
    h.red = true;
    resize(&mut h);
    x.right = Some(h);
    resize(&mut x);
    x
}

fn flip_colors<V>(h: &mut Node<V>) {
    h.red = !h.red;
    if let Some(left) = h.left.as_mut() {
        left.red = !left.red;
    }
    if let Some(right) = h.right.as_mut() {
        right.red = !right.red;
    }
}

fn balance<V>(mut h: Box<Node<V>>) -> Box<Node<V>> {
    if is_red(&h.right) && !is_red(&h.left) {
        h = rotate_left(h);
    }
    if is_red(&h.left) && is_left_red(&h.left) {
        h = rotate_right(h);
    }
    if is_red(&h.left) && is_red(&h.right) {
        flip_colors(&mut h);
    }
    resize(&mut h);
    h
}

fn move_red_left<V>(mut h: Box<Node<V>>) -> Box<Node<V>> {
    flip_colors(&mut h);
    if is_left_red(&h.right) {
        h.right = h.right.take().map(rotate_right);
        h = rotate_left(h);
        flip_colors(&mut h);
    }
    h
}

fn move_red_right<V>(mut h: Box<Node<V>>) -> Box<Node<V>> {
    flip_colors(&mut h);
    if is_left_red(&h.left) {
        h = rotate_right(h);
        flip_colors(&mut h);
    }
    h
}

fn insert_at<V>(link: Link<V>, rank: usize, hash: u64, value: V) -> Box<Node<V>> {
    let Some(mut h) = link else {
        return Box::new(Node {
            hash,
            value,
            red: true,
            size: 1,
            left: None,
            right: None,
        });
    };

    let left = size(&h.left);
    if rank <= left {
        h.left = Some(insert_at(h.left.take(), rank, hash, value));
    } else {
        h.right = Some(insert_at(h.right.take(), rank - left - 1, hash, value));
    }
    balance(h)
}

fn delete_min<V>(mut h: Box<Node<V>>) -> (Link<V>, Box<Node<V>>) {
    if h.left.is_none() {
        return (h.right.take(), h);
    }
    if !is_red(&h.left) && !is_left_red(&h.left) {
        h = move_red_left(h);
    }
    match h.left.take() {
        Some(left) => {
            let (left, min) = delete_min(left);
            h.left = left;
            (Some(balance(h)), min)
        }
        None => (h.right.take(), h),
    }
}

/// Removes the entry at `rank` within the subtree rooted at `h`. Rotations
/// keep in-order ranks, so the rank is compared against the left subtree
/// size again after each one.
fn delete<V>(mut h: Box<Node<V>>, rank: usize) -> (Link<V>, Option<V>) {
    if rank < size(&h.left) {
        if !is_red(&h.left) && !is_left_red(&h.left) {
            h = move_red_left(h);
        }
        let Some(left) = h.left.take() else {
            return (Some(h), None);
        };
        let (left, removed) = delete(left, rank);
        h.left = left;
        return (Some(balance(h)), removed);
    }

    if is_red(&h.left) {
        h = rotate_right(h);
    }
    if rank == size(&h.left) && h.right.is_none() {
        let node = *h;
        return (node.left, Some(node.value));
    }
    if !is_red(&h.right) && !is_left_red(&h.right) {
        h = move_red_right(h);
    }

    let left = size(&h.left);
    let Some(right) = h.right.take() else {
        return (Some(h), None);
    };
    if rank == left {
        let (right, min) = delete_min(right);
        let min = *min;
        h.right = right;
        h.hash = min.hash;
        let removed = core::mem::replace(&mut h.value, min.value);
        (Some(balance(h)), Some(removed))
    } else {
        let (right, removed) = delete(right, rank - left - 1);
        h.right = right;
        (Some(balance(h)), removed)
    }
}

fn locate_in<V>(
    link: Option<&Node<V>>,
    mut offset: usize,
    hash: u64,
    lookup: &impl Lookup<V>,
) -> Option<usize> {
    let mut link = link;
    while let Some(node) = link {
        let rank = offset + size(&node.left);
        let direction = match hash.cmp(&node.hash) {
            Ordering::Equal => lookup.direction(&node.value),
            unequal => Some(unequal),
        };
        match direction {
            Some(Ordering::Less) => link = node.left.as_deref(),
            Some(Ordering::Greater) => {
                offset = rank + 1;
                link = node.right.as_deref();
            }
            Some(Ordering::Equal) => return Some(rank),
            None => {
                if lookup.matches(&node.value) {
                    return Some(rank);
                }
                // Unordered equal hashes can sit on both sides of this node.
                return locate_in(node.left.as_deref(), offset, hash, lookup)
                    .or_else(|| locate_in(node.right.as_deref(), rank + 1, hash, lookup));
            }
        }
    }
    None
}

fn node_mut<V>(link: &mut Link<V>, rank: usize) -> Option<&mut Node<V>> {
    let node = link.as_deref_mut()?;
    let left = size(&node.left);
    match rank.cmp(&left) {
        Ordering::Less => node_mut(&mut node.left, rank),
        Ordering::Equal => Some(node),
        Ordering::Greater => node_mut(&mut node.right, rank - left - 1),
    }
}

fn drain_in_order<V>(link: Link<V>, out: &mut Vec<Slot<V>>) {
    if let Some(node) = link {
        let Node {
            hash,
            value,
            left,
            right,
            ..
        } = *node;
        drain_in_order(left, out);
        out.push(Slot { hash, value });
        drain_in_order(right, out);
    }
}

/// In-order iterator over a tree bucket.
pub(crate) struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
    remaining: usize,
}

impl<'a, V> Iter<'a, V> {
    fn push_left(&mut self, mut link: Option<&'a Node<V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
