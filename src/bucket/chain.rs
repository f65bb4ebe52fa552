use alloc::vec;
use alloc::vec::Vec;

use super::Slot;

/// Insertion-ordered run of entries sharing a bucket.
#[derive(Clone)]
pub(crate) struct Chain<V> {
    slots: Vec<Slot<V>>,
}

impl<V> Chain<V> {
    pub(crate) fn new() -> Self {
        Chain { slots: Vec::new() }
    }

    pub(crate) fn single(hash: u64, value: V) -> Self {
        Chain {
            slots: vec![Slot { hash, value }],
        }
    }

    pub(crate) fn from_slots(slots: Vec<Slot<V>>) -> Self {
        Chain { slots }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Appends an entry known to be absent and returns the new length.
    pub(crate) fn insert(&mut self, hash: u64, value: V) -> usize {
        self.slots.push(Slot { hash, value });
        self.slots.len()
    }

    /// Index of the matching entry. The cached hash is compared before the
    /// predicate runs.
    pub(crate) fn position(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.hash == hash && eq(&slot.value))
    }

    pub(crate) fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        self.slots
            .iter()
            .find(|slot| slot.hash == hash && eq(&slot.value))
            .map(|slot| &slot.value)
    }

    pub(crate) fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        self.slots
            .iter_mut()
            .find(|slot| slot.hash == hash && eq(&slot.value))
            .map(|slot| &mut slot.value)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&V> {
        self.slots.get(index).map(|slot| &slot.value)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        self.slots.get_mut(index).map(|slot| &mut slot.value)
    }

    /// Removes the entry at `index`, keeping the order of the rest.
    pub(crate) fn remove(&mut self, index: usize) -> Option<Slot<V>> {
        (index < self.slots.len()).then(|| self.slots.remove(index))
    }

    /// Stable partition into entries with `hash & bit` clear and set.
    pub(crate) fn split(self, bit: u64) -> (Self, Self) {
        let (low, high): (Vec<_>, Vec<_>) = self
            .slots
            .into_iter()
            .partition(|slot| slot.hash & bit == 0);
        (Chain { slots: low }, Chain { slots: high })
    }

    pub(crate) fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain_mut(|slot| f(&mut slot.value));
        before - self.slots.len()
    }

    pub(crate) fn into_slots(self) -> Vec<Slot<V>> {
        self.slots
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Slot<V>> {
        self.slots.iter()
    }
}
