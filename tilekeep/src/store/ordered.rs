//! Insertion-ordered index shared by the store implementations.
//!
//! Each identity owns a slot stamped with a monotonically increasing sequence
//! number; a `BTreeMap` keyed by sequence gives the oldest entry without a
//! scan, so evicting `n` entries costs `O(n log len)`.

use crate::request::RequestIdentity;
use crate::store::types::RefreshPolicy;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct Slot<V> {
    sequence: u64,
    value: V,
}

/// Outcome of [`OrderedIndex::insert`].
#[derive(Debug)]
pub(crate) struct Inserted<V> {
    /// Sequence the new value was stored at
    pub sequence: u64,
    /// Previous value and the sequence it was stored at
    pub replaced: Option<(u64, V)>,
}

#[derive(Debug)]
pub(crate) struct OrderedIndex<V> {
    slots: HashMap<RequestIdentity, Slot<V>>,
    order: BTreeMap<u64, RequestIdentity>,
    next_sequence: u64,
    policy: RefreshPolicy,
}

impl<V> OrderedIndex<V> {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            slots: HashMap::new(),
            order: BTreeMap::new(),
            next_sequence: 0,
            policy,
        }
    }

    /// The sequence a write of `identity` would be stored at.
    pub fn sequence_for(&self, identity: &RequestIdentity) -> u64 {
        match (self.policy, self.slots.get(identity)) {
            (RefreshPolicy::PreserveAge, Some(slot)) => slot.sequence,
            _ => self.next_sequence,
        }
    }

    pub fn insert(&mut self, identity: RequestIdentity, value: V) -> Inserted<V> {
        let sequence = self.sequence_for(&identity);
        if sequence == self.next_sequence {
            self.next_sequence += 1;
        }

        let replaced = self
            .slots
            .insert(identity.clone(), Slot { sequence, value })
            .map(|old| (old.sequence, old.value));

        if let Some((old_sequence, _)) = &replaced {
            if *old_sequence != sequence {
                self.order.remove(old_sequence);
            }
        }
        self.order.insert(sequence, identity);

        Inserted { sequence, replaced }
    }

    /// Re-insert a slot at a known sequence while rebuilding from storage.
    ///
    /// If the identity is already present the higher sequence wins. Callers
    /// reject `u64::MAX` before restoring; it would leave no room for writes.
    pub fn restore(
        &mut self,
        sequence: u64,
        identity: RequestIdentity,
        value: V,
    ) -> Option<(u64, V)> {
        let next = sequence.checked_add(1).unwrap_or(u64::MAX);
        self.next_sequence = self.next_sequence.max(next);

        if let Some(existing) = self.slots.get(&identity) {
            if existing.sequence > sequence {
                return Some((sequence, value));
            }
        }

        let displaced = self
            .slots
            .insert(identity.clone(), Slot { sequence, value })
            .map(|old| (old.sequence, old.value));
        if let Some((old_sequence, _)) = &displaced {
            self.order.remove(old_sequence);
        }
        self.order.insert(sequence, identity);
        displaced
    }

    pub fn get(&self, identity: &RequestIdentity) -> Option<&V> {
        self.slots.get(identity).map(|slot| &slot.value)
    }

    pub fn sequence_of(&self, identity: &RequestIdentity) -> Option<u64> {
        self.slots.get(identity).map(|slot| slot.sequence)
    }

    pub fn remove(&mut self, identity: &RequestIdentity) -> Option<(u64, V)> {
        let slot = self.slots.remove(identity)?;
        self.order.remove(&slot.sequence);
        Some((slot.sequence, slot.value))
    }

    /// Identities oldest first.
    pub fn keys(&self) -> Vec<RequestIdentity> {
        self.order.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Sequence and identity of the oldest slot.
    pub fn oldest(&self) -> Option<(u64, RequestIdentity)> {
        self.order
            .first_key_value()
            .map(|(sequence, identity)| (*sequence, identity.clone()))
    }

    /// Remove up to `count` oldest slots, oldest first.
    pub fn pop_oldest(&mut self, count: usize) -> Vec<(RequestIdentity, u64, V)> {
        let mut removed = Vec::with_capacity(count.min(self.slots.len()));
        while removed.len() < count {
            let Some((sequence, identity)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.slots.remove(&identity) {
                removed.push((identity, sequence, slot.value));
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    fn id(n: usize) -> RequestIdentity {
        Request::get(format!("https://mt0.google.com/vt?n={}", n)).identity()
    }

    #[test]
    fn test_keys_follow_insertion_order() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        for n in [3, 1, 2] {
            index.insert(id(n), n);
        }

        assert_eq!(index.keys(), vec![id(3), id(1), id(2)]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_reset_age_moves_overwrite_to_newest() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        index.insert(id(1), "a");
        index.insert(id(2), "b");

        let inserted = index.insert(id(1), "a2");

        assert_eq!(inserted.replaced.map(|(_, v)| v), Some("a"));
        assert_eq!(index.keys(), vec![id(2), id(1)]);
        assert_eq!(index.get(&id(1)), Some(&"a2"));
    }

    #[test]
    fn test_preserve_age_keeps_position() {
        let mut index = OrderedIndex::new(RefreshPolicy::PreserveAge);
        index.insert(id(1), "a");
        index.insert(id(2), "b");

        let inserted = index.insert(id(1), "a2");

        assert_eq!(inserted.sequence, 0);
        assert_eq!(index.keys(), vec![id(1), id(2)]);
        assert_eq!(index.get(&id(1)), Some(&"a2"));
        // A fresh identity still goes to the back
        assert_eq!(index.insert(id(3), "c").sequence, 2);
    }

    #[test]
    fn test_pop_oldest_removes_prefix() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        for n in 1..=5 {
            index.insert(id(n), n);
        }

        let removed: Vec<_> = index.pop_oldest(2).into_iter().map(|(k, _, _)| k).collect();

        assert_eq!(removed, vec![id(1), id(2)]);
        assert_eq!(index.keys(), vec![id(3), id(4), id(5)]);
    }

    #[test]
    fn test_pop_oldest_more_than_len() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        index.insert(id(1), ());

        assert_eq!(index.pop_oldest(10).len(), 1);
        assert_eq!(index.len(), 0);
        assert!(index.pop_oldest(1).is_empty());
    }

    #[test]
    fn test_oldest_tracks_front() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        assert!(index.oldest().is_none());

        index.insert(id(1), ());
        index.insert(id(2), ());
        assert_eq!(index.oldest(), Some((0, id(1))));

        index.remove(&id(1));
        assert_eq!(index.oldest(), Some((1, id(2))));
    }

    #[test]
    fn test_restore_at_max_sequence_does_not_overflow() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);

        index.restore(u64::MAX, id(1), ());

        assert_eq!(index.sequence_of(&id(1)), Some(u64::MAX));
    }

    #[test]
    fn test_remove() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        index.insert(id(1), 1);
        index.insert(id(2), 2);

        assert_eq!(index.remove(&id(1)), Some((0, 1)));
        assert_eq!(index.remove(&id(1)), None);
        assert_eq!(index.keys(), vec![id(2)]);
    }

    #[test]
    fn test_restore_rebuilds_order_and_counter() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        index.restore(7, id(2), ());
        index.restore(3, id(1), ());

        assert_eq!(index.keys(), vec![id(1), id(2)]);
        assert_eq!(index.insert(id(3), ()).sequence, 8);
    }

    #[test]
    fn test_restore_keeps_newest_duplicate() {
        let mut index = OrderedIndex::new(RefreshPolicy::ResetAge);
        assert!(index.restore(5, id(1), "new").is_none());

        let stale = index.restore(2, id(1), "old");

        assert_eq!(stale, Some((2, "old")));
        assert_eq!(index.get(&id(1)), Some(&"new"));
        assert_eq!(index.sequence_of(&id(1)), Some(5));
    }
}
