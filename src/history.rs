//! Bounded history buffers backing the status and resend introspection
//! features.

use std::collections::VecDeque;

/// A fixed-capacity ring that is always full.
///
/// The ring starts seeded with a fill value; pushing overwrites the oldest
/// entry. Iteration runs oldest to newest.
pub struct BoundedRing<T> {
    slots: Vec<T>,
    // index of the oldest entry (and the next one to be overwritten)
    head: usize,
}

impl<T: Clone> BoundedRing<T> {
    pub fn new(capacity: usize, seed: T) -> Self {
        assert!(capacity > 0);
        BoundedRing {
            slots: vec![seed; capacity],
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Overwrite the oldest entry with `value`.
    pub fn push(&mut self, value: T) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.slots.len();
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots[self.head..].iter().chain(self.slots[..self.head].iter())
    }

    /// Snapshot of the contents, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Reply packets retained for resend requests, keyed by the 16-bit packet
/// sequence number.
///
/// Bounded to a fixed depth with FIFO eviction: once full, inserting a new
/// sequence number drops the entry inserted longest ago. Re-inserting a
/// sequence number that is still retained replaces its reply in place without
/// evicting anything.
pub struct ReplyHistory {
    entries: VecDeque<(u16, Vec<u32>)>,
    depth: usize,
}

impl ReplyHistory {
    pub fn new(depth: usize) -> Self {
        ReplyHistory {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The retained reply for `sequence`, if any.
    pub fn get(&self, sequence: u16) -> Option<&[u32]> {
        self.entries
            .iter()
            .find(|(seq, _)| *seq == sequence)
            .map(|(_, reply)| reply.as_slice())
    }

    /// Store `reply` under `sequence`, evicting the oldest entry when full.
    pub fn insert(&mut self, sequence: u16, reply: Vec<u32>) {
        if let Some(entry) = self.entries.iter_mut().find(|(seq, _)| *seq == sequence) {
            entry.1 = reply;
            return;
        }
        if self.entries.len() == self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back((sequence, reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_starts_seeded_and_overwrites_oldest() {
        let mut ring = BoundedRing::new(4, 0u32);
        assert_eq!(ring.to_vec(), vec![0, 0, 0, 0]);

        ring.push(1);
        ring.push(2);
        assert_eq!(ring.to_vec(), vec![0, 0, 1, 2]);

        ring.push(3);
        ring.push(4);
        ring.push(5);
        assert_eq!(ring.to_vec(), vec![2, 3, 4, 5]);
        assert_eq!(ring.capacity(), 4);
    }

    #[test]
    fn ring_depth_never_grows() {
        let mut ring = BoundedRing::new(16, 0u8);
        for i in 0..1000 {
            ring.push((i % 251) as u8);
        }
        assert_eq!(ring.to_vec().len(), 16);
    }

    #[test]
    fn reply_history_evicts_fifo() {
        let mut history = ReplyHistory::new(5);
        for seq in 0..5u16 {
            history.insert(seq, vec![seq as u32]);
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.get(0), Some(&[0u32][..]));

        // sixth insertion evicts the first-inserted entry
        history.insert(5, vec![5]);
        assert_eq!(history.len(), 5);
        assert_eq!(history.get(0), None);
        assert_eq!(history.get(1), Some(&[1u32][..]));
        assert_eq!(history.get(5), Some(&[5u32][..]));
    }

    #[test]
    fn reply_history_replaces_in_place() {
        let mut history = ReplyHistory::new(5);
        for seq in 0..5u16 {
            history.insert(seq, vec![seq as u32]);
        }
        history.insert(2, vec![0xAA]);
        assert_eq!(history.len(), 5);
        assert_eq!(history.get(2), Some(&[0xAAu32][..]));
        // replacement does not change eviction order
        history.insert(9, vec![9]);
        assert_eq!(history.get(0), None);
        assert_eq!(history.get(2), Some(&[0xAAu32][..]));
    }

    #[test]
    fn unknown_sequence_yields_nothing() {
        let history = ReplyHistory::new(5);
        assert!(history.get(0x1234).is_none());
    }
}
