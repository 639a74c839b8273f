//! The pending event queue.

use crate::registry::EventType;
use std::{cmp::Reverse, collections::BinaryHeap};

/// A pending event, owned by the [`EventQueue`] until it is popped and fired.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledEvent {
    /// Absolute due time, in raw ticks.
    pub due: i64,
    /// Insertion sequence number, used as the FIFO tie-break.
    pub seq: u64,
    /// The registered event type to fire.
    pub event: EventType,
    /// Opaque caller data forwarded to the callback.
    pub userdata: u64,
}

// Ordering deliberately considers only (due, seq): two entries at the same due
// time fire in insertion order, never in callback or userdata order.
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// An ordered multiset of [`ScheduledEvent`], keyed by `(due, seq)`.
///
/// Only ever mutated by the thread that owns the scheduler.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::with_capacity(16),
            next_seq: 0,
        }
    }

    /// Inserts an event due at `due`, assigning it the next sequence number.
    #[inline(always)]
    pub fn push(&mut self, due: i64, event: EventType, userdata: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledEvent {
            due,
            seq,
            event,
            userdata,
        }));
    }

    /// Pops the earliest entry if it is due at or before `now`.
    #[inline(always)]
    pub fn pop_due(&mut self, now: i64) -> Option<ScheduledEvent> {
        if self.heap.peek().is_some_and(|Reverse(e)| e.due <= now) {
            self.heap.pop().map(|Reverse(e)| e)
        } else {
            None
        }
    }

    /// The due time of the earliest entry, if any.
    #[inline(always)]
    pub fn next_due(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
