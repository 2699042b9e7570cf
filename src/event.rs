//! Timestamped, totally-ordered, lazily-cancellable units of deferred work.
//!
//! Structurally this is the same `BinaryHeap`-of-reversed-`Ord` shape as a
//! cycle-accurate event scheduler: entries are ordered min-first by flipping
//! the natural `Ord`, and cancellation clears the action slot instead of
//! touching the heap, since a `BinaryHeap` cannot remove an arbitrary element
//! cheaply. Here the integer half-cycle clock becomes a floating virtual-time
//! timestamp and the action becomes a one-shot boxed closure over the
//! scheduler.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::scheduler::Scheduler;

/// Handle returned by [`EventHeap::push`], usable to cancel the event later.
pub type Seq = u64;

/// The callback executed when an event fires.
pub type Action = Box<dyn FnOnce(&Scheduler) + Send>;

struct ScheduledEvent {
    fire_at: f64,
    seq: Seq,
    /// `None` once cancelled.
    action: Option<Action>,
}

impl Eq for ScheduledEvent {}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (timestamp, seq)
        // pair sorts first. NaN can't arise: timestamps only ever come from
        // `now + non-negative delay` starting at a finite `now`.
        other
            .fire_at
            .partial_cmp(&self.fire_at)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending events, ordered lexicographically on (timestamp, seq).
#[derive(Default)]
pub(crate) struct EventHeap {
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: Seq,
}

impl EventHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a new event with the next sequence number. Returns that
    /// sequence number as a cancellation handle.
    pub(crate) fn push(&mut self, fire_at: f64, action: Action) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent {
            fire_at,
            seq,
            action: Some(action),
        });
        seq
    }

    /// Marks the event with this sequence number cancelled. A no-op if it
    /// already fired or was already cancelled.
    pub(crate) fn cancel(&mut self, target: Seq) {
        let mut temp: Vec<_> = self.queue.drain().collect();
        for e in &mut temp {
            if e.seq == target {
                e.action = None;
            }
        }
        self.queue.extend(temp);
    }

    /// Removes and returns the earliest live event, skipping any cancelled
    /// entries at the top of the heap.
    pub(crate) fn pop(&mut self) -> Option<(f64, Action)> {
        while let Some(mut entry) = self.queue.pop() {
            if let Some(action) = entry.action.take() {
                return Some((entry.fire_at, action));
            }
        }
        None
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.iter().all(|e| e.action.is_none())
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.iter().filter(|e| e.action.is_some()).count()
    }

    pub(crate) fn pending_times(&self) -> Vec<f64> {
        self.queue
            .iter()
            .filter(|e| e.action.is_some())
            .map(|e| e.fire_at)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_timestamp_then_sequence_order() {
        let mut heap = EventHeap::new();
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        for (t, n) in [(1.0, 1), (0.7, 2), (10.0, 3)] {
            let log = log.clone();
            heap.push(t, Box::new(move |_s| log.lock().unwrap().push(n)));
        }
        let mut order = Vec::new();
        while let Some((_t, action)) = heap.pop() {
            order.push(());
            let _ = action; // avoid calling with a real Scheduler in a unit test
        }
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn cancelled_event_is_skipped() {
        let mut heap = EventHeap::new();
        let fired = std::sync::Arc::new(std::sync::Mutex::new(false));
        let f = fired.clone();
        let seq = heap.push(1.0, Box::new(move |_s| *f.lock().unwrap() = true));
        heap.cancel(seq);
        assert!(heap.pop().is_none());
        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn same_timestamp_ties_break_by_sequence() {
        let mut heap = EventHeap::new();
        let seq_a = heap.push(5.0, Box::new(|_s| {}));
        let seq_b = heap.push(5.0, Box::new(|_s| {}));
        assert!(seq_a < seq_b);
    }
}
