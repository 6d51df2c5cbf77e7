//! Priority queue of pending notifications.
//!
//! The queue owns copies of every notification handed to it and always
//! exposes the highest ranked entry (category precedence first, then
//! priority). Storage is a fixed-capacity binary heap so the queue fits on
//! MCUs without an allocator; the capacity comfortably covers one error per
//! sensor plus the status notices the station raises.

use core::cmp::Ordering;
use core::fmt;

use heapless::Vec;
use heapless::binary_heap::{BinaryHeap, Max};

use crate::notification::{Notification, SensorType};

/// Default number of notifications a queue can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Error returned when a notification does not fit into the queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull(pub Notification);

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification queue is full, dropped {:?}", self.0)
    }
}

/// Heap entry ordered by rank only.
///
/// Structural equality of the wrapped notification is deliberately not used
/// here so that `Eq` and `Ord` stay consistent for the heap.
#[derive(Copy, Clone, Debug)]
struct Ranked(Notification);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank() == other.0.rank()
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_rank(&other.0)
    }
}

/// Fixed-capacity max-queue of notifications.
pub struct NotificationQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    heap: BinaryHeap<Ranked, Max, N>,
}

impl<const N: usize> NotificationQueue<N> {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Stores a copy of `notification` and returns the new top entry.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] carrying the rejected notification when the queue
    /// already holds `N` entries.
    pub fn add(&mut self, notification: Notification) -> Result<&Notification, QueueFull> {
        self.heap
            .push(Ranked(notification))
            .map_err(|Ranked(rejected)| QueueFull(rejected))?;
        Ok(self.peek_top())
    }

    /// Returns the highest ranked notification, if any.
    #[must_use]
    pub fn peek(&self) -> Option<&Notification> {
        self.heap.peek().map(|entry| &entry.0)
    }

    /// Returns the highest ranked notification.
    ///
    /// # Panics
    ///
    /// Panics when the queue is empty; check [`Self::is_empty`] first.
    #[must_use]
    pub fn peek_top(&self) -> &Notification {
        match self.peek() {
            Some(top) => top,
            None => panic!("peek_top called on an empty notification queue"),
        }
    }

    /// Removes and returns the highest ranked notification, if any.
    pub fn pop(&mut self) -> Option<Notification> {
        self.heap.pop().map(|entry| entry.0)
    }

    /// Removes and returns the highest ranked notification.
    ///
    /// # Panics
    ///
    /// Panics when the queue is empty; check [`Self::is_empty`] first.
    pub fn pop_top(&mut self) -> Notification {
        match self.pop() {
            Some(top) => top,
            None => panic!("pop_top called on an empty notification queue"),
        }
    }

    /// Removes every entry structurally equal to `target` and returns how many
    /// were dropped.
    ///
    /// Entries come off the heap in rank order, so the scan stops at the first
    /// entry of the target's category whose priority is below the target's.
    /// Entries of the other category never end the scan.
    pub fn remove_matching(&mut self, target: &Notification) -> usize {
        let mut kept: Vec<Ranked, N> = Vec::new();
        let mut removed = 0;

        while let Some(&Ranked(top)) = self.heap.peek() {
            if top.category() == target.category() && top.priority() < target.priority() {
                break;
            }
            self.heap.pop();
            if top == *target {
                removed += 1;
            } else {
                let pushed = kept.push(Ranked(top));
                debug_assert!(pushed.is_ok(), "scratch buffer matches queue capacity");
            }
        }

        self.restore(kept);
        removed
    }

    /// Removes every sensor error raised by `sensor`, whatever its status or
    /// priority, and returns how many were dropped. Plain notifications stay.
    pub fn remove_by_sensor(&mut self, sensor: SensorType) -> usize {
        let mut kept: Vec<Ranked, N> = Vec::new();
        let mut removed = 0;

        while let Some(entry) = self.heap.pop() {
            match entry.0.as_sensor_error() {
                Some(error) if error.sensor == sensor => removed += 1,
                _ => {
                    let pushed = kept.push(entry);
                    debug_assert!(pushed.is_ok(), "scratch buffer matches queue capacity");
                }
            }
        }

        self.restore(kept);
        removed
    }

    /// Drops every queued notification.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        N
    }

    /// Iterates over the queued notifications in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.heap.iter().map(|entry| &entry.0)
    }

    fn restore(&mut self, entries: Vec<Ranked, N>) {
        for entry in entries {
            let pushed = self.heap.push(entry);
            debug_assert!(pushed.is_ok(), "restored entries were already in the queue");
        }
    }
}

impl<const N: usize> Default for NotificationQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for NotificationQueue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("len", &self.len())
            .field("top", &self.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::ErrorStatus;

    #[test]
    fn empty_at_creation() {
        let queue: NotificationQueue = NotificationQueue::new();
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn size_tracks_additions_and_removals() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        let notices = [1, 2, 3, 4, 5].map(Notification::plain);
        for notice in notices {
            queue.add(notice).expect("queue has room");
        }
        assert_eq!(queue.len(), 5);

        for (expected_len, index) in [(4, 0), (3, 3), (2, 1), (1, 2), (0, 4)] {
            assert_eq!(queue.remove_matching(&notices[index]), 1);
            assert_eq!(queue.len(), expected_len);
        }
    }

    #[test]
    fn remove_matching_drops_every_equal_entry() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        for priority in [5, 5, 5, 6] {
            queue.add(Notification::plain(priority)).expect("queue has room");
        }

        assert_eq!(queue.remove_matching(&Notification::plain(5)), 3);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_top(), &Notification::plain(6));
    }

    #[test]
    fn add_returns_new_top() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        assert_eq!(queue.add(Notification::plain(3)), Ok(&Notification::plain(3)));
        assert_eq!(queue.add(Notification::plain(9)), Ok(&Notification::plain(9)));
        assert_eq!(queue.add(Notification::plain(4)), Ok(&Notification::plain(9)));
    }

    #[test]
    fn pop_top_yields_descending_priorities() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        for priority in [87, 36, 23, 3, 225, 171] {
            queue.add(Notification::plain(priority)).expect("queue has room");
        }

        for _ in 0..3 {
            assert_eq!(queue.peek_top().priority(), 225);
        }
        for expected in [225, 171, 87, 36, 23, 3] {
            assert_eq!(queue.pop_top().priority(), expected);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_rejects_and_returns_notification() {
        let mut queue: NotificationQueue<2> = NotificationQueue::new();
        queue.add(Notification::plain(1)).expect("queue has room");
        queue.add(Notification::plain(2)).expect("queue has room");

        let rejected = Notification::sensor_error(SensorType::AirQuality, ErrorStatus::High, 61);
        assert_eq!(queue.add(rejected), Err(QueueFull(rejected)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn remove_by_sensor_leaves_plain_notifications() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        queue.add(Notification::plain(10)).expect("queue has room");
        queue
            .add(Notification::sensor_error(SensorType::SoilHumidity, ErrorStatus::Low, 50))
            .expect("queue has room");

        assert_eq!(queue.remove_by_sensor(SensorType::SoilHumidity), 1);
        assert_eq!(queue.remove_by_sensor(SensorType::SoilHumidity), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_top(), &Notification::plain(10));
    }

    #[test]
    #[should_panic(expected = "empty notification queue")]
    fn peek_top_on_empty_queue_panics() {
        let queue: NotificationQueue = NotificationQueue::new();
        let _ = queue.peek_top();
    }

    #[test]
    #[should_panic(expected = "empty notification queue")]
    fn pop_top_on_empty_queue_panics() {
        let mut queue: NotificationQueue = NotificationQueue::new();
        queue.pop_top();
    }
}
