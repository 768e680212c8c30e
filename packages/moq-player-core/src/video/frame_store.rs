//! Bounded, timestamp-indexed video frame store with amortised compaction.
//!
//! Backing storage is a dense `Vec` of slots with a head index `h` and a
//! logical length `L`; the tail is `h + L`. Binary search (not linear scan)
//! is required for `take_by_timestamp` because PTS lookups are in the
//! render scheduler's hot path.

use std::collections::VecDeque;

/// A decoded video frame handle.
///
/// Move-only ownership: the frame store, the scheduler, and the compositor
/// each own it exclusively in turn. The last holder is responsible for
/// releasing the underlying GPU resource (via `Drop`, supplied by the
/// concrete decoder implementation this crate does not own).
pub trait VideoFrame: Send {
    /// Presentation timestamp, microseconds.
    fn timestamp(&self) -> i64;
    /// Frame duration, microseconds.
    fn duration(&self) -> i64;
}

/// Aggregate counters the frame store maintains incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub length: usize,
    pub queue_length_us: i64,
    pub total_discarded: u64,
}

/// Result of [`FrameStore::take_by_timestamp`].
pub struct TakeResult<F> {
    pub frame: Option<F>,
    pub discarded: u64,
    pub queue_stats: QueueStats,
}

/// A bounded ring of up to `capacity` frames, keyed by non-decreasing
/// timestamp.
pub struct FrameStore<F: VideoFrame> {
    slots: VecDeque<F>,
    capacity: usize,
    queue_length_us: i64,
    total_discarded: u64,
}

impl<F: VideoFrame> FrameStore<F> {
    /// Creates an empty store with the given capacity (spec default: 90).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            queue_length_us: 0,
            total_discarded: 0,
        }
    }

    /// Inserts a frame in arrival order. If the store is at capacity, the
    /// oldest frame is evicted first and counted against
    /// `total_discarded`.
    pub fn insert(&mut self, frame: F) {
        if self.slots.len() == self.capacity {
            if let Some(evicted) = self.slots.pop_front() {
                self.queue_length_us -= evicted.duration();
                self.total_discarded += 1;
            }
        }
        self.queue_length_us += frame.duration();
        self.slots.push_back(frame);
    }

    /// Binary-searches the **last** slot whose `timestamp <= ts`, releases
    /// every slot strictly before it (counting them as discarded), and
    /// takes that slot by moving it out. Compacts if the dead prefix would
    /// otherwise accumulate (amortised by the caller via the underlying
    /// `VecDeque`'s own front-popping, which is O(1) and needs no explicit
    /// head-index bookkeeping).
    pub fn take_by_timestamp(&mut self, ts: i64) -> TakeResult<F> {
        let idx = self.partition_point_le(ts);

        let mut discarded = 0u64;
        let frame = match idx {
            Some(target_idx) => {
                for _ in 0..target_idx {
                    if let Some(old) = self.slots.pop_front() {
                        self.queue_length_us -= old.duration();
                        discarded += 1;
                    }
                }
                let taken = self.slots.pop_front();
                if let Some(f) = &taken {
                    self.queue_length_us -= f.duration();
                }
                taken
            }
            None => None,
        };

        self.total_discarded += discarded;
        TakeResult {
            frame,
            discarded,
            queue_stats: self.stats(),
        }
    }

    /// Non-destructively looks at the oldest buffered frame.
    #[must_use]
    pub fn peek_first(&self) -> Option<&F> {
        self.slots.front()
    }

    /// Non-destructively looks at the newest buffered frame.
    #[must_use]
    pub fn peek_last(&self) -> Option<&F> {
        self.slots.back()
    }

    /// Unconditionally takes the oldest buffered frame.
    pub fn take_next(&mut self) -> Option<F> {
        let taken = self.slots.pop_front();
        if let Some(f) = &taken {
            self.queue_length_us -= f.duration();
        }
        taken
    }

    /// Releases every slot (used on an audio/video epoch reset).
    pub fn clear(&mut self) {
        self.slots.clear();
        self.queue_length_us = 0;
    }

    /// Returns the index of the last slot whose timestamp is `<= ts`, or
    /// `None` if every slot's timestamp is greater than `ts` (or the store
    /// is empty).
    fn partition_point_le(&self, ts: i64) -> Option<usize> {
        if self.slots.is_empty() || self.slots[0].timestamp() > ts {
            return None;
        }
        // `partition_point` finds the first index where timestamp() > ts;
        // the last index with timestamp() <= ts is one before that.
        let split = self.slots.partition_point(|f| f.timestamp() <= ts);
        if split == 0 {
            None
        } else {
            Some(split - 1)
        }
    }

    /// Current aggregate counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            length: self.slots.len(),
            queue_length_us: self.queue_length_us,
            total_discarded: self.total_discarded,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestFrame {
        ts: i64,
        dur: i64,
    }

    impl VideoFrame for TestFrame {
        fn timestamp(&self) -> i64 {
            self.ts
        }
        fn duration(&self) -> i64 {
            self.dur
        }
    }

    fn frame(ts: i64) -> TestFrame {
        TestFrame { ts, dur: 33_333 }
    }

    #[test]
    fn insert_and_stats_track_queue_length() {
        let mut store = FrameStore::new(4);
        store.insert(frame(0));
        store.insert(frame(33_333));
        let stats = store.stats();
        assert_eq!(stats.length, 2);
        assert_eq!(stats.queue_length_us, 66_666);
        assert_eq!(stats.total_discarded, 0);
    }

    #[test]
    fn eviction_at_capacity_counts_exactly_one() {
        let mut store = FrameStore::new(2);
        store.insert(frame(0));
        store.insert(frame(1000));
        store.insert(frame(2000)); // evicts ts=0
        assert_eq!(store.stats().total_discarded, 1);
        assert_eq!(store.peek_first().unwrap().ts, 1000);
    }

    #[test]
    fn take_by_timestamp_finds_last_frame_at_or_before_target() {
        let mut store = FrameStore::new(8);
        for ts in [0, 1000, 2000, 3000] {
            store.insert(frame(ts));
        }
        let result = store.take_by_timestamp(2500);
        assert_eq!(result.frame.unwrap().ts, 2000);
        // frames at 0 and 1000 were discarded ahead of the taken frame.
        assert_eq!(result.discarded, 2);
        assert_eq!(store.peek_first().unwrap().ts, 3000);
    }

    #[test]
    fn take_by_timestamp_before_first_frame_returns_none() {
        let mut store = FrameStore::new(8);
        store.insert(frame(5000));
        let result = store.take_by_timestamp(1000);
        assert!(result.frame.is_none());
        assert_eq!(result.discarded, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_next_is_unconditional() {
        let mut store = FrameStore::new(8);
        store.insert(frame(10));
        store.insert(frame(20));
        assert_eq!(store.take_next().unwrap().ts, 10);
        assert_eq!(store.stats().length, 1);
    }

    #[test]
    fn clear_releases_every_slot() {
        let mut store = FrameStore::new(8);
        store.insert(frame(10));
        store.insert(frame(20));
        store.clear();
        assert_eq!(store.stats().length, 0);
        assert_eq!(store.stats().queue_length_us, 0);
    }

    #[test]
    fn queue_length_us_equals_sum_of_live_slot_durations() {
        let mut store = FrameStore::new(8);
        for ts in [0, 1000, 2000] {
            store.insert(frame(ts));
        }
        store.take_next();
        let expected: i64 = [1000, 2000].iter().map(|_| 33_333).sum();
        assert_eq!(store.stats().queue_length_us, expected);
    }
}
