use std::collections::VecDeque;

use crate::error::ConfigError;
use crate::types::Timestamp;

/// Anything that can live in a time window.
pub trait Timestamped {
    fn timestamp(&self) -> Timestamp;
}

impl Timestamped for Timestamp {
    fn timestamp(&self) -> Timestamp {
        *self
    }
}

/// Bounded-duration FIFO. After every `append`/`catch_up(now)` no entry is
/// older than `now - width`; a span of exactly `width` is kept.
#[derive(Debug, Clone)]
pub struct SlidingTimeWindow<T = Timestamp> {
    width: Timestamp,
    entries: VecDeque<T>,
}

impl<T: Timestamped> SlidingTimeWindow<T> {
    pub fn new(width: Timestamp) -> Result<Self, ConfigError> {
        if width <= 0 {
            return Err(ConfigError::NonPositiveWidth(width));
        }
        Ok(Self {
            width,
            entries: VecDeque::new(),
        })
    }

    pub fn width(&self) -> Timestamp {
        self.width
    }

    /// Pushes `entry` and trims against its timestamp. Returns how many
    /// entries were evicted.
    pub fn append(&mut self, entry: T) -> usize {
        let now = entry.timestamp();
        self.entries.push_back(entry);
        self.catch_up(now)
    }

    /// Trims without adding, for when time moved on but nothing arrived.
    pub fn catch_up(&mut self, now: Timestamp) -> usize {
        let mut evicted = 0;
        self.evict_with(now, |_| evicted += 1);
        evicted
    }

    /// Trims against `now`, handing every evicted entry to `on_evict` oldest first.
    pub(crate) fn evict_with(&mut self, now: Timestamp, mut on_evict: impl FnMut(T)) {
        while let Some(front) = self.entries.front() {
            if now - front.timestamp() <= self.width {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                on_evict(entry);
            }
        }
    }

    /// Pushes without trimming; the caller trims on its own schedule.
    pub(crate) fn push_untrimmed(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn front(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn front_time(&self) -> Option<Timestamp> {
        self.entries.front().map(Timestamped::timestamp)
    }

    pub fn back_time(&self) -> Option<Timestamp> {
        self.entries.back().map(Timestamped::timestamp)
    }

    /// Seconds between the oldest entry and `now`.
    pub fn span(&self, now: Timestamp) -> Option<Timestamp> {
        self.front_time().map(|front| now - front)
    }

    /// True once the window reaches back a full width from `now`.
    pub fn is_full(&self, now: Timestamp) -> bool {
        self.span(now).is_some_and(|span| span >= self.width)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries with timestamps in the closed range `[start, end]`.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> impl Iterator<Item = &T> {
        let (lower, upper) = self.bounds(start, end);
        self.entries.range(lower..upper)
    }

    pub fn count_in(&self, start: Timestamp, end: Timestamp) -> usize {
        let (lower, upper) = self.bounds(start, end);
        upper - lower
    }

    fn bounds(&self, start: Timestamp, end: Timestamp) -> (usize, usize) {
        if start > end {
            return (0, 0);
        }
        let lower = self.entries.partition_point(|e| e.timestamp() < start);
        let upper = self.entries.partition_point(|e| e.timestamp() <= end);
        (lower, upper.max(lower))
    }
}

impl<T: Timestamped + Clone> SlidingTimeWindow<T> {
    /// Owned copy of the entries, safe to iterate while the window keeps moving.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
