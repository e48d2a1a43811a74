use crate::error::ConfigError;
use crate::types::Timestamp;

use super::sliding::{SlidingTimeWindow, Timestamped};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSide {
    Current,
    Previous,
    Both,
}

/// Two chained windows: entries aged out of `current` spend one more width
/// in `previous` before they are dropped.
#[derive(Debug, Clone)]
pub struct DoubleTimeWindow<T = Timestamp> {
    current: SlidingTimeWindow<T>,
    previous: SlidingTimeWindow<T>,
}

impl<T: Timestamped> DoubleTimeWindow<T> {
    pub fn new(width: Timestamp) -> Result<Self, ConfigError> {
        Ok(Self {
            current: SlidingTimeWindow::new(width)?,
            previous: SlidingTimeWindow::new(width)?,
        })
    }

    pub fn width(&self) -> Timestamp {
        self.current.width()
    }

    pub fn append(&mut self, entry: T) {
        let now = entry.timestamp();
        self.current.push_untrimmed(entry);
        self.catch_up(now);
    }

    pub fn catch_up(&mut self, now: Timestamp) {
        let previous = &mut self.previous;
        self.current.evict_with(now, |entry| previous.push_untrimmed(entry));
        self.previous.catch_up(now - self.current.width());
    }

    pub fn clear(&mut self, side: WindowSide) {
        match side {
            WindowSide::Current => self.current.clear(),
            WindowSide::Previous => self.previous.clear(),
            WindowSide::Both => {
                self.current.clear();
                self.previous.clear();
            }
        }
    }

    pub fn current(&self) -> &SlidingTimeWindow<T> {
        &self.current
    }

    pub fn window(&self, side: WindowSide) -> WindowView<'_, T> {
        WindowView { window: self, side }
    }

    pub fn total_len(&self) -> usize {
        self.current.len() + self.previous.len()
    }
}

impl<T: Timestamped + Clone> DoubleTimeWindow<T> {
    /// Owned copy of the previous window.
    pub fn previous(&self) -> Vec<T> {
        self.previous.snapshot()
    }
}

/// Read-only view over one or both halves of a `DoubleTimeWindow`, oldest first.
pub struct WindowView<'a, T> {
    window: &'a DoubleTimeWindow<T>,
    side: WindowSide,
}

impl<'a, T: Timestamped + 'a> WindowView<'a, T> {
    pub fn count_in(&self, start: Timestamp, end: Timestamp) -> usize {
        match self.side {
            WindowSide::Current => self.window.current.count_in(start, end),
            WindowSide::Previous => self.window.previous.count_in(start, end),
            WindowSide::Both => {
                self.window.previous.count_in(start, end)
                    + self.window.current.count_in(start, end)
            }
        }
    }

    pub fn range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        let window: &'a DoubleTimeWindow<T> = self.window;
        let (current, previous) = (&window.current, &window.previous);
        match self.side {
            WindowSide::Current => Box::new(current.range(start, end)),
            WindowSide::Previous => Box::new(previous.range(start, end)),
            WindowSide::Both => Box::new(
                previous
                    .range(start, end)
                    .chain(current.range(start, end)),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self.side {
            WindowSide::Current => self.window.current.len(),
            WindowSide::Previous => self.window.previous.len(),
            WindowSide::Both => self.window.total_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicted_entries_move_to_previous() {
        let mut window = DoubleTimeWindow::<Timestamp>::new(60).unwrap();
        for t in 0..=61 {
            window.append(t);
        }
        assert_eq!(window.current().front_time(), Some(1));
        assert_eq!(window.previous(), vec![0]);
        assert_eq!(window.total_len(), 62);
    }

    #[test]
    fn test_previous_is_width_bounded() {
        let mut window = DoubleTimeWindow::<Timestamp>::new(60).unwrap();
        for t in 0..=200 {
            window.append(t);
        }
        let previous = window.previous();
        assert_eq!(previous.first().copied(), Some(80));
        assert_eq!(previous.last().copied(), Some(139));
        assert!(previous.iter().all(|&p| p < window.current().front_time().unwrap()));
    }

    #[test]
    fn test_catch_up_moves_and_drops() {
        let mut window = DoubleTimeWindow::<Timestamp>::new(60).unwrap();
        window.append(0);
        window.append(30);
        window.catch_up(70);
        assert_eq!(window.previous(), vec![0]);
        assert_eq!(window.current().len(), 1);
        window.catch_up(200);
        assert_eq!(window.total_len(), 0);
    }

    #[test]
    fn test_selective_clear() {
        let mut window = DoubleTimeWindow::<Timestamp>::new(60).unwrap();
        for t in 0..=90 {
            window.append(t);
        }
        window.clear(WindowSide::Previous);
        assert!(window.previous().is_empty());
        assert!(!window.current().is_empty());
        window.clear(WindowSide::Both);
        assert_eq!(window.total_len(), 0);
    }

    #[test]
    fn test_view_counts_per_side() {
        let mut window = DoubleTimeWindow::<Timestamp>::new(60).unwrap();
        for t in 0..=100 {
            window.append(t);
        }
        // previous holds 0..=39, current holds 40..=100
        assert_eq!(window.window(WindowSide::Previous).count_in(30, 50), 10);
        assert_eq!(window.window(WindowSide::Current).count_in(30, 50), 11);
        assert_eq!(window.window(WindowSide::Both).count_in(30, 50), 21);
        assert_eq!(window.window(WindowSide::Both).range(38, 41).count(), 4);
    }
}
