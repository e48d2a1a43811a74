use tracing::debug;

use crate::error::ConfigError;
use crate::types::{Interval, Timestamp};
use crate::window::SlidingTimeWindow;

/// Tracks how many processed frames actually contained a face.
///
/// Callers pair every `add_face` with an `add_frame` for the same frame;
/// the counter does not check the pairing. A low span is proposed on every
/// frame while the condition holds; the grader's watermark and
/// `clear_windows` keep each second from being graded twice.
#[derive(Debug, Clone)]
pub struct FaceExistenceRateCounter {
    frames: SlidingTimeWindow,
    faces: SlidingTimeWindow,
    low_existence: f64,
}

impl FaceExistenceRateCounter {
    pub fn new(width: Timestamp, low_existence: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&low_existence) {
            return Err(ConfigError::RatioOutOfRange {
                name: "low_existence",
                value: low_existence,
            });
        }
        Ok(Self {
            frames: SlidingTimeWindow::new(width)?,
            faces: SlidingTimeWindow::new(width)?,
            low_existence,
        })
    }

    /// Records a processed frame; returns a low-existence span once the
    /// frame window covers a full width with too few faces.
    pub fn add_frame(&mut self, now: Timestamp) -> Option<Interval> {
        self.frames.append(now);
        self.faces.catch_up(now);
        self.check(now)
    }

    pub fn add_face(&mut self, now: Timestamp) {
        self.faces.append(now);
    }

    pub fn catch_up(&mut self, now: Timestamp) {
        self.frames.catch_up(now);
        self.faces.catch_up(now);
    }

    /// Share of frames with a face, `None` before the first frame.
    pub fn existence_rate(&self) -> Option<f64> {
        if self.frames.is_empty() {
            return None;
        }
        Some(self.faces.len() as f64 / self.frames.len() as f64)
    }

    pub fn is_low_existence(&self) -> bool {
        self.existence_rate()
            .is_some_and(|rate| rate <= self.low_existence)
    }

    pub fn clear_windows(&mut self) {
        self.frames.clear();
        self.faces.clear();
    }

    fn check(&self, now: Timestamp) -> Option<Interval> {
        let front = self.frames.front_time()?;
        if !self.frames.is_full(now) || !self.is_low_existence() {
            return None;
        }
        let span = Interval::new(front, front + self.frames.width());
        debug!(
            start = span.start,
            end = span.end,
            rate = self.existence_rate().unwrap_or_default(),
            "low face existence span"
        );
        Some(span)
    }
}
