use std::ops::RangeInclusive;

use tracing::debug;

use crate::error::ConfigError;
use crate::types::{Candidate, Interval, Timestamp};
use crate::window::{DoubleTimeWindow, WindowSide};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Proposes REAL_TIME spans while the blink rate sits in the good range and
/// LOOK_BACK spans for time that was never judged in real time.
#[derive(Debug, Clone)]
pub struct BlinkRateIntervalDetector {
    blinks: DoubleTimeWindow,
    good_rate: RangeInclusive<u32>,
    last_interval_end: Timestamp,
    extrusion: Option<Candidate>,
}

impl BlinkRateIntervalDetector {
    pub fn new(width: Timestamp, good_rate: RangeInclusive<u32>) -> Result<Self, ConfigError> {
        if good_rate.is_empty() {
            return Err(ConfigError::EmptyRateRange {
                min: *good_rate.start(),
                max: *good_rate.end(),
            });
        }
        Ok(Self {
            blinks: DoubleTimeWindow::new(width)?,
            good_rate,
            last_interval_end: 0,
            extrusion: None,
        })
    }

    pub fn add_blink(&mut self, now: Timestamp) -> Vec<Candidate> {
        self.blinks.append(now);
        self.evaluate(now)
    }

    /// Re-evaluates without a new blink so rate checks run on a quiet stream.
    pub fn tick(&mut self, now: Timestamp) -> Vec<Candidate> {
        self.blinks.catch_up(now);
        self.evaluate(now)
    }

    /// Blinks in the last full width, i.e. blinks per minute.
    pub fn blink_rate(&self) -> usize {
        self.blinks.current().len()
    }

    pub fn last_interval_end(&self) -> Timestamp {
        self.last_interval_end
    }

    pub fn sync_last_end_up(&mut self, end: Timestamp) {
        self.last_interval_end = self.last_interval_end.max(end);
    }

    /// Hands time back to the detector after a proposed span was not graded.
    pub fn release(&mut self, watermark: Timestamp) {
        self.last_interval_end = watermark;
        self.extrusion = None;
    }

    pub fn clear_windows(&mut self, side: WindowSide, now: Timestamp) {
        self.blinks.clear(side);
        let reset_to = match side {
            WindowSide::Previous => now - self.blinks.width(),
            WindowSide::Current | WindowSide::Both => now,
        };
        self.sync_last_end_up(reset_to);
        if side == WindowSide::Both {
            self.extrusion = None;
        }
    }

    /// Full reset used when grading (re)starts at `now`.
    pub fn restart(&mut self, now: Timestamp) {
        self.blinks.clear(WindowSide::Both);
        self.last_interval_end = now;
        self.extrusion = None;
    }

    pub fn take_extrusion(&mut self) -> Option<Candidate> {
        self.extrusion.take()
    }

    fn evaluate(&mut self, now: Timestamp) -> Vec<Candidate> {
        let width = self.blinks.width();
        let current = self.blinks.current();

        if let Some(front) = current.front_time() {
            let rate = current.len() as u32;
            if current.is_full(now)
                && self.good_rate.contains(&rate)
                && front >= self.last_interval_end
            {
                return self.propose_real_time(front, now, rate);
            }
        }

        let look_back_start = now - 2 * width;
        let look_back_end = now - width;
        if look_back_start >= self.last_interval_end {
            let rate = self.blinks.window(WindowSide::Previous).len() as u32;
            self.last_interval_end = look_back_end;
            debug!(
                start = look_back_start,
                end = look_back_end,
                rate,
                "look-back span proposed"
            );
            return vec![Candidate::look_back(
                Interval::new(look_back_start, look_back_end),
                rate,
            )];
        }

        Vec::new()
    }

    fn propose_real_time(&mut self, front: Timestamp, now: Timestamp, rate: u32) -> Vec<Candidate> {
        let width = self.blinks.width();
        let gap = front - self.last_interval_end;
        let mut proposals = Vec::with_capacity(2);

        if gap >= width / 2 {
            let span = Interval::new(self.last_interval_end, front);
            let gap_rate = self.per_minute_rate(span.start, span.end);
            proposals.push(Candidate::look_back(span, gap_rate));
        } else if gap > 0 {
            // too short to measure on its own; judged with the adjoining rate
            let span = Interval::new(self.last_interval_end, front);
            self.extrusion = Some(Candidate::look_back(span, rate));
        }

        proposals.push(Candidate::real_time(Interval::new(front, now), rate));
        self.last_interval_end = now;
        debug!(start = front, end = now, rate, gap, "real-time span proposed");
        proposals
    }

    /// Blinks in `[start, end)` scaled to a per-minute rate.
    fn per_minute_rate(&self, start: Timestamp, end: Timestamp) -> u32 {
        let duration = (end - start).max(1) as f64;
        let count = self.blinks.window(WindowSide::Both).count_in(start, end - 1) as f64;
        (count * SECONDS_PER_MINUTE / duration).round() as u32
    }
}
