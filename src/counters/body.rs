use crate::error::{ConfigError, GraderError, Result};
use crate::sanitize::round2;
use crate::types::{Interval, Timestamp};
use crate::window::{DoubleTimeWindow, WindowSide};

/// Concentration vs distraction ticks from the posture and distance guards.
#[derive(Debug, Clone)]
pub struct BodyConcentrationCounter {
    concentration: DoubleTimeWindow,
    distraction: DoubleTimeWindow,
}

impl BodyConcentrationCounter {
    pub fn new(width: Timestamp) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            concentration: DoubleTimeWindow::new(width)?,
            distraction: DoubleTimeWindow::new(width)?,
        })
    }

    pub fn add_concentration(&mut self, now: Timestamp) {
        self.concentration.append(now);
        self.distraction.catch_up(now);
    }

    pub fn add_distraction(&mut self, now: Timestamp) {
        self.distraction.append(now);
        self.concentration.catch_up(now);
    }

    pub fn catch_up(&mut self, now: Timestamp) {
        self.concentration.catch_up(now);
        self.distraction.catch_up(now);
    }

    pub fn clear(&mut self, side: WindowSide) {
        self.concentration.clear(side);
        self.distraction.clear(side);
    }

    /// Share of concentration ticks among all ticks in `interval`, read from
    /// the chosen side, rounded to two decimals.
    ///
    /// A span without any tick is a caller error.
    pub fn get_ratio(&self, side: WindowSide, interval: &Interval) -> Result<f64> {
        let concentrated = self
            .concentration
            .window(side)
            .count_in(interval.start, interval.end);
        let distracted = self
            .distraction
            .window(side)
            .count_in(interval.start, interval.end);

        let total = concentrated + distracted;
        if total == 0 {
            return Err(GraderError::NoBodySamples {
                start: interval.start,
                end: interval.end,
            });
        }
        Ok(round2(concentrated as f64 / total as f64))
    }
}
