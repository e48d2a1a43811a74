use crate::error::ConfigError;
use crate::sanitize::clamp01;
use crate::types::{Interval, Timestamp};
use crate::window::{DoubleTimeWindow, Timestamped, WindowSide};

const MEAN_SHIFT_MAX_ITERATIONS: usize = 50;
const MEAN_SHIFT_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCenterSample {
    pub ts: Timestamp,
    pub x: f64,
    pub y: f64,
}

impl Timestamped for FaceCenterSample {
    fn timestamp(&self) -> Timestamp {
        self.ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterCluster {
    pub x: f64,
    pub y: f64,
    pub size: usize,
}

/// Face center positions over time. Feeds the deviation input of the fuzzy
/// grade and a mean-shift clustering used for diagnostics.
#[derive(Debug, Clone)]
pub struct FaceCenterCounter {
    centers: DoubleTimeWindow<FaceCenterSample>,
    deviation_scale: f64,
    bandwidth: f64,
}

impl FaceCenterCounter {
    pub fn new(width: Timestamp, deviation_scale: f64, bandwidth: f64) -> Result<Self, ConfigError> {
        if deviation_scale <= 0.0 || deviation_scale.is_nan() {
            return Err(ConfigError::NonPositive {
                name: "center_deviation_scale",
                value: deviation_scale,
            });
        }
        if bandwidth <= 0.0 || bandwidth.is_nan() {
            return Err(ConfigError::NonPositive {
                name: "cluster_bandwidth",
                value: bandwidth,
            });
        }
        Ok(Self {
            centers: DoubleTimeWindow::new(width)?,
            deviation_scale,
            bandwidth,
        })
    }

    pub fn add_center(&mut self, now: Timestamp, x: f64, y: f64) {
        self.centers.append(FaceCenterSample { ts: now, x, y });
    }

    pub fn catch_up(&mut self, now: Timestamp) {
        self.centers.catch_up(now);
    }

    pub fn clear(&mut self, side: WindowSide) {
        self.centers.clear(side);
    }

    pub fn len(&self) -> usize {
        self.centers.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mean distance of the span's centers from their centroid, divided by
    /// the deviation scale and clamped to `[0, 1]`. A span without samples
    /// counts as perfectly steady.
    pub fn deviation(&self, side: WindowSide, interval: &Interval) -> f64 {
        let samples: Vec<&FaceCenterSample> = self
            .centers
            .window(side)
            .range(interval.start, interval.end)
            .collect();
        if samples.is_empty() {
            return 0.0;
        }

        let n = samples.len() as f64;
        let cx = samples.iter().map(|s| s.x).sum::<f64>() / n;
        let cy = samples.iter().map(|s| s.y).sum::<f64>() / n;
        let mean_distance = samples
            .iter()
            .map(|s| distance(s.x, s.y, cx, cy))
            .sum::<f64>()
            / n;

        clamp01(mean_distance / self.deviation_scale)
    }

    /// Flat-kernel mean shift over every retained center, largest cluster first.
    pub fn clusters(&self) -> Vec<CenterCluster> {
        let points: Vec<(f64, f64)> = self
            .centers
            .window(WindowSide::Both)
            .range(Timestamp::MIN, Timestamp::MAX)
            .map(|s| (s.x, s.y))
            .collect();

        let mut clusters: Vec<CenterCluster> = Vec::new();
        for &seed in &points {
            let mode = self.shift_to_mode(seed, &points);
            match clusters
                .iter_mut()
                .find(|c| distance(c.x, c.y, mode.0, mode.1) < self.bandwidth / 2.0)
            {
                Some(cluster) => cluster.size += 1,
                None => clusters.push(CenterCluster {
                    x: mode.0,
                    y: mode.1,
                    size: 1,
                }),
            }
        }

        clusters.sort_by(|a, b| b.size.cmp(&a.size));
        clusters
    }

    fn shift_to_mode(&self, seed: (f64, f64), points: &[(f64, f64)]) -> (f64, f64) {
        let mut center = seed;
        for _ in 0..MEAN_SHIFT_MAX_ITERATIONS {
            let (mut sx, mut sy, mut count) = (0.0, 0.0, 0usize);
            for &(x, y) in points {
                if distance(x, y, center.0, center.1) <= self.bandwidth {
                    sx += x;
                    sy += y;
                    count += 1;
                }
            }
            if count == 0 {
                break;
            }
            let next = (sx / count as f64, sy / count as f64);
            let moved = distance(next.0, next.1, center.0, center.1);
            center = next;
            if moved < MEAN_SHIFT_TOLERANCE {
                break;
            }
        }
        center
    }
}

fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
}
