use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// A graded (or about to be graded) span of time.
///
/// Equality and ordering look at `(start, end)` only; the grade is payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
    pub grade: Option<f64>,
}

impl Interval {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start <= end, "interval start {start} after end {end}");
        Self {
            start,
            end,
            grade: None,
        }
    }

    pub fn with_grade(mut self, grade: f64) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn duration(&self) -> Timestamp {
        self.end - self.start
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start, self.end).cmp(&(other.start, other.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalType {
    LowFace,
    RealTime,
    LookBack,
}

impl IntervalType {
    /// Lower value wins a tie on start time.
    pub fn priority(&self) -> u8 {
        match self {
            IntervalType::LowFace => 10,
            IntervalType::RealTime => 20,
            IntervalType::LookBack => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::LowFace => "LOW_FACE",
            IntervalType::RealTime => "REAL_TIME",
            IntervalType::LookBack => "LOOK_BACK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    LowFace,
    RealTime { rate: u32 },
    LookBack { rate: u32 },
}

impl CandidateKind {
    pub fn interval_type(&self) -> IntervalType {
        match self {
            CandidateKind::LowFace => IntervalType::LowFace,
            CandidateKind::RealTime { .. } => IntervalType::RealTime,
            CandidateKind::LookBack { .. } => IntervalType::LookBack,
        }
    }
}

/// An interval waiting in the grader's heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub interval: Interval,
    pub kind: CandidateKind,
}

impl Candidate {
    pub fn low_face(interval: Interval) -> Self {
        Self {
            interval,
            kind: CandidateKind::LowFace,
        }
    }

    pub fn real_time(interval: Interval, rate: u32) -> Self {
        Self {
            interval,
            kind: CandidateKind::RealTime { rate },
        }
    }

    pub fn look_back(interval: Interval, rate: u32) -> Self {
        Self {
            interval,
            kind: CandidateKind::LookBack { rate },
        }
    }

    fn sort_key(&self) -> (Timestamp, u8, Timestamp) {
        (
            self.interval.start,
            self.kind.interval_type().priority(),
            self.interval.end,
        )
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    #[test]
    fn test_interval_ordering_ignores_grade() {
        let a = Interval::new(10, 70).with_grade(0.2);
        let b = Interval::new(10, 70).with_grade(0.9);
        assert_eq!(a, b);
        assert!(Interval::new(10, 70) < Interval::new(10, 71));
        assert!(Interval::new(9, 100) < Interval::new(10, 20));
    }

    #[test]
    fn test_priority_order() {
        assert!(IntervalType::LowFace.priority() < IntervalType::RealTime.priority());
        assert!(IntervalType::RealTime.priority() < IntervalType::LookBack.priority());
    }

    #[test]
    fn test_heap_pops_by_start_then_priority() {
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(Candidate::look_back(Interval::new(0, 60), 12)));
        heap.push(Reverse(Candidate::real_time(Interval::new(60, 120), 18)));
        heap.push(Reverse(Candidate::low_face(Interval::new(60, 120))));

        let order: Vec<IntervalType> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(c)| c.kind.interval_type())
            .collect();
        assert_eq!(
            order,
            vec![
                IntervalType::LookBack,
                IntervalType::LowFace,
                IntervalType::RealTime
            ]
        );
    }

    #[test]
    fn test_interval_json_shape() {
        let json = serde_json::to_value(Interval::new(1, 61).with_grade(0.75)).unwrap();
        assert_eq!(json, serde_json::json!({"start": 1, "end": 61, "grade": 0.75}));
        let json = serde_json::to_value(Interval::new(1, 61)).unwrap();
        assert_eq!(json, serde_json::json!({"start": 1, "end": 61, "grade": null}));
    }
}
