//! Concentration grading engine.
//!
//! Turns a stream of low-level attention signals (blinks, processed frames,
//! visible faces, posture ticks, face positions) into non-overlapping time
//! intervals, each carrying a concentration grade in `[0, 1]`.
//!
//! [`ConcentrationGrader`] is the synchronous core; [`GraderService`] runs it
//! as a tokio actor behind a cloneable [`GraderHandle`].

pub mod blink;
pub mod clock;
pub mod config;
pub mod counters;
pub mod error;
pub mod fuzzy;
pub mod grader;
pub mod logging;
pub mod persistence;
pub mod sanitize;
pub mod service;
pub mod types;
pub mod window;

pub use blink::{eye_aspect_ratio, BlinkDetector, EarResult, Landmark};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GraderConfig;
pub use error::{ConfigError, GraderError, PersistenceError, Result};
pub use fuzzy::FuzzyGrader;
pub use grader::{ConcentrationGrader, GraderState, GraderStats};
pub use persistence::{BufferedIntervalWriter, IntervalLog};
pub use service::{GraderHandle, GraderService};
pub use types::{Candidate, CandidateKind, Interval, IntervalType, Timestamp};
pub use window::{DoubleTimeWindow, SlidingTimeWindow, WindowSide};
