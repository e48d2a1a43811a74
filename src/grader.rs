//! The grading scheduler.
//!
//! Counters and the interval detector propose candidate spans; every tick the
//! grader drains them in `(start, priority, end)` order, grades what is still
//! ahead of the watermark and emits non-overlapping intervals.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn, Level};

use crate::blink::{eye_aspect_ratio, BlinkDetector, Landmark};
use crate::clock::Clock;
use crate::config::GraderConfig;
use crate::counters::{
    BlinkRateIntervalDetector, BodyConcentrationCounter, FaceCenterCounter,
    FaceExistenceRateCounter,
};
use crate::error::{GraderError, Result};
use crate::fuzzy::FuzzyGrader;
use crate::types::{Candidate, CandidateKind, Interval, Timestamp};
use crate::window::WindowSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraderState {
    Grading,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraderStats {
    pub emitted: u64,
    /// Candidates popped behind the watermark.
    pub discarded: u64,
    /// REAL_TIME candidates rejected for low face existence or a low grade.
    pub dropped: u64,
    /// Ticks that started with more than `heap_warn_len` candidates queued.
    pub backlog_ticks: u64,
    pub pending: usize,
}

pub struct ConcentrationGrader {
    config: GraderConfig,
    clock: Arc<dyn Clock>,
    fuzzy: FuzzyGrader,
    blink_detector: BlinkDetector,
    interval_detector: BlinkRateIntervalDetector,
    face_counter: FaceExistenceRateCounter,
    body_counter: BodyConcentrationCounter,
    center_counter: FaceCenterCounter,
    candidates: BinaryHeap<Reverse<Candidate>>,
    last_end_time: Timestamp,
    state: GraderState,
    stats: GraderStats,
}

impl ConcentrationGrader {
    pub fn new(config: GraderConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let width = config.window_width;

        Ok(Self {
            fuzzy: FuzzyGrader::new(),
            blink_detector: BlinkDetector::default(),
            interval_detector: BlinkRateIntervalDetector::new(width, config.good_rate_range())?,
            face_counter: FaceExistenceRateCounter::new(width, config.low_existence)?,
            body_counter: BodyConcentrationCounter::new(width)?,
            center_counter: FaceCenterCounter::new(
                width,
                config.center_deviation_scale,
                config.cluster_bandwidth,
            )?,
            candidates: BinaryHeap::new(),
            last_end_time: 0,
            state: GraderState::Stopped,
            stats: GraderStats::default(),
            config,
            clock,
        })
    }

    pub fn state(&self) -> GraderState {
        self.state
    }

    pub fn is_grading(&self) -> bool {
        self.state == GraderState::Grading
    }

    /// End of the most recently emitted interval.
    pub fn last_end_time(&self) -> Timestamp {
        self.last_end_time
    }

    pub fn stats(&self) -> GraderStats {
        GraderStats {
            pending: self.candidates.len(),
            ..self.stats
        }
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    pub fn start_grading(&mut self) -> Result<()> {
        let now = self.now()?;
        self.reset_windows();
        self.candidates.clear();
        self.blink_detector.reset();
        self.interval_detector.restart(now);
        self.last_end_time = now;
        self.state = GraderState::Grading;
        info!(now, "grading started");
        Ok(())
    }

    /// Drops everything gathered so far, including the interval in progress.
    pub fn stop_grading(&mut self) {
        let pending = self.candidates.len();
        self.reset_windows();
        self.candidates.clear();
        self.blink_detector.reset();
        self.state = GraderState::Stopped;
        info!(pending, last_end = self.last_end_time, "grading stopped");
    }

    pub fn add_frame(&mut self) -> Result<()> {
        let Some(now) = self.intake_time()? else {
            return Ok(());
        };
        if let Some(span) = self.face_counter.add_frame(now) {
            self.push(Candidate::low_face(span));
        }
        Ok(())
    }

    pub fn add_face(&mut self) -> Result<()> {
        if let Some(now) = self.intake_time()? {
            self.face_counter.add_face(now);
        }
        Ok(())
    }

    /// Records a blink detected upstream.
    pub fn add_blink(&mut self) -> Result<()> {
        if let Some(now) = self.intake_time()? {
            let proposals = self.interval_detector.add_blink(now);
            self.push_all(proposals);
        }
        Ok(())
    }

    /// Runs one frame's eye landmarks through the blink detector; returns
    /// whether the frame completed a blink.
    pub fn detect_blink(&mut self, landmarks: &[Landmark]) -> Result<bool> {
        let Some(now) = self.intake_time()? else {
            return Ok(false);
        };
        let ear = eye_aspect_ratio(landmarks).map_err(|err| {
            warn!(error = %err, points = landmarks.len(), "rejected eye landmarks");
            err
        })?;

        if !self.blink_detector.update(ear.avg_ear) {
            return Ok(false);
        }
        debug!(now, ear = ear.avg_ear, "blink");
        let proposals = self.interval_detector.add_blink(now);
        self.push_all(proposals);
        Ok(true)
    }

    pub fn add_body_concentration(&mut self) -> Result<()> {
        if let Some(now) = self.intake_time()? {
            self.body_counter.add_concentration(now);
        }
        Ok(())
    }

    pub fn add_body_distraction(&mut self) -> Result<()> {
        if let Some(now) = self.intake_time()? {
            self.body_counter.add_distraction(now);
        }
        Ok(())
    }

    pub fn add_face_center(&mut self, x: f64, y: f64) -> Result<()> {
        if !x.is_finite() || !y.is_finite() {
            warn!(x, y, "ignored non-finite face center");
            return Ok(());
        }
        if let Some(now) = self.intake_time()? {
            self.center_counter.add_center(now, x, y);
        }
        Ok(())
    }

    /// One scheduling pass. Returns the newly graded intervals in emission
    /// order; the watermark has already moved past each of them.
    pub fn tick(&mut self) -> Result<Vec<Interval>> {
        if !self.is_grading() {
            return Ok(Vec::new());
        }
        let now = self.now()?;

        self.face_counter.catch_up(now);
        self.body_counter.catch_up(now);
        self.center_counter.catch_up(now);
        let proposals = self.interval_detector.tick(now);
        self.push_all(proposals);

        if self.candidates.len() > self.config.heap_warn_len {
            self.stats.backlog_ticks += 1;
            warn!(
                pending = self.candidates.len(),
                limit = self.config.heap_warn_len,
                "candidate backlog"
            );
        }

        let mut emitted = Vec::new();
        while let Some(Reverse(candidate)) = self.candidates.pop() {
            if candidate.interval.start < self.last_end_time {
                self.stats.discarded += 1;
                debug!(
                    kind = candidate.kind.interval_type().as_str(),
                    start = candidate.interval.start,
                    end = candidate.interval.end,
                    watermark = self.last_end_time,
                    "discarded stale candidate"
                );
                continue;
            }

            match candidate.kind {
                CandidateKind::LookBack { rate } => {
                    let graded = self.grade_look_back(candidate.interval, rate);
                    self.emit(graded, "LOOK_BACK", &mut emitted);
                    self.interval_detector.clear_windows(WindowSide::Previous, now);
                }
                CandidateKind::LowFace => {
                    let ratio = self.body_ratio(WindowSide::Current, &candidate.interval);
                    self.emit(candidate.interval.with_grade(ratio), "LOW_FACE", &mut emitted);
                    self.face_counter.clear_windows();
                    self.interval_detector.clear_windows(WindowSide::Current, now);
                }
                CandidateKind::RealTime { rate } => {
                    self.grade_real_time(candidate.interval, rate, &mut emitted);
                }
            }
        }

        if !emitted.is_empty() && tracing::enabled!(Level::DEBUG) {
            let clusters = self.center_counter.clusters();
            debug!(count = clusters.len(), top = ?clusters.first(), "face center clusters");
        }

        Ok(emitted)
    }

    fn grade_real_time(&mut self, interval: Interval, rate: u32, emitted: &mut Vec<Interval>) {
        if self.face_counter.is_low_existence() {
            self.drop_real_time(interval, "low face existence");
            return;
        }

        let body = self.body_ratio(WindowSide::Current, &interval);
        let deviation = self.center_counter.deviation(WindowSide::Current, &interval);
        let grade = self.fuzzy.compute(f64::from(rate), body, deviation);
        if grade < self.config.min_real_time_grade {
            debug!(grade, rate, body, deviation, "real-time grade below threshold");
            self.drop_real_time(interval, "grade below threshold");
            return;
        }

        if let Some(extrusion) = self.interval_detector.take_extrusion() {
            if let CandidateKind::LookBack { rate } = extrusion.kind {
                if extrusion.interval.start >= self.last_end_time {
                    let graded = self.grade_look_back(extrusion.interval, rate);
                    self.emit(graded, "EXTRUSION", emitted);
                }
            }
        }
        self.emit(interval.with_grade(grade), "REAL_TIME", emitted);
    }

    fn drop_real_time(&mut self, interval: Interval, reason: &'static str) {
        self.stats.dropped += 1;
        self.interval_detector.release(self.last_end_time);
        debug!(
            start = interval.start,
            end = interval.end,
            reason,
            "real-time candidate dropped"
        );
    }

    /// Look-back spans end at or before the current window's front, so they
    /// are read from both halves.
    fn grade_look_back(&self, interval: Interval, rate: u32) -> Interval {
        let body = self.body_ratio(WindowSide::Both, &interval);
        let deviation = self.center_counter.deviation(WindowSide::Both, &interval);
        let grade = self.fuzzy.compute(f64::from(rate), body, deviation);
        interval.with_grade(grade)
    }

    fn body_ratio(&self, side: WindowSide, interval: &Interval) -> f64 {
        match self.body_counter.get_ratio(side, interval) {
            Ok(ratio) => ratio,
            Err(err) => {
                warn!(
                    error = %err,
                    fallback = self.config.default_body_ratio,
                    "body ratio unavailable"
                );
                self.config.default_body_ratio
            }
        }
    }

    fn emit(&mut self, interval: Interval, kind: &'static str, emitted: &mut Vec<Interval>) {
        emitted.push(interval);
        self.last_end_time = interval.end;
        self.interval_detector.sync_last_end_up(interval.end);
        self.stats.emitted += 1;
        info!(
            kind,
            start = interval.start,
            end = interval.end,
            grade = interval.grade,
            "interval graded"
        );
    }

    fn push(&mut self, candidate: Candidate) {
        debug!(
            kind = candidate.kind.interval_type().as_str(),
            start = candidate.interval.start,
            end = candidate.interval.end,
            "candidate queued"
        );
        self.candidates.push(Reverse(candidate));
    }

    fn push_all(&mut self, candidates: Vec<Candidate>) {
        for candidate in candidates {
            self.push(candidate);
        }
    }

    fn reset_windows(&mut self) {
        self.face_counter.clear_windows();
        self.body_counter.clear(WindowSide::Both);
        self.center_counter.clear(WindowSide::Both);
    }

    fn now(&self) -> Result<Timestamp> {
        let now = self.clock.now();
        if now < 0 {
            warn!(now, "clock reported a negative timestamp");
            return Err(GraderError::NegativeTimestamp(now));
        }
        Ok(now)
    }

    /// `None` while stopped: intake is ignored outside a grading session.
    fn intake_time(&self) -> Result<Option<Timestamp>> {
        if !self.is_grading() {
            return Ok(None);
        }
        self.now().map(Some)
    }
}

impl std::fmt::Debug for ConcentrationGrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcentrationGrader")
            .field("state", &self.state)
            .field("last_end_time", &self.last_end_time)
            .field("pending", &self.candidates.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blink::synthetic_eye;
    use crate::clock::ManualClock;

    const T0: Timestamp = 1_700_000_000;

    fn grader() -> (ConcentrationGrader, ManualClock) {
        let clock = ManualClock::new(T0);
        let grader = ConcentrationGrader::new(GraderConfig::default(), Arc::new(clock.clone()))
            .unwrap();
        (grader, clock)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = GraderConfig {
            good_rate_min: 30,
            good_rate_max: 10,
            ..GraderConfig::default()
        };
        let result = ConcentrationGrader::new(config, Arc::new(ManualClock::new(T0)));
        assert!(matches!(result, Err(GraderError::Config(_))));
    }

    #[test]
    fn test_intake_ignored_while_stopped() {
        let (mut grader, clock) = grader();
        for _ in 0..=90 {
            grader.add_frame().unwrap();
            grader.add_body_concentration().unwrap();
            clock.advance(1);
        }
        assert_eq!(grader.state(), GraderState::Stopped);
        assert!(grader.tick().unwrap().is_empty());
        assert_eq!(grader.stats(), GraderStats::default());
    }

    #[test]
    fn test_start_sets_watermark_to_now() {
        let (mut grader, clock) = grader();
        clock.set(T0 + 500);
        grader.start_grading().unwrap();
        assert!(grader.is_grading());
        assert_eq!(grader.last_end_time(), T0 + 500);
    }

    #[test]
    fn test_negative_clock_is_rejected() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();
        clock.set(-5);
        assert!(matches!(
            grader.add_frame(),
            Err(GraderError::NegativeTimestamp(-5))
        ));
        assert!(grader.tick().is_err());
    }

    #[test]
    fn test_low_face_graded_by_body_ratio() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();

        let mut emitted = Vec::new();
        for step in 0..=64 {
            grader.add_frame().unwrap();
            if step % 4 == 0 {
                grader.add_body_distraction().unwrap();
            } else {
                grader.add_body_concentration().unwrap();
            }
            emitted.extend(grader.tick().unwrap());
            clock.advance(1);
        }

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0], Interval::new(T0, T0 + 60));
        assert_eq!(emitted[0].grade, Some(0.74));
        assert_eq!(grader.last_end_time(), T0 + 60);
    }

    #[test]
    fn test_low_existence_drops_real_time() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();

        let mut emitted = Vec::new();
        for step in 0..=59 {
            grader.add_frame().unwrap();
            grader.add_body_concentration().unwrap();
            if step % 3 == 0 {
                grader.add_blink().unwrap();
            }
            emitted.extend(grader.tick().unwrap());
            clock.advance(1);
        }
        // the frame at T0 + 60 proposes LOW_FACE, the blink proposes REAL_TIME
        grader.add_blink().unwrap();
        grader.add_frame().unwrap();
        emitted.extend(grader.tick().unwrap());

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0], Interval::new(T0, T0 + 60));
        assert_eq!(emitted[0].grade, Some(1.0));
        // LOW_FACE wins the tie on start and pushes the watermark past REAL_TIME
        let stats = grader.stats();
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_poor_posture_drops_real_time() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();

        let mut emitted = Vec::new();
        for step in 0..=64 {
            grader.add_frame().unwrap();
            grader.add_face().unwrap();
            grader.add_body_distraction().unwrap();
            grader.add_face_center(if step % 2 == 0 { 0.0 } else { 400.0 }, 240.0).unwrap();
            if step % 3 == 0 {
                grader.add_blink().unwrap();
            }
            emitted.extend(grader.tick().unwrap());
            clock.advance(1);
        }

        assert!(emitted.is_empty());
        assert!(grader.stats().dropped >= 1);
        assert_eq!(grader.last_end_time(), T0);
    }

    #[test]
    fn test_stop_discards_pending_candidates() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();
        for _ in 0..=60 {
            grader.add_frame().unwrap();
            clock.advance(1);
        }
        assert_eq!(grader.stats().pending, 1);
        grader.stop_grading();
        assert_eq!(grader.stats().pending, 0);
        assert!(grader.tick().unwrap().is_empty());
    }

    #[test]
    fn test_detect_blink_feeds_interval_detector() {
        let (mut grader, _clock) = grader();
        grader.start_grading().unwrap();

        let both_eyes = |ear: f64| -> Vec<Landmark> {
            let eye = synthetic_eye(ear);
            eye.iter().chain(eye.iter()).copied().collect()
        };
        let open = both_eyes(0.3);
        let closed = both_eyes(0.05);
        for _ in 0..20 {
            assert!(!grader.detect_blink(&open).unwrap());
        }
        assert!(grader.detect_blink(&closed).unwrap());

        assert!(matches!(
            grader.detect_blink(&open[..5]),
            Err(GraderError::InvalidLandmarks(5))
        ));
    }

    #[test]
    fn test_backlog_warning_counts_ticks() {
        let clock = ManualClock::new(T0);
        let config = GraderConfig {
            heap_warn_len: 0,
            ..GraderConfig::default()
        };
        let mut grader = ConcentrationGrader::new(config, Arc::new(clock.clone())).unwrap();
        grader.start_grading().unwrap();

        let mut emitted = Vec::new();
        for _ in 0..=60 {
            grader.add_frame().unwrap();
            grader.add_body_concentration().unwrap();
            emitted.extend(grader.tick().unwrap());
            clock.advance(1);
        }

        // only the tick that found the LOW_FACE span queued is over the limit
        assert_eq!(grader.stats().backlog_ticks, 1);
        assert_eq!(emitted, vec![Interval::new(T0, T0 + 60)]);
        assert_eq!(grader.stats().pending, 0);
    }

    #[test]
    fn test_gap_look_back_reads_both_window_halves() {
        let (mut grader, clock) = grader();
        grader.start_grading().unwrap();

        let mut emitted = Vec::new();
        for step in 0..=100 {
            grader.add_frame().unwrap();
            grader.add_face().unwrap();
            // posture ticks begin with the blinks, on the gap's last second
            if step >= 40 {
                grader.add_body_concentration().unwrap();
                if (step - 40) % 3 == 0 {
                    grader.add_blink().unwrap();
                }
            }
            emitted.extend(grader.tick().unwrap());
            clock.advance(1);
        }

        assert_eq!(
            emitted,
            vec![Interval::new(T0, T0 + 40), Interval::new(T0 + 40, T0 + 100)]
        );
        let expected = FuzzyGrader::new().compute(0.0, 1.0, 0.0);
        assert_eq!(emitted[0].grade, Some(expected));
        // the default body ratio would have graded the gap at 0.5
        assert!(expected > 0.5);
        assert_eq!(emitted[1].grade, Some(1.0));
    }

    #[test]
    fn test_non_finite_landmarks_leave_blink_detection_intact() {
        let (mut grader, _clock) = grader();
        grader.start_grading().unwrap();

        let both_eyes = |ear: f64| -> Vec<Landmark> {
            let eye = synthetic_eye(ear);
            eye.iter().chain(eye.iter()).copied().collect()
        };
        let open = both_eyes(0.3);
        let mut broken = open.clone();
        broken[1] = (f32::NAN, f32::NAN);

        for _ in 0..20 {
            grader.detect_blink(&open).unwrap();
        }
        assert!(matches!(
            grader.detect_blink(&broken),
            Err(GraderError::DegenerateEye)
        ));
        assert!(grader.detect_blink(&both_eyes(0.05)).unwrap());
    }
}
