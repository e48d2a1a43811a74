//! Fuzzy combination of blink rate, posture and face steadiness into a grade.
//!
//! Membership shapes, rules and the final rescale are fixed: grades stay
//! comparable across releases only as long as these constants do.

use crate::sanitize::{clamp01, is_invalid, round2};

pub const BLINK_RATE_MAX: f64 = 21.0;
pub const GRADE_UNIVERSE_MAX: f64 = 13.0;

const DEFUZZ_STEP: f64 = 0.01;
const RESCALE_SLOPE: f64 = 0.2304;
const RESCALE_INTERCEPT: f64 = -0.9977;

/// Trapezoid `a <= b <= c <= d`; a triangle is `b == c`. Shoulders with
/// `a == b` or `c == d` are flat at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trapezoid {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Trapezoid {
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub const fn triangle(a: f64, b: f64, c: f64) -> Self {
        Self::new(a, b, b, c)
    }

    pub fn membership(&self, x: f64) -> f64 {
        if x < self.a || x > self.d {
            return 0.0;
        }
        if x < self.b {
            return (x - self.a) / (self.b - self.a);
        }
        if x <= self.c {
            return 1.0;
        }
        (self.d - x) / (self.d - self.c)
    }
}

/// Good / average / poor buckets over one input.
#[derive(Debug, Clone, Copy)]
pub struct Buckets {
    pub good: Trapezoid,
    pub average: Trapezoid,
    pub poor: Trapezoid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Degrees {
    pub good: f64,
    pub average: f64,
    pub poor: f64,
}

impl Buckets {
    pub fn fuzzify(&self, x: f64) -> Degrees {
        Degrees {
            good: self.good.membership(x),
            average: self.average.membership(x),
            poor: self.poor.membership(x),
        }
    }
}

pub const BLINK_BUCKETS: Buckets = Buckets {
    poor: Trapezoid::new(0.0, 0.0, 5.0, 10.0),
    average: Trapezoid::triangle(5.0, 10.0, 15.0),
    good: Trapezoid::new(10.0, 15.0, 21.0, 21.0),
};

pub const BODY_BUCKETS: Buckets = Buckets {
    poor: Trapezoid::new(0.0, 0.0, 0.3, 0.5),
    average: Trapezoid::triangle(0.3, 0.5, 0.7),
    good: Trapezoid::new(0.5, 0.7, 1.0, 1.0),
};

pub const CENTER_BUCKETS: Buckets = Buckets {
    good: Trapezoid::new(0.0, 0.0, 0.2, 0.4),
    average: Trapezoid::triangle(0.2, 0.4, 0.6),
    poor: Trapezoid::new(0.4, 0.6, 1.0, 1.0),
};

pub const GRADE_LOW: Trapezoid = Trapezoid::triangle(0.0, 0.0, GRADE_UNIVERSE_MAX);
pub const GRADE_MEDIUM: Trapezoid = Trapezoid::triangle(0.0, GRADE_UNIVERSE_MAX / 2.0, GRADE_UNIVERSE_MAX);
pub const GRADE_HIGH: Trapezoid = Trapezoid::triangle(0.0, GRADE_UNIVERSE_MAX, GRADE_UNIVERSE_MAX);

/// Firing strength of the three output buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleActivation {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

#[derive(Debug, Clone)]
pub struct FuzzyGrader {
    universe: Vec<f64>,
}

impl FuzzyGrader {
    pub fn new() -> Self {
        let steps = (GRADE_UNIVERSE_MAX / DEFUZZ_STEP).round() as usize;
        let universe = (0..=steps).map(|i| i as f64 * DEFUZZ_STEP).collect();
        Self { universe }
    }

    /// Grade in `[0, 1]`, rounded to two decimals.
    ///
    /// `blink_rate` is blinks per minute, `body_ratio` the share of
    /// concentrated posture ticks and `center_deviation` the normalized
    /// face-center spread.
    pub fn compute(&self, blink_rate: f64, body_ratio: f64, center_deviation: f64) -> f64 {
        let raw = self.raw_centroid(blink_rate, body_ratio, center_deviation);
        round2(clamp01(RESCALE_SLOPE * raw + RESCALE_INTERCEPT))
    }

    /// Defuzzified value on the `[0, 13]` grade universe.
    pub fn raw_centroid(&self, blink_rate: f64, body_ratio: f64, center_deviation: f64) -> f64 {
        let activation = Self::infer(blink_rate, body_ratio, center_deviation);

        let (mut moment, mut area) = (0.0, 0.0);
        for &x in &self.universe {
            let mu = GRADE_LOW
                .membership(x)
                .min(activation.low)
                .max(GRADE_MEDIUM.membership(x).min(activation.medium))
                .max(GRADE_HIGH.membership(x).min(activation.high));
            moment += x * mu;
            area += mu;
        }

        if area <= f64::EPSILON {
            return GRADE_UNIVERSE_MAX / 2.0;
        }
        moment / area
    }

    pub fn infer(blink_rate: f64, body_ratio: f64, center_deviation: f64) -> RuleActivation {
        let blink = BLINK_BUCKETS.fuzzify(sanitize_rate(blink_rate));
        let body = BODY_BUCKETS.fuzzify(clamp01(body_ratio));
        let center = CENTER_BUCKETS.fuzzify(clamp01(center_deviation));

        let low = any_two(blink.poor, body.poor, center.poor);
        let medium = 1.0 - blink.good.min(body.good).min(center.good);
        let high = any_two(1.0 - blink.poor, body.good, center.good);

        RuleActivation { low, medium, high }
    }
}

impl Default for FuzzyGrader {
    fn default() -> Self {
        Self::new()
    }
}

fn any_two(a: f64, b: f64, c: f64) -> f64 {
    a.min(b).max(a.min(c)).max(b.min(c))
}

fn sanitize_rate(rate: f64) -> f64 {
    if is_invalid(rate) {
        return 0.0;
    }
    rate.clamp(0.0, BLINK_RATE_MAX)
}
