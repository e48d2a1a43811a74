//! Numeric hygiene for grader inputs and outputs.

/// True for NaN or infinite values.
pub fn is_invalid(x: f64) -> bool {
    x.is_nan() || x.is_infinite()
}

/// Clamps into `[0, 1]`; invalid values collapse to 0.
pub fn clamp01(x: f64) -> f64 {
    if is_invalid(x) {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Rounds half away from zero to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(0.42), 0.42);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.7377), 0.74);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.0), 1.0);
    }
}
