use crate::error::{GraderError, Result};
use crate::sanitize::is_invalid;

/// A 2D landmark in pixel space, as produced by the face landmark model.
pub type Landmark = (f32, f32);

// dlib 68-point model eye ranges
const DLIB_LEFT_EYE: std::ops::Range<usize> = 36..42;
const DLIB_RIGHT_EYE: std::ops::Range<usize> = 42..48;
const DLIB_POINT_COUNT: usize = 68;

const EYE_POINTS: usize = 6;
const MIN_EYE_WIDTH: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarResult {
    pub left_ear: f64,
    pub right_ear: f64,
    pub avg_ear: f64,
}

#[inline]
fn euclidean_distance(p1: &Landmark, p2: &Landmark) -> f64 {
    let dx = f64::from(p2.0) - f64::from(p1.0);
    let dy = f64::from(p2.1) - f64::from(p1.1);
    (dx * dx + dy * dy).sqrt()
}

/// `(|p2-p6| + |p3-p5|) / (2 |p1-p4|)` over one eye's six contour points.
fn single_eye_ear(eye: &[Landmark]) -> Result<f64> {
    let vertical1 = euclidean_distance(&eye[1], &eye[5]);
    let vertical2 = euclidean_distance(&eye[2], &eye[4]);
    let horizontal = euclidean_distance(&eye[0], &eye[3]);

    if is_invalid(horizontal) || horizontal < MIN_EYE_WIDTH {
        return Err(GraderError::DegenerateEye);
    }

    let ear = (vertical1 + vertical2) / (2.0 * horizontal);
    if is_invalid(ear) {
        return Err(GraderError::DegenerateEye);
    }
    Ok(ear)
}

/// Eye aspect ratio from a landmark set.
///
/// Accepts the full dlib 68-point layout, a 12-point pair (left eye then
/// right eye, six points each in dlib order) or a single 6-point eye.
pub fn eye_aspect_ratio(landmarks: &[Landmark]) -> Result<EarResult> {
    let (left, right) = match landmarks.len() {
        DLIB_POINT_COUNT => (&landmarks[DLIB_LEFT_EYE], &landmarks[DLIB_RIGHT_EYE]),
        n if n == 2 * EYE_POINTS => (&landmarks[..EYE_POINTS], &landmarks[EYE_POINTS..]),
        EYE_POINTS => (landmarks, landmarks),
        other => return Err(GraderError::InvalidLandmarks(other)),
    };

    let left_ear = single_eye_ear(left)?;
    let right_ear = single_eye_ear(right)?;

    Ok(EarResult {
        left_ear,
        right_ear,
        avg_ear: (left_ear + right_ear) / 2.0,
    })
}

#[cfg(test)]
pub(crate) fn synthetic_eye(ear: f64) -> [Landmark; 6] {
    // eye width 20 px, both vertical pairs at ear * 20 px
    let half = (ear * 20.0 / 2.0) as f32;
    [
        (0.0, 0.0),
        (7.0, -half),
        (13.0, -half),
        (20.0, 0.0),
        (13.0, half),
        (7.0, half),
    ]
}
