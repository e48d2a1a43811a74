mod detector;
mod ear;

pub use detector::BlinkDetector;
pub use ear::{eye_aspect_ratio, EarResult, Landmark};

#[cfg(test)]
pub(crate) use ear::synthetic_eye;
