pub mod blink_rate;
pub mod body;
pub mod face_center;
pub mod face_existence;

pub use blink_rate::BlinkRateIntervalDetector;
pub use body::BodyConcentrationCounter;
pub use face_center::{CenterCluster, FaceCenterCounter, FaceCenterSample};
pub use face_existence::FaceExistenceRateCounter;
