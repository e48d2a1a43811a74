use crate::types::Timestamp;

#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    #[error("Invalid landmarks: expected 6, 12 or 68 points, got {0}")]
    InvalidLandmarks(usize),
    #[error("Degenerate eye landmarks: horizontal eye width is zero")]
    DegenerateEye,
    #[error("No body posture samples in [{start}, {end}]")]
    NoBodySamples { start: Timestamp, end: Timestamp },
    #[error("Negative timestamp: {0}")]
    NegativeTimestamp(Timestamp),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Grader service is closed")]
    ServiceClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("window width must be positive, got {0}")]
    NonPositiveWidth(i64),
    #[error("good rate range is empty: {min}..={max}")]
    EmptyRateRange { min: u32, max: u32 },
    #[error("{name} must lie in [0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed interval log {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GraderError>;
