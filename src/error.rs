use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipeBurstError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation refused: {0}")]
    Precondition(String),

    #[error("No pipeline detected within {threshold_m} m of the click")]
    DetectionMiss { threshold_m: f64 },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Geometry error: {0}")]
    Geometry(String),
}

impl PipeBurstError {
    /// True for outcomes that are reported to the user as information rather than failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::DetectionMiss { .. })
    }
}
