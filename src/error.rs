use thiserror::Error;

use crate::models::location::Location;

pub type Result<T> = std::result::Result<T, SimError>;

/// Failures that can stop a simulation call.
///
/// Configuration and location problems are detected before any weather is
/// extracted. Night-time and cloudy edge cases inside the numerical pipeline
/// never surface here; they are clamped or masked in place.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    LocationResolution(#[from] LocationResolutionError),

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("numerical domain error: {0}")]
    NumericalDomain(String),

    #[error("weather variable '{0}' is not available")]
    MissingVariable(String),

    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LocationResolutionError {
    #[error("elevation for {0} is not uniquely resolvable")]
    AmbiguousElevation(Location),

    #[error("expected {expected} elevation values, got {actual}")]
    ElevationCountMismatch { expected: usize, actual: usize },

    #[error("{location} is outside the loaded weather window ({detail})")]
    OutOfBounds { location: Location, detail: String },
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    pub fn shape(what: &str, expected: impl ToString, actual: impl ToString) -> Self {
        SimError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Whether the failure is the caller's fault (bad options or locations).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SimError::InvalidLocation(_)
                | SimError::Configuration(_)
                | SimError::LocationResolution(_)
                | SimError::UnsupportedModel(_)
                | SimError::MissingVariable(_)
                | SimError::ShapeMismatch { .. }
        )
    }
}
