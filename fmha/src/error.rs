use thiserror::Error;

/// Legacy elapsed-time value returned when no specialization was launched.
pub const MISS_SENTINEL: f32 = -1.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
    #[error("Invalid mask descriptor: {0}")]
    InvalidMask(String),
    #[error("Unknown bias type: {0}")]
    UnknownBias(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("No {family} specialization for {request}")]
    NoSpecialization {
        family: &'static str,
        request: String,
    },
    #[error("No specialization for data type `{0}`")]
    UnknownDataType(String),
    #[error("Kernel timing failed: {0}")]
    Timing(String),
}

impl DispatchError {
    /// True when the request did not match any built specialization.
    pub fn is_miss(&self) -> bool {
        matches!(self, DispatchError::NoSpecialization { .. } | DispatchError::UnknownDataType(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate specialization: {0}")]
    DuplicateSpecialization(String),
}

pub type DispatchResult = Result<f32, DispatchError>;

/// Collapses a dispatch result into the single float the host framework expects.
pub fn legacy_elapsed_ms(result: &DispatchResult) -> f32 {
    match result {
        Ok(elapsed_ms) => *elapsed_ms,
        Err(_) => MISS_SENTINEL,
    }
}
