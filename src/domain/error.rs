use thiserror::Error;

/// PHYSIs Link unified error type
#[derive(Error, Debug)]
pub enum PhysisError {
    #[error("Validation error: {field} must not be empty")]
    Validation { field: &'static str },

    #[error("Malformed frame: expected 4 fields, found {fields} in {payload:?}")]
    MalformedFrame { fields: usize, payload: String },

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl PhysisError {
    /// Whether the error is a user-input problem that aborted the action
    /// before anything reached the transport.
    pub fn is_validation(&self) -> bool {
        matches!(self, PhysisError::Validation { .. })
    }
}

pub type PhysisResult<T> = Result<T, PhysisError>;
