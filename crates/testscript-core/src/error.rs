use thiserror::Error;

/// Core error types for TestScript validation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown FHIR version: {0}")]
    UnknownFhirVersion(String),

    #[error("Unknown TestScript status: {0}")]
    UnknownStatus(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new UnknownFhirVersion error
    pub fn unknown_fhir_version(version: impl Into<String>) -> Self {
        Self::UnknownFhirVersion(version.into())
    }

    /// Create a new UnknownStatus error
    pub fn unknown_status(status: impl Into<String>) -> Self {
        Self::UnknownStatus(status.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (bad input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownFhirVersion(_) | Self::UnknownStatus(_) | Self::JsonError(_)
        )
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
