//! Unified error type for the AQI monitor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Data load failed: {0}")]
    DataLoad(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Stable code reported to dashboard clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::DataLoad(_) | Error::Io(_) | Error::Csv(_) => "E001",
            Error::InvalidParameter(_) => "E002",
            Error::InsufficientData(_) => "E007",
            Error::Computation(_) => "E008",
            Error::Json(_) => "E009",
            Error::Config(_) => "E011",
            Error::Internal(_) => "E500",
        }
    }

    /// Human-readable summary for the code; `details` carries the specifics.
    pub fn message(&self) -> &'static str {
        match self {
            Error::DataLoad(_) | Error::Io(_) | Error::Csv(_) => {
                "Data loading failed - File not found"
            }
            Error::InvalidParameter(_) => "Invalid pollutant parameter",
            Error::InsufficientData(_) => "Insufficient data for visualization",
            Error::Computation(_) => "Model prediction failed",
            Error::Json(_) => "Data preprocessing error",
            Error::Config(_) => "Configuration error",
            Error::Internal(_) => "Internal Server Error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidParameter(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.message().to_string(),
            details: self.to_string(),
        }
    }
}

/// Structured error object handed to the serving layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: String,
}
