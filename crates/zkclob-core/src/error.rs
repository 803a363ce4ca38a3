//! Error types for the zkCLOB order authentication pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed field element, point encoding or byte input.
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Wallet signature unavailable or curve operation failed while deriving keys.
    #[error("Key derivation failed: {message}")]
    KeyDerivation { message: String },

    #[error("Signing failed: {message}")]
    Signing { message: String },

    /// An order field does not fit the width the circuit allots to it.
    #[error("Value out of range for {field}: {value} exceeds {max}")]
    Range {
        field: &'static str,
        value: String,
        max: String,
    },

    #[error("Failed to load circuit artifact {artifact}: {message}")]
    ArtifactLoad { artifact: String, message: String },

    #[error("Proof failed local verification: {message}")]
    ProofInvalid { message: String },

    #[error("Malformed circuit outputs: {message}")]
    OutputParse { message: String },

    /// Identity verification or key readiness not satisfied.
    #[error("Precondition not met: {message}")]
    Precondition { message: String },

    #[error("Order submission failed: {message}")]
    Submission { message: String, status: Option<u16> },

    #[error("Prover error: {message}")]
    Prover { message: String },

    #[error("Proof worker unavailable: {message}")]
    WorkerUnavailable { message: String },

    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },

    #[error("Invalid order: {message}")]
    InvalidOrder { message: String },
}

impl Error {
    /// Whether a fresh re-submission by the caller is the expected recovery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Submission { .. } | Error::Http(_))
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Error::Encoding {
            message: message.into(),
        }
    }

    pub fn range(field: &'static str, value: impl ToString, max: impl ToString) -> Self {
        Error::Range {
            field,
            value: value.to_string(),
            max: max.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
