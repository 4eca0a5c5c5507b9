//! Error types for the DQE engine

use std::io;
use thiserror::Error;

/// Main error type for DQE operations
#[derive(Error, Debug)]
pub enum DqeError {
    /// Device description is unusable; registration aborts
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),

    /// Colormode global header failed validation
    #[error("Invalid colormode header: {0}")]
    InvalidHeader(String),

    /// Colormode record header or attributes failed validation
    #[error("Invalid colormode record (id {id}): {reason}")]
    InvalidRecord {
        /// Block id of the offending record
        id: u8,
        /// What was wrong with it
        reason: String,
    },

    /// A numeric or hex token could not be parsed
    #[error("Failed to parse token '{token}'")]
    ParseToken {
        /// The offending token, truncated
        token: String,
    },

    /// Index or value outside the accepted range
    #[error("{what} {value} out of range (max {max})")]
    OutOfRange {
        /// Name of the parameter
        what: &'static str,
        /// Value that was rejected
        value: i64,
        /// Largest accepted value
        max: i64,
    },

    /// Samples cannot be expressed in the requested DPCM mode
    #[error("DPCM mode {mode}: {reason}")]
    Dpcm {
        /// Wire mode (0, 1 or 2)
        mode: u8,
        /// Why encoding failed
        reason: String,
    },

    /// Width, height or bit depth has not been received yet
    #[error("Display configuration not received yet")]
    NotConfigured,

    /// Colormode DMA buffer could not be imported or mapped
    #[error("DMA buffer error: {0}")]
    DmaBuf(String),

    /// Debug attribute name is not known
    #[error("Unknown debug attribute: {0}")]
    UnknownAttribute(String),

    /// Debug attribute does not accept stores
    #[error("Attribute {0} is read-only")]
    ReadOnly(&'static str),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<io::Error> for DqeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                DqeError::DmaBuf(err.to_string())
            }
            _ => DqeError::Io(err),
        }
    }
}

impl DqeError {
    pub(crate) fn token(token: &str) -> Self {
        DqeError::ParseToken {
            token: token.chars().take(16).collect(),
        }
    }

    pub(crate) fn record(id: u8, reason: impl Into<String>) -> Self {
        DqeError::InvalidRecord {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn range(what: &'static str, value: impl Into<i64>, max: impl Into<i64>) -> Self {
        DqeError::OutOfRange {
            what,
            value: value.into(),
            max: max.into(),
        }
    }
}

/// Result type for DQE operations
pub type DqeResult<T> = std::result::Result<T, DqeError>;
