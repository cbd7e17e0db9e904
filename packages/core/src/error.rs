//! Error types for the core layer.

use thiserror::Error;

/// Errors raised by value conversion and bus handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be decoded into the requested type.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// A typed value could not be encoded into a `Value`.
    #[error("encode error: {message}")]
    Encode { message: String },

    /// A value had the wrong shape for the operation.
    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    /// Generic error with message.
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Error::Encode {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other {
            message: message.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
