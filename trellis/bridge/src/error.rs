//! Error types for the bridge.

use thiserror::Error;

/// Errors that can occur on either side of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An envelope named a target with no registration.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// The method is not in the target's manifest for this context.
    #[error("method `{method}` is not exposed by `{target}`")]
    UnknownMethod { target: String, method: String },

    /// The remote method failed; carries its error description.
    #[error("remote failure: {0}")]
    Remote(String),

    /// The other side of the channel is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// A target name was registered twice.
    #[error("target already registered: {0}")]
    AlreadyRegistered(String),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] trellis_core::Error),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
