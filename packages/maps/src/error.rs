//! Error types for the maps crate.

use thiserror::Error;
use trellis_bridge::BridgeError;
use trellis_config::CompileError;
use trellis_reactive::ReactiveError;

#[derive(Debug, Error)]
pub enum MapsError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Core(#[from] trellis_core::Error),
}

/// Result type alias for maps operations.
pub type Result<T> = std::result::Result<T, MapsError>;
