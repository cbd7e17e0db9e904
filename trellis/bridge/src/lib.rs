//! Trellis remote bridge
//!
//! Connects logic contexts to the privileged context that owns the rendering
//! surface and third-party APIs. Nothing is shared between the two: calls
//! and results cross as JSON text frames over tokio channels.
//!
//! - Logic side: a [`RemoteClient`] per context hands out [`RemoteProxy`]
//!   stand-ins. Calling a manifest-listed method sends a
//!   [`RemoteCallEnvelope`] and returns a [`PendingCall`] future keyed by its
//!   [`CallId`].
//! - Privileged side: the dispatcher resolves each envelope's target in
//!   the [`AddonRegistry`], runs the [`Addon`] method and sends back a
//!   [`RemoteCallResult`]. A method whose resource does not exist yet replies
//!   [`Reply::NotReady`]; the call waits in the [`ReadinessQueue`] until the
//!   resource's readiness topic fires and then runs once more with the same
//!   arguments.
//!
//! Results are matched by call id, so they may arrive in any order. Failures
//! on the privileged side come back as rejected futures and never stop the
//! dispatcher.

mod addon;
mod bridge;
mod channel;
mod dispatcher;
mod envelope;
mod error;
mod proxy;
mod readiness;
mod registry;

pub use addon::{arg, Addon, AddonError, LaterReply, Reply, Scope};
pub use bridge::{Bridge, BridgeConfig};
pub use channel::ChannelEnd;
pub use envelope::{decode, encode, CallId, RemoteCallEnvelope, RemoteCallResult};
pub use error::{BridgeError, Result};
pub use proxy::{PendingCall, RemoteClient, RemoteProxy};
pub use readiness::ReadinessQueue;
pub use registry::{AddonRegistration, AddonRegistry};
