//! Trellis: reactive configuration objects that drive remote resources.
//!
//! A class is a compiled table of config slots. Instances of it react to
//! slot changes through explicit hook tables, and the hooks talk to a
//! privileged context only through the remote bridge: JSON envelopes in,
//! JSON results out, matched by call id.
//!
//! This crate re-exports the layers:
//! - [`core`]: the `Value` tree and the `Observable` bus
//! - [`config`]: declarations, class descriptors and the class registry
//! - [`reactive`]: instances, hooks, construction and teardown
//! - [`bridge`]: envelopes, proxies, addons and the dispatcher

pub use trellis_bridge as bridge;
pub use trellis_config as config;
pub use trellis_core as core;
pub use trellis_reactive as reactive;

pub use trellis_bridge::{Addon, AddonRegistry, Bridge, BridgeConfig, RemoteProxy, Reply};
pub use trellis_config::{ClassRegistry, Declarations};
pub use trellis_core::{Observable, Value};
pub use trellis_reactive::{Class, HookTable, Instance, InstanceFactory, ReactiveConfig};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs anything.
/// Returns whether this call installed the subscriber.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
