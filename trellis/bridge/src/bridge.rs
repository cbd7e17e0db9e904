//! Wiring the two contexts together.

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use trellis_core::Observable;

use crate::channel::ChannelEnd;
use crate::dispatcher::{Dispatcher, Routes};
use crate::error::Result;
use crate::proxy::RemoteClient;
use crate::registry::AddonRegistry;

/// Configuration for a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Identity of the default logic context, stamped on its envelopes.
    pub origin: String,
    /// Log every frame at debug level.
    pub log_frames: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            origin: "app".to_string(),
            log_frames: false,
        }
    }
}

/// A running bridge: the dispatcher task and the way in for logic contexts.
///
/// # Example
///
/// ```rust
/// use trellis_bridge::{Addon, AddonError, AddonRegistry, Bridge, BridgeConfig, Reply, Scope};
/// use trellis_config::RemoteManifest;
/// use trellis_core::Value;
///
/// struct Echo;
///
/// impl Addon for Echo {
///     fn invoke(
///         &mut self,
///         _scope: &mut Scope<'_>,
///         method: &str,
///         args: &[Value],
///     ) -> Result<Reply, AddonError> {
///         match method {
///             "echo" => Ok(Reply::Value(args.first().cloned().unwrap_or_default())),
///             other => Err(AddonError::NoSuchMethod(other.to_string())),
///         }
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> trellis_bridge::Result<()> {
/// let mut manifest = RemoteManifest::new();
/// manifest.add("app", ["echo"]);
/// let mut registry = AddonRegistry::new();
/// registry.register("echo", manifest.clone(), Echo)?;
///
/// let bridge = Bridge::spawn(registry, BridgeConfig::default());
/// let echo = bridge.client()?.proxy("echo", &manifest);
/// let value = echo.call("echo", vec![Value::from("hi")])?.await?;
/// assert_eq!(value, Value::from("hi"));
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    config: BridgeConfig,
    inbound: mpsc::UnboundedSender<String>,
    routes: Routes,
    bus: Observable,
    task: JoinHandle<()>,
}

impl Bridge {
    /// Start the dispatcher on its own task. Must run inside a tokio runtime.
    pub fn spawn(registry: AddonRegistry, config: BridgeConfig) -> Self {
        let (inbound, rx) = mpsc::unbounded_channel();
        let routes = Routes::default();
        let bus = Observable::new();

        info!(targets = ?registry.targets().collect::<Vec<_>>(), "bridge starting");
        let dispatcher = Dispatcher::new(registry, bus.clone(), routes.clone());
        let task = tokio::spawn(dispatcher.run(rx));

        Self {
            config,
            inbound,
            routes,
            bus,
            task,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The privileged context's bus, where readiness topics fire.
    pub fn bus(&self) -> &Observable {
        &self.bus
    }

    /// A raw channel end for a logic context: envelopes sent on it reach the
    /// dispatcher, results for `origin` arrive on it.
    pub fn connect_raw(&self, origin: &str) -> ChannelEnd {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        self.routes.insert(origin, results_tx);
        ChannelEnd::from_parts(Some(self.inbound.clone()), Some(results_rx))
            .log_frames(self.config.log_frames)
    }

    /// Connect a logic context. A second connection for the same origin
    /// takes over its results; the earlier client is closed, so its pending
    /// and later calls reject with `ChannelClosed`.
    pub fn connect(&self, origin: &str) -> Result<RemoteClient> {
        RemoteClient::attach(origin, self.connect_raw(origin), self.config.log_frames)
    }

    /// Connect the default logic context.
    pub fn client(&self) -> Result<RemoteClient> {
        self.connect(&self.config.origin)
    }

    /// Stop the dispatcher. Calls still pending reject with `ChannelClosed`.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("running", &!self.task.is_finished())
            .finish()
    }
}
