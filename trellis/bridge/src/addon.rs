//! Privileged-context addon targets.

use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use thiserror::Error;
use trellis_core::{from_value, Observable, Value};

use crate::envelope::CallId;

/// Errors an addon method reports back to its caller.
#[derive(Debug, Error)]
pub enum AddonError {
    #[error("{method}: invalid arguments: {message}")]
    InvalidArgs { method: String, message: String },

    #[error("no such method: {0}")]
    NoSuchMethod(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Core(#[from] trellis_core::Error),
}

impl AddonError {
    pub fn failed(message: impl Into<String>) -> Self {
        AddonError::Failed(message.into())
    }
}

/// A reply that completes later.
pub type LaterReply = Pin<Box<dyn Future<Output = Result<Value, AddonError>> + Send>>;

/// What an addon method produced.
pub enum Reply {
    /// The call completed.
    Value(Value),
    /// A prerequisite resource is missing. The call is queued and run again,
    /// with the same arguments, once the readiness topic of this key fires.
    NotReady(String),
    /// The call completes asynchronously. Later envelopes are not held up.
    Later(LaterReply),
}

impl Reply {
    pub fn later<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, AddonError>> + Send + 'static,
    {
        Reply::Later(Box::pin(future))
    }

    pub fn not_ready(key: impl Into<String>) -> Self {
        Reply::NotReady(key.into())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reply::NotReady(key) => f.debug_tuple("NotReady").field(key).finish(),
            Reply::Later(_) => f.write_str("Later(..)"),
        }
    }
}

/// What a method body can reach while it runs.
pub struct Scope<'a> {
    bus: &'a Observable,
    call_id: CallId,
    origin: &'a str,
}

impl<'a> Scope<'a> {
    /// A scope for one call. The dispatcher builds these; addons under test
    /// may too.
    pub fn new(bus: &'a Observable, call_id: CallId, origin: &'a str) -> Self {
        Self {
            bus,
            call_id,
            origin,
        }
    }

    /// The privileged context's bus.
    pub fn bus(&self) -> &Observable {
        self.bus
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// The context that made the call.
    pub fn origin(&self) -> &str {
        self.origin
    }

    /// Announce that the resource `key` is usable. Calls deferred on it run
    /// right after the current one. Returns the number of listeners reached.
    pub fn ready(&self, key: &str) -> usize {
        self.bus.fire(key, &[Value::from(key)])
    }
}

/// A privileged-context target. Exactly one instance exists per target name.
///
/// Methods run one at a time on the dispatcher, so the addon owns its state
/// without locking.
pub trait Addon: Send {
    fn invoke(
        &mut self,
        scope: &mut Scope<'_>,
        method: &str,
        args: &[Value],
    ) -> Result<Reply, AddonError>;
}

/// Decode positional argument `index` into a typed value.
pub fn arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<T, AddonError> {
    let value = args.get(index).cloned().unwrap_or_default();
    from_value(value).map_err(|e| AddonError::InvalidArgs {
        method: method.to_string(),
        message: format!("argument {}: {}", index, e),
    })
}
