//! Logic-context side of the bridge: clients, proxies and pending calls.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use trellis_config::RemoteManifest;
use trellis_core::{to_value, Value};

use crate::channel::ChannelEnd;
use crate::envelope::{decode, CallId, RemoteCallEnvelope, RemoteCallResult};
use crate::error::{BridgeError, Result};

type Waiter = oneshot::Sender<std::result::Result<Value, String>>;

#[derive(Debug, Default)]
struct Waiters {
    calls: HashMap<CallId, Waiter>,
    // Set once results stop arriving; no call may wait after that.
    closed: bool,
}

/// Calls sent and not yet answered.
#[derive(Debug, Clone, Default)]
struct Pending {
    inner: Arc<Mutex<Waiters>>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, call_id: CallId, waiter: Waiter) -> Result<()> {
        let mut waiters = self.lock();
        if waiters.closed {
            return Err(BridgeError::ChannelClosed);
        }
        waiters.calls.insert(call_id, waiter);
        Ok(())
    }

    fn forget(&self, call_id: &CallId) {
        self.lock().calls.remove(call_id);
    }

    fn settle(&self, result: RemoteCallResult) {
        let call_id = result.call_id;
        let Some(waiter) = self.lock().calls.remove(&call_id) else {
            debug!(%call_id, "stale result dropped");
            return;
        };
        if waiter.send(result.into_outcome()).is_err() {
            debug!(%call_id, "result for abandoned call");
        }
    }

    fn close(&self, origin: &str) {
        let abandoned = {
            let mut waiters = self.lock();
            waiters.closed = true;
            std::mem::take(&mut waiters.calls)
        };
        if !abandoned.is_empty() {
            warn!(origin, calls = abandoned.len(), "channel closed with calls pending");
        }
    }
}

/// A call in flight. Resolves with the remote value, or rejects with the
/// remote error description.
///
/// Dropping it abandons the call: the result is still delivered but ignored.
#[derive(Debug)]
pub struct PendingCall {
    call_id: CallId,
    rx: oneshot::Receiver<std::result::Result<Value, String>>,
}

impl PendingCall {
    pub fn call_id(&self) -> CallId {
        self.call_id
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(description)) => Err(BridgeError::Remote(description)),
            Err(_) => Err(BridgeError::ChannelClosed),
        })
    }
}

/// One logic context's connection to the dispatcher.
///
/// Cloning yields another handle on the same connection.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    origin: String,
    tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    log_frames: bool,
}

impl RemoteClient {
    /// Attach to a channel end: calls go out on its sender, results come in
    /// on its receiver. Spawns the task that resolves pending calls, so this
    /// must run inside a tokio runtime.
    pub fn attach(origin: impl Into<String>, end: ChannelEnd, log_frames: bool) -> Result<Self> {
        let (tx, rx) = end.into_parts();
        let (Some(tx), Some(rx)) = (tx, rx) else {
            return Err(BridgeError::ChannelClosed);
        };

        let client = Self {
            origin: origin.into(),
            tx,
            pending: Pending::default(),
            log_frames,
        };
        tokio::spawn(pump_results(
            rx,
            client.pending.clone(),
            client.origin.clone(),
            log_frames,
        ));
        Ok(client)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// A stand-in for `target` exposing the methods `manifest` lists for
    /// this client's context.
    pub fn proxy(&self, target: impl Into<String>, manifest: &RemoteManifest) -> RemoteProxy {
        RemoteProxy {
            client: self.clone(),
            target: target.into(),
            methods: manifest.methods_for(&self.origin).to_vec(),
        }
    }

    /// Number of calls still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().calls.len()
    }

    fn send_call(&self, target: &str, method: &str, args: Vec<Value>) -> Result<PendingCall> {
        let envelope = RemoteCallEnvelope::new(self.origin.clone(), target, method, args);
        let call_id = envelope.call_id;
        let text = crate::envelope::encode(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.pending.register(call_id, tx)?;

        if self.log_frames {
            debug!(frame = %text, "send frame");
        }
        if self.tx.send(text).is_err() {
            self.pending.forget(&call_id);
            return Err(BridgeError::ChannelClosed);
        }
        debug!(%call_id, target, method, "call sent");
        Ok(PendingCall { call_id, rx })
    }

    /// Settle the pending call a result belongs to.
    ///
    /// A result with no pending call is dropped.
    pub fn deliver(&self, result: RemoteCallResult) {
        self.pending.settle(result);
    }
}

async fn pump_results(
    mut rx: mpsc::UnboundedReceiver<String>,
    pending: Pending,
    origin: String,
    log_frames: bool,
) {
    while let Some(text) = rx.recv().await {
        if log_frames {
            debug!(frame = %text, "received frame");
        }
        match decode::<RemoteCallResult>(&text) {
            Ok(result) => pending.settle(result),
            Err(e) => warn!(error = %e, "dropping undecodable result"),
        }
    }
    pending.close(&origin);
}

/// A logic-context stand-in for an addon target.
///
/// Only methods listed in the manifest for the client's context can be
/// called; anything else fails here without touching the channel.
#[derive(Debug, Clone)]
pub struct RemoteProxy {
    client: RemoteClient,
    target: String,
    methods: Vec<String>,
}

impl RemoteProxy {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn exposes(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// Call a method with positional arguments.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<PendingCall> {
        if !self.exposes(method) {
            return Err(BridgeError::UnknownMethod {
                target: self.target.clone(),
                method: method.to_string(),
            });
        }
        self.client.send_call(&self.target, method, args)
    }

    /// Call a method whose single argument is a serializable struct.
    pub fn call_with<T: Serialize>(&self, method: &str, arg: &T) -> Result<PendingCall> {
        self.call(method, vec![to_value(arg)?])
    }

    /// Call a method and ignore its result.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.call(method, args).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> RemoteManifest {
        let mut manifest = RemoteManifest::new();
        manifest.add("app", ["create", "setZoom"]);
        manifest
    }

    #[tokio::test]
    async fn unlisted_method_fails_locally() {
        let (ours, mut theirs) = ChannelEnd::bidirectional();
        let client = RemoteClient::attach("app", ours, false).unwrap();
        let proxy = client.proxy("maps", &manifest());

        let err = proxy.call("destroyAll", vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownMethod { .. }));
        assert!(theirs.try_recv_text().is_none());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn other_contexts_see_their_own_methods() {
        let (ours, _theirs) = ChannelEnd::bidirectional();
        let client = RemoteClient::attach("worker", ours, false).unwrap();
        let proxy = client.proxy("maps", &manifest());
        assert!(proxy.methods().is_empty());
    }

    #[tokio::test]
    async fn call_sends_envelope_and_resolves() {
        let (ours, mut theirs) = ChannelEnd::bidirectional();
        let client = RemoteClient::attach("app", ours, false).unwrap();
        let proxy = client.proxy("maps", &manifest());

        let call = proxy.call("setZoom", vec![Value::from(10)]).unwrap();
        let frame = theirs.recv_text().await.unwrap();
        let envelope: RemoteCallEnvelope = decode(&frame).unwrap();
        assert_eq!(envelope.call_id, call.call_id());
        assert_eq!(envelope.method, "setZoom");
        assert_eq!(envelope.args, vec![Value::from(10)]);
        assert_eq!(envelope.origin, "app");

        theirs
            .send(&RemoteCallResult::success(envelope.call_id, Value::from(10)))
            .unwrap();
        assert_eq!(call.await.unwrap(), Value::from(10));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn closed_channel_rejects_pending() {
        let (ours, theirs) = ChannelEnd::bidirectional();
        let client = RemoteClient::attach("app", ours, false).unwrap();
        let call = client.proxy("maps", &manifest()).call("create", vec![]).unwrap();

        drop(theirs);
        assert!(matches!(call.await, Err(BridgeError::ChannelClosed)));
    }

    #[tokio::test]
    async fn calls_after_results_stop_fail_fast() {
        let (ours, theirs) = ChannelEnd::bidirectional();
        let (theirs_tx, theirs_rx) = theirs.into_parts();
        let client = RemoteClient::attach("app", ours, false).unwrap();
        let proxy = client.proxy("maps", &manifest());

        // The sending side is still open; only the results stopped.
        drop(theirs_tx);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let err = proxy.call("create", vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::ChannelClosed));
        assert_eq!(client.pending_count(), 0);
        drop(theirs_rx);
    }
}
