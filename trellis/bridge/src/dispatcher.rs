//! The privileged-context dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error, info_span, warn};
use trellis_core::{Observable, Value};

use crate::addon::{Reply, Scope};
use crate::envelope::{decode, encode, RemoteCallEnvelope, RemoteCallResult};
use crate::error::BridgeError;
use crate::readiness::ReadinessQueue;
use crate::registry::AddonRegistry;

/// Origin context name to the channel its results go back on.
#[derive(Debug, Clone, Default)]
pub(crate) struct Routes {
    inner: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl Routes {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<String>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, origin: &str, tx: mpsc::UnboundedSender<String>) {
        self.lock().insert(origin.to_string(), tx);
    }

    fn get(&self, origin: &str) -> Option<mpsc::UnboundedSender<String>> {
        self.lock().get(origin).cloned()
    }
}

/// Receives envelopes, runs them against the registry and sends results back.
///
/// Envelopes run one at a time, in arrival order. A method that replies
/// [`Reply::Later`] is completed on its own task so it never holds up the
/// envelopes behind it.
pub(crate) struct Dispatcher {
    registry: AddonRegistry,
    bus: Observable,
    readiness: ReadinessQueue,
    routes: Routes,
}

impl Dispatcher {
    pub(crate) fn new(registry: AddonRegistry, bus: Observable, routes: Routes) -> Self {
        Self {
            registry,
            bus,
            readiness: ReadinessQueue::new(),
            routes,
        }
    }

    /// Process frames until every sender is gone.
    pub(crate) async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<String>) {
        loop {
            let ready = self.readiness.notified();
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(text) => self.handle_frame(&text),
                    None => break,
                },
                _ = ready => self.flush_ready(),
            }
        }

        let dropped = self.readiness.clear(&self.bus);
        if !dropped.is_empty() {
            warn!(calls = dropped.len(), "dispatcher stopped with calls still waiting");
        }
        debug!("dispatcher stopped");
    }

    /// Decode and dispatch one inbound frame.
    fn handle_frame(&mut self, text: &str) {
        match decode::<RemoteCallEnvelope>(text) {
            Ok(envelope) => self.dispatch(envelope),
            Err(e) => error!(error = %e, "dropping undecodable frame"),
        }
    }

    /// Run one envelope, then anything it made ready.
    fn dispatch(&mut self, envelope: RemoteCallEnvelope) {
        self.execute(envelope);
        self.flush_ready();
    }

    fn flush_ready(&mut self) {
        loop {
            let ready = self.readiness.take_ready();
            if ready.is_empty() {
                break;
            }
            for envelope in ready {
                self.execute(envelope);
            }
        }
    }

    fn execute(&mut self, envelope: RemoteCallEnvelope) {
        let span = info_span!(
            "dispatch",
            call_id = %envelope.call_id,
            target = %envelope.target,
            method = %envelope.method,
        );
        let _enter = span.enter();

        let Some(registration) = self.registry.resolve_mut(&envelope.target) else {
            error!(origin = %envelope.origin, "envelope for unregistered target");
            let failure = BridgeError::UnknownTarget(envelope.target.clone());
            self.reply(&envelope, Err(failure.to_string()));
            return;
        };

        if !registration.exposes(&envelope.origin, &envelope.method) {
            warn!(origin = %envelope.origin, "method not exposed to caller");
            let failure = BridgeError::UnknownMethod {
                target: envelope.target.clone(),
                method: envelope.method.clone(),
            };
            self.reply(&envelope, Err(failure.to_string()));
            return;
        }

        let mut scope = Scope::new(&self.bus, envelope.call_id, &envelope.origin);
        let outcome = registration
            .addon_mut()
            .invoke(&mut scope, &envelope.method, &envelope.args);

        match outcome {
            Ok(Reply::Value(value)) => self.reply(&envelope, Ok(value)),
            Ok(Reply::NotReady(key)) => self.readiness.defer(&self.bus, &key, envelope),
            Ok(Reply::Later(future)) => {
                let route = self.routes.get(&envelope.origin);
                let call_id = envelope.call_id;
                tokio::spawn(async move {
                    let outcome = future.await.map_err(|e| e.to_string());
                    if let Some(route) = route {
                        send_result(&route, RemoteCallResult::from_outcome(call_id, outcome));
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "remote method failed");
                self.reply(&envelope, Err(e.to_string()));
            }
        }
    }

    fn reply(&self, envelope: &RemoteCallEnvelope, outcome: Result<Value, String>) {
        let Some(route) = self.routes.get(&envelope.origin) else {
            warn!(origin = %envelope.origin, "no route back to caller");
            return;
        };
        send_result(&route, RemoteCallResult::from_outcome(envelope.call_id, outcome));
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.registry.targets().collect::<Vec<_>>())
            .field("waiting", &self.readiness.len())
            .finish()
    }
}

fn send_result(route: &mpsc::UnboundedSender<String>, result: RemoteCallResult) {
    let call_id = result.call_id;
    match encode(&result) {
        Ok(text) => {
            if route.send(text).is_err() {
                debug!(%call_id, "caller gone, result dropped");
            }
        }
        Err(e) => error!(%call_id, error = %e, "could not encode result"),
    }
}
