//! Calls waiting for a resource to become ready.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;
use trellis_core::{Observable, SubscriptionId};

use crate::envelope::RemoteCallEnvelope;

/// Keys whose readiness topic fired, waiting to be flushed.
#[derive(Debug, Default)]
struct Flushed {
    keys: Mutex<VecDeque<String>>,
    notify: Notify,
}

/// Deferred envelopes keyed by the resource they wait on.
///
/// Each waiting key holds one `once` subscription on the bus. When the
/// topic fires the subscription is gone and the key's envelopes come back
/// out of [`take_ready`](Self::take_ready) in the order they were deferred.
#[derive(Debug, Default)]
pub struct ReadinessQueue {
    waiting: HashMap<String, (SubscriptionId, VecDeque<RemoteCallEnvelope>)>,
    flushed: Arc<Flushed>,
}

impl ReadinessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an envelope until `key` is ready.
    pub fn defer(&mut self, bus: &Observable, key: &str, envelope: RemoteCallEnvelope) {
        debug!(key, call_id = %envelope.call_id, method = %envelope.method, "deferred until ready");
        if let Some((_, queue)) = self.waiting.get_mut(key) {
            queue.push_back(envelope);
            return;
        }

        let flushed = Arc::clone(&self.flushed);
        let ready_key = key.to_string();
        let subscription = bus.once(key, move |_| {
            lock(&flushed.keys).push_back(ready_key.clone());
            flushed.notify.notify_one();
            Ok(())
        });
        self.waiting
            .insert(key.to_string(), (subscription, VecDeque::from([envelope])));
    }

    /// Envelopes whose resource became ready, oldest first.
    pub fn take_ready(&mut self) -> Vec<RemoteCallEnvelope> {
        let keys: Vec<String> = lock(&self.flushed.keys).drain(..).collect();
        let mut ready = Vec::new();
        for key in keys {
            if let Some((_, queue)) = self.waiting.remove(&key) {
                debug!(key, calls = queue.len(), "resource ready");
                ready.extend(queue);
            }
        }
        ready
    }

    /// Number of envelopes still waiting.
    pub fn len(&self) -> usize {
        self.waiting.values().map(|(_, queue)| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn is_waiting_on(&self, key: &str) -> bool {
        self.waiting.contains_key(key)
    }

    /// Resolves when a readiness topic has fired since the last flush.
    pub(crate) fn notified(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let flushed = Arc::clone(&self.flushed);
        async move { flushed.notify.notified().await }
    }

    /// Drop everything waiting and the subscriptions behind it.
    pub fn clear(&mut self, bus: &Observable) -> Vec<RemoteCallEnvelope> {
        let mut dropped = Vec::new();
        for (_, (subscription, queue)) in self.waiting.drain() {
            bus.un(subscription);
            dropped.extend(queue);
        }
        dropped
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
