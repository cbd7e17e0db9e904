//! Observable: a synchronous publish/subscribe bus.
//!
//! Every instance carries one. Handlers run in subscription order on the
//! caller's stack. A `fire` works on a snapshot of the subscriptions taken
//! when it starts, so handlers may subscribe or unsubscribe on the same bus
//! while it is firing without affecting the current pass.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::{Result, Value};

/// A bus handler. Receives the payload passed to `fire`.
pub type Handler = Arc<dyn Fn(&[Value]) -> Result<()> + Send + Sync>;

/// Identifies one subscription on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What to remove in [`Observable::un`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A single subscription.
    Id(SubscriptionId),
    /// Every subscription on a topic.
    Topic(String),
    /// Every subscription made on behalf of an owner.
    Owner(String),
}

impl From<SubscriptionId> for Selector {
    fn from(id: SubscriptionId) -> Self {
        Selector::Id(id)
    }
}

impl From<&str> for Selector {
    fn from(topic: &str) -> Self {
        Selector::Topic(topic.to_string())
    }
}

impl From<String> for Selector {
    fn from(topic: String) -> Self {
        Selector::Topic(topic)
    }
}

struct Subscription {
    id: SubscriptionId,
    topic: String,
    owner: Option<String>,
    once: bool,
    handler: Handler,
}

impl Subscription {
    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Id(id) => self.id == *id,
            Selector::Topic(topic) => self.topic == *topic,
            Selector::Owner(owner) => self.owner.as_deref() == Some(owner.as_str()),
        }
    }
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    // Kept in subscription order; ids are monotonic.
    entries: Vec<Subscription>,
}

/// A publish/subscribe bus.
///
/// Cloning an `Observable` yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct Observable {
    inner: Arc<Mutex<Subscriptions>>,
}

impl Observable {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscriptions(&self) -> MutexGuard<'_, Subscriptions> {
        // Critical sections never panic, so a poisoned lock still holds consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(
        &self,
        topic: String,
        owner: Option<String>,
        once: bool,
        handler: Handler,
    ) -> SubscriptionId {
        let mut subs = self.subscriptions();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.entries.push(Subscription {
            id,
            topic,
            owner,
            once,
            handler,
        });
        id
    }

    /// Subscribe to a topic.
    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(topic.into(), None, false, Arc::new(handler))
    }

    /// Subscribe on behalf of an owner, so the owner can drop all of its
    /// subscriptions at once with `un(Selector::Owner(..))`.
    pub fn on_owned<F>(
        &self,
        owner: impl Into<String>,
        topic: impl Into<String>,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(topic.into(), Some(owner.into()), false, Arc::new(handler))
    }

    /// Subscribe for a single firing. The subscription is removed as soon as
    /// a `fire` on the topic captures it.
    pub fn once<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(topic.into(), None, true, Arc::new(handler))
    }

    /// Remove subscriptions. Returns how many were removed.
    pub fn un(&self, selector: impl Into<Selector>) -> usize {
        let selector = selector.into();
        let mut subs = self.subscriptions();
        let before = subs.entries.len();
        subs.entries.retain(|s| !s.matches(&selector));
        before - subs.entries.len()
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.subscriptions().entries.clear();
    }

    /// Invoke every handler subscribed to `topic`, in subscription order.
    ///
    /// A failing handler is logged and does not stop the others. Returns the
    /// number of handlers invoked.
    pub fn fire(&self, topic: &str, payload: &[Value]) -> usize {
        let captured: Vec<(SubscriptionId, Handler)> = {
            let mut subs = self.subscriptions();
            let captured = subs
                .entries
                .iter()
                .filter(|s| s.topic == topic)
                .map(|s| (s.id, Arc::clone(&s.handler)))
                .collect();
            subs.entries.retain(|s| !(s.once && s.topic == topic));
            captured
        };

        for (id, handler) in &captured {
            if let Err(error) = handler(payload) {
                warn!(topic, subscription = %id, %error, "bus handler failed");
            }
        }
        captured.len()
    }

    /// Number of live subscriptions on a topic.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.subscriptions()
            .entries
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    pub fn has_listeners(&self, topic: &str) -> bool {
        self.listener_count(topic) > 0
    }

    /// Whether two handles refer to the same bus.
    pub fn same_bus(&self, other: &Observable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subs = self.subscriptions();
        f.debug_struct("Observable")
            .field("subscriptions", &subs.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| {
                let log = Arc::clone(&log);
                let name = name.to_string();
                Arc::new(move |_: &[Value]| -> Result<()> {
                    log.lock().unwrap().push(name.clone());
                    Ok(())
                }) as Handler
            }
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = Observable::new();
        let (log, make) = recorder();
        for name in ["a", "b", "c"] {
            let handler = make(name);
            bus.on("load", move |p: &[Value]| handler(p));
        }

        assert_eq!(bus.fire("load", &[]), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failing_handler_does_not_stop_others() {
        let bus = Observable::new();
        let (log, make) = recorder();
        let first = make("first");
        bus.on("load", move |p: &[Value]| first(p));
        bus.on("load", |_: &[Value]| Err(Error::other("broken handler")));
        let last = make("last");
        bus.on("load", move |p: &[Value]| last(p));

        assert_eq!(bus.fire("load", &[]), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "last"]);
    }

    #[test]
    fn payload_reaches_handler() {
        let bus = Observable::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.on("mapCreated", move |payload: &[Value]| {
            *sink.lock().unwrap() = payload.first().cloned();
            Ok(())
        });

        bus.fire("mapCreated", &[Value::from("m1")]);
        assert_eq!(*seen.lock().unwrap(), Some(Value::from("m1")));
    }

    #[test]
    fn handler_added_during_fire_misses_that_firing() {
        let bus = Observable::new();
        let (log, make) = recorder();
        let inner_bus = bus.clone();
        let late = make("late");
        bus.on("load", move |_: &[Value]| {
            let late = Arc::clone(&late);
            inner_bus.on("load", move |p: &[Value]| late(p));
            Ok(())
        });

        assert_eq!(bus.fire("load", &[]), 1);
        assert!(log.lock().unwrap().is_empty());

        // The handler added during the first pass sees the second one.
        assert_eq!(bus.fire("load", &[]), 2);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn unsubscribe_during_fire_keeps_captured_pass() {
        let bus = Observable::new();
        let (log, make) = recorder();
        let second_id = Arc::new(Mutex::new(None));

        let inner_bus = bus.clone();
        let target = Arc::clone(&second_id);
        bus.on("load", move |_: &[Value]| {
            if let Some(id) = *target.lock().unwrap() {
                inner_bus.un(id);
            }
            Ok(())
        });
        let second = make("second");
        let id = bus.on("load", move |p: &[Value]| second(p));
        *second_id.lock().unwrap() = Some(id);

        bus.fire("load", &[]);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);

        bus.fire("load", &[]);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn once_is_removed_after_first_firing() {
        let bus = Observable::new();
        let (log, make) = recorder();
        let handler = make("once");
        bus.once("m1", move |p: &[Value]| handler(p));

        assert_eq!(bus.fire("m1", &[]), 1);
        assert_eq!(bus.fire("m1", &[]), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(!bus.has_listeners("m1"));
    }

    #[test]
    fn un_by_id_topic_and_owner() {
        let bus = Observable::new();
        let a = bus.on("a", |_: &[Value]| Ok(()));
        bus.on("a", |_: &[Value]| Ok(()));
        bus.on_owned("map-1", "b", |_: &[Value]| Ok(()));
        bus.on_owned("map-1", "c", |_: &[Value]| Ok(()));
        bus.on_owned("map-2", "c", |_: &[Value]| Ok(()));

        assert_eq!(bus.un(a), 1);
        assert_eq!(bus.un(a), 0);
        assert_eq!(bus.un("a"), 1);
        assert_eq!(bus.un(Selector::Owner("map-1".into())), 2);
        assert_eq!(bus.listener_count("c"), 1);

        bus.clear();
        assert!(!bus.has_listeners("c"));
    }

    #[test]
    fn fire_without_listeners_is_a_noop() {
        let bus = Observable::new();
        assert_eq!(bus.fire("nothing", &[Value::Null]), 0);
    }
}
