//! Per-manager publish/subscribe broker.
//!
//! Listeners are registered on a [`Channel`] and invoked synchronously, in
//! registration order, for every broadcast on that channel.
//!
//! # Example
//!
//! ```ignore
//! use ws_relay::broker::Broker;
//! use ws_relay::protocol::{BrokerEvent, Channel};
//!
//! let broker = Broker::new();
//! let id = broker.on(Channel::Message, |event| println!("{event:?}"));
//! broker.broadcast(&BrokerEvent::Opened);
//! broker.off(id);
//! ```
//!
//! Broadcasting never holds the registry lock while a listener runs, so
//! listeners may register or remove listeners (including themselves).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::identifiers::ListenerId;
use crate::protocol::{BrokerEvent, Channel};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
pub type Listener = Arc<dyn Fn(&BrokerEvent) + Send + Sync>;

/// A registered listener.
struct Entry {
    id: ListenerId,
    channel: Channel,
    once: bool,
    listener: Listener,
}

struct Registry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

// ============================================================================
// Broker
// ============================================================================

/// Publish/subscribe registry keyed by [`Channel`].
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Broker {
    registry: Arc<Registry>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a listener that fires on every broadcast on `channel`
    /// until removed with [`off`](Self::off).
    pub fn on<F>(&self, channel: Channel, listener: F) -> ListenerId
    where
        F: Fn(&BrokerEvent) + Send + Sync + 'static,
    {
        self.register(channel, false, Arc::new(listener))
    }

    /// Registers a listener that fires on the next broadcast on `channel`
    /// and is then deregistered.
    pub fn once<F>(&self, channel: Channel, listener: F) -> ListenerId
    where
        F: Fn(&BrokerEvent) + Send + Sync + 'static,
    {
        self.register(channel, true, Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut entries = self.registry.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Delivers `event` to every listener on its channel.
    ///
    /// One-shot listeners are removed before any listener runs, so a
    /// re-entrant broadcast cannot fire them twice.
    pub fn broadcast(&self, event: &BrokerEvent) {
        let channel = event.channel();

        let listeners: Vec<Listener> = {
            let mut entries = self.registry.entries.lock();
            let listeners = entries
                .iter()
                .filter(|entry| entry.channel == channel)
                .map(|entry| Arc::clone(&entry.listener))
                .collect();
            entries.retain(|entry| !(entry.once && entry.channel == channel));
            listeners
        };

        trace!(%channel, listeners = listeners.len(), "Broadcasting");

        for listener in listeners {
            listener(event);
        }
    }

    /// Returns the number of listeners registered on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: Channel) -> usize {
        self.registry
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.channel == channel)
            .count()
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.entries.lock().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, channel: Channel, once: bool, listener: Listener) -> ListenerId {
        let id = ListenerId::new(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry.entries.lock().push(Entry {
            id,
            channel,
            once,
            listener,
        });
        trace!(%id, %channel, once, "Listener registered");
        id
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Guard that deregisters its listeners when dropped.
///
/// Ties listener lifetime to the future that owns the guard, so a settled
/// or abandoned operation never leaves listeners behind.
pub struct Subscription {
    broker: Broker,
    ids: Vec<ListenerId>,
}

impl Subscription {
    /// Creates an empty guard bound to `broker`.
    #[must_use]
    pub fn new(broker: &Broker) -> Self {
        Self {
            broker: broker.clone(),
            ids: Vec::with_capacity(2),
        }
    }

    /// Adds a listener to the guard.
    pub fn push(&mut self, id: ListenerId) {
        self.ids.push(id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.broker.off(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::protocol::{BinaryType, MessageEvent, TransportError};

    fn message(text: &str) -> BrokerEvent {
        BrokerEvent::Message(MessageEvent::new(text, BinaryType::Blob))
    }

    #[test]
    fn test_on_fires_every_time() {
        let broker = Broker::new();
        let seen = Arc::new(Mutex::new(0));
        let seen_clone = Arc::clone(&seen);

        broker.on(Channel::Opened, move |_| *seen_clone.lock() += 1);
        broker.broadcast(&BrokerEvent::Opened);
        broker.broadcast(&BrokerEvent::Opened);

        assert_eq!(*seen.lock(), 2);
    }

    #[test]
    fn test_broadcast_only_reaches_matching_channel() {
        let broker = Broker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        broker.on(Channel::Error, move |event| seen_clone.lock().push(event.clone()));
        broker.broadcast(&BrokerEvent::Closed);
        broker.broadcast(&BrokerEvent::Error(TransportError::new("boom")));

        assert_eq!(
            *seen.lock(),
            vec![BrokerEvent::Error(TransportError::new("boom"))]
        );
    }

    #[test]
    fn test_once_deregisters_after_first_fire() {
        let broker = Broker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        broker.once(Channel::Message, move |event| {
            seen_clone.lock().push(event.clone());
        });
        assert_eq!(broker.listener_count(Channel::Message), 1);

        broker.broadcast(&message("first"));
        broker.broadcast(&message("second"));

        assert_eq!(*seen.lock(), vec![message("first")]);
        assert!(broker.is_empty());
    }

    #[test]
    fn test_off_removes_listener() {
        let broker = Broker::new();
        let id = broker.on(Channel::Closed, |_| panic!("should be removed"));

        assert!(broker.off(id));
        assert!(!broker.off(id));
        broker.broadcast(&BrokerEvent::Closed);
    }

    #[test]
    fn test_reentrant_registration_does_not_deadlock() {
        let broker = Broker::new();
        let inner = broker.clone();
        let seen = Arc::new(Mutex::new(0));
        let seen_clone = Arc::clone(&seen);

        broker.once(Channel::Opened, move |_| {
            let seen = Arc::clone(&seen_clone);
            inner.on(Channel::Opened, move |_| *seen.lock() += 1);
        });

        // The listener added during the first broadcast only sees the second.
        broker.broadcast(&BrokerEvent::Opened);
        assert_eq!(*seen.lock(), 0);
        broker.broadcast(&BrokerEvent::Opened);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_subscription_drop_deregisters() {
        let broker = Broker::new();
        {
            let mut subscription = Subscription::new(&broker);
            subscription.push(broker.once(Channel::Message, |_| {}));
            subscription.push(broker.once(Channel::Error, |_| {}));
            assert_eq!(broker.len(), 2);
        }
        assert!(broker.is_empty());
    }

    proptest! {
        #[test]
        fn prop_delivery_follows_registration_order(count in 1usize..32) {
            let broker = Broker::new();
            let order = Arc::new(Mutex::new(Vec::new()));

            for index in 0..count {
                let order = Arc::clone(&order);
                broker.on(Channel::Message, move |_| order.lock().push(index));
            }
            broker.broadcast(&message("x"));

            prop_assert_eq!(order.lock().clone(), (0..count).collect::<Vec<_>>());
        }
    }
}
