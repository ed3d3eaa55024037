//! In-process broadcast of reconciled preference snapshots.
//!
//! Messages carry the full document, never a diff, so a receiver always
//! replaces its local copy and no cross-instance ordering is required. Echo
//! suppression is structural: a subscriber registered under an origin id
//! never sees messages emitted with that same id. There is no replay; a
//! late subscriber catches up through its own load path.

use std::sync::{Arc, Mutex};

use tickerdesk_prefs_core::PreferenceDocument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastMessage {
    pub origin_id: Uuid,
    pub preferences: PreferenceDocument,
}

type Handler = Arc<dyn Fn(&BroadcastMessage) + Send + Sync>;

struct Subscriber {
    id: Uuid,
    origin_id: Uuid,
    handler: Handler,
}

/// Injectable pub/sub shared by every preference store instance of one
/// process. Cloning shares the subscriber registry.
#[derive(Clone, Default)]
pub struct PreferenceBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl PreferenceBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler bound to `origin_id`. The returned guard
    /// unsubscribes on drop.
    pub fn subscribe(
        &self,
        origin_id: Uuid,
        handler: impl Fn(&BroadcastMessage) + Send + Sync + 'static,
    ) -> BusSubscription {
        let id = Uuid::new_v4();
        let mut subscribers = lock_registry(&self.subscribers);
        subscribers.push(Subscriber {
            id,
            origin_id,
            handler: Arc::new(handler),
        });
        BusSubscription {
            id,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Synchronous fan-out to every subscriber except the originator.
    pub fn emit(&self, message: &BroadcastMessage) {
        let handlers: Vec<Handler> = {
            let subscribers = lock_registry(&self.subscribers);
            subscribers
                .iter()
                .filter(|subscriber| subscriber.origin_id != message.origin_id)
                .map(|subscriber| Arc::clone(&subscriber.handler))
                .collect()
        };
        tracing::debug!(
            origin_id = %message.origin_id,
            receivers = handlers.len(),
            "preference broadcast"
        );
        for handler in handlers {
            handler(message);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock_registry(&self.subscribers).len()
    }
}

/// Unsubscribes its handler when dropped.
pub struct BusSubscription {
    id: Uuid,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        let mut subscribers = lock_registry(&self.subscribers);
        subscribers.retain(|subscriber| subscriber.id != self.id);
    }
}

fn lock_registry(
    subscribers: &Mutex<Vec<Subscriber>>,
) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
    subscribers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(origin_id: Uuid) -> BroadcastMessage {
        BroadcastMessage {
            origin_id,
            preferences: PreferenceDocument::default(),
        }
    }

    #[test]
    fn fan_out_skips_the_originator() {
        let bus = PreferenceBus::new();
        let origin_a = Uuid::new_v4();
        let origin_b = Uuid::new_v4();

        let seen_by_a = Arc::new(AtomicUsize::new(0));
        let seen_by_b = Arc::new(AtomicUsize::new(0));

        let a_counter = Arc::clone(&seen_by_a);
        let _sub_a = bus.subscribe(origin_a, move |_| {
            a_counter.fetch_add(1, Ordering::SeqCst);
        });
        let b_counter = Arc::clone(&seen_by_b);
        let _sub_b = bus.subscribe(origin_b, move |_| {
            b_counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&message(origin_a));

        assert_eq!(seen_by_a.load(Ordering::SeqCst), 0);
        assert_eq!(seen_by_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let bus = PreferenceBus::new();
        let origin = Uuid::new_v4();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let subscription = bus.subscribe(origin, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);

        bus.emit(&message(Uuid::new_v4()));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_subscribers_get_no_replay() {
        let bus = PreferenceBus::new();
        bus.emit(&message(Uuid::new_v4()));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _subscription = bus.subscribe(Uuid::new_v4(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn messages_deliver_the_full_snapshot() {
        let bus = PreferenceBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        let _subscription = bus.subscribe(Uuid::new_v4(), move |message| {
            let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            sink.push(message.preferences.clone());
        });

        let origin = Uuid::new_v4();
        let mut preferences = PreferenceDocument::default();
        preferences.dark_mode = false;
        bus.emit(&BroadcastMessage {
            origin_id: origin,
            preferences: preferences.clone(),
        });

        let received = received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(received.as_slice(), &[preferences]);
    }
}
