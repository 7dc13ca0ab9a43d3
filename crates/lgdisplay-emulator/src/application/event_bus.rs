//! Topic-keyed publish/subscribe for display events.
//!
//! The bus is an ordinary owned value: build one with [`EventBus::new`],
//! wrap it in an `Arc`, and hand it to every component that publishes or
//! subscribes.  Tests create as many isolated buses as they like.
//!
//! # Delivery
//!
//! Each subscription owns an unbounded queue drained by its own Tokio task.
//! [`EventBus::publish`] only enqueues, so it never waits for subscriber
//! work.  Different subscriptions run concurrently with no ordering between
//! them; a single subscription sees events in publish order, even when it
//! spans several topics (see [`EventBus::subscribe_topics`]).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use lgdisplay_core::{DisplayEvent, EventTopic};

type Subscribers = HashMap<EventTopic, Vec<mpsc::UnboundedSender<DisplayEvent>>>;

/// Process-wide event bus, passed explicitly to its users.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Subscribers>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every event published under `topic`.
    ///
    /// Subscribing the same callback twice is allowed; both subscriptions
    /// fire.  The subscription lives as long as the bus.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime (the delivery task is
    /// spawned immediately).
    pub fn subscribe<F, Fut>(&self, topic: EventTopic, callback: F)
    where
        F: Fn(DisplayEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_topics(&[topic], callback);
    }

    /// Registers one `callback` for every event published under any of
    /// `topics`.
    ///
    /// All topics share a single queue and delivery task, so the callback
    /// sees events in publish order across topics, and each invocation
    /// finishes before the next one starts.
    ///
    /// # Parameters
    ///
    /// * `topics`   - Topics to listen on.  Duplicates are ignored.
    /// * `callback` - Awaited once per event.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe_topics<F, Fut>(&self, topics: &[EventTopic], callback: F)
    where
        F: Fn(DisplayEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<DisplayEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                callback(event).await;
            }
        });
        let mut subscribers = self.lock();
        for (i, &topic) in topics.iter().enumerate() {
            if topics[..i].contains(&topic) {
                continue;
            }
            subscribers.entry(topic).or_default().push(tx.clone());
        }
        debug!("subscribed to {topics:?}");
    }

    /// Delivers `event` to every subscriber of its topic.
    ///
    /// Events without subscribers are dropped silently.
    pub fn publish(&self, event: DisplayEvent) {
        let topic = event.topic();
        let mut subscribers = self.lock();
        let Some(list) = subscribers.get_mut(&topic) else {
            trace!("no subscribers for {topic}; dropping event");
            return;
        };
        // A closed queue means the delivery task is gone (runtime shutdown).
        list.retain(|tx| tx.send(event).is_ok());
        trace!(
            "published {topic} for display {} to {} subscriber(s)",
            event.display_id(),
            list.len()
        );
    }

    /// Number of live subscriptions for `topic`.
    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.lock().get(&topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
