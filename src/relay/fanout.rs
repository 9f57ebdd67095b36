//! Fan-out of inbound peer messages to subscribed UI sessions.
//!
//! Each subscriber owns an unbounded queue and a wakeup signal. Producers are
//! concurrent router invocations; the single consumer is the client's
//! subscription stream. Publishing to an unknown client drops the message
//! silently: there is no buffering for clients that never subscribed.

use crate::core::{now, Timestamp};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tracing::debug;

/// A message destined for a UI session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiMessage {
    /// Display text
    pub message: String,
    /// Bridge the message came from
    pub from_agent: String,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// When the bridge received it
    pub timestamp: Timestamp,
}

impl UiMessage {
    /// Create a UI message stamped with the current time.
    pub fn new(message: &str, from_agent: &str, conversation_id: &str) -> Self {
        Self {
            message: message.to_string(),
            from_agent: from_agent.to_string(),
            conversation_id: conversation_id.to_string(),
            timestamp: now(),
        }
    }
}

struct Subscriber {
    queue: Mutex<VecDeque<UiMessage>>,
    notify: Notify,
}

impl Subscriber {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// Fan-out relay for UI subscribers.
#[derive(Default)]
pub struct UiRelay {
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
}

impl UiRelay {
    /// Create a relay with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a client, creating its queue on first subscription.
    ///
    /// Subscribers are never reaped; a disconnecting transport may call
    /// [`UiRelay::unsubscribe`] but the router does not.
    pub fn subscribe(&self, client_id: &str) -> UiSubscription {
        let mut subscribers = self.subscribers.write().expect("relay lock poisoned");
        let subscriber = subscribers
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Subscriber::new()))
            .clone();
        UiSubscription { subscriber }
    }

    /// Enqueue a message for `client_id` and raise its signal.
    ///
    /// No-op when the client has no active subscription.
    pub fn publish(&self, client_id: &str, message: UiMessage) {
        let subscriber = {
            let subscribers = self.subscribers.read().expect("relay lock poisoned");
            subscribers.get(client_id).cloned()
        };
        match subscriber {
            Some(subscriber) => {
                subscriber
                    .queue
                    .lock()
                    .expect("subscriber queue lock poisoned")
                    .push_back(message);
                subscriber.notify.notify_one();
            }
            None => debug!(client_id, "dropping UI message for unsubscribed client"),
        }
    }

    /// Publish `message` to every subscribed client.
    ///
    /// Returns the number of queues reached (zero when nobody subscribed).
    pub fn broadcast(&self, message: UiMessage) -> usize {
        let subscribers: Vec<Arc<Subscriber>> = {
            let map = self.subscribers.read().expect("relay lock poisoned");
            map.values().cloned().collect()
        };
        for subscriber in &subscribers {
            subscriber
                .queue
                .lock()
                .expect("subscriber queue lock poisoned")
                .push_back(message.clone());
            subscriber.notify.notify_one();
        }
        subscribers.len()
    }

    /// Whether `client_id` currently has a subscription.
    pub fn is_subscribed(&self, client_id: &str) -> bool {
        self.subscribers
            .read()
            .expect("relay lock poisoned")
            .contains_key(client_id)
    }

    /// Remove a client's subscription and pending queue.
    pub fn unsubscribe(&self, client_id: &str) {
        self.subscribers
            .write()
            .expect("relay lock poisoned")
            .remove(client_id);
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("relay lock poisoned").len()
    }
}

/// A client's view of its queue.
pub struct UiSubscription {
    subscriber: Arc<Subscriber>,
}

impl UiSubscription {
    /// Take every currently queued message, in publish order.
    pub fn drain(&self) -> Vec<UiMessage> {
        self.subscriber
            .queue
            .lock()
            .expect("subscriber queue lock poisoned")
            .drain(..)
            .collect()
    }

    /// Wait cooperatively until at least one message is queued, then drain.
    pub async fn next_batch(&self) -> Vec<UiMessage> {
        loop {
            let batch = self.drain();
            if !batch.is_empty() {
                return batch;
            }
            self.subscriber.notify.notified().await;
        }
    }

    /// Wait for the next single message.
    pub async fn next(&self) -> UiMessage {
        loop {
            let front = self
                .subscriber
                .queue
                .lock()
                .expect("subscriber queue lock poisoned")
                .pop_front();
            if let Some(message) = front {
                return message;
            }
            self.subscriber.notify.notified().await;
        }
    }

    /// Turn the subscription into an unbounded message stream.
    ///
    /// The stream terminates only when the caller stops consuming it.
    pub fn into_stream(self) -> impl Stream<Item = UiMessage> {
        futures::stream::unfold(self, |subscription| async move {
            let message = subscription.next().await;
            Some((message, subscription))
        })
    }
}
