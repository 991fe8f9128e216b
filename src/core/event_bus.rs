//! Event bus implementation for publish-subscribe pattern
//!
//! Client data modules announce every change of a data kind here, and
//! report failures that the caller cannot see through a global error
//! event. It supports:
//! - Asynchronous event publishing and handling
//! - Multiple subscribers per event type
//! - Subscription handles that detach their handler
//! - A bounded event history
//! - Isolated error handling (one handler failure doesn't affect others)

use crate::core::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Unique identifier for an event
pub type EventId = String;

/// Unique identifier for a subscription
pub type SubscriptionId = String;

type SubscriberMap = HashMap<EventType, Vec<Subscriber>>;

/// Event bus for publish-subscribe pattern
///
/// Cloning is cheap and every clone shares subscribers and history.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<SubscriberMap>>,
    event_log: Arc<RwLock<Vec<Event>>>,
    max_history: usize,
}

/// Event structure containing all event information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// Types of events that can be published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    PlayRecordsUpdated,
    FavoritesUpdated,
    SearchHistoryUpdated,
    SkipConfigsUpdated,
    GlobalError,
}

impl EventType {
    /// Name used by browser listeners for this event
    pub fn name(&self) -> &'static str {
        match self {
            EventType::PlayRecordsUpdated => "playRecordsUpdated",
            EventType::FavoritesUpdated => "favoritesUpdated",
            EventType::SearchHistoryUpdated => "searchHistoryUpdated",
            EventType::SkipConfigsUpdated => "skipConfigsUpdated",
            EventType::GlobalError => "globalError",
        }
    }
}

/// Event handler function type
pub type EventHandler =
    Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to detach it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: SubscriptionId,
    event_type: EventType,
    subscribers: Arc<RwLock<SubscriberMap>>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Detach the handler. Returns false if it was already gone.
    pub async fn unsubscribe(self) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get_mut(&self.event_type) {
            Some(subs) => {
                let before = subs.len();
                subs.retain(|s| s.id != self.id);
                before != subs.len()
            }
            None => false,
        }
    }
}

impl EventBus {
    /// Create a new event bus with default history size
    pub fn new() -> Self {
        Self::with_history_size(1000)
    }

    /// Create a new event bus with specified history size
    pub fn with_history_size(max_history: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            event_log: Arc::new(RwLock::new(Vec::new())),
            max_history,
        }
    }

    /// Subscribe to an event type with a handler
    pub async fn subscribe(&self, event_type: EventType, handler: EventHandler) -> Subscription {
        let id = Uuid::new_v4().to_string();
        let subscriber = Subscriber {
            id: id.clone(),
            handler,
        };

        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(event_type).or_default().push(subscriber);

        Subscription {
            id,
            event_type,
            subscribers: self.subscribers.clone(),
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Handlers run concurrently and a failing handler is only logged.
    pub async fn publish(&self, event: Event) {
        {
            let mut log = self.event_log.write().await;
            log.push(event.clone());

            if log.len() > self.max_history {
                let excess = log.len() - self.max_history;
                log.drain(0..excess);
            }
        }

        let subscribers = {
            let subs = self.subscribers.read().await;
            subs.get(&event.event_type).cloned()
        };

        let Some(subscribers) = subscribers else {
            return;
        };

        let mut handles = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let event_clone = event.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = (subscriber.handler)(event_clone).await {
                    tracing::error!(
                        subscription_id = %subscriber.id,
                        "Event handler failed: {}",
                        e
                    );
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Shorthand for publishing a global error event
    pub async fn publish_error(&self, message: impl Into<String>) {
        self.publish(Event::global_error(message)).await;
    }

    /// Events in publication order, optionally restricted to one type
    pub async fn history(&self, event_type: Option<EventType>) -> Vec<Event> {
        let log = self.event_log.read().await;
        log.iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .cloned()
            .collect()
    }

    /// Number of recorded events of the given type
    pub async fn count(&self, event_type: EventType) -> usize {
        let log = self.event_log.read().await;
        log.iter().filter(|e| e.event_type == event_type).count()
    }

    /// Clear event history
    pub async fn clear_history(&self) {
        self.event_log.write().await.clear();
    }

    /// Get the number of subscribers for an event type
    pub async fn subscriber_count(&self, event_type: EventType) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.get(&event_type).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    /// Create a new event
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Create a global error event carrying a human-readable message
    pub fn global_error(message: impl Into<String>) -> Self {
        Self::new(EventType::GlobalError, json!({ "message": message.into() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LunaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        Arc::new(move |_event| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let _sub = bus
            .subscribe(EventType::FavoritesUpdated, counting_handler(counter.clone()))
            .await;

        bus.publish(Event::new(EventType::FavoritesUpdated, json!({})))
            .await;
        bus.publish(Event::new(EventType::PlayRecordsUpdated, json!({})))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_receives_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();

        let handler: EventHandler = Arc::new(move |event| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                seen.write().await.push(event.data);
                Ok(())
            })
        });
        let _sub = bus.subscribe(EventType::SearchHistoryUpdated, handler).await;

        bus.publish(Event::new(EventType::SearchHistoryUpdated, json!(["naruto"])))
            .await;

        assert_eq!(*seen.read().await, vec![json!(["naruto"])]);
    }

    #[tokio::test]
    async fn test_unsubscribe_handle() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let sub = bus
            .subscribe(EventType::GlobalError, counting_handler(counter.clone()))
            .await;
        bus.publish_error("first").await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(sub.unsubscribe().await);
        assert_eq!(bus.subscriber_count(EventType::GlobalError).await, 0);

        bus.publish_error("second").await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_leaves_other_subscribers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = bus
            .subscribe(EventType::SkipConfigsUpdated, counting_handler(counter.clone()))
            .await;
        let _second = bus
            .subscribe(EventType::SkipConfigsUpdated, counting_handler(counter.clone()))
            .await;

        assert!(first.unsubscribe().await);
        bus.publish(Event::new(EventType::SkipConfigsUpdated, json!({})))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_isolation() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let failing: EventHandler = Arc::new(move |_event| {
            Box::pin(async move { Err(LunaError::EventError("listener failed".to_string())) })
        });

        let _a = bus.subscribe(EventType::PlayRecordsUpdated, failing).await;
        let _b = bus
            .subscribe(EventType::PlayRecordsUpdated, counting_handler(counter.clone()))
            .await;

        bus.publish(Event::new(EventType::PlayRecordsUpdated, json!({})))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let bus = EventBus::with_history_size(3);

        for i in 0..5 {
            bus.publish(Event::new(EventType::FavoritesUpdated, json!({ "index": i })))
                .await;
        }

        let history = bus.history(None).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].data, json!({ "index": 2 }));
    }

    #[tokio::test]
    async fn test_history_filter_and_count() {
        let bus = EventBus::new();
        bus.publish(Event::new(EventType::FavoritesUpdated, json!({})))
            .await;
        bus.publish_error("network down").await;

        assert_eq!(bus.count(EventType::GlobalError).await, 1);
        let errors = bus.history(Some(EventType::GlobalError)).await;
        assert_eq!(errors[0].data["message"], "network down");

        bus.clear_history().await;
        assert!(bus.history(None).await.is_empty());
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::PlayRecordsUpdated.name(), "playRecordsUpdated");
        assert_eq!(EventType::GlobalError.name(), "globalError");
        assert_eq!(
            serde_json::to_value(EventType::SkipConfigsUpdated).unwrap(),
            json!("skipConfigsUpdated")
        );
    }
}
