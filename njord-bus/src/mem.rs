use crate::{Bus, BusError};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use njord_core::topic;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Deterministic in-memory bus double.
///
/// Publishes append to a per-topic recorded log and fan out to subscribers that
/// were active at publish time, in publish order. Tests inspect the recorded log
/// directly via [`InMemoryBus::published`]. The key/value plane is a plain map.
///
/// Delivery is single-threaded-cooperative: a publish enqueues onto unbounded
/// subscriber channels and returns; subscribers observe messages at their next
/// `await` point.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    published: HashMap<String, Vec<serde_json::Value>>,
    subscribers: Vec<Subscriber>,
    keys: HashMap<String, String>,
}

struct Subscriber {
    pattern: String,
    tx: mpsc::UnboundedSender<serde_json::Value>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload published to `topic`, in publish order.
    pub fn published(&self, topic: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Every payload published to `topic`, decoded.
    ///
    /// Panics on decode failure; intended for test assertions only.
    pub fn published_decoded<T>(&self, topic: &str) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        self.published(topic)
            .into_iter()
            .map(|payload| {
                serde_json::from_value(payload).expect("recorded payload decodes as requested type")
            })
            .collect()
    }

    /// Number of payloads published to `topic`.
    pub fn published_len(&self, topic: &str) -> usize {
        self.state
            .lock()
            .published
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of live subscriptions.
    ///
    /// Lets tests wait for spawned service loops to finish subscribing before
    /// publishing (a subscriber established after a publish misses it).
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|subscriber| !subscriber.tx.is_closed());
        state.subscribers.len()
    }

    /// Whether a publish to `topic` would currently reach a live subscriber.
    pub fn subscribed_to(&self, topic_name: &str) -> bool {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|subscriber| !subscriber.tx.is_closed());
        state
            .subscribers
            .iter()
            .any(|subscriber| topic::matches(&subscriber.pattern, topic_name))
    }
}

impl fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryBus")
            .field("topics", &state.published.len())
            .field("subscribers", &state.subscribers.len())
            .field("keys", &state.keys.len())
            .finish()
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish_json(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock();

        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(payload.clone());

        // Fan out to live subscribers, pruning any whose receiver is gone.
        state.subscribers.retain(|subscriber| {
            if !topic::matches(&subscriber.pattern, topic) {
                return !subscriber.tx.is_closed();
            }
            subscriber.tx.send(payload.clone()).is_ok()
        });

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<BoxStream<'static, serde_json::Value>, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.state.lock().subscribers.push(Subscriber {
            pattern: topic.to_string(),
            tx,
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>, BusError> {
        Ok(self.state.lock().keys.get(key).cloned())
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<(), BusError> {
        self.state
            .lock()
            .keys
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del_key(&self, key: &str) -> Result<(), BusError> {
        self.state.lock().keys.remove(key);
        Ok(())
    }
}
