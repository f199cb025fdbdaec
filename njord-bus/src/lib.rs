#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Njord-Bus
//! The capability interface every Njord component communicates through: topic-based
//! publish/subscribe with a key/value plane, backed by either a production Redis
//! adapter ([`RedisBus`]) or a deterministic in-memory recording double
//! ([`InMemoryBus`]) used by all business-logic tests.
//!
//! Also home to the append-only NDJSON [`journal`] writer and the process-wide
//! [`kill`] switch, which both sit on the same seam between components.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Append-only line-delimited JSON journal writer.
pub mod journal;

/// Two-source process-wide halt probe (file sentinel + bus-level flag).
pub mod kill;

/// Deterministic in-memory bus double.
pub mod mem;

/// Production Redis bus backend.
pub mod redis;

/// Cooperative shutdown signalling shared by every service loop.
pub mod shutdown;

pub use self::mem::InMemoryBus;
pub use self::redis::RedisBus;

/// Errors arising from bus interaction.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("serialization: {0}")]
    Serde(String),

    #[error("connectivity: {0}")]
    Connectivity(String),
}

impl From<serde_json::Error> for BusError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serde(error.to_string())
    }
}

/// Topic-based publish/subscribe capability with a key/value plane.
///
/// Subscription is best-effort fanout: a subscriber established after a publish
/// does not observe that publish. A subscription topic may end in `*` to match a
/// whole topic family (eg/ `md.trades.*`).
///
/// Components depend on this trait, never on a concrete backend; that seam is
/// what makes deterministic tests possible.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publish a JSON object payload to the topic.
    async fn publish_json(&self, topic: &str, payload: serde_json::Value)
        -> Result<(), BusError>;

    /// Subscribe to a lazy, potentially infinite sequence of payloads.
    ///
    /// The returned stream is cancellable: dropping it releases the subscription.
    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, serde_json::Value>, BusError>;

    /// Read a key from the backend's key/value plane.
    async fn get_key(&self, key: &str) -> Result<Option<String>, BusError>;

    /// Write a key on the backend's key/value plane.
    async fn set_key(&self, key: &str, value: &str) -> Result<(), BusError>;

    /// Delete a key from the backend's key/value plane.
    async fn del_key(&self, key: &str) -> Result<(), BusError>;
}

/// Typed convenience layer over [`Bus`].
#[async_trait]
pub trait BusExt: Bus {
    /// Serialize `item` and publish it to the topic.
    async fn publish<T>(&self, topic: &str, item: &T) -> Result<(), BusError>
    where
        T: Serialize + Send + Sync,
    {
        self.publish_json(topic, serde_json::to_value(item)?).await
    }

    /// Subscribe and decode each payload, dropping payloads that fail to decode.
    ///
    /// Dropped payloads are logged; a malformed message must never take a
    /// consumer down.
    async fn subscribe_typed<T>(&self, topic: &str) -> Result<BoxStream<'static, T>, BusError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        use futures::StreamExt;

        let topic_owned = topic.to_string();
        let stream = self.subscribe(topic).await?;
        Ok(stream
            .filter_map(move |payload| {
                let topic = topic_owned.clone();
                async move {
                    match serde_json::from_value::<T>(payload) {
                        Ok(item) => Some(item),
                        Err(error) => {
                            tracing::warn!(%topic, %error, "dropping undecodable bus payload");
                            None
                        }
                    }
                }
            })
            .boxed())
    }
}

impl<B> BusExt for B where B: Bus + ?Sized {}
