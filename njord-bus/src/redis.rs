use crate::{Bus, BusError};
use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// Default reconnection policy for a [`RedisBus`] subscription.
pub const BUS_RECONNECTION_POLICY: ReconnectionBackoffPolicy = ReconnectionBackoffPolicy {
    backoff_ms_initial: 125,
    backoff_multiplier: 2,
    backoff_ms_max: 60_000,
};

/// Dictates how the exponential backoff scales between subscription reconnections.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct ReconnectionBackoffPolicy {
    pub backoff_ms_initial: u64,
    pub backoff_multiplier: u64,
    pub backoff_ms_max: u64,
}

impl ReconnectionBackoffPolicy {
    fn next(&self, current_ms: u64) -> u64 {
        current_ms
            .saturating_mul(self.backoff_multiplier)
            .min(self.backoff_ms_max)
    }
}

/// Production bus backend over Redis pub/sub, with the key/value plane mapped to
/// plain Redis keys.
///
/// Payloads are JSON-encoded strings. Each subscription owns a dedicated
/// connection and survives transient disconnects by reconnecting with
/// exponential backoff; publishes and key/value operations share a multiplexed
/// connection.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    conn: MultiplexedConnection,
    policy: ReconnectionBackoffPolicy,
}

impl RedisBus {
    /// Connect to the Redis instance at `url` using the default backoff policy.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        Self::connect_with_policy(url, BUS_RECONNECTION_POLICY).await
    }

    pub async fn connect_with_policy(
        url: &str,
        policy: ReconnectionBackoffPolicy,
    ) -> Result<Self, BusError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;

        Ok(Self {
            client,
            conn,
            policy,
        })
    }
}

impl fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBus")
            .field("policy", &self.policy)
            .finish()
    }
}

impl From<::redis::RedisError> for BusError {
    fn from(error: ::redis::RedisError) -> Self {
        Self::Connectivity(error.to_string())
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish_json(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        let encoded = serde_json::to_string(&payload)?;
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(topic, encoded).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<BoxStream<'static, serde_json::Value>, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let policy = self.policy;
        let topic = topic.to_string();

        tokio::spawn(async move {
            let mut backoff_ms = policy.backoff_ms_initial;

            loop {
                let mut stream = match subscription_stream(&client, &topic).await {
                    Ok(stream) => {
                        debug!(%topic, "bus subscription established");
                        backoff_ms = policy.backoff_ms_initial;
                        Box::pin(stream)
                    }
                    Err(error) => {
                        if tx.is_closed() {
                            return;
                        }
                        warn!(%topic, %error, backoff_ms, "bus subscription failed - backing off");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = policy.next(backoff_ms);
                        continue;
                    }
                };

                while let Some(message) = stream.next().await {
                    let payload = match message.get_payload::<String>() {
                        Ok(payload) => payload,
                        Err(error) => {
                            warn!(%topic, %error, "bus payload was not a string - dropping");
                            continue;
                        }
                    };

                    match serde_json::from_str(&payload) {
                        Ok(value) => {
                            if tx.send(value).is_err() {
                                // Subscriber cancelled; release the connection.
                                return;
                            }
                        }
                        Err(error) => {
                            warn!(%topic, %error, "bus payload was not valid JSON - dropping")
                        }
                    }
                }

                if tx.is_closed() {
                    return;
                }
                warn!(%topic, "bus subscription lost - reconnecting");
            }
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>, BusError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn del_key(&self, key: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Open a dedicated pub/sub connection for `topic`.
///
/// Patterns with a trailing `*` use `PSUBSCRIBE`; exact topics use `SUBSCRIBE`.
async fn subscription_stream(
    client: &Client,
    topic: &str,
) -> Result<impl futures::Stream<Item = ::redis::Msg>, BusError> {
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();

    if topic.ends_with('*') {
        pubsub.psubscribe(topic).await?;
    } else {
        pubsub.subscribe(topic).await?;
    }

    Ok(pubsub.into_on_message())
}
