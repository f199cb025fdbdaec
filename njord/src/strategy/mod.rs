use njord_bus::{Bus, BusError, BusExt};
use njord_core::{
    event::BusEvent,
    ids::StrategyId,
    order::OrderIntent,
    state::{PositionReader, PriceReader},
};
use serde::Serialize;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Manifest loading and event dispatch with failure containment and hot reload.
pub mod manager;

/// Built-in threshold-crossing momentum emitter.
pub mod momentum;

/// Process-wide `strategy key -> factory` registry.
pub mod registry;

#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid params for {strategy}: {reason}")]
    InvalidParams { strategy: String, reason: String },
}

/// The strategy contract: one identifier, one operation.
///
/// Given an event, produce zero or more [`OrderIntent`]s. Strategies never hold
/// a venue handle; the runtime publishes their emitted intents to
/// `strat.intent` where the risk engine arbitrates them.
pub trait Strategy: Send + Sync {
    fn id(&self) -> &StrategyId;

    fn on_event(&mut self, event: &BusEvent) -> Vec<OrderIntent>;
}

/// Constructs one strategy instance from its context.
pub type StrategyFactory = fn(StrategyContext) -> Result<Box<dyn Strategy>, StrategyError>;

/// Immutable context injected into a strategy at construction.
///
/// Carries the instance id, a publish-restricted bus handle, read-only views of
/// the latest committed positions and last trade prices, and the configured
/// parameter table. Strategies own no other state machinery.
#[derive(Clone)]
pub struct StrategyContext {
    pub strategy_id: StrategyId,
    pub bus: PublishHandle,
    pub positions: PositionReader,
    pub prices: PriceReader,
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyContext")
            .field("strategy_id", &self.strategy_id)
            .field("params", &self.params)
            .finish()
    }
}

impl StrategyContext {
    /// Read a numeric parameter, falling back to `default`.
    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(default)
    }
}

/// Bus capability restricted to publishing.
///
/// This is the only bus access a strategy context carries: strategies may emit,
/// never subscribe or touch the key/value plane.
#[derive(Clone)]
pub struct PublishHandle {
    bus: Arc<dyn Bus>,
}

impl fmt::Debug for PublishHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishHandle").finish()
    }
}

impl PublishHandle {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    pub async fn publish<T>(&self, topic: &str, item: &T) -> Result<(), BusError>
    where
        T: Serialize + Send + Sync,
    {
        self.bus.publish(topic, item).await
    }
}
