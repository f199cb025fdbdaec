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

//! # Njord-Core
//! Immutable, serializable message contracts exchanged over the Njord Quant event bus,
//! together with the topic naming scheme and the injectable clock abstraction.
//!
//! Every entity is a value type: once published it is never mutated, and all timestamps
//! are integer nanoseconds since the Unix epoch (`*_ns` fields).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker boundary contracts: order requests, acks, updates and balance snapshots.
pub mod broker;

/// Injectable clock abstraction with live and stepped implementations.
pub mod clock;

/// Market events ([`TradeEvent`](event::TradeEvent), [`BookEvent`](event::BookEvent),
/// [`TickerEvent`](event::TickerEvent)) and the closed [`BusEvent`](event::BusEvent) union.
pub mod event;

/// [`FillEvent`](fill::FillEvent) produced by the paper OMS or a live venue.
pub mod fill;

/// Identifier newtypes (`IntentId`, `ClientOrderId`, `StrategyId`, `Symbol`, ...).
pub mod ids;

/// Order contracts: [`OrderIntent`](order::OrderIntent) emitted by strategies and the
/// approved [`OrderEvent`](order::OrderEvent) forwarded downstream.
pub mod order;

/// [`PositionSnapshot`](position::PositionSnapshot) derived from the ordered fill stream.
pub mod position;

/// [`RiskDecision`](risk::RiskDecision) verdicts with normalised deny reasons.
pub mod risk;

/// Single-owner shared state (price cache, position map) with read-only views.
pub mod state;

/// Topic naming scheme shared by every component.
pub mod topic;

/// Free-form metadata carried from an `OrderIntent` through to its `FillEvent`.
///
/// Values are restricted to JSON primitives by convention; the map is copied on
/// publish so downstream consumers can never observe producer-side mutation.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Errors arising from contract validation and payload decoding.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum ContractError {
    #[error("unrecognised topic: {0}")]
    UnknownTopic(String),

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("invalid order intent: {0}")]
    InvalidIntent(&'static str),
}

impl From<serde_json::Error> for ContractError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
