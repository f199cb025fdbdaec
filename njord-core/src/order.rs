use crate::{
    ids::{ClientOrderId, IntentId, StrategyId, Symbol},
    ContractError, Meta,
};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Order direction.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[display("buy")]
    Buy,
    #[display("sell")]
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Signed direction multiplier: +1 long flow, -1 short flow.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

/// Order pricing kind.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[display("market")]
    Market,
    #[display("limit")]
    Limit,
}

/// A strategy's expressed desire to place an order, subject to risk approval.
///
/// `intent_id` is unique per strategy for the process lifetime; republishing an id
/// is a producer bug. `meta` carries execution-algorithm context and is copied
/// verbatim onto the eventual [`FillEvent`](crate::fill::FillEvent).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderIntent {
    pub intent_id: IntentId,
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub meta: Meta,
}

impl OrderIntent {
    /// Validate the well-formedness rules every consumer relies on.
    pub fn validate(&self) -> Result<(), ContractError> {
        if !self.qty.is_finite() || self.qty <= 0.0 {
            return Err(ContractError::InvalidIntent("qty must be finite and > 0"));
        }
        if let Some(limit_price) = self.limit_price {
            if !limit_price.is_finite() || limit_price <= 0.0 {
                return Err(ContractError::InvalidIntent(
                    "limit_price must be finite and > 0",
                ));
            }
        }
        if self.order_type == OrderType::Limit && self.limit_price.is_none() {
            return Err(ContractError::InvalidIntent(
                "limit order requires limit_price",
            ));
        }
        if self.symbol.as_str().is_empty() {
            return Err(ContractError::InvalidIntent("symbol must be non-empty"));
        }
        Ok(())
    }
}

impl Display for OrderIntent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ intent: {}, strategy: {}, symbol: {}, side: {}, type: {}, qty: {} }}",
            self.intent_id, self.strategy_id, self.symbol, self.side, self.order_type, self.qty
        )
    }
}

/// Risk-approved intent forwarded downstream on `orders.accepted`.
///
/// Carries the intent `meta` so the OMS can round-trip it onto the fill.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderEvent {
    pub intent_id: IntentId,
    pub venue: SmolStr,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    pub client_order_id: ClientOrderId,
    pub ts_accepted_ns: i64,
    #[serde(default)]
    pub meta: Meta,
}

impl OrderEvent {
    /// Build the approved order for an intent, stamping the acceptance time and the
    /// deterministic client order id.
    pub fn accept(intent: &OrderIntent, venue: SmolStr, ts_accepted_ns: i64) -> Self {
        Self {
            intent_id: intent.intent_id.clone(),
            venue,
            symbol: intent.symbol.clone(),
            side: intent.side,
            order_type: intent.order_type,
            qty: intent.qty,
            limit_price: intent.limit_price,
            client_order_id: ClientOrderId::from_intent(&intent.intent_id),
            ts_accepted_ns,
            meta: intent.meta.clone(),
        }
    }
}
