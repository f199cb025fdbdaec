use crate::{
    ids::{ClientOrderId, OrderId, Symbol},
    order::{OrderEvent, OrderType, Side},
};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Venue order lifecycle states surfaced on `broker.orders`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum BrokerOrderStatus {
    #[display("open")]
    Open,
    #[display("partially_filled")]
    PartiallyFilled,
    #[display("filled")]
    Filled,
    #[display("cancelled")]
    Cancelled,
    #[display("rejected")]
    Rejected,
}

/// Order placement request at the broker boundary.
///
/// `client_order_id` is the dispatcher-chosen stable key; it is the basis for
/// idempotent recovery when the venue reports a duplicate placement.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BrokerOrderReq {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    pub ts_ns: i64,
}

impl From<&OrderEvent> for BrokerOrderReq {
    fn from(order: &OrderEvent) -> Self {
        Self {
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            qty: order.qty,
            limit_price: order.limit_price,
            ts_ns: order.ts_accepted_ns,
        }
    }
}

/// Venue acknowledgement of a placement, published on `broker.acks`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BrokerOrderAck {
    pub client_order_id: ClientOrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_order_id: Option<OrderId>,
    pub symbol: Symbol,
    pub status: BrokerOrderStatus,
    pub ts_ns: i64,
}

/// Polled or streamed venue order state, published on `broker.orders`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BrokerOrderUpdate {
    pub client_order_id: ClientOrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_order_id: Option<OrderId>,
    pub symbol: Symbol,
    pub status: BrokerOrderStatus,
    pub filled_qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_fill_price: Option<f64>,
    pub ts_ns: i64,
}

impl BrokerOrderUpdate {
    /// Synthesize the ack a successful placement would have produced.
    ///
    /// Used for idempotent recovery when a duplicate client order id is reported
    /// but the original order is found on the venue.
    pub fn as_ack(&self, ts_ns: i64) -> BrokerOrderAck {
        BrokerOrderAck {
            client_order_id: self.client_order_id.clone(),
            venue_order_id: self.venue_order_id.clone(),
            symbol: self.symbol.clone(),
            status: self.status,
            ts_ns,
        }
    }
}

/// Request to cancel a working order, consumed from `orders.cancel`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BrokerCancelReq {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub ts_ns: i64,
}

/// Per-asset balance published on `broker.balances`.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct BalanceSnapshot {
    pub asset: SmolStr,
    pub free: f64,
    pub locked: f64,
    pub ts_ns: i64,
}

impl BalanceSnapshot {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}
