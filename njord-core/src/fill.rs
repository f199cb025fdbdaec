use crate::{
    ids::{OrderId, Symbol},
    order::Side,
    Meta,
};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An execution against an accepted order.
///
/// `meta` is copied verbatim from the originating intent so execution algorithms
/// can round-trip their context.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: f64,
    pub price: f64,
    pub fee: f64,
    pub ts_fill_ns: i64,
    #[serde(default)]
    pub meta: Meta,
}

impl FillEvent {
    pub fn notional(&self) -> f64 {
        self.price * self.qty.abs()
    }
}

impl Display for FillEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ order: {}, symbol: {}, side: {}, qty: {}, price: {} }}",
            self.order_id, self.symbol, self.side, self.qty, self.price
        )
    }
}
