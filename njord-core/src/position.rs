use crate::ids::Symbol;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a symbol's position, derived purely from its ordered
/// fill stream.
///
/// `qty` is signed (long positive, short negative); `avg_price` is the FIFO cost
/// basis of the remaining open lots, 0 when flat.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub qty: f64,
    pub avg_price: f64,
    pub realized_pnl: f64,
    pub ts_ns: i64,
}

impl PositionSnapshot {
    pub fn flat(symbol: Symbol, ts_ns: i64) -> Self {
        Self {
            symbol,
            qty: 0.0,
            avg_price: 0.0,
            realized_pnl: 0.0,
            ts_ns,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty == 0.0
    }
}
