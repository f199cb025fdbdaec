use njord_core::{ids::Symbol, order::Side, position::PositionSnapshot};
use std::collections::VecDeque;

/// Residual lot quantities below this are treated as fully consumed.
const QTY_EPSILON: f64 = 1e-12;

/// One open lot: remaining quantity at its entry price.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Lot {
    pub qty: f64,
    pub price: f64,
}

/// FIFO lot book for one symbol.
///
/// Open quantity is a queue of lots on a single side; an opposite-side fill
/// consumes lots from the head, realizing `(exit - entry) * side_sign` per
/// closed unit (+1 closing longs, -1 closing shorts). A fill larger than the
/// open position flips it: the remainder starts a new lot on the other side.
///
/// The final state is a pure function of the ordered fill stream, so replaying
/// the same fills from scratch reconstructs it exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    side: Option<Side>,
    lots: VecDeque<Lot>,
    realized_pnl: f64,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fill, updating lots and realized PnL.
    pub fn apply_fill(&mut self, fill_side: Side, qty: f64, price: f64) {
        match self.side {
            Some(open_side) if open_side != fill_side => {
                self.close_against(open_side, fill_side, qty, price)
            }
            _ => {
                self.side = Some(fill_side);
                self.lots.push_back(Lot { qty, price });
            }
        }
    }

    fn close_against(&mut self, open_side: Side, fill_side: Side, mut qty: f64, price: f64) {
        // +1 when closing longs, -1 when closing shorts.
        let side_sign = open_side.sign();

        while qty > QTY_EPSILON {
            let Some(front) = self.lots.front_mut() else {
                break;
            };

            let closed = qty.min(front.qty);
            self.realized_pnl += (price - front.price) * side_sign * closed;
            front.qty -= closed;
            qty -= closed;

            if front.qty <= QTY_EPSILON {
                self.lots.pop_front();
            }
        }

        if self.lots.is_empty() {
            self.side = None;
        }

        // Over-close flips the position onto the fill side.
        if qty > QTY_EPSILON {
            self.side = Some(fill_side);
            self.lots.push_back(Lot { qty, price });
        }
    }

    /// Signed open quantity (long positive, short negative).
    pub fn qty(&self) -> f64 {
        let open: f64 = self.lots.iter().map(|lot| lot.qty).sum();
        match self.side {
            Some(side) => open * side.sign(),
            None => 0.0,
        }
    }

    /// Quantity-weighted mean entry price of the remaining lots; 0 when flat.
    pub fn avg_price(&self) -> f64 {
        let open: f64 = self.lots.iter().map(|lot| lot.qty).sum();
        if open <= QTY_EPSILON {
            return 0.0;
        }
        self.lots
            .iter()
            .map(|lot| lot.qty * lot.price)
            .sum::<f64>()
            / open
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn is_flat(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn snapshot(&self, symbol: Symbol, ts_ns: i64) -> PositionSnapshot {
        PositionSnapshot {
            symbol,
            qty: self.qty(),
            avg_price: self.avg_price(),
            realized_pnl: self.realized_pnl,
            ts_ns,
        }
    }
}
