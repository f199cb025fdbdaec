use crate::strategy::{Strategy, StrategyContext, StrategyError};
use njord_core::{
    event::BusEvent,
    ids::{IntentId, StrategyId, Symbol},
    order::{OrderIntent, OrderType, Side},
    Meta,
};
use std::collections::HashMap;

/// Threshold-crossing momentum emitter.
///
/// Tracks an anchor price per symbol; a trade moving `threshold_pct` above the
/// anchor emits a market buy, one moving the same distance below emits a market
/// sell. The anchor resets to the triggering price so each crossing fires once.
///
/// Parameters: `threshold_pct` (default 1.0), `qty` (default 1.0).
#[derive(Debug)]
pub struct Momentum {
    id: StrategyId,
    threshold_pct: f64,
    qty: f64,
    anchors: HashMap<Symbol, f64>,
    sequence: u64,
}

/// Factory registered under the `momentum` key.
pub fn factory(ctx: StrategyContext) -> Result<Box<dyn Strategy>, StrategyError> {
    let threshold_pct = ctx.param_f64("threshold_pct", 1.0);
    let qty = ctx.param_f64("qty", 1.0);

    if threshold_pct <= 0.0 || qty <= 0.0 {
        return Err(StrategyError::InvalidParams {
            strategy: ctx.strategy_id.to_string(),
            reason: "threshold_pct and qty must be > 0".to_string(),
        });
    }

    Ok(Box::new(Momentum {
        id: ctx.strategy_id,
        threshold_pct,
        qty,
        anchors: HashMap::new(),
        sequence: 0,
    }))
}

impl Momentum {
    fn intent(&mut self, symbol: Symbol, side: Side) -> OrderIntent {
        // Sequence numbers keep intent ids unique for the process lifetime.
        self.sequence += 1;
        OrderIntent {
            intent_id: IntentId::new(format!("{}-{}", self.id, self.sequence)),
            strategy_id: self.id.clone(),
            symbol,
            side,
            order_type: OrderType::Market,
            qty: self.qty,
            limit_price: None,
            meta: Meta::default(),
        }
    }
}

impl Strategy for Momentum {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn on_event(&mut self, event: &BusEvent) -> Vec<OrderIntent> {
        let BusEvent::Trade(trade) = event else {
            return Vec::new();
        };

        let anchor = match self.anchors.get(&trade.symbol) {
            Some(&anchor) => anchor,
            None => {
                self.anchors.insert(trade.symbol.clone(), trade.price);
                return Vec::new();
            }
        };

        let threshold = anchor * self.threshold_pct / 100.0;
        let side = if trade.price >= anchor + threshold {
            Side::Buy
        } else if trade.price <= anchor - threshold {
            Side::Sell
        } else {
            return Vec::new();
        };

        self.anchors.insert(trade.symbol.clone(), trade.price);
        vec![self.intent(trade.symbol.clone(), side)]
    }
}
