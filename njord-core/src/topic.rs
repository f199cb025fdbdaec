//! Topic naming scheme.
//!
//! Market-data topics embed the instrument symbol verbatim in `BASE/QUOTE` form
//! (eg/ `md.trades.BTC/USDT`); everything else is a fixed name. Subscriptions may
//! use a trailing `*` to match a whole topic family.

use crate::ids::Symbol;

pub const MD_TRADES_PREFIX: &str = "md.trades.";
pub const MD_BOOK_PREFIX: &str = "md.book.";
pub const MD_TICKER_PREFIX: &str = "md.ticker.";

pub const MD_TRADES_ALL: &str = "md.trades.*";
pub const MD_BOOK_ALL: &str = "md.book.*";
pub const MD_TICKER_ALL: &str = "md.ticker.*";

pub const STRAT_INTENT: &str = "strat.intent";
pub const RISK_DECISION: &str = "risk.decision";
pub const ORDERS_ACCEPTED: &str = "orders.accepted";
pub const ORDERS_CANCEL: &str = "orders.cancel";
pub const FILLS_NEW: &str = "fills.new";
pub const POSITIONS_SNAPSHOT: &str = "positions.snapshot";
pub const BROKER_ECHO: &str = "broker.echo";
pub const BROKER_ORDERS: &str = "broker.orders";
pub const BROKER_ACKS: &str = "broker.acks";
pub const BROKER_BALANCES: &str = "broker.balances";

pub fn trades(symbol: &Symbol) -> String {
    format!("{MD_TRADES_PREFIX}{symbol}")
}

pub fn book(symbol: &Symbol) -> String {
    format!("{MD_BOOK_PREFIX}{symbol}")
}

pub fn ticker(symbol: &Symbol) -> String {
    format!("{MD_TICKER_PREFIX}{symbol}")
}

/// Whether `topic` is matched by `pattern`.
///
/// A pattern either names a topic exactly or ends in `*`, which matches any
/// suffix (`md.trades.*` matches `md.trades.BTC/USDT`).
pub fn matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}
