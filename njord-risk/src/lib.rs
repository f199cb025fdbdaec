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

//! # Njord-Risk
//! Stateful gatekeeper between strategy intents and order flow. Every intent on
//! `strat.intent` receives exactly one [`RiskDecision`](njord_core::risk::RiskDecision)
//! on `risk.decision`; allowed intents are additionally forwarded as
//! [`OrderEvent`](njord_core::order::OrderEvent)s on `orders.accepted`.
//!
//! Checks run in a fixed order (kill switch, rate limit, per-order notional cap,
//! daily loss cap) and the first failure sets the deny reason. The engine also
//! owns the last-trade-price cache fed from `md.trades.*`.

use njord_bus::{journal::JournalError, BusError};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// The risk engine service.
pub mod engine;

/// Per-symbol sliding-window rate limiter.
pub mod rate_limit;

pub use engine::RiskEngine;
pub use rate_limit::RateLimiter;

/// Errors that take a risk engine down.
///
/// Malformed intents are not among them: they are denied with reason `invalid`
/// and the loop continues.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("journal: {0}")]
    Journal(#[from] JournalError),
}

/// Caps and identifiers the risk engine enforces.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskConfig {
    /// Venue stamped on accepted `OrderEvent`s.
    pub venue: SmolStr,

    /// Maximum notional (quote units) of a single order.
    pub per_order_usd_cap: f64,

    /// Maximum admitted intents per symbol in any sliding 60 s window.
    pub orders_per_min_cap: u32,

    /// Deny all intents once the signed day PnL drops below the negated cap.
    pub daily_loss_usd_cap: f64,

    /// Bus key/value entry holding the signed day PnL (absent reads as 0).
    ///
    /// An external aggregator owns the value and its UTC-midnight rollover; the
    /// engine only reads it.
    pub day_pnl_key: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            venue: SmolStr::new("paper"),
            per_order_usd_cap: 100.0,
            orders_per_min_cap: 5,
            daily_loss_usd_cap: 1_000.0,
            day_pnl_key: "njord:day_pnl".to_string(),
        }
    }
}
