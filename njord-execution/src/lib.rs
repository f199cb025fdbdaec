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

//! # Njord-Execution
//! The two terminal consumers of `orders.accepted`:
//!
//! * [`paper::PaperEngine`]: deterministic fill simulation with FIFO position
//!   accounting and realized-PnL math; the default execution path.
//! * [`dispatch::BrokerDispatcher`]: the live path, engaged only behind a
//!   double gate (`config.env == "live"` *and* `NJORD_ENABLE_LIVE=1`), with a
//!   kill-switch re-check and an unconfigurable hard micro-cap at the order
//!   boundary, and idempotent placement against duplicate client order ids.
//!
//! The venue itself sits behind the [`venue::Venue`] trait; tests script a
//! [`venue::MockVenue`].

/// Live broker dispatcher.
pub mod dispatch;

/// Error taxonomy for the execution crate.
pub mod error;

/// Paper trading OMS.
pub mod paper;

/// FIFO lot book and realized-PnL math.
pub mod position;

/// Bounded exponential-backoff retry for venue calls.
pub mod retry;

/// Venue client seam and the scripted test double.
pub mod venue;

pub use dispatch::{BrokerConfig, BrokerDispatcher, LiveGate, LIVE_MICRO_CAP_USD};
pub use error::{DispatchError, OmsError, VenueError};
pub use paper::PaperEngine;
pub use position::PositionBook;
pub use retry::{retry_with, RetryPolicy, VENUE_RETRY_POLICY};
pub use venue::{MockVenue, Venue};
