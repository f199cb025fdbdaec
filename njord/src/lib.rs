#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Njord
//! Runtime crate of the Njord Quant trading core: the strategy plugin system
//! (contract, registry, manifest-driven manager with hot reload), service
//! configuration, and logging/shutdown glue.
//!
//! A deployment wires the services together over one bus:
//!
//! ```text
//! md.trades.{symbol} -> StrategyManager -> strat.intent -> RiskEngine
//!     -> risk.decision + orders.accepted -> PaperEngine -> fills.new
//!     -> positions.snapshot            (or -> BrokerDispatcher when live)
//! ```
//!
//! Each service exposes an async `run(shutdown)` loop; entry points await
//! [`shutdown::await_term_signal`] and signal the shared
//! [`njord_bus::shutdown::ShutdownHandle`] so loops drain, flush journals and
//! return before the process exits 0.

/// Service configuration loaded from TOML.
pub mod config;

/// Logging initialisation over `tracing-subscriber`.
pub mod logging;

/// Process termination signals.
pub mod shutdown;

/// Strategy contract, context, registry and manager.
pub mod strategy;

pub use config::{Config, ConfigError};
pub use strategy::{
    manager::StrategyManager, registry::StrategyRegistry, Strategy, StrategyContext, StrategyError,
};
