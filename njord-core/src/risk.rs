use crate::ids::IntentId;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Normalised reason codes for a denied intent.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    #[display("per_order_cap")]
    PerOrderCap,
    #[display("rate_limit")]
    RateLimit,
    #[display("halted")]
    Halted,
    #[display("live_micro_cap")]
    LiveMicroCap,
    #[display("daily_loss_cap")]
    DailyLossCap,
    #[display("invalid")]
    Invalid,
}

/// Snapshot of the caps in force when a decision was made.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct CapsSnapshot {
    pub per_order_usd_cap: f64,
    pub orders_per_min_cap: u32,
    pub daily_loss_usd_cap: f64,
}

/// The risk engine's per-intent verdict.
///
/// Exactly one decision is published per observed intent; once an intent is denied
/// no `OrderEvent` is ever published for it.
///
/// `caps` is the risk engine's cap snapshot; decisions issued at the broker
/// boundary (kill-switch re-check, hard micro-cap) carry none.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct RiskDecision {
    pub intent_id: IntentId,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    pub ts_ns: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<CapsSnapshot>,
}

impl RiskDecision {
    pub fn allow(intent_id: IntentId, ts_ns: i64, caps: CapsSnapshot) -> Self {
        Self {
            intent_id,
            allowed: true,
            reason: None,
            ts_ns,
            caps: Some(caps),
        }
    }

    pub fn deny(intent_id: IntentId, reason: DenyReason, ts_ns: i64, caps: CapsSnapshot) -> Self {
        Self {
            intent_id,
            allowed: false,
            reason: Some(reason),
            ts_ns,
            caps: Some(caps),
        }
    }

    /// Denial issued at the broker boundary, outside the risk engine's cap view.
    pub fn deny_at_boundary(intent_id: IntentId, reason: DenyReason, ts_ns: i64) -> Self {
        Self {
            intent_id,
            allowed: false,
            reason: Some(reason),
            ts_ns,
            caps: None,
        }
    }
}
