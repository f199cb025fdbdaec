use crate::{
    error::{DispatchError, VenueError},
    retry::{retry_with, RetryPolicy, VENUE_RETRY_POLICY},
    venue::Venue,
};
use futures::StreamExt;
use njord_bus::{
    journal::{Journal, JournalDir},
    kill::KillSwitch,
    shutdown::Shutdown,
    Bus, BusExt,
};
use njord_core::{
    broker::{
        BrokerCancelReq, BrokerOrderAck, BrokerOrderReq, BrokerOrderStatus, BrokerOrderUpdate,
    },
    clock::Clock,
    event::TradeEvent,
    ids::{ClientOrderId, Symbol},
    order::{OrderEvent, OrderType},
    risk::{DenyReason, RiskDecision},
    topic,
};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};

/// Unconfigurable notional ceiling applied at the live order boundary, layered
/// on top of the risk engine's configurable per-order cap. Protects against a
/// mis-configured cap reaching a real venue.
pub const LIVE_MICRO_CAP_USD: f64 = 10.0;

/// Environment flag required (alongside `config.env == "live"`) for any live
/// placement to occur.
pub const ENABLE_LIVE_ENV: &str = "NJORD_ENABLE_LIVE";

/// Broker dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Deployment environment; only `"live"` can engage the live path.
    pub env: String,

    /// Venue order/balance polling cadence on the live path.
    pub poll_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            env: "paper".to_string(),
            poll_interval_ms: 5_000,
        }
    }
}

/// The two independent flags whose conjunction engages live trading.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LiveGate {
    pub config_env_live: bool,
    pub env_flag_set: bool,
}

impl LiveGate {
    /// Resolve the gate from config and the process environment.
    pub fn from_env(config: &BrokerConfig) -> Self {
        Self {
            config_env_live: config.env == "live",
            env_flag_set: std::env::var(ENABLE_LIVE_ENV).as_deref() == Ok("1"),
        }
    }

    pub fn dry_run() -> Self {
        Self {
            config_env_live: false,
            env_flag_set: false,
        }
    }

    pub fn live() -> Self {
        Self {
            config_env_live: true,
            env_flag_set: true,
        }
    }

    /// Live placement requires both flags; either absent means dry-run.
    pub fn engaged(&self) -> bool {
        self.config_env_live && self.env_flag_set
    }
}

/// One line in the `broker.orders` journal.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum BrokerJournalRecord<'a> {
    Request(&'a BrokerOrderReq),
    Ack(&'a BrokerOrderAck),
    Update(&'a BrokerOrderUpdate),
    Cancel(&'a BrokerCancelReq),
}

/// Alternate terminal consumer of `orders.accepted` for live trading.
///
/// Dry-run (the default) echoes orders to `broker.echo` without contacting the
/// venue. The live path re-checks the kill switch at the order boundary,
/// enforces [`LIVE_MICRO_CAP_USD`], and places idempotently: a duplicate client
/// order id is recovered via `fetch_order` rather than re-placed.
pub struct BrokerDispatcher<B, V> {
    bus: B,
    venue: V,
    config: BrokerConfig,
    gate: LiveGate,
    kill_switch: KillSwitch,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    prices: HashMap<Symbol, f64>,
    inflight: HashSet<ClientOrderId>,
    orders_journal: Journal,
    echo_journal: Journal,
}

impl<B, V> fmt::Debug for BrokerDispatcher<B, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerDispatcher")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl<B, V> BrokerDispatcher<B, V>
where
    B: Bus,
    V: Venue,
{
    pub fn new(
        bus: B,
        venue: V,
        config: BrokerConfig,
        gate: LiveGate,
        kill_switch: KillSwitch,
        clock: Arc<dyn Clock>,
        journals: &JournalDir,
    ) -> Result<Self, DispatchError> {
        let orders_journal = journals.open_stream("broker.orders")?;
        let echo_journal = journals.open_stream("broker.echo")?;

        Ok(Self {
            bus,
            venue,
            config,
            gate,
            kill_switch,
            clock,
            retry: VENUE_RETRY_POLICY,
            prices: HashMap::new(),
            inflight: HashSet::new(),
            orders_journal,
            echo_journal,
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Client order ids placed this process and not yet seen terminal.
    pub fn inflight(&self) -> &HashSet<ClientOrderId> {
        &self.inflight
    }

    pub fn on_trade(&mut self, trade: &TradeEvent) {
        self.prices.insert(trade.symbol.clone(), trade.price);
    }

    /// Dispatch one accepted order down the dry-run or live path.
    pub async fn on_order(&mut self, order: OrderEvent) -> Result<(), DispatchError> {
        if !self.gate.engaged() {
            return self.dry_run(&order).await;
        }

        // Race-free kill check at the order boundary.
        if self.kill_switch.tripped(&self.bus).await? {
            return self.abort(&order, DenyReason::Halted).await;
        }

        match self.reference_price(&order) {
            Some(ref_price) if order.qty * ref_price <= LIVE_MICRO_CAP_USD => {}
            // An unknown reference price cannot prove the cap holds.
            _ => return self.abort(&order, DenyReason::LiveMicroCap).await,
        }

        // The client order id is a pure function of the intent id, stamped at
        // acceptance; retries and replays reach the venue under the same key.
        let request = BrokerOrderReq::from(&order);
        self.orders_journal
            .append(&BrokerJournalRecord::Request(&request))?;

        let placed = retry_with(self.retry, || self.venue.place(&request)).await;
        let ack = match placed {
            Ok(ack) => ack,
            Err(VenueError::DuplicateClientOrderId(cid)) => self.recover_duplicate(cid).await?,
            Err(error) => {
                error!(%error, order = %order.client_order_id, "placement failed");
                return Err(error.into());
            }
        };

        self.inflight.insert(ack.client_order_id.clone());
        self.orders_journal.append(&BrokerJournalRecord::Ack(&ack))?;
        self.bus.publish(topic::BROKER_ACKS, &ack).await?;

        info!(order = %ack.client_order_id, status = %ack.status, "order placed");
        Ok(())
    }

    /// Echo the order instead of contacting the venue.
    async fn dry_run(&mut self, order: &OrderEvent) -> Result<(), DispatchError> {
        info!(order = %order.client_order_id, symbol = %order.symbol, "dry-run - echoing order");
        self.echo_journal.append(order)?;
        self.bus.publish(topic::BROKER_ECHO, order).await?;
        Ok(())
    }

    async fn abort(&mut self, order: &OrderEvent, reason: DenyReason) -> Result<(), DispatchError> {
        warn!(order = %order.client_order_id, %reason, "live order aborted at broker boundary");
        let decision =
            RiskDecision::deny_at_boundary(order.intent_id.clone(), reason, self.clock.now_ns());
        self.bus.publish(topic::RISK_DECISION, &decision).await?;
        Ok(())
    }

    /// Idempotent recovery: the venue already holds this client order id, so
    /// adopt its state as the ack. Never place a second order.
    async fn recover_duplicate(
        &mut self,
        cid: ClientOrderId,
    ) -> Result<BrokerOrderAck, DispatchError> {
        warn!(order = %cid, "duplicate client order id - recovering via fetch_order");

        match self.venue.fetch_order(&cid).await? {
            Some(existing) => Ok(existing.as_ack(self.clock.now_ns())),
            None => Err(VenueError::DuplicateClientOrderId(cid).into()),
        }
    }

    /// Same reference-price rule as the risk engine: last trade price, falling
    /// back to the limit price for limit orders.
    fn reference_price(&self, order: &OrderEvent) -> Option<f64> {
        self.prices
            .get(&order.symbol)
            .copied()
            .or(match order.order_type {
                OrderType::Limit => order.limit_price,
                OrderType::Market => None,
            })
    }

    /// Forward a cancel request to the venue (live path only).
    pub async fn on_cancel(&mut self, request: BrokerCancelReq) -> Result<(), DispatchError> {
        self.orders_journal
            .append(&BrokerJournalRecord::Cancel(&request))?;

        if !self.gate.engaged() {
            return Ok(());
        }

        retry_with(self.retry, || self.venue.cancel(&request)).await?;
        self.inflight.remove(&request.client_order_id);
        Ok(())
    }

    /// Publish venue order state and balances to their topics.
    pub async fn poll_venue(&mut self) -> Result<(), DispatchError> {
        for update in self.venue.open_orders().await? {
            if matches!(
                update.status,
                BrokerOrderStatus::Filled
                    | BrokerOrderStatus::Cancelled
                    | BrokerOrderStatus::Rejected
            ) {
                self.inflight.remove(&update.client_order_id);
            }

            self.orders_journal
                .append(&BrokerJournalRecord::Update(&update))?;
            self.bus.publish(topic::BROKER_ORDERS, &update).await?;
        }

        for balance in self.venue.balances().await? {
            self.bus.publish(topic::BROKER_BALANCES, &balance).await?;
        }

        Ok(())
    }

    /// Subscribe and dispatch until shutdown or the order stream ends.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<(), DispatchError> {
        let mut orders = self
            .bus
            .subscribe_typed::<OrderEvent>(topic::ORDERS_ACCEPTED)
            .await?;
        let mut cancels = self
            .bus
            .subscribe_typed::<BrokerCancelReq>(topic::ORDERS_CANCEL)
            .await?;
        let mut trades = self
            .bus
            .subscribe_typed::<TradeEvent>(topic::MD_TRADES_ALL)
            .await?;

        let mut poll = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            venue = self.venue.name(),
            mode = if self.gate.engaged() { "live" } else { "dry-run" },
            "BrokerDispatcher running"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                Some(trade) = trades.next() => self.on_trade(&trade),

                Some(cancel) = cancels.next() => {
                    if let Err(error) = self.on_cancel(cancel).await {
                        error!(%error, "cancel forwarding failed");
                    }
                }

                order = orders.next() => match order {
                    Some(order) => {
                        if let Err(error) = self.on_order(order).await {
                            error!(%error, "order dispatch failed");
                        }
                    }
                    None => break,
                },

                _ = poll.tick(), if self.gate.engaged() => {
                    if let Err(error) = self.poll_venue().await {
                        error!(%error, "venue poll failed");
                    }
                }
            }
        }

        info!("BrokerDispatcher shutting down");
        Ok(())
    }
}
