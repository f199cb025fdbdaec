use crate::{rate_limit::RateLimiter, RiskConfig, RiskError};
use futures::StreamExt;
use njord_bus::{
    journal::{Journal, JournalDir},
    kill::KillSwitch,
    shutdown::Shutdown,
    Bus, BusExt,
};
use njord_core::{
    clock::Clock,
    event::TradeEvent,
    ids::IntentId,
    order::{OrderEvent, OrderIntent, OrderType},
    risk::{CapsSnapshot, DenyReason, RiskDecision},
    state::{PriceCache, PriceReader},
    topic,
};
use std::{fmt, sync::Arc};
use tracing::{error, info, warn};

/// Risk engine service.
///
/// Processes intents serially in arrival order; decisions are never reordered
/// relative to intents. A malformed message never takes the engine down.
pub struct RiskEngine<B> {
    bus: B,
    config: RiskConfig,
    kill_switch: KillSwitch,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    prices: PriceCache,
    journal: Journal,
}

impl<B> fmt::Debug for RiskEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl<B> RiskEngine<B>
where
    B: Bus,
{
    pub fn new(
        bus: B,
        config: RiskConfig,
        kill_switch: KillSwitch,
        clock: Arc<dyn Clock>,
        journals: &JournalDir,
    ) -> Result<Self, RiskError> {
        let journal = journals.open_stream("risk.decisions")?;
        let limiter = RateLimiter::new(config.orders_per_min_cap);

        Ok(Self {
            bus,
            config,
            kill_switch,
            clock,
            limiter,
            prices: PriceCache::new(),
            journal,
        })
    }

    /// Read-only view of the last-trade-price cache, for strategy contexts.
    pub fn prices(&self) -> PriceReader {
        self.prices.reader()
    }

    /// Update the price cache from an observed trade.
    pub fn on_trade(&self, trade: &TradeEvent) {
        self.prices.set(trade.symbol.clone(), trade.price);
    }

    /// Decide one intent payload, publishing the decision (and the `OrderEvent`
    /// when allowed) and journalling it.
    ///
    /// Undecodable payloads are denied with reason `invalid` under whatever
    /// `intent_id` can be salvaged from the raw payload.
    pub async fn process_intent(
        &mut self,
        payload: serde_json::Value,
    ) -> Result<RiskDecision, RiskError> {
        match serde_json::from_value::<OrderIntent>(payload.clone()) {
            Ok(intent) => self.decide(&intent).await,
            Err(decode_error) => {
                warn!(%decode_error, "undecodable intent payload - denying as invalid");

                let intent_id = payload
                    .get("intent_id")
                    .and_then(serde_json::Value::as_str)
                    .map(IntentId::new)
                    .unwrap_or_else(|| IntentId::new("unknown"));

                let decision = RiskDecision::deny(
                    intent_id,
                    DenyReason::Invalid,
                    self.clock.now_ns(),
                    self.caps(),
                );
                self.publish_decision(&decision).await?;
                Ok(decision)
            }
        }
    }

    /// Run the fixed check sequence for a decoded intent.
    pub async fn decide(&mut self, intent: &OrderIntent) -> Result<RiskDecision, RiskError> {
        let now_ns = self.clock.now_ns();
        let caps = self.caps();

        if let Some(reason) = self.evaluate(intent, now_ns).await? {
            info!(intent = %intent, %reason, "intent denied");
            let decision = RiskDecision::deny(intent.intent_id.clone(), reason, now_ns, caps);
            self.publish_decision(&decision).await?;
            return Ok(decision);
        }

        // Tokens are consumed by admitted intents only.
        self.limiter.commit(&intent.symbol, now_ns);

        let decision = RiskDecision::allow(intent.intent_id.clone(), now_ns, caps);
        self.publish_decision(&decision).await?;

        let order = OrderEvent::accept(intent, self.config.venue.clone(), now_ns);
        self.bus.publish(topic::ORDERS_ACCEPTED, &order).await?;

        Ok(decision)
    }

    /// First failing check sets the reason; `None` means allowed.
    async fn evaluate(
        &mut self,
        intent: &OrderIntent,
        now_ns: i64,
    ) -> Result<Option<DenyReason>, RiskError> {
        if intent.validate().is_err() {
            return Ok(Some(DenyReason::Invalid));
        }

        if self.kill_switch.tripped(&self.bus).await? {
            return Ok(Some(DenyReason::Halted));
        }

        if !self.limiter.check(&intent.symbol, now_ns) {
            return Ok(Some(DenyReason::RateLimit));
        }

        let Some(ref_price) = self.reference_price(intent) else {
            // No reference price means the notional cap cannot be evaluated.
            return Ok(Some(DenyReason::PerOrderCap));
        };
        if intent.qty * ref_price > self.config.per_order_usd_cap {
            return Ok(Some(DenyReason::PerOrderCap));
        }

        if self.day_pnl().await? < -self.config.daily_loss_usd_cap {
            return Ok(Some(DenyReason::DailyLossCap));
        }

        Ok(None)
    }

    /// Last trade price for the symbol, falling back to the limit price for
    /// limit orders.
    fn reference_price(&self, intent: &OrderIntent) -> Option<f64> {
        self.prices.get(&intent.symbol).or(match intent.order_type {
            OrderType::Limit => intent.limit_price,
            OrderType::Market => None,
        })
    }

    async fn day_pnl(&self) -> Result<f64, RiskError> {
        Ok(self
            .bus
            .get_key(&self.config.day_pnl_key)
            .await?
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.0))
    }

    async fn publish_decision(&mut self, decision: &RiskDecision) -> Result<(), RiskError> {
        // Journal first so every published decision has a journal line.
        self.journal.append(decision)?;
        self.bus.publish(topic::RISK_DECISION, decision).await?;
        Ok(())
    }

    fn caps(&self) -> CapsSnapshot {
        CapsSnapshot::new(
            self.config.per_order_usd_cap,
            self.config.orders_per_min_cap,
            self.config.daily_loss_usd_cap,
        )
    }

    /// Subscribe and process until shutdown or the intent stream ends.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<(), RiskError> {
        let mut intents = self.bus.subscribe(topic::STRAT_INTENT).await?;
        let mut trades = self
            .bus
            .subscribe_typed::<TradeEvent>(topic::MD_TRADES_ALL)
            .await?;

        info!(
            venue = %self.config.venue,
            per_order_usd_cap = self.config.per_order_usd_cap,
            orders_per_min_cap = self.config.orders_per_min_cap,
            daily_loss_usd_cap = self.config.daily_loss_usd_cap,
            "RiskEngine running"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                Some(trade) = trades.next() => self.on_trade(&trade),

                payload = intents.next() => match payload {
                    Some(payload) => {
                        if let Err(error) = self.process_intent(payload).await {
                            error!(%error, "publishing risk decision failed");
                        }
                    }
                    None => break,
                },
            }
        }

        info!("RiskEngine shutting down");
        Ok(())
    }
}
