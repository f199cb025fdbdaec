use crate::{
    config::StrategyManifestEntry,
    strategy::{registry::StrategyRegistry, PublishHandle, Strategy, StrategyContext, StrategyError},
};
use futures::{
    stream::{self, BoxStream, SelectAll},
    StreamExt,
};
use njord_bus::{shutdown::Shutdown, Bus, BusExt};
use njord_core::{
    event::BusEvent,
    ids::{StrategyId, Symbol},
    order::OrderIntent,
    state::{PositionReader, PriceReader},
    topic,
};
use std::{
    collections::HashSet,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Requests a manifest reload on a running [`StrategyManager`].
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::UnboundedSender<Vec<StrategyManifestEntry>>,
}

impl ReloadHandle {
    pub fn reload(&self, manifest: Vec<StrategyManifestEntry>) {
        let _ = self.tx.send(manifest);
    }
}

struct ActiveStrategy {
    entry: StrategyManifestEntry,
    strategy: Box<dyn Strategy>,
    symbols: HashSet<Symbol>,
    topics: Vec<String>,
}

impl ActiveStrategy {
    /// Whether an event on `topic_name` for `symbol` dispatches to this instance.
    fn matches(&self, topic_name: &str, symbol: &Symbol) -> bool {
        self.topics
            .iter()
            .any(|pattern| topic::matches(pattern, topic_name))
            && (self.symbols.is_empty() || self.symbols.contains(symbol))
    }
}

/// Instantiates the strategies of a manifest and dispatches bus events to them,
/// publishing every returned intent to `strat.intent`.
///
/// One strategy's bug never stops the others: a panic inside `on_event` is
/// caught, logged and counted, and dispatch continues. Hot reload tears down
/// removed entries, replaces changed ones (unchanged entries keep their
/// instance and state) and re-subscribes to the new topic union; intents
/// already published keep flowing to their decisions.
pub struct StrategyManager {
    bus: Arc<dyn Bus>,
    registry: StrategyRegistry,
    prices: PriceReader,
    positions: PositionReader,
    active: Vec<ActiveStrategy>,
    failures: u64,
    reload_tx: mpsc::UnboundedSender<Vec<StrategyManifestEntry>>,
    reload_rx: Option<mpsc::UnboundedReceiver<Vec<StrategyManifestEntry>>>,
}

impl fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyManager")
            .field("active", &self.active.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl StrategyManager {
    pub fn new(
        bus: Arc<dyn Bus>,
        registry: StrategyRegistry,
        prices: PriceReader,
        positions: PositionReader,
    ) -> Self {
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();

        Self {
            bus,
            registry,
            prices,
            positions,
            active: Vec::new(),
            failures: 0,
            reload_tx,
            reload_rx: Some(reload_rx),
        }
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.reload_tx.clone(),
        }
    }

    /// Ids of the currently instantiated strategies, in manifest order.
    pub fn active_ids(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|active| active.entry.id.clone())
            .collect()
    }

    /// Contained `on_event` panics since construction.
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    /// Load or reload the manifest.
    ///
    /// Removed entries are torn down, changed entries are re-instantiated, and
    /// unchanged entries keep their instance (and accumulated state). Disabled
    /// or unknown entries are skipped with a log line, never an error.
    pub fn apply(&mut self, manifest: &[StrategyManifestEntry]) {
        let mut previous = std::mem::take(&mut self.active);
        let mut next = Vec::with_capacity(manifest.len());

        for entry in manifest {
            if let Some(index) = previous
                .iter()
                .position(|active| active.entry.id == entry.id)
            {
                let existing = previous.remove(index);
                if existing.entry == *entry {
                    next.push(existing);
                    continue;
                }
                info!(id = %entry.id, "strategy changed - replacing instance");
            }

            if let Some(active) = self.instantiate(entry) {
                next.push(active);
            }
        }

        for removed in &previous {
            info!(id = %removed.entry.id, "strategy removed - tearing down");
        }

        self.active = next;
    }

    fn instantiate(&self, entry: &StrategyManifestEntry) -> Option<ActiveStrategy> {
        if !entry.enabled {
            debug!(id = %entry.id, "strategy disabled - skipping");
            return None;
        }

        let Some(factory) = self.registry.get(&entry.strategy) else {
            warn!(
                id = %entry.id,
                strategy = %entry.strategy,
                "unknown strategy in manifest - skipping"
            );
            return None;
        };

        let ctx = StrategyContext {
            strategy_id: StrategyId::new(&entry.id),
            bus: PublishHandle::new(Arc::clone(&self.bus)),
            positions: self.positions.clone(),
            prices: self.prices.clone(),
            params: entry.params.clone(),
        };

        match factory(ctx) {
            Ok(strategy) => Some(ActiveStrategy {
                symbols: entry.symbols.iter().map(Symbol::new).collect(),
                topics: entry.topics(),
                entry: entry.clone(),
                strategy,
            }),
            Err(error) => {
                warn!(id = %entry.id, %error, "strategy construction failed - skipping");
                None
            }
        }
    }

    /// Decode one bus event and dispatch it to every matching strategy,
    /// publishing returned intents.
    ///
    /// Undecodable payloads are dropped with a log line. Returns the intents
    /// that were published.
    pub async fn dispatch(
        &mut self,
        topic_name: &str,
        payload: &serde_json::Value,
    ) -> Result<Vec<OrderIntent>, StrategyError> {
        let event = match BusEvent::from_topic(topic_name, payload) {
            Ok(event) => event,
            Err(error) => {
                warn!(topic = topic_name, %error, "undecodable event - dropping");
                return Ok(Vec::new());
            }
        };

        let mut emitted = Vec::new();
        for active in &mut self.active {
            if !active.matches(topic_name, event.symbol()) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| active.strategy.on_event(&event))) {
                Ok(intents) => emitted.extend(intents),
                Err(_) => {
                    self.failures += 1;
                    error!(
                        id = %active.entry.id,
                        failures = self.failures,
                        "strategy panicked in on_event - containing"
                    );
                }
            }
        }

        for intent in &emitted {
            self.bus.publish(topic::STRAT_INTENT, intent).await?;
        }

        Ok(emitted)
    }

    /// Union of the active strategies' topic subscriptions, deduplicated.
    fn topic_union(&self) -> Vec<String> {
        let mut topics = Vec::new();
        for active in &self.active {
            for topic_name in &active.topics {
                if !topics.contains(topic_name) {
                    topics.push(topic_name.clone());
                }
            }
        }
        topics
    }

    async fn subscribe_union(
        &self,
    ) -> Result<SelectAll<BoxStream<'static, (String, serde_json::Value)>>, StrategyError> {
        let mut feeds = Vec::new();
        for topic_name in self.topic_union() {
            let feed = self.bus.subscribe(&topic_name).await?;
            feeds.push(
                feed.map(move |payload| (topic_name.clone(), payload))
                    .boxed(),
            );
        }
        Ok(stream::select_all(feeds))
    }

    /// Subscribe to the topic union and dispatch until shutdown.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<(), StrategyError> {
        // `run` consumes the manager, so the receiver is always still present.
        let mut reload_rx = self
            .reload_rx
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);

        let mut feed = self.subscribe_union().await?;

        info!(strategies = self.active.len(), "StrategyManager running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                Some(manifest) = reload_rx.recv() => {
                    info!(entries = manifest.len(), "manifest reload requested");
                    self.apply(&manifest);
                    feed = self.subscribe_union().await?;
                }

                Some((topic_name, payload)) = feed.next() => {
                    if let Err(error) = self.dispatch(&topic_name, &payload).await {
                        error!(%error, "event dispatch failed");
                    }
                }
            }
        }

        info!("StrategyManager shutting down");
        Ok(())
    }
}
