use njord::{
    config::StrategyManifestEntry,
    strategy::{Strategy, StrategyContext, StrategyError},
    StrategyManager, StrategyRegistry,
};
use njord_bus::{shutdown, Bus, InMemoryBus};
use njord_core::{
    event::{BusEvent, TradeEvent},
    ids::{StrategyId, Symbol, TradeId},
    order::{OrderIntent, Side},
    state::{PositionMap, PriceCache},
    topic,
};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};

fn entry(id: &str, strategy: &str, symbols: &[&str]) -> StrategyManifestEntry {
    StrategyManifestEntry {
        id: id.to_string(),
        strategy: strategy.to_string(),
        enabled: true,
        symbols: symbols.iter().map(|symbol| symbol.to_string()).collect(),
        events: Vec::new(),
        params: serde_json::Map::new(),
    }
}

fn manager(bus: &InMemoryBus, registry: StrategyRegistry) -> StrategyManager {
    StrategyManager::new(
        Arc::new(bus.clone()),
        registry,
        PriceCache::new().reader(),
        PositionMap::new().reader(),
    )
}

fn trade_payload(symbol: &str, price: f64, ts_ns: i64) -> serde_json::Value {
    serde_json::to_value(TradeEvent {
        symbol: Symbol::new(symbol),
        price,
        qty: 1.0,
        side: Side::Buy,
        ts_ns,
        venue: SmolStr::new("binanceus"),
        trade_id: TradeId::new(format!("t-{ts_ns}")),
    })
    .unwrap()
}

struct Panicking {
    id: StrategyId,
}

impl Strategy for Panicking {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn on_event(&mut self, _: &BusEvent) -> Vec<OrderIntent> {
        panic!("strategy bug")
    }
}

fn panicking_factory(ctx: StrategyContext) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(Panicking {
        id: ctx.strategy_id,
    }))
}

#[tokio::test]
async fn test_dispatch_routes_by_symbol() {
    let bus = InMemoryBus::new();
    let mut manager = manager(&bus, StrategyRegistry::builtin());
    manager.apply(&[
        entry("momentum-atom", "momentum", &["ATOM/USDT"]),
        entry("momentum-btc", "momentum", &["BTC/USDT"]),
    ]);

    // Seed anchors, then cross the ATOM threshold only.
    manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.0, 1))
        .await
        .unwrap();
    manager
        .dispatch("md.trades.BTC/USDT", &trade_payload("BTC/USDT", 100.0, 2))
        .await
        .unwrap();
    let emitted = manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.5, 3))
        .await
        .unwrap();

    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].strategy_id, StrategyId::new("momentum-atom"));
    assert_eq!(emitted[0].symbol, Symbol::new("ATOM/USDT"));

    let published = bus.published_decoded::<OrderIntent>(topic::STRAT_INTENT);
    assert_eq!(published, emitted);
}

#[tokio::test]
async fn test_unknown_and_disabled_entries_are_skipped_not_fatal() {
    let bus = InMemoryBus::new();
    let mut manager = manager(&bus, StrategyRegistry::builtin());

    let mut disabled = entry("disabled", "momentum", &["ATOM/USDT"]);
    disabled.enabled = false;

    manager.apply(&[
        entry("known", "momentum", &["ATOM/USDT"]),
        entry("missing", "not-a-strategy", &["ATOM/USDT"]),
        disabled,
    ]);

    assert_eq!(manager.active_ids(), vec!["known".to_string()]);
}

#[tokio::test]
async fn test_a_panicking_strategy_does_not_stop_the_others() {
    let bus = InMemoryBus::new();
    let mut registry = StrategyRegistry::builtin();
    registry.register("panicking", panicking_factory);

    let mut manager = manager(&bus, registry);
    manager.apply(&[
        entry("boom", "panicking", &["ATOM/USDT"]),
        entry("momentum-atom", "momentum", &["ATOM/USDT"]),
    ]);

    manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.0, 1))
        .await
        .unwrap();
    let emitted = manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.5, 2))
        .await
        .unwrap();

    assert_eq!(manager.failure_count(), 2);
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].strategy_id, StrategyId::new("momentum-atom"));
}

#[tokio::test]
async fn test_undecodable_events_are_dropped() {
    let bus = InMemoryBus::new();
    let mut manager = manager(&bus, StrategyRegistry::builtin());
    manager.apply(&[entry("momentum-atom", "momentum", &["ATOM/USDT"])]);

    let emitted = manager
        .dispatch(
            "md.trades.ATOM/USDT",
            &serde_json::json!({"price": "not-a-number"}),
        )
        .await
        .unwrap();

    assert!(emitted.is_empty());
    assert_eq!(manager.failure_count(), 0);
}

#[tokio::test]
async fn test_hot_reload_keeps_unchanged_replaces_changed_removes_gone() {
    let bus = InMemoryBus::new();
    let mut manager = manager(&bus, StrategyRegistry::builtin());

    manager.apply(&[
        entry("keep", "momentum", &["ATOM/USDT"]),
        entry("change", "momentum", &["BTC/USDT"]),
        entry("remove", "momentum", &["ETH/USDT"]),
    ]);

    // Seed the kept instance's anchor so retained state is observable.
    manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.0, 1))
        .await
        .unwrap();

    let mut changed = entry("change", "momentum", &["BTC/USDT"]);
    changed
        .params
        .insert("threshold_pct".to_string(), serde_json::json!(5.0));

    manager.apply(&[entry("keep", "momentum", &["ATOM/USDT"]), changed]);
    assert_eq!(
        manager.active_ids(),
        vec!["keep".to_string(), "change".to_string()]
    );

    // The kept instance still holds its anchor: a crossing trade emits
    // immediately instead of re-seeding.
    let emitted = manager
        .dispatch("md.trades.ATOM/USDT", &trade_payload("ATOM/USDT", 10.5, 2))
        .await
        .unwrap();
    assert_eq!(emitted.len(), 1);
}

#[tokio::test]
async fn test_run_loop_dispatches_and_hot_reloads() {
    let bus = InMemoryBus::new();
    let mut manager = manager(&bus, StrategyRegistry::builtin());
    manager.apply(&[entry("momentum-atom", "momentum", &["ATOM/USDT"])]);

    let reload = manager.reload_handle();
    let (shutdown_handle, shutdown_rx) = shutdown::channel();
    let task = tokio::spawn(manager.run(shutdown_rx));

    wait_until(|| bus.subscribed_to("md.trades.ATOM/USDT")).await;

    bus.publish_json("md.trades.ATOM/USDT", trade_payload("ATOM/USDT", 10.0, 1))
        .await
        .unwrap();
    bus.publish_json("md.trades.ATOM/USDT", trade_payload("ATOM/USDT", 10.5, 2))
        .await
        .unwrap();
    wait_until(|| bus.published_len(topic::STRAT_INTENT) == 1).await;

    // Reload onto BTC; the old subscription is torn down with the instance.
    reload.reload(vec![entry("momentum-btc", "momentum", &["BTC/USDT"])]);
    wait_until(|| bus.subscribed_to("md.trades.BTC/USDT")).await;

    bus.publish_json("md.trades.BTC/USDT", trade_payload("BTC/USDT", 100.0, 3))
        .await
        .unwrap();
    bus.publish_json("md.trades.BTC/USDT", trade_payload("BTC/USDT", 102.0, 4))
        .await
        .unwrap();
    wait_until(|| bus.published_len(topic::STRAT_INTENT) == 2).await;

    let intents = bus.published_decoded::<OrderIntent>(topic::STRAT_INTENT);
    assert_eq!(intents[1].strategy_id, StrategyId::new("momentum-btc"));

    shutdown_handle.shutdown();
    task.await.unwrap().unwrap();
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition within timeout");
}
