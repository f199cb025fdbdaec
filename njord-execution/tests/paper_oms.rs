use njord_bus::{journal::JournalDir, InMemoryBus};
use njord_core::{
    event::TradeEvent,
    fill::FillEvent,
    ids::{ClientOrderId, IntentId, Symbol, TradeId},
    order::{OrderEvent, OrderType, Side},
    position::PositionSnapshot,
    topic, Meta,
};
use njord_execution::{PaperEngine, PositionBook};
use proptest::prelude::*;
use smol_str::SmolStr;

const T0_NS: i64 = 1_700_000_000_000_000_000;

fn trade(symbol: &str, price: f64, ts_ns: i64) -> TradeEvent {
    TradeEvent {
        symbol: Symbol::new(symbol),
        price,
        qty: 0.01,
        side: Side::Buy,
        ts_ns,
        venue: SmolStr::new("binanceus"),
        trade_id: TradeId::new(format!("t-{ts_ns}")),
    }
}

fn order(id: &str, symbol: &str, side: Side, qty: f64, ts_accepted_ns: i64) -> OrderEvent {
    let intent_id = IntentId::new(id);
    OrderEvent {
        client_order_id: ClientOrderId::from_intent(&intent_id),
        intent_id,
        venue: SmolStr::new("paper"),
        symbol: Symbol::new(symbol),
        side,
        order_type: OrderType::Market,
        qty,
        limit_price: None,
        ts_accepted_ns,
        meta: Meta::default(),
    }
}

fn limit_order(
    id: &str,
    symbol: &str,
    side: Side,
    qty: f64,
    limit_price: f64,
    ts_accepted_ns: i64,
) -> OrderEvent {
    let mut order = order(id, symbol, side, qty, ts_accepted_ns);
    order.order_type = OrderType::Limit;
    order.limit_price = Some(limit_price);
    order
}

fn engine(bus: &InMemoryBus, dir: &tempfile::TempDir) -> PaperEngine<InMemoryBus> {
    PaperEngine::new(bus.clone(), JournalDir::new(dir.path()))
}

#[tokio::test]
async fn test_market_order_fills_at_last_trade_price() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("BTC/USDT", 100.0, T0_NS)).await.unwrap();
    oms.on_order(order("intent-1", "BTC/USDT", Side::Buy, 0.5, T0_NS + 1))
        .await
        .unwrap();

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 100.0);
    assert_eq!(fills[0].qty, 0.5);
    assert_eq!(fills[0].ts_fill_ns, T0_NS + 1);

    let snapshots = bus.published_decoded::<PositionSnapshot>(topic::POSITIONS_SNAPSHOT);
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].qty, 0.5);
    assert_eq!(snapshots[0].avg_price, 100.0);
    assert_eq!(snapshots[0].realized_pnl, 0.0);
}

#[tokio::test]
async fn test_fifo_realized_pnl_sequence() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("ATOM/USDT", 100.0, T0_NS)).await.unwrap();
    oms.on_order(order("intent-1", "ATOM/USDT", Side::Buy, 1.0, T0_NS))
        .await
        .unwrap();
    oms.on_trade(trade("ATOM/USDT", 110.0, T0_NS + 1)).await.unwrap();
    oms.on_order(order("intent-2", "ATOM/USDT", Side::Buy, 1.0, T0_NS + 1))
        .await
        .unwrap();
    oms.on_trade(trade("ATOM/USDT", 120.0, T0_NS + 2)).await.unwrap();
    oms.on_order(order("intent-3", "ATOM/USDT", Side::Sell, 1.0, T0_NS + 2))
        .await
        .unwrap();

    let snapshots = bus.published_decoded::<PositionSnapshot>(topic::POSITIONS_SNAPSHOT);
    let third = &snapshots[2];
    assert_eq!(third.qty, 1.0);
    assert_eq!(third.avg_price, 110.0);
    assert_eq!(third.realized_pnl, 20.0);

    oms.on_trade(trade("ATOM/USDT", 105.0, T0_NS + 3)).await.unwrap();
    oms.on_order(order("intent-4", "ATOM/USDT", Side::Sell, 1.0, T0_NS + 3))
        .await
        .unwrap();

    let snapshots = bus.published_decoded::<PositionSnapshot>(topic::POSITIONS_SNAPSHOT);
    let fourth = &snapshots[3];
    assert_eq!(fourth.qty, 0.0);
    assert_eq!(fourth.avg_price, 0.0);
    assert_eq!(fourth.realized_pnl, 15.0);
}

#[tokio::test]
async fn test_market_order_without_price_is_held_then_filled_retroactively() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_order(order("intent-1", "BTC/USDT", Side::Buy, 0.5, T0_NS))
        .await
        .unwrap();
    assert_eq!(oms.open_order_count(), 1);
    assert_eq!(bus.published_len(topic::FILLS_NEW), 0);

    // A trade on another symbol does not release it.
    oms.on_trade(trade("ATOM/USDT", 9.0, T0_NS + 1)).await.unwrap();
    assert_eq!(oms.open_order_count(), 1);

    oms.on_trade(trade("BTC/USDT", 101.0, T0_NS + 2)).await.unwrap();
    assert_eq!(oms.open_order_count(), 0);

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 101.0);
    assert_eq!(fills[0].ts_fill_ns, T0_NS + 2);
}

#[tokio::test]
async fn test_market_order_falls_back_to_limit_price() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    let mut order = order("intent-1", "BTC/USDT", Side::Buy, 0.5, T0_NS);
    order.limit_price = Some(99.5);
    oms.on_order(order).await.unwrap();

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 99.5);
    assert_eq!(fills[0].ts_fill_ns, T0_NS);
}

#[tokio::test]
async fn test_limit_order_fills_at_limit_price_when_crossed() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    // Last trade above the buy limit: held.
    oms.on_trade(trade("ATOM/USDT", 10.5, T0_NS)).await.unwrap();
    oms.on_order(limit_order(
        "intent-1",
        "ATOM/USDT",
        Side::Buy,
        2.0,
        10.0,
        T0_NS + 1,
    ))
    .await
    .unwrap();
    assert_eq!(oms.open_order_count(), 1);

    // Not crossed yet.
    oms.on_trade(trade("ATOM/USDT", 10.2, T0_NS + 2)).await.unwrap();
    assert_eq!(oms.open_order_count(), 1);

    // Crossed: fills at the limit price, stamped with the crossing trade.
    oms.on_trade(trade("ATOM/USDT", 9.9, T0_NS + 3)).await.unwrap();
    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 10.0);
    assert_eq!(fills[0].ts_fill_ns, T0_NS + 3);
}

#[tokio::test]
async fn test_limit_order_crossing_at_acceptance_fills_immediately() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("ATOM/USDT", 9.9, T0_NS)).await.unwrap();
    oms.on_order(limit_order(
        "intent-1",
        "ATOM/USDT",
        Side::Buy,
        2.0,
        10.0,
        T0_NS + 1,
    ))
    .await
    .unwrap();

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 10.0);
    assert_eq!(fills[0].ts_fill_ns, T0_NS + 1);
}

#[tokio::test]
async fn test_sell_limit_crosses_upward() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("ATOM/USDT", 10.0, T0_NS)).await.unwrap();
    oms.on_order(order("intent-0", "ATOM/USDT", Side::Buy, 2.0, T0_NS))
        .await
        .unwrap();

    oms.on_order(limit_order(
        "intent-1",
        "ATOM/USDT",
        Side::Sell,
        2.0,
        11.0,
        T0_NS + 1,
    ))
    .await
    .unwrap();
    assert_eq!(oms.open_order_count(), 1);

    oms.on_trade(trade("ATOM/USDT", 11.2, T0_NS + 2)).await.unwrap();
    assert_eq!(oms.open_order_count(), 0);

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills[1].price, 11.0);

    let snapshots = bus.published_decoded::<PositionSnapshot>(topic::POSITIONS_SNAPSHOT);
    assert_eq!(snapshots[1].qty, 0.0);
    assert_eq!(snapshots[1].realized_pnl, 2.0);
}

#[tokio::test]
async fn test_meta_round_trips_from_intent_to_fill() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    let mut meta = Meta::default();
    meta.insert("algo".to_string(), serde_json::json!("twap"));
    meta.insert("slice".to_string(), serde_json::json!(3));

    oms.on_trade(trade("BTC/USDT", 100.0, T0_NS)).await.unwrap();
    let mut order = order("intent-1", "BTC/USDT", Side::Buy, 0.5, T0_NS);
    order.meta = meta.clone();
    oms.on_order(order).await.unwrap();

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    assert_eq!(fills[0].meta, meta);
}

#[tokio::test]
async fn test_fills_and_positions_are_journalled_per_symbol() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("BTC/USDT", 100.0, T0_NS)).await.unwrap();
    oms.on_order(order("intent-1", "BTC/USDT", Side::Buy, 0.5, T0_NS))
        .await
        .unwrap();
    oms.on_order(order("intent-2", "BTC/USDT", Side::Sell, 0.5, T0_NS + 1))
        .await
        .unwrap();

    let fill_lines = std::fs::read_to_string(dir.path().join("fills.BTC-USDT.ndjson")).unwrap();
    let journalled_fills = fill_lines
        .lines()
        .map(|line| serde_json::from_str::<FillEvent>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        journalled_fills,
        bus.published_decoded::<FillEvent>(topic::FILLS_NEW)
    );

    let position_lines =
        std::fs::read_to_string(dir.path().join("positions.BTC-USDT.ndjson")).unwrap();
    let journalled_positions = position_lines
        .lines()
        .map(|line| serde_json::from_str::<PositionSnapshot>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        journalled_positions,
        bus.published_decoded::<PositionSnapshot>(topic::POSITIONS_SNAPSHOT)
    );
}

#[tokio::test]
async fn test_replaying_the_same_stream_yields_identical_journals() {
    let run = |dir: tempfile::TempDir| async move {
        let bus = InMemoryBus::new();
        let mut oms = engine(&bus, &dir);

        oms.on_trade(trade("BTC/USDT", 100.0, T0_NS)).await.unwrap();
        oms.on_order(order("intent-1", "BTC/USDT", Side::Buy, 0.7, T0_NS))
            .await
            .unwrap();
        oms.on_trade(trade("BTC/USDT", 130.0, T0_NS + 1)).await.unwrap();
        oms.on_order(order("intent-2", "BTC/USDT", Side::Sell, 0.4, T0_NS + 1))
            .await
            .unwrap();

        let fills = std::fs::read(dir.path().join("fills.BTC-USDT.ndjson")).unwrap();
        let positions = std::fs::read(dir.path().join("positions.BTC-USDT.ndjson")).unwrap();
        (fills, positions)
    };

    let first = run(tempfile::tempdir().unwrap()).await;
    let second = run(tempfile::tempdir().unwrap()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cold_start_restores_positions_from_journalled_fills() {
    let bus = InMemoryBus::new();
    let dir = tempfile::tempdir().unwrap();
    let mut oms = engine(&bus, &dir);

    oms.on_trade(trade("BTC/USDT", 100.0, T0_NS)).await.unwrap();
    oms.on_order(order("intent-1", "BTC/USDT", Side::Buy, 1.0, T0_NS))
        .await
        .unwrap();
    oms.on_trade(trade("BTC/USDT", 120.0, T0_NS + 1)).await.unwrap();
    oms.on_order(order("intent-2", "BTC/USDT", Side::Sell, 0.4, T0_NS + 1))
        .await
        .unwrap();

    let fills = bus.published_decoded::<FillEvent>(topic::FILLS_NEW);
    let live_snapshot = oms.positions().get(&Symbol::new("BTC/USDT")).unwrap();

    let fresh_bus = InMemoryBus::new();
    let fresh_dir = tempfile::tempdir().unwrap();
    let mut restored = engine(&fresh_bus, &fresh_dir);
    restored.restore_fills(fills);

    assert_eq!(
        restored.positions().get(&Symbol::new("BTC/USDT")).unwrap(),
        live_snapshot
    );
}

proptest! {
    /// FIFO accounting preserves net quantity, and replaying the same fill
    /// stream from scratch reconstructs the identical book.
    #[test]
    fn prop_fifo_book_replay_and_net_qty(
        fills in proptest::collection::vec(
            (any::<bool>(), 1u32..100, 1u32..1_000),
            1..32,
        ),
    ) {
        let mut book = PositionBook::new();
        let mut replay = PositionBook::new();
        let mut net_qty = 0.0_f64;

        for &(is_buy, qty, price) in &fills {
            let side = if is_buy { Side::Buy } else { Side::Sell };
            let qty = f64::from(qty);
            let price = f64::from(price);

            book.apply_fill(side, qty, price);
            net_qty += qty * side.sign();
        }
        for &(is_buy, qty, price) in &fills {
            let side = if is_buy { Side::Buy } else { Side::Sell };
            replay.apply_fill(side, f64::from(qty), f64::from(price));
        }

        prop_assert_eq!(book.clone(), replay);
        prop_assert!((book.qty() - net_qty).abs() < 1e-6);
        if book.is_flat() {
            prop_assert_eq!(book.avg_price(), 0.0);
        }
    }
}
