use crate::{error::OmsError, position::PositionBook};
use futures::StreamExt;
use njord_bus::{
    journal::{Journal, JournalDir},
    shutdown::Shutdown,
    Bus, BusExt,
};
use njord_core::{
    event::TradeEvent,
    fill::FillEvent,
    ids::{OrderId, Symbol},
    order::{OrderEvent, OrderType, Side},
    state::{PositionMap, PositionReader},
    topic,
};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
};
use tracing::{error, info};

/// Paper trading OMS.
///
/// Consumes `orders.accepted` serially, synthesizes deterministic fills,
/// maintains FIFO positions, and publishes `fills.new` + `positions.snapshot`
/// (journalling both per symbol).
///
/// Determinism: no wall-clock reads; every stamp comes from the input events
/// (the order's `ts_accepted_ns` for immediate fills, the triggering trade's
/// `ts_ns` for retroactive ones). Two runs over identical input streams produce
/// byte-identical journals.
pub struct PaperEngine<B> {
    bus: B,
    journals: JournalDir,
    prices: HashMap<Symbol, f64>,
    books: HashMap<Symbol, PositionBook>,
    positions: PositionMap,
    /// Orders awaiting a fillable price, in arrival order.
    open_orders: VecDeque<OrderEvent>,
    fill_journals: HashMap<Symbol, Journal>,
    position_journals: HashMap<Symbol, Journal>,
}

impl<B> fmt::Debug for PaperEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperEngine")
            .field("symbols", &self.books.len())
            .field("open_orders", &self.open_orders.len())
            .finish()
    }
}

impl<B> PaperEngine<B>
where
    B: Bus,
{
    pub fn new(bus: B, journals: JournalDir) -> Self {
        Self {
            bus,
            journals,
            prices: HashMap::new(),
            books: HashMap::new(),
            positions: PositionMap::new(),
            open_orders: VecDeque::new(),
            fill_journals: HashMap::new(),
            position_journals: HashMap::new(),
        }
    }

    /// Read-only view of the latest committed positions, for strategy contexts.
    pub fn positions(&self) -> PositionReader {
        self.positions.reader()
    }

    /// Orders currently held awaiting a fillable price.
    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    /// Rebuild position state from a previously journalled fill stream.
    ///
    /// Cold-start affordance: positions are a pure function of the ordered fill
    /// stream, so replaying it reproduces an equivalent book. Nothing is
    /// published or journalled.
    pub fn restore_fills<I>(&mut self, fills: I)
    where
        I: IntoIterator<Item = FillEvent>,
    {
        for fill in fills {
            let book = self.books.entry(fill.symbol.clone()).or_default();
            book.apply_fill(fill.side, fill.qty, fill.price);
            self.positions
                .set(book.snapshot(fill.symbol.clone(), fill.ts_fill_ns));
        }
    }

    /// Handle one accepted order: fill immediately when a price is available,
    /// otherwise hold it for the next trade on its symbol.
    pub async fn on_order(&mut self, order: OrderEvent) -> Result<(), OmsError> {
        match self.immediate_fill_price(&order) {
            Some(price) => self.execute(order, price, None).await,
            None => {
                info!(order = %order.client_order_id, symbol = %order.symbol, "no fillable price - holding order");
                self.open_orders.push_back(order);
                Ok(())
            }
        }
    }

    /// Fill price available at acceptance time, if any.
    ///
    /// Market orders take the last observed trade price, falling back to the
    /// limit price. Limit orders fill at the limit price once the last trade
    /// crosses it.
    fn immediate_fill_price(&self, order: &OrderEvent) -> Option<f64> {
        let last = self.prices.get(&order.symbol).copied();
        match order.order_type {
            OrderType::Market => last.or(order.limit_price),
            OrderType::Limit => {
                let limit = order.limit_price?;
                last.filter(|&last| crosses(order.side, last, limit))
                    .map(|_| limit)
            }
        }
    }

    /// Handle one trade: refresh the price and re-evaluate held orders for the
    /// symbol, filling retroactively with the trade's stamp.
    pub async fn on_trade(&mut self, trade: TradeEvent) -> Result<(), OmsError> {
        self.prices.insert(trade.symbol.clone(), trade.price);

        let mut still_open = VecDeque::with_capacity(self.open_orders.len());
        let mut fillable = Vec::new();

        while let Some(order) = self.open_orders.pop_front() {
            if order.symbol != trade.symbol {
                still_open.push_back(order);
                continue;
            }
            match order.order_type {
                OrderType::Market => fillable.push((order, trade.price)),
                OrderType::Limit => match order.limit_price {
                    Some(limit) if crosses(order.side, trade.price, limit) => {
                        fillable.push((order, limit))
                    }
                    _ => still_open.push_back(order),
                },
            }
        }
        self.open_orders = still_open;

        for (order, price) in fillable {
            self.execute(order, price, Some(trade.ts_ns)).await?;
        }
        Ok(())
    }

    /// Synthesize the fill, update the position, journal and publish both.
    async fn execute(
        &mut self,
        order: OrderEvent,
        price: f64,
        ts_fill_ns: Option<i64>,
    ) -> Result<(), OmsError> {
        let ts_fill_ns = ts_fill_ns.unwrap_or(order.ts_accepted_ns);

        let fill = FillEvent {
            order_id: OrderId::new(order.client_order_id.0.as_str()),
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            price,
            // Paper fills carry no fee model.
            fee: 0.0,
            ts_fill_ns,
            meta: order.meta.clone(),
        };

        let book = self.books.entry(order.symbol.clone()).or_default();
        book.apply_fill(fill.side, fill.qty, fill.price);
        let snapshot = book.snapshot(order.symbol.clone(), ts_fill_ns);

        // Journal before publishing so every published event has a line.
        self.fill_journal(&order.symbol)?.append(&fill)?;
        self.position_journal(&order.symbol)?.append(&snapshot)?;

        self.positions.set(snapshot.clone());

        self.bus.publish(topic::FILLS_NEW, &fill).await?;
        self.bus.publish(topic::POSITIONS_SNAPSHOT, &snapshot).await?;

        info!(fill = %fill, qty = snapshot.qty, realized_pnl = snapshot.realized_pnl, "paper fill");
        Ok(())
    }

    fn fill_journal(&mut self, symbol: &Symbol) -> Result<&mut Journal, OmsError> {
        match self.fill_journals.entry(symbol.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                Ok(entry.insert(self.journals.open_symbol_stream("fills", symbol)?))
            }
        }
    }

    fn position_journal(&mut self, symbol: &Symbol) -> Result<&mut Journal, OmsError> {
        match self.position_journals.entry(symbol.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                Ok(entry.insert(self.journals.open_symbol_stream("positions", symbol)?))
            }
        }
    }

    /// Subscribe and process until shutdown or the order stream ends.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<(), OmsError> {
        let mut orders = self
            .bus
            .subscribe_typed::<OrderEvent>(topic::ORDERS_ACCEPTED)
            .await?;
        let mut trades = self
            .bus
            .subscribe_typed::<TradeEvent>(topic::MD_TRADES_ALL)
            .await?;

        info!("PaperEngine running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                Some(trade) = trades.next() => {
                    if let Err(error) = self.on_trade(trade).await {
                        error!(%error, "paper trade handling failed");
                    }
                }

                order = orders.next() => match order {
                    Some(order) => {
                        if let Err(error) = self.on_order(order).await {
                            error!(%error, "paper order handling failed");
                        }
                    }
                    None => break,
                },
            }
        }

        info!("PaperEngine shutting down");
        Ok(())
    }
}

/// Whether `last` crosses `limit` for the given side.
fn crosses(side: Side, last: f64, limit: f64) -> bool {
    match side {
        Side::Buy => last <= limit,
        Side::Sell => last >= limit,
    }
}
