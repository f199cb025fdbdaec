use crate::error::VenueError;
use async_trait::async_trait;
use njord_core::{
    broker::{
        BalanceSnapshot, BrokerCancelReq, BrokerOrderAck, BrokerOrderReq, BrokerOrderStatus,
        BrokerOrderUpdate,
    },
    ids::{ClientOrderId, OrderId},
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Venue client seam the broker dispatcher executes against.
///
/// Implementations are interchangeable behind this trait; the dispatcher never
/// depends on a concrete venue. Calls are expected to surface
/// [`VenueError::DuplicateClientOrderId`] verbatim so idempotent recovery can
/// run.
#[async_trait]
pub trait Venue: Send + Sync {
    fn name(&self) -> &str;

    async fn place(&self, request: &BrokerOrderReq) -> Result<BrokerOrderAck, VenueError>;

    async fn fetch_order(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<BrokerOrderUpdate>, VenueError>;

    async fn cancel(&self, request: &BrokerCancelReq) -> Result<(), VenueError>;

    async fn open_orders(&self) -> Result<Vec<BrokerOrderUpdate>, VenueError>;

    async fn balances(&self) -> Result<Vec<BalanceSnapshot>, VenueError>;
}

/// Scripted venue double for dispatcher tests.
///
/// `place` consumes scripted outcomes in order, acknowledging with a synthetic
/// open order once the script runs dry. Every call is recorded for assertions.
#[derive(Debug, Clone, Default)]
pub struct MockVenue {
    state: Arc<Mutex<MockVenueState>>,
}

#[derive(Debug, Default)]
struct MockVenueState {
    place_scripts: VecDeque<Result<BrokerOrderAck, VenueError>>,
    place_calls: Vec<BrokerOrderReq>,
    orders: HashMap<ClientOrderId, BrokerOrderUpdate>,
    cancels: Vec<BrokerCancelReq>,
    balances: Vec<BalanceSnapshot>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unscripted `place` call.
    pub fn script_place(&self, outcome: Result<BrokerOrderAck, VenueError>) {
        self.state.lock().place_scripts.push_back(outcome);
    }

    /// Seed an order the venue already knows about (the `fetch_order` source).
    pub fn insert_order(&self, update: BrokerOrderUpdate) {
        self.state
            .lock()
            .orders
            .insert(update.client_order_id.clone(), update);
    }

    pub fn set_balances(&self, balances: Vec<BalanceSnapshot>) {
        self.state.lock().balances = balances;
    }

    /// Every `place` call observed, in order.
    pub fn place_calls(&self) -> Vec<BrokerOrderReq> {
        self.state.lock().place_calls.clone()
    }

    pub fn cancels(&self) -> Vec<BrokerCancelReq> {
        self.state.lock().cancels.clone()
    }
}

#[async_trait]
impl Venue for MockVenue {
    fn name(&self) -> &str {
        "mock"
    }

    async fn place(&self, request: &BrokerOrderReq) -> Result<BrokerOrderAck, VenueError> {
        let mut state = self.state.lock();
        state.place_calls.push(request.clone());

        if let Some(outcome) = state.place_scripts.pop_front() {
            return outcome;
        }

        let venue_order_id = OrderId::new(format!("mock-{}", state.place_calls.len()));
        let ack = BrokerOrderAck {
            client_order_id: request.client_order_id.clone(),
            venue_order_id: Some(venue_order_id.clone()),
            symbol: request.symbol.clone(),
            status: BrokerOrderStatus::Open,
            ts_ns: request.ts_ns,
        };

        state.orders.insert(
            request.client_order_id.clone(),
            BrokerOrderUpdate {
                client_order_id: request.client_order_id.clone(),
                venue_order_id: Some(venue_order_id),
                symbol: request.symbol.clone(),
                status: BrokerOrderStatus::Open,
                filled_qty: 0.0,
                avg_fill_price: None,
                ts_ns: request.ts_ns,
            },
        );

        Ok(ack)
    }

    async fn fetch_order(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<BrokerOrderUpdate>, VenueError> {
        Ok(self.state.lock().orders.get(client_order_id).cloned())
    }

    async fn cancel(&self, request: &BrokerCancelReq) -> Result<(), VenueError> {
        let mut state = self.state.lock();
        state.cancels.push(request.clone());
        if let Some(order) = state.orders.get_mut(&request.client_order_id) {
            order.status = BrokerOrderStatus::Cancelled;
        }
        Ok(())
    }

    async fn open_orders(&self) -> Result<Vec<BrokerOrderUpdate>, VenueError> {
        let mut orders = self
            .state
            .lock()
            .orders
            .values()
            .cloned()
            .collect::<Vec<_>>();
        orders.sort_by(|a, b| a.client_order_id.cmp(&b.client_order_id));
        Ok(orders)
    }

    async fn balances(&self) -> Result<Vec<BalanceSnapshot>, VenueError> {
        Ok(self.state.lock().balances.clone())
    }
}
