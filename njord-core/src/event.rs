use crate::{
    fill::FillEvent,
    ids::{Symbol, TradeId},
    order::Side,
    position::PositionSnapshot,
    topic, ContractError,
};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Public trade observed on a venue.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct TradeEvent {
    pub symbol: Symbol,
    pub price: f64,
    pub qty: f64,
    pub side: Side,
    pub ts_ns: i64,
    pub venue: SmolStr,
    pub trade_id: TradeId,
}

impl Display for TradeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ symbol: {}, side: {}, price: {}, qty: {}, ts_ns: {} }}",
            self.symbol, self.side, self.price, self.qty, self.ts_ns
        )
    }
}

/// Top-of-book summary.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct BookEvent {
    pub symbol: Symbol,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
    pub ts_ns: i64,
    pub venue: SmolStr,
}

/// Last-price summary.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct TickerEvent {
    pub symbol: Symbol,
    pub last_price: f64,
    pub ts_ns: i64,
    pub venue: SmolStr,
}

/// Closed union of every event a strategy can be dispatched.
///
/// The source of each variant is the bus topic it arrived on; [`BusEvent::from_topic`]
/// is the single decode point, so strategies pattern-match instead of inspecting
/// topic strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum BusEvent {
    Trade(TradeEvent),
    Book(BookEvent),
    Ticker(TickerEvent),
    Fill(FillEvent),
    Position(PositionSnapshot),
}

impl BusEvent {
    /// Decode a bus payload according to the topic it was published on.
    ///
    /// Unknown trailing fields in the payload are tolerated; type mismatches and
    /// missing required fields are rejected.
    pub fn from_topic(topic: &str, payload: &serde_json::Value) -> Result<Self, ContractError> {
        if topic.starts_with(topic::MD_TRADES_PREFIX) {
            Ok(Self::Trade(serde_json::from_value(payload.clone())?))
        } else if topic.starts_with(topic::MD_BOOK_PREFIX) {
            Ok(Self::Book(serde_json::from_value(payload.clone())?))
        } else if topic.starts_with(topic::MD_TICKER_PREFIX) {
            Ok(Self::Ticker(serde_json::from_value(payload.clone())?))
        } else if topic == topic::FILLS_NEW {
            Ok(Self::Fill(serde_json::from_value(payload.clone())?))
        } else if topic == topic::POSITIONS_SNAPSHOT {
            Ok(Self::Position(serde_json::from_value(payload.clone())?))
        } else {
            Err(ContractError::UnknownTopic(topic.to_string()))
        }
    }

    /// Symbol the event refers to.
    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Trade(event) => &event.symbol,
            Self::Book(event) => &event.symbol,
            Self::Ticker(event) => &event.symbol,
            Self::Fill(event) => &event.symbol,
            Self::Position(event) => &event.symbol,
        }
    }

    pub fn ts_ns(&self) -> i64 {
        match self {
            Self::Trade(event) => event.ts_ns,
            Self::Book(event) => event.ts_ns,
            Self::Ticker(event) => event.ts_ns,
            Self::Fill(event) => event.ts_fill_ns,
            Self::Position(event) => event.ts_ns,
        }
    }
}
