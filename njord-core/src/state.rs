use crate::{ids::Symbol, position::PositionSnapshot};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Last-trade-price cache, owned and written by exactly one component (the risk
/// engine); everyone else holds a read-only [`PriceReader`].
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    inner: Arc<RwLock<HashMap<Symbol, f64>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: Symbol, price: f64) {
        self.inner.write().insert(symbol, price);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.inner.read().get(symbol).copied()
    }

    /// Hand out a read-only view for strategy contexts.
    pub fn reader(&self) -> PriceReader {
        PriceReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view over a [`PriceCache`].
#[derive(Debug, Clone)]
pub struct PriceReader {
    inner: Arc<RwLock<HashMap<Symbol, f64>>>,
}

impl PriceReader {
    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.inner.read().get(symbol).copied()
    }
}

/// Latest committed position per symbol, owned and written by exactly one
/// component (the paper OMS); everyone else holds a read-only [`PositionReader`].
///
/// Strategies observe the latest committed snapshot between events, never a live
/// view mid-fill.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    inner: Arc<RwLock<HashMap<Symbol, PositionSnapshot>>>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, snapshot: PositionSnapshot) {
        self.inner.write().insert(snapshot.symbol.clone(), snapshot);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<PositionSnapshot> {
        self.inner.read().get(symbol).cloned()
    }

    pub fn reader(&self) -> PositionReader {
        PositionReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view over a [`PositionMap`].
#[derive(Debug, Clone)]
pub struct PositionReader {
    inner: Arc<RwLock<HashMap<Symbol, PositionSnapshot>>>,
}

impl PositionReader {
    pub fn get(&self, symbol: &Symbol) -> Option<PositionSnapshot> {
        self.inner.read().get(symbol).cloned()
    }
}
