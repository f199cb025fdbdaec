use njord_core::ids::Symbol;
use std::collections::{HashMap, VecDeque};

const WINDOW_NS: i64 = 60 * 1_000_000_000;

/// Per-symbol sliding-window rate limiter over admitted intents.
///
/// The window is the last 60 seconds (sliding, not fixed): timestamps of admitted
/// intents are recorded and discarded once they age out at query time. Only
/// admitted intents consume capacity, so the caller splits admission into
/// [`check`](Self::check) (would a token be available?) and
/// [`commit`](Self::commit) (consume it), committing only when every downstream
/// check also passed.
///
/// The clock is injected by the caller as `now_ns`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    capacity: u32,
    admitted: HashMap<Symbol, VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            admitted: HashMap::new(),
        }
    }

    /// Whether a token is available for `symbol` at `now_ns`.
    pub fn check(&mut self, symbol: &Symbol, now_ns: i64) -> bool {
        self.prune(symbol, now_ns);
        self.admitted
            .get(symbol)
            .map(|window| window.len() < self.capacity as usize)
            .unwrap_or(self.capacity > 0)
    }

    /// Record an admission for `symbol` at `now_ns`.
    pub fn commit(&mut self, symbol: &Symbol, now_ns: i64) {
        self.admitted
            .entry(symbol.clone())
            .or_default()
            .push_back(now_ns);
    }

    /// Admitted intents for `symbol` still inside the window.
    pub fn in_window(&mut self, symbol: &Symbol, now_ns: i64) -> usize {
        self.prune(symbol, now_ns);
        self.admitted.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    fn prune(&mut self, symbol: &Symbol, now_ns: i64) {
        if let Some(window) = self.admitted.get_mut(symbol) {
            while window
                .front()
                .is_some_and(|&ts_ns| now_ns - ts_ns >= WINDOW_NS)
            {
                window.pop_front();
            }
        }
    }
}
