use njord_bus::{journal::JournalError, BusError};
use njord_core::ids::ClientOrderId;
use thiserror::Error;

/// Errors surfaced by a venue client.
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("connectivity: {0}")]
    Connectivity(String),

    #[error("venue call timed out")]
    Timeout,

    /// HTTP 429/418 style throttling, optionally carrying a `Retry-After` hint.
    #[error("rate limited by venue")]
    RateLimited { retry_after_ms: Option<u64> },

    /// The venue already holds an order under this client order id.
    ///
    /// Recoverable via `fetch_order`; surfaced as-is when the duplicate cannot
    /// be found, in which case no second placement is attempted.
    #[error("duplicate client order id: {0}")]
    DuplicateClientOrderId(ClientOrderId),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("api: {0}")]
    Api(String),
}

impl VenueError {
    /// Whether the retry policy applies.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_) | Self::Timeout | Self::RateLimited { .. }
        )
    }

    /// Venue-provided backoff hint, when present.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Errors that take the paper OMS down.
#[derive(Debug, Error)]
pub enum OmsError {
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("journal: {0}")]
    Journal(#[from] JournalError),
}

/// Errors surfaced by the broker dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("journal: {0}")]
    Journal(#[from] JournalError),

    #[error("venue: {0}")]
    Venue(#[from] VenueError),
}
