//! Hexagonal ports consumed by the dispatch pipeline.
//!
//! Production implementations live next to the component that owns the
//! concern (`config`, `history`, `memdate`, `responder`) or in adapter crates
//! (`jimbot-providers`, `jimbot-telegram`).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{config::Config, domain::Role, messaging::types::InboundMessage, Result};

/// Source of the bot configuration.
///
/// Implementations must return fresh data on every call (no caching) so edits
/// to the backing store take effect without a restart.
pub trait ConfigProvider: Send + Sync {
    fn get(&self) -> Result<Config>;
}

/// Durable append-only log of processed message text.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn append(&self, text: &str) -> Result<()>;
}

/// Persisted "already celebrated" stamp used by `MemDateTracker`.
///
/// The stamp is the ISO date of the occurrence that fired.
pub trait MarkerStore: Send + Sync {
    /// The stored stamp, or `None` when no marker exists.
    fn current(&self) -> Option<String>;

    /// Atomically create the marker holding `stamp`. Returns `Ok(false)` if a
    /// marker already existed.
    fn create_if_absent(&self, stamp: &str) -> Result<bool>;

    /// Remove the marker. Removing an absent marker is not an error.
    fn remove(&self) -> Result<()>;
}

/// One asset price, as reported by a quote provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub display_name: String,
    pub price_in_fiat: String,
    pub price_in_primary: String,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Quote `symbol` in `fiat` and in the primary asset.
    async fn quote(&self, symbol: &str, fiat: &str) -> Result<PriceQuote>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a web search and return a plain-text rendering of the results.
    async fn search(&self, query: &str) -> Result<String>;
}

/// Produces the text of a free-text reply once the decider said yes.
#[async_trait]
pub trait ResponseEngine: Send + Sync {
    async fn respond(&self, msg: &InboundMessage, role: Role, config: &Config) -> String;
}

/// Today's date, injectable so special-date logic is testable.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}
