//! Market data access: retrying fetches, the shared snapshot cache and symbol resolution.

pub mod resolver;
pub mod retry;
pub mod snapshot;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_source;

#[cfg(test)]
mod snapshot_tests;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::MarketDataConfig;
use crate::error::{FetchError, ResolveError};

pub use resolver::SymbolResolver;
pub use retry::{ResilientFetchClient, RetryPolicy};
pub use snapshot::SnapshotCache;
pub use source::{EastmoneySource, MarketDataSource};
pub use types::{Adjust, Candidate, DailyBar, Fundamentals, Resolution, Snapshot, SnapshotRow, StockQuote};

/// Entry point for everything the tools need from the market.
/// Constructed once per process and cloned into each consumer.
#[derive(Clone)]
pub struct MarketData {
    source: Arc<dyn MarketDataSource>,
    fetcher: ResilientFetchClient,
    cache: SnapshotCache,
    resolver: SymbolResolver,
}

impl MarketData {
    pub fn new(source: Arc<dyn MarketDataSource>, policy: RetryPolicy, snapshot_ttl: Duration) -> Self {
        let fetcher = ResilientFetchClient::new(policy);
        let cache = SnapshotCache::new(source.clone(), fetcher.clone(), snapshot_ttl);
        let resolver = SymbolResolver::new(cache.clone());
        Self {
            source,
            fetcher,
            cache,
            resolver,
        }
    }

    pub fn from_config(source: Arc<dyn MarketDataSource>, config: &MarketDataConfig) -> Self {
        Self::new(
            source,
            RetryPolicy::from(&config.retry),
            Duration::from_secs(config.snapshot_ttl_secs),
        )
    }

    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, FetchError> {
        self.cache.get().await
    }

    pub async fn invalidate_snapshot(&self) {
        self.cache.invalidate().await;
    }

    pub async fn resolve(&self, query: &str, top_n: usize) -> Result<Resolution, ResolveError> {
        self.resolver.resolve(query, top_n).await
    }

    /// Latest quote for `code`, read from the cached snapshot.
    pub async fn realtime_quote(&self, code: &str) -> Result<StockQuote, ResolveError> {
        let code = code.trim();
        let snapshot = self.cache.get().await?;
        snapshot
            .find_code(code)
            .map(StockQuote::from)
            .ok_or_else(|| ResolveError::UnknownCode {
                code: code.to_string(),
            })
    }

    /// PE, PB and market cap from the cached snapshot.
    pub async fn fundamentals(&self, code: &str) -> Result<Fundamentals, ResolveError> {
        let code = code.trim();
        let snapshot = self.cache.get().await?;
        snapshot
            .find_code(code)
            .map(Fundamentals::from)
            .ok_or_else(|| ResolveError::UnknownCode {
                code: code.to_string(),
            })
    }

    /// Last `days` daily bars, oldest first. `days == 0` keeps the full history.
    /// History is never cached.
    pub async fn daily_history(&self, code: &str, days: usize, adjust: Adjust) -> Result<Vec<DailyBar>, FetchError> {
        let code = code.trim();
        let label = format!("daily history {}", code);
        let mut bars = self
            .fetcher
            .execute(&label, || self.source.fetch_daily_bars(code, adjust))
            .await?;

        bars.sort_by_key(|bar| bar.date);
        if days > 0 && bars.len() > days {
            bars.drain(..bars.len() - days);
        }
        debug!("[DATA] {} daily bars for {}", bars.len(), code);
        Ok(bars)
    }
}
