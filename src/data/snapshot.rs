use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::FetchError;

use super::retry::ResilientFetchClient;
use super::source::MarketDataSource;
use super::types::Snapshot;

struct CacheEntry {
    snapshot: Arc<Snapshot>,
    fetched_at: Instant,
}

/// Guarded by the refill lock.
#[derive(Default)]
struct RefillState {
    /// Refills finished so far, mirrored in `SnapshotCache::refills`
    completed: u64,
    /// Outcome of the most recent refill when it failed
    last_failure: Option<FetchError>,
}

/// Single-slot, time-boxed cache of the whole-market snapshot.
///
/// Readers share the slot; a miss is refilled by exactly one caller while the
/// others wait on the refill lock and then read what it stored. When that
/// refill fails, the waiters get the same error instead of fetching again.
#[derive(Clone)]
pub struct SnapshotCache {
    source: Arc<dyn MarketDataSource>,
    fetcher: ResilientFetchClient,
    ttl: Duration,
    slot: Arc<RwLock<Option<CacheEntry>>>,
    refill: Arc<Mutex<RefillState>>,
    refills: Arc<AtomicU64>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn MarketDataSource>, fetcher: ResilientFetchClient, ttl: Duration) -> Self {
        Self {
            source,
            fetcher,
            ttl,
            slot: Arc::new(RwLock::new(None)),
            refill: Arc::new(Mutex::new(RefillState::default())),
            refills: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached snapshot if younger than the TTL, otherwise a fresh fetch.
    pub async fn get(&self) -> Result<Arc<Snapshot>, FetchError> {
        if let Some(snapshot) = self.fresh().await {
            return Ok(snapshot);
        }

        let observed = self.refills.load(Ordering::Acquire);
        let mut refill = self.refill.lock().await;

        // Filled by whoever held the lock before us
        if let Some(snapshot) = self.fresh().await {
            debug!("[SNAPSHOT] Served from coalesced refill");
            return Ok(snapshot);
        }

        // A refill finished while we queued and it failed
        if refill.completed != observed {
            if let Some(err) = &refill.last_failure {
                debug!("[SNAPSHOT] Sharing failed refill with queued caller");
                return Err(err.clone());
            }
        }

        let result = self
            .fetcher
            .execute("whole-market snapshot", || self.source.fetch_snapshot())
            .await;

        refill.completed += 1;
        self.refills.store(refill.completed, Ordering::Release);

        let rows = match result {
            Ok(rows) => {
                refill.last_failure = None;
                rows
            }
            Err(err) => {
                warn!("[SNAPSHOT] Refill failed: {}", err);
                refill.last_failure = Some(err.clone());
                return Err(err);
            }
        };
        let snapshot = Arc::new(Snapshot::new(rows));

        {
            let mut slot = self.slot.write().await;
            *slot = Some(CacheEntry {
                snapshot: snapshot.clone(),
                fetched_at: Instant::now(),
            });
        }
        info!("[SNAPSHOT] Refreshed whole-market snapshot ({} rows)", snapshot.len());

        Ok(snapshot)
    }

    /// Clears the slot; the next `get` fetches.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
        info!("[SNAPSHOT] Cache invalidated");
    }

    async fn fresh(&self) -> Option<Arc<Snapshot>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.fetched_at.elapsed() <= self.ttl)
            .map(|entry| entry.snapshot.clone())
    }
}
