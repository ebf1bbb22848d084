//! Unit tests for the TTL snapshot cache.

#[cfg(test)]
mod snapshot_tests {
    use crate::data::retry::{ResilientFetchClient, RetryPolicy};
    use crate::data::snapshot::SnapshotCache;
    use crate::data::test_source::{market_rows, row, ScriptedSource};
    use crate::error::FetchError;
    use std::sync::Arc;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(10);

    fn fast_retry(max_retries: u32) -> ResilientFetchClient {
        ResilientFetchClient::new(RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(50),
            backoff_factor: 2.0,
            jitter: Duration::ZERO,
        })
    }

    fn cache_over(source: Arc<ScriptedSource>) -> SnapshotCache {
        SnapshotCache::new(source, fast_retry(3), TTL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_within_ttl_share_one_fetch() {
        let source = Arc::new(ScriptedSource::new(market_rows()));
        let cache = cache_over(source.clone());

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let third = cache.get().await.unwrap();

        assert_eq!(source.snapshot_calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(first.len(), market_rows().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_ttl() {
        let source = Arc::new(ScriptedSource::new(vec![row("600519", "贵州茅台", Some(1.0))]));
        let cache = cache_over(source.clone());

        let before = cache.get().await.unwrap();
        source.set_rows(vec![row("000001", "平安银行", Some(2.0))]);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        let after = cache.get().await.unwrap();

        assert_eq!(source.snapshot_calls(), 2);
        assert!(before.find_code("600519").is_some());
        assert!(after.find_code("000001").is_some());
        assert!(after.find_code("600519").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_coalesce() {
        let source = Arc::new(ScriptedSource::new(market_rows()).with_latency(Duration::from_millis(200)));
        let cache = cache_over(source.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await })
            })
            .collect();

        let mut snapshots = Vec::new();
        for h in handles {
            snapshots.push(h.await.unwrap().unwrap());
        }

        assert_eq!(source.snapshot_calls(), 1);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let source = Arc::new(ScriptedSource::new(market_rows()));
        let cache = cache_over(source.clone());

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();

        assert_eq!(source.snapshot_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let source = Arc::new(ScriptedSource::new(market_rows()).failing_first(2));
        let cache = cache_over(source.clone());

        let snapshot = cache.get().await.unwrap();

        assert_eq!(source.snapshot_calls(), 3);
        assert!(!snapshot.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_fetch_leaves_slot_empty() {
        let source = Arc::new(ScriptedSource::new(market_rows()).failing_first(3));
        let cache = cache_over(source.clone());

        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));

        // Nothing was cached, so the next read fetches again and succeeds
        let snapshot = cache.get().await.unwrap();
        assert_eq!(source.snapshot_calls(), 4);
        assert!(!snapshot.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_callers_share_failed_refill() {
        let source = Arc::new(
            ScriptedSource::new(market_rows())
                .failing_first(100)
                .with_latency(Duration::from_millis(100)),
        );
        let cache = cache_over(source.clone());
        let started = tokio::time::Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let result = cache.get().await;
                    (result, started.elapsed())
                })
            })
            .collect();

        let mut finished = Vec::new();
        for h in handles {
            let (result, elapsed) = h.await.unwrap();
            assert!(matches!(result, Err(FetchError::Exhausted { attempts: 3, .. })));
            finished.push(elapsed);
        }

        // One retry cycle upstream, not one per caller
        assert_eq!(source.snapshot_calls(), 3);
        // Everyone returns when the single cycle ends:
        // 3 x 100ms latency + 50ms + 100ms backoff, 1ms timer slack per sleep
        assert!(finished.iter().all(|e| *e == finished[0]), "{:?}", finished);
        assert!(finished[0] >= Duration::from_millis(450), "{:?}", finished[0]);
        assert!(finished[0] <= Duration::from_millis(455), "{:?}", finished[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_after_failed_refill_fetches_again() {
        let source = Arc::new(ScriptedSource::new(market_rows()).failing_first(3));
        let cache = cache_over(source.clone());

        assert!(cache.get().await.is_err());
        assert_eq!(source.snapshot_calls(), 3);

        // A new call is not a queued waiter, so the stale failure is not replayed
        let snapshot = cache.get().await.unwrap();
        assert_eq!(source.snapshot_calls(), 4);
        assert!(!snapshot.is_empty());
    }
}
