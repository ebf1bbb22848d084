//! Scripted market data source shared by the data and tool tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::SourceError;

use super::source::MarketDataSource;
use super::types::{Adjust, DailyBar, SnapshotRow};

pub struct ScriptedSource {
    rows: Mutex<Vec<SnapshotRow>>,
    bars: Vec<DailyBar>,
    failures_left: AtomicU32,
    latency: Duration,
    pub snapshot_calls: AtomicU32,
    pub history_calls: AtomicU32,
    pub last_adjust: Mutex<Option<Adjust>>,
}

impl ScriptedSource {
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            bars: Vec::new(),
            failures_left: AtomicU32::new(0),
            latency: Duration::ZERO,
            snapshot_calls: AtomicU32::new(0),
            history_calls: AtomicU32::new(0),
            last_adjust: Mutex::new(None),
        }
    }

    pub fn with_bars(mut self, bars: Vec<DailyBar>) -> Self {
        self.bars = bars;
        self
    }

    /// The next `n` calls (of either kind) fail with a 503.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_rows(&self, rows: Vec<SnapshotRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn snapshot_calls(&self) -> u32 {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), SourceError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SourceError::Http {
                status: 503,
                body: "upstream busy".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Vec<SnapshotRow>, SourceError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.take_failure()?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn fetch_daily_bars(&self, _code: &str, adjust: Adjust) -> Result<Vec<DailyBar>, SourceError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_adjust.lock().unwrap() = Some(adjust);
        self.take_failure()?;
        Ok(self.bars.clone())
    }
}

pub fn row(code: &str, name: &str, amount: Option<f64>) -> SnapshotRow {
    SnapshotRow {
        code: code.to_string(),
        name: name.to_string(),
        latest: Some(10.0),
        pct_change: Some(1.5),
        turnover: Some(0.8),
        amount,
        pe_dynamic: Some(12.5),
        pb: Some(1.1),
        total_market_cap: Some(2.0e10),
    }
}

pub fn bar(date: &str, close: f64) -> DailyBar {
    DailyBar {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close - 0.1,
        close,
        high: close + 0.2,
        low: close - 0.3,
        volume: 1000.0,
        amount: close * 1000.0,
        amplitude: None,
        pct_change: None,
        change: None,
        turnover: None,
    }
}

/// A handful of well-known names plus fifteen banks with distinct traded values.
pub fn market_rows() -> Vec<SnapshotRow> {
    let mut rows = vec![
        row("600519", "贵州茅台", Some(5.2e9)),
        row("000858", "五粮液", Some(2.1e9)),
        row("300750", "宁德时代", Some(4.4e9)),
        row("601318", "中国平安", Some(3.0e9)),
    ];
    for i in 0..15 {
        let amount = (i as f64 + 1.0) * 1.0e8;
        rows.push(row(&format!("6010{:02}", i), &format!("测试银行{}", i), Some(amount)));
    }
    rows
}
