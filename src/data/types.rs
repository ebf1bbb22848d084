use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One instrument row of the whole-market table.
/// Numeric fields are `None` when the feed has no value (suspended, not yet traded).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotRow {
    pub code: String,
    pub name: String,
    pub latest: Option<f64>,
    pub pct_change: Option<f64>,
    /// Turnover rate in percent
    pub turnover: Option<f64>,
    /// Traded value (成交额) in CNY
    pub amount: Option<f64>,
    /// Dynamic price/earnings ratio
    pub pe_dynamic: Option<f64>,
    /// Price/book ratio
    pub pb: Option<f64>,
    /// Total market capitalization in CNY
    pub total_market_cap: Option<f64>,
}

/// Point-in-time whole-market table
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Snapshot {
    pub rows: Vec<SnapshotRow>,
}

impl Snapshot {
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        Self { rows }
    }

    pub fn find_code(&self, code: &str) -> Option<&SnapshotRow> {
        self.rows.iter().find(|r| r.code == code)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Resolved instrument, ranked by traded value when several match
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub code: String,
    pub name: String,
    pub traded_value: Option<f64>,
}

impl From<&SnapshotRow> for Candidate {
    fn from(row: &SnapshotRow) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            traded_value: row.amount,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Resolution {
    /// Default selection: the top-ranked candidate
    pub primary: Candidate,
    /// Ranked candidates, `primary` first
    pub candidates: Vec<Candidate>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StockQuote {
    pub code: String,
    pub name: String,
    pub latest: Option<f64>,
    pub pct_change: Option<f64>,
    pub turnover: Option<f64>,
    pub amount: Option<f64>,
}

impl From<&SnapshotRow> for StockQuote {
    fn from(row: &SnapshotRow) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            latest: row.latest,
            pct_change: row.pct_change,
            turnover: row.turnover,
            amount: row.amount,
        }
    }
}

/// Valuation figures for one stock, taken from the whole-market table
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    pub code: String,
    pub name: String,
    pub latest: Option<f64>,
    pub pe_dynamic: Option<f64>,
    pub pb: Option<f64>,
    pub total_market_cap: Option<f64>,
}

impl From<&SnapshotRow> for Fundamentals {
    fn from(row: &SnapshotRow) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            latest: row.latest,
            pe_dynamic: row.pe_dynamic,
            pb: row.pb,
            total_market_cap: row.total_market_cap,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub amount: f64,
    pub amplitude: Option<f64>,
    pub pct_change: Option<f64>,
    pub change: Option<f64>,
    pub turnover: Option<f64>,
}

/// Price adjustment for daily history
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Adjust {
    /// Forward-adjusted (前复权)
    #[default]
    Qfq,
    /// Backward-adjusted (后复权)
    Hfq,
    /// Unadjusted
    None,
}

impl Adjust {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "qfq" => Some(Adjust::Qfq),
            "hfq" => Some(Adjust::Hfq),
            "" | "none" => Some(Adjust::None),
            _ => None,
        }
    }
}
