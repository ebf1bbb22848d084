use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::MarketDataConfig;
use crate::error::SourceError;

use super::types::{Adjust, DailyBar, SnapshotRow};

/// External market data feed. Both calls are read-only and may fail transiently.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Whole-market table, one row per instrument.
    async fn fetch_snapshot(&self) -> Result<Vec<SnapshotRow>, SourceError>;

    /// Full daily history for one instrument, oldest first.
    async fn fetch_daily_bars(&self, code: &str, adjust: Adjust) -> Result<Vec<DailyBar>, SourceError>;
}

const LIST_UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";
const KLINE_UT: &str = "7eea3edcaed734bea9cbfc24409ed989";
/// Shanghai, Shenzhen and Beijing A-share boards
const A_SHARE_FILTER: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";
const LIST_FIELDS: &str = "f2,f3,f6,f8,f9,f12,f14,f20,f23";

/// Eastmoney quote service client
#[derive(Clone)]
pub struct EastmoneySource {
    client: Client,
    list_url: String,
    kline_url: String,
    page_size: usize,
}

impl EastmoneySource {
    pub fn new(config: &MarketDataConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            list_url: config.list_url.clone(),
            kline_url: config.kline_url.clone(),
            page_size: config.page_size.max(1),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketDataSource for EastmoneySource {
    async fn fetch_snapshot(&self) -> Result<Vec<SnapshotRow>, SourceError> {
        let mut rows = Vec::new();
        let mut page = 1usize;

        loop {
            let query = [
                ("pn", page.to_string()),
                ("pz", self.page_size.to_string()),
                ("po", "1".to_string()),
                ("np", "1".to_string()),
                ("ut", LIST_UT.to_string()),
                ("fltt", "2".to_string()),
                ("invt", "2".to_string()),
                ("fid", "f12".to_string()),
                ("fs", A_SHARE_FILTER.to_string()),
                ("fields", LIST_FIELDS.to_string()),
            ];
            let body = self.get_json(&self.list_url, &query).await?;
            let (total, page_rows) = parse_list_page(&body, &self.list_url)?;

            if page_rows.is_empty() {
                break;
            }
            rows.extend(page_rows);
            if rows.len() >= total {
                break;
            }
            page += 1;
        }

        debug!("[EASTMONEY] Snapshot fetched: {} rows over {} pages", rows.len(), page);
        Ok(rows)
    }

    async fn fetch_daily_bars(&self, code: &str, adjust: Adjust) -> Result<Vec<DailyBar>, SourceError> {
        let fqt = match adjust {
            Adjust::None => "0",
            Adjust::Qfq => "1",
            Adjust::Hfq => "2",
        };
        let query = [
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61".to_string()),
            ("ut", KLINE_UT.to_string()),
            ("klt", "101".to_string()),
            ("fqt", fqt.to_string()),
            ("secid", secid(code)),
            ("beg", "0".to_string()),
            ("end", "20500101".to_string()),
        ];
        let body = self.get_json(&self.kline_url, &query).await?;
        parse_kline_response(&body, &self.kline_url)
    }
}

/// Market-qualified id: `1.` for Shanghai (6xxxxx, 9xxxxx), `0.` otherwise.
pub fn secid(code: &str) -> String {
    let market = if code.starts_with('6') || code.starts_with('9') { 1 } else { 0 };
    format!("{}.{}", market, code)
}

/// Numeric cell; the feed uses `"-"` for missing values.
fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns the reported total and the rows of one list page.
pub fn parse_list_page(body: &Value, endpoint: &str) -> Result<(usize, Vec<SnapshotRow>), SourceError> {
    let data = match body.get("data") {
        Some(Value::Null) | None => return Ok((0, Vec::new())),
        Some(d) => d,
    };
    let total = data.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;

    // np=1 yields an array, older deployments an index-keyed object
    let items: Vec<&Value> = match data.get("diff") {
        Some(Value::Array(a)) => a.iter().collect(),
        Some(Value::Object(o)) => o.values().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(SourceError::Malformed {
                endpoint: endpoint.to_string(),
                reason: format!("unexpected diff payload: {}", other),
            })
        }
    };

    let rows = items
        .into_iter()
        .filter_map(|item| {
            let code = text(item.get("f12"))?;
            let name = text(item.get("f14"))?;
            Some(SnapshotRow {
                code,
                name,
                latest: number(item.get("f2")),
                pct_change: number(item.get("f3")),
                turnover: number(item.get("f8")),
                amount: number(item.get("f6")),
                pe_dynamic: number(item.get("f9")),
                pb: number(item.get("f23")),
                total_market_cap: number(item.get("f20")),
            })
        })
        .collect();

    Ok((total, rows))
}

/// One kline record: `date,open,close,high,low,volume,amount,amplitude,pct,change,turnover`.
pub fn parse_kline(line: &str) -> Option<DailyBar> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 7 {
        return None;
    }
    let num = |i: usize| fields.get(i).and_then(|s| s.trim().parse::<f64>().ok());

    Some(DailyBar {
        date: NaiveDate::parse_from_str(fields[0].trim(), "%Y-%m-%d").ok()?,
        open: num(1)?,
        close: num(2)?,
        high: num(3)?,
        low: num(4)?,
        volume: num(5)?,
        amount: num(6)?,
        amplitude: num(7),
        pct_change: num(8),
        change: num(9),
        turnover: num(10),
    })
}

pub fn parse_kline_response(body: &Value, endpoint: &str) -> Result<Vec<DailyBar>, SourceError> {
    let data = match body.get("data") {
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(d) => d,
    };
    let klines = match data.get("klines") {
        Some(Value::Array(a)) => a,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(SourceError::Malformed {
                endpoint: endpoint.to_string(),
                reason: format!("unexpected klines payload: {}", other),
            })
        }
    };

    // Rows with unparseable dates or prices are dropped
    Ok(klines
        .iter()
        .filter_map(Value::as_str)
        .filter_map(parse_kline)
        .collect())
}
