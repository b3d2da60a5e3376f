//! Market data client
//!
//! REST access to the Binance public API: recent klines for the
//! prediction prompt and 24h ticker snapshots for trade resolution.
//! Transport failures propagate; an unexpected payload or a non-success
//! status degrades to an empty result so one bad cycle never kills the
//! polling loops.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::types::{Candle, Symbol, Ticker};

/// Source of candles and ticker snapshots
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Recent klines in chronological order; empty when unavailable
    async fn fetch_klines(&self, symbol: Symbol) -> Result<Vec<Candle>>;

    /// Latest 24h ticker; None when unavailable
    async fn fetch_ticker(&self, symbol: Symbol) -> Result<Option<Ticker>>;
}

pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    kline_interval: String,
    kline_limit: u32,
}

#[derive(Debug, Deserialize)]
struct TickerPayload {
    #[serde(rename = "lastPrice")]
    last_price: String,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
}

impl BinanceClient {
    pub fn new(cfg: &MarketConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("Failed to build market HTTP client")?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            kline_interval: cfg.kline_interval.clone(),
            kline_limit: cfg.kline_limit,
        })
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_klines(&self, symbol: Symbol) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = self.kline_limit.to_string();
        let params = [
            ("symbol", symbol.trading_pair()),
            ("interval", &self.kline_interval),
            ("limit", &limit),
        ];

        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            warn!(
                "Kline request for {} failed: {}",
                symbol,
                response.status()
            );
            return Ok(Vec::new());
        }

        let rows: Vec<Value> = response.json().await?;
        let candles = parse_klines(&rows);
        debug!("Fetched {} candles for {}", candles.len(), symbol);
        Ok(candles)
    }

    async fn fetch_ticker(&self, symbol: Symbol) -> Result<Option<Ticker>> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let params = [("symbol", symbol.trading_pair())];

        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            warn!(
                "Ticker request for {} failed: {}",
                symbol,
                response.status()
            );
            return Ok(None);
        }

        let payload: TickerPayload = response.json().await?;
        Ok(parse_ticker(&payload))
    }
}

/// Parse the Binance kline rows (arrays of mixed numbers and strings).
/// Rows that do not match the expected shape are dropped.
fn parse_klines(rows: &[Value]) -> Vec<Candle> {
    rows.iter().filter_map(parse_kline_row).collect()
}

fn parse_kline_row(row: &Value) -> Option<Candle> {
    let time = row.get(0)?.as_i64()?;
    Some(Candle {
        time,
        open: field_f64(row, 1)?,
        high: field_f64(row, 2)?,
        low: field_f64(row, 3)?,
        close: field_f64(row, 4)?,
        volume: field_f64(row, 5)?,
    })
}

// Binance serializes prices as JSON strings
fn field_f64(row: &Value, idx: usize) -> Option<f64> {
    row.get(idx)?.as_str()?.parse().ok()
}

fn parse_ticker(payload: &TickerPayload) -> Option<Ticker> {
    let last_price = payload.last_price.parse().ok()?;
    let price_change_percent = payload.price_change_percent.parse().ok()?;
    Some(Ticker {
        last_price,
        price_change_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kline_rows_parse_into_candles() {
        let rows = vec![json!([
            1700000000000i64,
            "42000.10",
            "42100.00",
            "41900.50",
            "42050.25",
            "123.456",
            1700000059999i64,
            "5190000.0",
            100,
            "60.0",
            "2520000.0",
            "0"
        ])];

        let candles = parse_klines(&rows);
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.time, 1700000000000);
        assert!((c.open - 42000.10).abs() < 1e-9);
        assert!((c.close - 42050.25).abs() < 1e-9);
        assert!((c.volume - 123.456).abs() < 1e-9);
    }

    #[test]
    fn malformed_kline_rows_are_dropped() {
        let rows = vec![
            json!([1700000000000i64, "1.0", "2.0", "0.5", "1.5", "10.0"]),
            json!(["not-a-timestamp", "1.0", "2.0", "0.5", "1.5", "10.0"]),
            json!([1700000060000i64, "oops", "2.0", "0.5", "1.5", "10.0"]),
            json!({"unexpected": "shape"}),
        ];

        let candles = parse_klines(&rows);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].time, 1700000000000);
    }

    #[test]
    fn ticker_payload_parses_string_prices() {
        let payload = TickerPayload {
            last_price: "2501.75".to_string(),
            price_change_percent: "-1.23".to_string(),
        };
        let ticker = parse_ticker(&payload).unwrap();
        assert!((ticker.last_price - 2501.75).abs() < 1e-9);
        assert!((ticker.price_change_percent + 1.23).abs() < 1e-9);
    }

    #[test]
    fn unparseable_ticker_degrades_to_none() {
        let payload = TickerPayload {
            last_price: "n/a".to_string(),
            price_change_percent: "0.0".to_string(),
        };
        assert!(parse_ticker(&payload).is_none());
    }
}
