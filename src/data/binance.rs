//! Binance public REST API client
//!
//! This module fetches 24h tickers and klines (candles) from Binance's public
//! spot endpoints, which need no API key, and parses them into our market
//! data structures.

use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{base_asset, Candle, MarketError, MarketSource, TickerSnapshot};

/// Base URL for the Binance spot API
const BINANCE_BASE_URL: &str = "https://api.binance.com";

/// Timeout applied to every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance error code for an unknown symbol
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Most candles Binance returns for one klines request
const MAX_KLINES: u32 = 1000;

/// Client for fetching market data from the Binance spot API
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    /// Create a new BinanceClient with default settings
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("cryptoprice/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self::with_client(client)
    }

    /// Create a new BinanceClient with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_BASE_URL.to_string(),
        }
    }

    /// Point the client at another API root (a mirror or a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The API root requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a GET request and returns the body of a successful response
    async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
        pair: &str,
    ) -> Result<String, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, pair, "requesting exchange data");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text, pair));
        }

        Ok(text)
    }
}

impl MarketSource for BinanceClient {
    /// Fetch the 24h ticker for a pair such as "BTC/USDT"
    async fn fetch_ticker(&self, pair: &str) -> Result<TickerSnapshot, MarketError> {
        let query = [("symbol", exchange_symbol(pair))];
        let text = self.get_text("/api/v3/ticker/24hr", &query, pair).await?;
        let ticker: Ticker24h = serde_json::from_str(&text)?;

        parse_ticker(pair, ticker)
    }

    /// Fetch up to `limit` candles (capped at 1000) for a pair, oldest first
    async fn fetch_candles(
        &self,
        pair: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError> {
        let query = [
            ("symbol", exchange_symbol(pair)),
            ("interval", interval.to_string()),
            ("limit", limit.clamp(1, MAX_KLINES).to_string()),
        ];
        let text = self.get_text("/api/v3/klines", &query, pair).await?;
        let rows: Vec<Vec<Value>> = serde_json::from_str(&text)?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

/// Converts "BTC/USDT" into Binance's "BTCUSDT"
fn exchange_symbol(pair: &str) -> String {
    pair.replace('/', "")
}

/// Parse a 24h ticker response into a TickerSnapshot
fn parse_ticker(pair: &str, ticker: Ticker24h) -> Result<TickerSnapshot, MarketError> {
    let change_percent = ticker
        .price_change_percent
        .as_deref()
        .map(|raw| parse_decimal("priceChangePercent", raw))
        .transpose()?;

    Ok(TickerSnapshot {
        symbol: base_asset(pair).to_string(),
        price: parse_decimal("lastPrice", &ticker.last_price)?,
        high_24h: parse_decimal("highPrice", &ticker.high_price)?,
        low_24h: parse_decimal("lowPrice", &ticker.low_price)?,
        volume: parse_decimal("quoteVolume", &ticker.quote_volume)?,
        bid: parse_decimal("bidPrice", &ticker.bid_price)?,
        ask: parse_decimal("askPrice", &ticker.ask_price)?,
        change_percent,
        fetched_at: Local::now(),
    })
}

/// Parse one klines row: `[open_time_ms, open, high, low, close, volume, ...]`
fn parse_kline(row: &[Value]) -> Result<Candle, MarketError> {
    let open_time_ms = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| MarketError::InvalidField {
            field: "openTime",
            value: format!("{:?}", row.first()),
        })?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time_ms)
        .single()
        .ok_or_else(|| MarketError::InvalidField {
            field: "openTime",
            value: open_time_ms.to_string(),
        })?
        .with_timezone(&Local);

    Ok(Candle {
        timestamp,
        open: kline_decimal(row, 1, "open")?,
        high: kline_decimal(row, 2, "high")?,
        low: kline_decimal(row, 3, "low")?,
        close: kline_decimal(row, 4, "close")?,
        volume: kline_decimal(row, 5, "volume")?,
    })
}

/// Reads a decimal string (or plain number) at `index` of a klines row
fn kline_decimal(row: &[Value], index: usize, field: &'static str) -> Result<f64, MarketError> {
    match row.get(index) {
        Some(Value::String(raw)) => parse_decimal(field, raw),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| MarketError::InvalidField {
            field,
            value: n.to_string(),
        }),
        other => Err(MarketError::InvalidField {
            field,
            value: format!("{:?}", other),
        }),
    }
}

/// Binance sends prices as decimal strings, e.g. "45000.01000000"
fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, MarketError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| MarketError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

/// Map a non-success response to a MarketError
fn parse_error_body(status: u16, body: &str, pair: &str) -> MarketError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) if err.code == INVALID_SYMBOL_CODE => MarketError::UnknownPair(pair.to_string()),
        Ok(err) => MarketError::Api {
            status,
            code: err.code,
            message: err.msg,
        },
        Err(_) => MarketError::Api {
            status,
            code: 0,
            message: body.chars().take(200).collect(),
        },
    }
}

/// 24h ticker response from `/api/v3/ticker/24hr`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    high_price: String,
    low_price: String,
    quote_volume: String,
    bid_price: String,
    ask_price: String,
    #[serde(default)]
    price_change_percent: Option<String>,
}

/// Error body returned by Binance alongside 4xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample valid `/api/v3/ticker/24hr` response
    const VALID_TICKER_RESPONSE: &str = r#"{
        "symbol": "BTCUSDT",
        "priceChange": "562.01000000",
        "priceChangePercent": "1.264",
        "weightedAvgPrice": "44875.12",
        "prevClosePrice": "44437.99000000",
        "lastPrice": "45000.00000000",
        "lastQty": "0.00120000",
        "bidPrice": "44999.99000000",
        "bidQty": "3.12000000",
        "askPrice": "45000.01000000",
        "askQty": "1.02000000",
        "openPrice": "44437.99000000",
        "highPrice": "45500.00000000",
        "lowPrice": "44100.00000000",
        "volume": "21345.12000000",
        "quoteVolume": "957893211.55000000",
        "openTime": 1721000000000,
        "closeTime": 1721086399999,
        "firstId": 1,
        "lastId": 2,
        "count": 2
    }"#;

    /// Sample valid `/api/v3/klines` response with two daily candles
    const VALID_KLINES_RESPONSE: &str = r#"[
        [1720915200000, "44000.00", "45100.00", "43800.00", "44900.00", "15000.5", 1721001599999, "0", 100, "0", "0", "0"],
        [1721001600000, "44900.00", "45500.00", "44100.00", "45000.00", "21345.12", 1721087999999, "0", 120, "0", "0", "0"]
    ]"#;

    #[test]
    fn test_parse_valid_ticker() {
        let ticker: Ticker24h = serde_json::from_str(VALID_TICKER_RESPONSE).unwrap();
        let snapshot = parse_ticker("BTC/USDT", ticker).expect("Ticker should parse");

        assert_eq!(snapshot.symbol, "BTC");
        assert!((snapshot.price - 45000.0).abs() < 1e-9);
        assert!((snapshot.high_24h - 45500.0).abs() < 1e-9);
        assert!((snapshot.low_24h - 44100.0).abs() < 1e-9);
        assert!((snapshot.volume - 957893211.55).abs() < 1e-3);
        assert!((snapshot.bid - 44999.99).abs() < 1e-9);
        assert!((snapshot.ask - 45000.01).abs() < 1e-9);
        assert_eq!(snapshot.change_percent, Some(1.264));
    }

    #[test]
    fn test_parse_ticker_without_change_percent() {
        let mut raw: serde_json::Map<String, Value> =
            serde_json::from_str(VALID_TICKER_RESPONSE).unwrap();
        raw.remove("priceChangePercent");
        let ticker: Ticker24h = serde_json::from_value(Value::Object(raw)).unwrap();

        let snapshot = parse_ticker("ETH/USDT", ticker).unwrap();

        assert_eq!(snapshot.symbol, "ETH");
        assert!(snapshot.change_percent.is_none());
    }

    #[test]
    fn test_parse_ticker_rejects_bad_decimal() {
        let body = VALID_TICKER_RESPONSE.replace("\"45000.00000000\"", "\"n/a\"");
        let ticker: Ticker24h = serde_json::from_str(&body).unwrap();

        let err = parse_ticker("BTC/USDT", ticker).unwrap_err();

        assert!(matches!(err, MarketError::InvalidField { field: "lastPrice", .. }));
    }

    #[test]
    fn test_parse_valid_klines() {
        let rows: Vec<Vec<Value>> = serde_json::from_str(VALID_KLINES_RESPONSE).unwrap();
        let candles: Vec<Candle> = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<_, _>>()
            .expect("Klines should parse");

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp.timestamp_millis(), 1720915200000);
        assert!((candles[0].open - 44000.0).abs() < 1e-9);
        assert!((candles[1].close - 45000.0).abs() < 1e-9);
        assert!((candles[1].volume - 21345.12).abs() < 1e-9);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn test_parse_kline_short_row() {
        let row = vec![Value::from(1720915200000_i64), Value::from("1.0")];

        let err = parse_kline(&row).unwrap_err();

        assert!(matches!(err, MarketError::InvalidField { field: "high", .. }));
    }

    #[test]
    fn test_invalid_symbol_error_maps_to_unknown_pair() {
        let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;

        let err = parse_error_body(400, body, "FOO/USDT");

        assert!(matches!(err, MarketError::UnknownPair(pair) if pair == "FOO/USDT"));
    }

    #[test]
    fn test_other_error_body_maps_to_api_error() {
        let body = r#"{"code":-1003,"msg":"Too much request weight used."}"#;

        match parse_error_body(429, body, "BTC/USDT") {
            MarketError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(code, -1003);
                assert!(message.contains("request weight"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unstructured_error_body() {
        let err = parse_error_body(502, "<html>Bad Gateway</html>", "BTC/USDT");

        assert!(matches!(err, MarketError::Api { status: 502, code: 0, .. }));
    }

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(exchange_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(exchange_symbol("SHIB/USDT"), "SHIBUSDT");
    }

    #[test]
    fn test_default_base_url() {
        let client = BinanceClient::default();
        assert_eq!(client.base_url(), "https://api.binance.com");
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = BinanceClient::new().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let client = BinanceClient::new().with_base_url("http://127.0.0.1:9");

        let err = client.fetch_ticker("BTC/USDT").await.unwrap_err();

        assert!(matches!(err, MarketError::RequestFailed(_)));
    }
}
