//! Core market data models for cryptoprice
//!
//! This module contains the types returned by an exchange data source and the
//! `MarketSource` trait that the price service fetches through.

pub mod binance;
pub mod symbols;

pub use binance::BinanceClient;
pub use symbols::{supported_symbols, trading_pair};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when fetching market data
#[derive(Debug, Error)]
pub enum MarketError {
    /// The symbol has no configured trading pair
    #[error("Symbol {0} not supported")]
    UnsupportedSymbol(String),

    /// The exchange does not list the trading pair
    #[error("Trading pair {0} is not listed on the exchange")]
    UnknownPair(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The exchange answered with an error body
    #[error("Exchange returned HTTP {status} (code {code}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// A field in the response could not be interpreted
    #[error("Invalid value for {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

impl MarketError {
    /// Short name of the error variant, used in error reports
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::UnsupportedSymbol(_) => "UnsupportedSymbol",
            MarketError::UnknownPair(_) => "UnknownPair",
            MarketError::RequestFailed(_) => "RequestFailed",
            MarketError::ParseError(_) => "ParseError",
            MarketError::Api { .. } => "ApiError",
            MarketError::InvalidField { .. } => "InvalidField",
        }
    }
}

/// Current 24h market data for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Base asset symbol (e.g. "BTC")
    pub symbol: String,
    /// Last traded price in the quote currency
    pub price: f64,
    /// Highest price over the last 24 hours
    pub high_24h: f64,
    /// Lowest price over the last 24 hours
    pub low_24h: f64,
    /// Traded volume over the last 24 hours, in the quote currency
    pub volume: f64,
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
    /// Price change over the last 24 hours in percent, if reported
    pub change_percent: Option<f64>,
    /// When this data was fetched
    pub fetched_at: DateTime<Local>,
}

/// One OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time of the candle
    pub timestamp: DateTime<Local>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume in the base asset
    pub volume: f64,
}

/// An exchange that can be asked for tickers and candles
///
/// Pairs are written `BASE/QUOTE`, e.g. `BTC/USDT`.
#[allow(async_fn_in_trait)]
pub trait MarketSource {
    /// Fetches the current 24h ticker for a trading pair
    async fn fetch_ticker(&self, pair: &str) -> Result<TickerSnapshot, MarketError>;

    /// Fetches up to `limit` candles of the given interval (e.g. "1d"), oldest first
    async fn fetch_candles(
        &self,
        pair: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError>;
}

/// Returns the base asset of a `BASE/QUOTE` pair
pub fn base_asset(pair: &str) -> &str {
    pair.split('/').next().unwrap_or(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_asset() {
        assert_eq!(base_asset("BTC/USDT"), "BTC");
        assert_eq!(base_asset("PEPE/USDT"), "PEPE");
        assert_eq!(base_asset("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_unsupported_symbol_message() {
        let err = MarketError::UnsupportedSymbol("INVALID123".to_string());
        assert_eq!(err.to_string(), "Symbol INVALID123 not supported");
        assert_eq!(err.kind(), "UnsupportedSymbol");
    }

    #[test]
    fn test_api_error_message() {
        let err = MarketError::Api {
            status: 429,
            code: -1003,
            message: "Too many requests".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.kind(), "ApiError");
    }

    #[test]
    fn test_ticker_snapshot_serializes_without_timestamp_field() {
        let snapshot = TickerSnapshot {
            symbol: "BTC".to_string(),
            price: 45000.0,
            high_24h: 46000.0,
            low_24h: 44000.0,
            volume: 1_000_000.0,
            bid: 44999.5,
            ask: 45000.5,
            change_percent: Some(1.25),
            fetched_at: Local::now(),
        };

        let value = serde_json::to_value(&snapshot).expect("Failed to serialize TickerSnapshot");
        let object = value.as_object().expect("Snapshot should serialize to an object");

        // The cache reserves "timestamp" for its own write stamp
        assert!(!object.contains_key("timestamp"));
        assert_eq!(object["symbol"], "BTC");

        let restored: TickerSnapshot =
            serde_json::from_value(value).expect("Failed to deserialize TickerSnapshot");
        assert_eq!(restored, snapshot);
    }
}
