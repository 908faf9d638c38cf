//! Cache-first price lookups
//!
//! `PriceService` answers price questions for coin symbols. Current prices are
//! served from the cache while fresh and fetched from the exchange otherwise;
//! history and live overviews always go to the exchange. Errors are handed to
//! the error log and come back as `ErrorReport`s.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, Clock, SystemClock};
use crate::data::{supported_symbols, trading_pair, Candle, MarketSource, TickerSnapshot};
use crate::errors::{validate_days, validate_symbol, AppError, ErrorLog, ErrorReport};

/// Candle interval used for price history
pub const HISTORY_INTERVAL: &str = "1d";

/// Where a quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Served from a fresh cache entry
    Cache,
    /// Fetched from the exchange (and cached)
    Exchange,
}

/// A current price and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub snapshot: TickerSnapshot,
    pub origin: Origin,
}

/// Outcome of one symbol in a live overview
pub type LiveResult = (String, Result<TickerSnapshot, ErrorReport>);

/// Price lookups over an exchange source, a cache store and an error log
pub struct PriceService<S, C: Clock = SystemClock> {
    source: S,
    cache: CacheStore<C>,
    errors: ErrorLog,
}

impl<S: MarketSource, C: Clock> PriceService<S, C> {
    /// Creates a service from its collaborators
    pub fn new(source: S, cache: CacheStore<C>, errors: ErrorLog) -> Self {
        Self {
            source,
            cache,
            errors,
        }
    }

    /// The cache store backing current-price lookups
    pub fn cache(&self) -> &CacheStore<C> {
        &self.cache
    }

    /// Mutable access to the cache store, for diagnostics and clearing
    pub fn cache_mut(&mut self) -> &mut CacheStore<C> {
        &mut self.cache
    }

    /// The error log reports are written to
    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    /// Gets the current price of a coin, from cache when fresh
    ///
    /// # Arguments
    /// * `symbol` - Coin symbol such as "BTC"
    ///
    /// # Returns
    /// * `Ok(Quote)` - The snapshot and whether it came from the cache or the exchange
    /// * `Err(ErrorReport)` - If the symbol is invalid or the exchange request failed
    pub async fn get_current_price(&mut self, symbol: &str) -> Result<Quote, ErrorReport> {
        self.lookup_price(symbol)
            .await
            .map_err(|e| self.errors.handle(&e, symbol))
    }

    /// Gets current prices for several coins, one at a time
    pub async fn get_multiple_prices<I, T>(
        &mut self,
        symbols: I,
    ) -> Vec<(String, Result<Quote, ErrorReport>)>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut results = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref();
            let result = self.get_current_price(symbol).await;
            results.push((symbol.to_string(), result));
        }
        results
    }

    /// Gets daily candles covering the last `days` days, oldest first
    pub async fn get_historical_data(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<Vec<Candle>, ErrorReport> {
        self.lookup_history(symbol, days)
            .await
            .map_err(|e| self.errors.handle(&e, &format!("{} (historical)", symbol)))
    }

    /// Fetches every supported coin straight from the exchange
    ///
    /// The whole cache is cleared first so that later lookups start fresh.
    /// Requests run concurrently; results keep the display order of the
    /// supported symbols.
    pub async fn fetch_all_live(&mut self) -> Vec<LiveResult> {
        if let Err(e) = self.cache.clear(None) {
            warn!(error = %e, "could not clear cache before live fetch");
        }

        let symbols = supported_symbols();
        info!(count = symbols.len(), "fetching live prices");

        let source = &self.source;
        let fetches = symbols.iter().map(|symbol| async move {
            match trading_pair(symbol) {
                Ok(pair) => source.fetch_ticker(pair).await,
                Err(e) => Err(e),
            }
        });
        let outcomes = join_all(fetches).await;

        symbols
            .into_iter()
            .zip(outcomes)
            .map(|(symbol, outcome)| {
                let result = outcome.map_err(|e| self.errors.handle(&e.into(), symbol));
                (symbol.to_string(), result)
            })
            .collect()
    }

    /// Fetches a fresh ticker and `days` of history for one coin
    ///
    /// The coin's cache entry is dropped first.
    pub async fn fetch_detail(
        &mut self,
        symbol: &str,
        days: u32,
    ) -> Result<(TickerSnapshot, Vec<Candle>), ErrorReport> {
        self.lookup_detail(symbol, days)
            .await
            .map_err(|e| self.errors.handle(&e, symbol))
    }

    async fn lookup_price(&mut self, symbol: &str) -> Result<Quote, AppError> {
        validate_symbol(symbol)?;
        let pair = trading_pair(symbol)?;

        if let Some(snapshot) = self.cached_snapshot(symbol) {
            info!(symbol, "served price from cache");
            return Ok(Quote {
                snapshot,
                origin: Origin::Cache,
            });
        }

        let snapshot = self.source.fetch_ticker(pair).await?;
        if let Err(e) = self.cache.save_serialized(symbol, &snapshot) {
            warn!(symbol, error = %e, "fetched price could not be cached");
        }
        info!(symbol, price = snapshot.price, "fetched price from exchange");

        Ok(Quote {
            snapshot,
            origin: Origin::Exchange,
        })
    }

    async fn lookup_history(&self, symbol: &str, days: u32) -> Result<Vec<Candle>, AppError> {
        validate_symbol(symbol)?;
        validate_days(days)?;
        let pair = trading_pair(symbol)?;

        let candles = self
            .source
            .fetch_candles(pair, HISTORY_INTERVAL, days)
            .await?;
        info!(symbol, days, points = candles.len(), "fetched price history");
        Ok(candles)
    }

    async fn lookup_detail(
        &mut self,
        symbol: &str,
        days: u32,
    ) -> Result<(TickerSnapshot, Vec<Candle>), AppError> {
        validate_symbol(symbol)?;
        validate_days(days)?;
        let pair = trading_pair(symbol)?;

        self.cache.clear(Some(symbol))?;
        let snapshot = self.source.fetch_ticker(pair).await?;
        let candles = self
            .source
            .fetch_candles(pair, HISTORY_INTERVAL, days)
            .await?;

        Ok((snapshot, candles))
    }

    /// Returns the cached snapshot for `symbol` if present, fresh and readable
    fn cached_snapshot(&mut self, symbol: &str) -> Option<TickerSnapshot> {
        let entry = match self.cache.get(symbol) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(symbol, error = %e, "could not persist cache eviction");
                return None;
            }
        };

        match serde_json::from_value(Value::Object(entry.value.clone())) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(symbol, error = %e, "ignoring cache entry that is not a ticker snapshot");
                None
            }
        }
    }
}
