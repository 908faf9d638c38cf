//! Supported coins and the trading pairs they are priced in

use super::MarketError;

/// Supported symbols and their trading pairs, in display order
pub const SYMBOL_PAIRS: [(&str, &str); 18] = [
    ("BTC", "BTC/USDT"),
    ("ETH", "ETH/USDT"),
    ("XRP", "XRP/USDT"),
    ("ADA", "ADA/USDT"),
    ("SOL", "SOL/USDT"),
    ("DOGE", "DOGE/USDT"),
    ("MATIC", "MATIC/USDT"),
    ("LINK", "LINK/USDT"),
    ("LTC", "LTC/USDT"),
    ("BCH", "BCH/USDT"),
    ("DOT", "DOT/USDT"),
    ("AVAX", "AVAX/USDT"),
    ("ARB", "ARB/USDT"),
    ("OP", "OP/USDT"),
    ("SHIB", "SHIB/USDT"),
    ("PEPE", "PEPE/USDT"),
    ("NEAR", "NEAR/USDT"),
    ("UNI", "UNI/USDT"),
];

/// Looks up the trading pair for a symbol
///
/// # Returns
/// * `Ok(pair)` - e.g. "BTC/USDT" for "BTC"
/// * `Err(MarketError::UnsupportedSymbol)` if the symbol is not in `SYMBOL_PAIRS`
pub fn trading_pair(symbol: &str) -> Result<&'static str, MarketError> {
    SYMBOL_PAIRS
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, pair)| *pair)
        .ok_or_else(|| MarketError::UnsupportedSymbol(symbol.to_string()))
}

/// Returns all supported symbols in display order
pub fn supported_symbols() -> Vec<&'static str> {
    SYMBOL_PAIRS.iter().map(|(sym, _)| *sym).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_symbols_contains_majors() {
        let symbols = supported_symbols();
        assert!(symbols.contains(&"BTC"));
        assert!(symbols.contains(&"ETH"));
        assert_eq!(symbols.len(), 18);
        assert_eq!(symbols[0], "BTC");
    }

    #[test]
    fn test_trading_pair_lookup() {
        assert_eq!(trading_pair("BTC").unwrap(), "BTC/USDT");
        assert_eq!(trading_pair("UNI").unwrap(), "UNI/USDT");
    }

    #[test]
    fn test_trading_pair_is_case_sensitive() {
        assert!(trading_pair("btc").is_err());
    }

    #[test]
    fn test_trading_pair_unsupported() {
        let err = trading_pair("INVALID123").unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_symbols_are_unique() {
        let mut symbols = supported_symbols();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), SYMBOL_PAIRS.len());
    }
}
