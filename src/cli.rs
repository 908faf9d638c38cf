//! Command-line interface parsing for cryptoprice
//!
//! This module handles parsing of CLI arguments using clap and resolves them
//! into the `Settings` the binary runs with: where the cache and error log
//! live, the cache TTL and which exchange endpoint to call.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

/// Default time-to-live for cached prices, in minutes
pub const DEFAULT_TTL_MINUTES: u32 = 5;

/// Default history window, in days
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Directory used when no platform data directory can be determined
const FALLBACK_DATA_DIR: &str = "data";

/// Cryptoprice - cryptocurrency prices from the exchange, cached briefly on disk
#[derive(Parser, Debug)]
#[command(name = "cryptoprice")]
#[command(about = "Cryptocurrency prices and history with a short-lived local cache")]
#[command(version)]
pub struct Cli {
    /// Directory for the cache file, error log and exported data
    #[arg(long, global = true, value_name = "DIR", env = "CRYPTOPRICE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Minutes a cached price stays fresh
    #[arg(
        long,
        global = true,
        value_name = "MINUTES",
        env = "CRYPTOPRICE_TTL",
        default_value_t = DEFAULT_TTL_MINUTES
    )]
    pub ttl: u32,

    /// Base URL of the exchange API
    #[arg(long, global = true, value_name = "URL", env = "CRYPTOPRICE_EXCHANGE_URL")]
    pub exchange_url: Option<String>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Current prices, served from cache while fresh
    ///
    /// Examples:
    ///   cryptoprice price BTC
    ///   cryptoprice price btc eth xrp
    Price {
        /// Coin symbols (case-insensitive)
        #[arg(required = true, value_parser = parse_symbol_arg)]
        symbols: Vec<String>,
    },

    /// Daily price history for one coin
    History {
        /// Coin symbol (case-insensitive)
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,

        /// Number of days, 1-365
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },

    /// Live prices for every supported coin, with top gainers and losers
    Live {
        /// How many gainers and losers to show
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Do not write live_prices.json to the data directory
        #[arg(long)]
        no_save: bool,
    },

    /// Fresh ticker details and history for one coin
    Detail {
        /// Coin symbol (case-insensitive)
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,

        /// Number of days of history, 1-365
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },

    /// List supported coins
    Symbols,

    /// Inspect or clear the price cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

/// Cache maintenance commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show the cache file, TTL and cached symbols
    Info,

    /// Remove one symbol, or everything when no symbol is given
    Clear {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: Option<String>,
    },

    /// Remove every expired entry
    Sweep,
}

/// Normalizes a symbol argument to uppercase
///
/// # Returns
/// * `Ok(String)` - The trimmed, uppercased symbol
/// * `Err(String)` - If the argument is empty
pub fn parse_symbol_arg(s: &str) -> Result<String, String> {
    let symbol = s.trim();
    if symbol.is_empty() {
        return Err("symbol cannot be empty".to_string());
    }
    Ok(symbol.to_uppercase())
}

/// Runtime settings derived from CLI arguments and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding all files written by the tool
    pub data_dir: PathBuf,
    /// Cache backing file
    pub cache_file: PathBuf,
    /// JSON-lines error log
    pub error_log: PathBuf,
    /// Where `live` exports its results
    pub live_export: PathBuf,
    /// Cache time-to-live in minutes
    pub ttl_minutes: u32,
    /// Exchange base URL override
    pub exchange_url: Option<String>,
}

impl Settings {
    /// Creates Settings from parsed CLI arguments.
    ///
    /// Without `--data-dir`, files go to the platform data directory
    /// (`~/.local/share/cryptoprice/` on Linux), or `./data` if there is none.
    pub fn from_cli(cli: &Cli) -> Self {
        let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
        Self::with_data_dir(data_dir, cli.ttl, cli.exchange_url.clone())
    }

    /// Creates Settings rooted at `data_dir`
    pub fn with_data_dir(data_dir: PathBuf, ttl_minutes: u32, exchange_url: Option<String>) -> Self {
        Self {
            cache_file: data_dir.join("cache.json"),
            error_log: data_dir.join("errors.log"),
            live_export: data_dir.join("live_prices.json"),
            data_dir,
            ttl_minutes,
            exchange_url,
        }
    }
}

/// Platform data directory for the tool
fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "cryptoprice")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbol_arg_uppercases() {
        assert_eq!(parse_symbol_arg("btc").unwrap(), "BTC");
        assert_eq!(parse_symbol_arg(" Eth ").unwrap(), "ETH");
    }

    #[test]
    fn test_parse_symbol_arg_empty() {
        assert!(parse_symbol_arg("  ").is_err());
    }

    #[test]
    fn test_cli_parse_price_many() {
        let cli = Cli::parse_from(["cryptoprice", "price", "btc", "ETH"]);
        assert_eq!(
            cli.command,
            Command::Price {
                symbols: vec!["BTC".to_string(), "ETH".to_string()]
            }
        );
    }

    #[test]
    fn test_cli_price_requires_symbol() {
        assert!(Cli::try_parse_from(["cryptoprice", "price"]).is_err());
    }

    #[test]
    fn test_cli_parse_history_default_days() {
        let cli = Cli::parse_from(["cryptoprice", "history", "sol"]);
        assert_eq!(
            cli.command,
            Command::History {
                symbol: "SOL".to_string(),
                days: DEFAULT_HISTORY_DAYS
            }
        );
    }

    #[test]
    fn test_cli_parse_history_days() {
        let cli = Cli::parse_from(["cryptoprice", "history", "BTC", "--days", "30"]);
        assert_eq!(
            cli.command,
            Command::History {
                symbol: "BTC".to_string(),
                days: 30
            }
        );
    }

    #[test]
    fn test_cli_parse_live() {
        let cli = Cli::parse_from(["cryptoprice", "live", "--top", "3", "--no-save"]);
        assert_eq!(cli.command, Command::Live { top: 3, no_save: true });
    }

    #[test]
    fn test_cli_parse_cache_commands() {
        let cli = Cli::parse_from(["cryptoprice", "cache", "info"]);
        assert_eq!(cli.command, Command::Cache { action: CacheCommand::Info });

        let cli = Cli::parse_from(["cryptoprice", "cache", "clear"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheCommand::Clear { symbol: None }
            }
        );

        let cli = Cli::parse_from(["cryptoprice", "cache", "clear", "doge"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheCommand::Clear {
                    symbol: Some("DOGE".to_string())
                }
            }
        );
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "cryptoprice",
            "symbols",
            "--ttl",
            "10",
            "--data-dir",
            "/tmp/cp",
            "-v",
        ]);
        assert_eq!(cli.ttl, 10);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/cp")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_rejects_negative_ttl() {
        assert!(Cli::try_parse_from(["cryptoprice", "symbols", "--ttl", "-1"]).is_err());
    }

    #[test]
    fn test_settings_from_cli_with_data_dir() {
        let cli = Cli::parse_from(["cryptoprice", "symbols", "--data-dir", "/tmp/cp"]);
        let settings = Settings::from_cli(&cli);

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/cp"));
        assert_eq!(settings.cache_file, PathBuf::from("/tmp/cp/cache.json"));
        assert_eq!(settings.error_log, PathBuf::from("/tmp/cp/errors.log"));
        assert_eq!(settings.live_export, PathBuf::from("/tmp/cp/live_prices.json"));
    }

    #[test]
    fn test_settings_default_data_dir_mentions_project() {
        let path = default_data_dir();
        let shown = path.to_string_lossy();
        assert!(shown.contains("cryptoprice") || shown == FALLBACK_DATA_DIR);
    }
}
