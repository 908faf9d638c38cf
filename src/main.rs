//! Cryptoprice - cryptocurrency prices from the command line
//!
//! Fetches tickers and candles from the exchange's public API, keeps recent
//! prices in a small on-disk cache and logs handled errors as JSON lines.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cryptoprice::cache::{CacheStore, SystemClock};
use cryptoprice::cli::{CacheCommand, Cli, Command, Settings};
use cryptoprice::data::{supported_symbols, trading_pair, BinanceClient};
use cryptoprice::errors::ErrorLog;
use cryptoprice::report::{self, Movers};
use cryptoprice::service::PriceService;

type Service = PriceService<BinanceClient, SystemClock>;

/// Sets up logging to stderr, honouring `RUST_LOG` when set
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the price service from resolved settings
fn build_service(settings: &Settings) -> Service {
    let mut source = BinanceClient::new();
    if let Some(url) = &settings.exchange_url {
        source = source.with_base_url(url.as_str());
    }
    let cache = CacheStore::open(&settings.cache_file, settings.ttl_minutes);
    let errors = ErrorLog::new(&settings.error_log);
    PriceService::new(source, cache, errors)
}

async fn run_price(service: &mut Service, symbols: &[String]) -> bool {
    let mut all_ok = true;
    for (symbol, result) in service.get_multiple_prices(symbols).await {
        match result {
            Ok(quote) => println!("{}", report::quote_line(&quote)),
            Err(report) => {
                all_ok = false;
                eprintln!("error: {symbol}: {}", report.message);
            }
        }
    }
    all_ok
}

async fn run_history(service: &Service, symbol: &str, days: u32) -> bool {
    match service.get_historical_data(symbol, days).await {
        Ok(candles) => {
            println!("{}", report::section(&format!("{symbol} - last {days} days")));
            println!("{}", report::history_table(&candles));
            true
        }
        Err(report) => {
            eprintln!("error: {}", report.message);
            false
        }
    }
}

async fn run_live(service: &mut Service, settings: &Settings, top: usize, no_save: bool) -> bool {
    let results = service.fetch_all_live().await;

    let mut snapshots = Vec::new();
    for (symbol, result) in &results {
        match result {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(report) => eprintln!("error: {symbol}: {}", report.message),
        }
    }

    println!(
        "{}",
        report::section(&format!(
            "LIVE PRICES - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))
    );
    println!("{}\n", report::summary_table(&snapshots));

    println!("{}", report::section(&format!("TOP {top} GAINERS (24h)")));
    let gainers = report::top_movers(&snapshots, top, Movers::Gainers);
    println!("{}\n", report::movers_table(&gainers));

    println!("{}", report::section(&format!("TOP {top} LOSERS (24h)")));
    let losers = report::top_movers(&snapshots, top, Movers::Losers);
    println!("{}\n", report::movers_table(&losers));

    if !no_save {
        match report::save_live_data(&settings.live_export, &results) {
            Ok(()) => println!("Live data saved to: {}", settings.live_export.display()),
            Err(e) => eprintln!("warning: could not save live data: {e}"),
        }
    }

    !snapshots.is_empty()
}

async fn run_detail(service: &mut Service, symbol: &str, days: u32) -> bool {
    match service.fetch_detail(symbol, days).await {
        Ok((snapshot, candles)) => {
            println!("{}", report::section(&format!("DETAILED DATA - {symbol}")));
            println!("{}", report::detail_view(&snapshot, &candles));
            true
        }
        Err(report) => {
            eprintln!("error: {}", report.message);
            false
        }
    }
}

fn run_symbols() {
    for symbol in supported_symbols() {
        // Every listed symbol has a pair
        if let Ok(pair) = trading_pair(symbol) {
            println!("{:<8} {}", symbol, pair);
        }
    }
}

fn run_cache(service: &mut Service, action: &CacheCommand) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CacheCommand::Info => {
            let info = service.cache().describe();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        CacheCommand::Clear { symbol } => {
            service.cache_mut().clear(symbol.as_deref())?;
            match symbol {
                Some(symbol) => println!("Cleared cache entry for {symbol}"),
                None => println!("Cleared cache"),
            }
        }
        CacheCommand::Sweep => {
            let removed = service.cache_mut().evict_expired()?;
            println!("Removed {removed} expired entries");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::from_cli(&cli);
    tracing::debug!(?settings, "resolved settings");
    let mut service = build_service(&settings);

    let ok = match &cli.command {
        Command::Price { symbols } => run_price(&mut service, symbols).await,
        Command::History { symbol, days } => run_history(&service, symbol, *days).await,
        Command::Live { top, no_save } => run_live(&mut service, &settings, *top, *no_save).await,
        Command::Detail { symbol, days } => run_detail(&mut service, symbol, *days).await,
        Command::Symbols => {
            run_symbols();
            true
        }
        Command::Cache { action } => match run_cache(&mut service, action) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("error: {e}");
                false
            }
        },
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
