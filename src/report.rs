//! Plain-text rendering of prices for the terminal
//!
//! Everything here returns `String`s so the CLI decides where output goes and
//! tests can inspect it.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Map, Value};

use crate::data::{Candle, TickerSnapshot};
use crate::service::{LiveResult, Origin, Quote};

/// Width of section rules
const RULE_WIDTH: usize = 70;

/// Which end of the 24h change ranking to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movers {
    Gainers,
    Losers,
}

/// Formats a dollar amount with thousands separators, e.g. `$45,000.00`
pub fn format_usd(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{sign}${grouped}.{fraction}"),
        None => format!("{sign}${grouped}"),
    }
}

/// Formats a 24h change such as `+1.26%`, or `N/A` when unknown
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(change) => format!("{:+.2}%", change),
        None => "N/A".to_string(),
    }
}

/// A titled section header framed by rules
pub fn section(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("{rule}\n{title}\n{rule}")
}

/// One line describing a quote and where it came from
pub fn quote_line(quote: &Quote) -> String {
    let origin = match quote.origin {
        Origin::Cache => "cache",
        Origin::Exchange => "exchange",
    };
    format!(
        "{:<8} {:>16}  {:>9}  ({})",
        quote.snapshot.symbol,
        format_usd(quote.snapshot.price, 2),
        format_change(quote.snapshot.change_percent),
        origin
    )
}

/// Table of price, 24h range and change for each snapshot
pub fn summary_table(snapshots: &[&TickerSnapshot]) -> String {
    let mut lines = vec![
        format!(
            "{:<10} {:>17} {:>17} {:>17} {:>10}",
            "Symbol", "Price (USDT)", "24h High", "24h Low", "Change %"
        ),
        "-".repeat(RULE_WIDTH + 6),
    ];

    lines.extend(snapshots.iter().map(|s| {
        format!(
            "{:<10} {:>17} {:>17} {:>17} {:>10}",
            s.symbol,
            format_usd(s.price, 2),
            format_usd(s.high_24h, 2),
            format_usd(s.low_24h, 2),
            format_change(s.change_percent)
        )
    }));

    lines.join("\n")
}

/// The `n` biggest gainers or losers by 24h change; unknown change counts as 0
pub fn top_movers<'a>(
    snapshots: &[&'a TickerSnapshot],
    n: usize,
    movers: Movers,
) -> Vec<&'a TickerSnapshot> {
    let mut ranked = snapshots.to_vec();
    let change = |s: &TickerSnapshot| s.change_percent.unwrap_or(0.0);
    ranked.sort_by(|a, b| match movers {
        Movers::Gainers => change(b).total_cmp(&change(a)),
        Movers::Losers => change(a).total_cmp(&change(b)),
    });
    ranked.truncate(n);
    ranked
}

/// Numbered list of movers
pub fn movers_table(movers: &[&TickerSnapshot]) -> String {
    movers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}. {:<8} {:>16}  {}",
                i + 1,
                s.symbol,
                format_usd(s.price, 2),
                format_change(s.change_percent)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Daily candles as a table, one row per day
pub fn history_table(candles: &[Candle]) -> String {
    let mut lines = vec![
        format!(
            "{:<12} {:>15} {:>15} {:>15} {:>15}",
            "Date", "Open", "High", "Low", "Close"
        ),
        "-".repeat(RULE_WIDTH + 6),
    ];

    lines.extend(candles.iter().map(|c| {
        format!(
            "{:<12} {:>15} {:>15} {:>15} {:>15}",
            c.timestamp.format("%Y-%m-%d"),
            format_usd(c.open, 2),
            format_usd(c.high, 2),
            format_usd(c.low, 2),
            format_usd(c.close, 2)
        )
    }));

    lines.join("\n")
}

/// Full detail view of one coin followed by its history
pub fn detail_view(snapshot: &TickerSnapshot, candles: &[Candle]) -> String {
    let fields = [
        ("Symbol", snapshot.symbol.clone()),
        ("Current Price", format_usd(snapshot.price, 2)),
        ("24h High", format_usd(snapshot.high_24h, 2)),
        ("24h Low", format_usd(snapshot.low_24h, 2)),
        ("24h Change", format_change(snapshot.change_percent)),
        ("Bid Price", format_usd(snapshot.bid, 2)),
        ("Ask Price", format_usd(snapshot.ask, 2)),
        ("Volume (24h)", format_usd(snapshot.volume, 0)),
        ("Updated", snapshot.fetched_at.to_rfc3339()),
    ];

    let mut out: Vec<String> = fields
        .iter()
        .map(|(label, value)| format!("{:<17} {}", format!("{label}:"), value))
        .collect();

    out.push(String::new());
    out.push(section(&format!("HISTORICAL DATA (Last {} Days)", candles.len())));
    out.push(history_table(candles));
    out.join("\n")
}

/// Writes a live overview to `path` as pretty JSON keyed by symbol
///
/// Failed symbols are written as their error report.
pub fn save_live_data(path: &Path, results: &[LiveResult]) -> io::Result<()> {
    let to_io = |e: serde_json::Error| io::Error::new(io::ErrorKind::InvalidData, e);

    let mut document = Map::new();
    for (symbol, result) in results {
        let value = match result {
            Ok(snapshot) => serde_json::to_value(snapshot).map_err(to_io)?,
            Err(report) => serde_json::to_value(report).map_err(to_io)?,
        };
        document.insert(symbol.clone(), value);
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(&Value::Object(document)).map_err(to_io)?;
    fs::write(path, json)
}
