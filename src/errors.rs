//! Error reporting and input validation
//!
//! `ErrorLog` turns handled errors into `ErrorReport`s and appends each one as a
//! JSON line to a log file. Writing the log is best-effort: if the file cannot
//! be written the report is still returned and the failure is only traced.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheError;
use crate::data::MarketError;

/// Shortest accepted symbol
const MIN_SYMBOL_LEN: usize = 2;

/// Longest accepted symbol
const MAX_SYMBOL_LEN: usize = 10;

/// Largest history window, in days
const MAX_HISTORY_DAYS: u32 = 365;

/// Errors raised by input validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Symbol is too short or too long
    #[error("Symbol must be 2-10 characters, got '{0}'")]
    SymbolLength(String),

    /// Symbol contains something other than ASCII letters and digits
    #[error("Symbol must contain only letters and digits, got '{0}'")]
    SymbolCharacters(String),

    /// Symbol contains lowercase letters
    #[error("Symbol must be uppercase, got '{0}'")]
    SymbolCase(String),

    /// History window outside 1..=365
    #[error("Days must be between 1 and 365, got {0}")]
    DaysOutOfRange(u32),
}

/// Any error the price service can hand to the error log
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl AppError {
    /// Short name of the underlying error, recorded as the report `type`
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Market(e) => e.kind(),
            AppError::Cache(CacheError::Write { .. }) => "CacheWrite",
            AppError::Cache(CacheError::Serialize(_)) => "CacheSerialize",
            AppError::Cache(CacheError::NotAnObject(_)) => "CacheNotAnObject",
            AppError::Validation(_) => "ValidationError",
        }
    }
}

/// A handled error, as logged and returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Always `true`; lets consumers tell reports from data in mixed output
    pub error: bool,
    /// Human-readable error message
    pub message: String,
    /// Where the error happened (usually the symbol being processed)
    pub context: String,
    /// When the error was handled
    pub timestamp: DateTime<Local>,
    /// Error kind, see `AppError::kind`
    #[serde(rename = "type")]
    pub kind: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.context, self.message)
    }
}

/// Appends handled errors to a JSON-lines log file
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Creates an error log writing to `path`; nothing is written until an error is handled
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records an error and returns its report
    ///
    /// # Arguments
    /// * `err` - The error that occurred
    /// * `context` - Where it occurred, e.g. "BTC" or "BTC (historical)"
    ///
    /// # Returns
    /// The `ErrorReport`, whether or not it could be written to the log file
    pub fn handle(&self, err: &AppError, context: &str) -> ErrorReport {
        let report = ErrorReport {
            error: true,
            message: err.to_string(),
            context: context.to_string(),
            timestamp: Local::now(),
            kind: err.kind().to_string(),
        };

        debug!(
            kind = %report.kind,
            context = %report.context,
            "{}",
            report.message
        );

        if let Err(e) = self.append(&report) {
            debug!(path = %self.path.display(), error = %e, "could not write error log");
        }

        report
    }

    fn append(&self, report: &ErrorReport) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let line = serde_json::to_string(report)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

/// Checks that a symbol looks like a ticker: 2-10 uppercase letters or digits
pub fn validate_symbol(symbol: &str) -> Result<(), ValidationError> {
    let len = symbol.chars().count();
    if !(MIN_SYMBOL_LEN..=MAX_SYMBOL_LEN).contains(&len) {
        return Err(ValidationError::SymbolLength(symbol.to_string()));
    }

    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::SymbolCharacters(symbol.to_string()));
    }

    if symbol.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::SymbolCase(symbol.to_string()));
    }

    Ok(())
}

/// Checks that a history window is between 1 and 365 days
pub fn validate_days(days: u32) -> Result<(), ValidationError> {
    if (1..=MAX_HISTORY_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::DaysOutOfRange(days))
    }
}
