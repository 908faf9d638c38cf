//! Cryptoprice library
//!
//! This module exposes the cache, exchange client, price service and CLI
//! modules for use by the binary and integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod errors;
pub mod report;
pub mod service;
