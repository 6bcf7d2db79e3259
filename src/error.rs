//! Error taxonomy
//!
//! `ChainError` is what the chain interfaces return. `ScanError` is fatal for a
//! run (read path). `ConfigError` stops the process before the loop starts.
//! Batch-local failures are not errors at all: they become an `Outcome`
//! variant and the run carries on with the next batch.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Failure reasons are cut to this many characters before they are reported
pub const MAX_REASON_LEN: usize = 400;

/// Errors surfaced by the chain read/write interfaces
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl ChainError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        ChainError::Decode(err.to_string())
    }
}

/// Read-path failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read stakes of {staker}: {source}")]
    StakeRead {
        staker: Address,
        #[source]
        source: ChainError,
    },

    #[error("failed to resolve owners on {contract}: {source}")]
    OwnerRead {
        contract: Address,
        #[source]
        source: ChainError,
    },

    #[error("failed to read approvals on {contract}: {source}")]
    ApprovalRead {
        contract: Address,
        #[source]
        source: ChainError,
    },

    #[error("owner lookup returned {got} results for {expected} tokens")]
    OwnerCountMismatch { expected: usize, got: usize },

    #[error("token id {0} does not fit in 32 bits")]
    TokenIdOverflow(U256),

    #[error("failed to query order events for blocks {from}-{to}: {source}")]
    OrderEvents {
        from: u64,
        to: u64,
        #[source]
        source: ChainError,
    },

    #[error("failed to read matched orders: {0}")]
    OrderRead(#[source] ChainError),

    #[error("failed to read block number: {0}")]
    BlockNumber(#[source] ChainError),
}

/// Invalid configuration, detected once at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("schedule.run_hour_utc must be in 0..24, got {0}")]
    RunHour(u32),

    #[error("no [thresholds.{0}] table in configuration")]
    MissingThresholds(String),

    #[error("invalid amount {field} = '{value}'")]
    InvalidAmount { field: String, value: String },

    #[error("no collections configured")]
    NoCollections,
}

/// Cut an error message down to `MAX_REASON_LEN` characters for reporting
pub fn truncate_reason(err: impl std::fmt::Display) -> String {
    truncate_chars(err, MAX_REASON_LEN)
}

/// Cut a message down to at most `max` characters
pub fn truncate_chars(msg: impl std::fmt::Display, max: usize) -> String {
    let msg = msg.to_string();
    match msg.char_indices().nth(max) {
        Some((idx, _)) => msg[..idx].to_string(),
        None => msg,
    }
}
