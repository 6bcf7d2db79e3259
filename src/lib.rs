//! Ape Staking Compound Bot Library
//!
//! Scans staked ape positions held through the lending pool, filters them by
//! pending reward, packs the eligible ones into claim batches and compounds
//! them on-chain. P2P pair-staking matched orders are harvested the same way.
//!
//! Created: 2026-10-03

pub mod alert;
pub mod chain;
pub mod compound;
pub mod config;
pub mod contracts;
pub mod error;
pub mod fee;
pub mod runtime;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{load_config_from_file, BotConfig, Network};
pub use runtime::{Pipeline, RunLoop};
pub use types::{CompoundBatch, ExecutionResult, Outcome, StakedPosition};
