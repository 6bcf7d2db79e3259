//! Harvest path: threshold filtering, batch packing, and on-chain execution

pub mod aggregator;
pub mod calls;
pub mod executor;
pub mod splitter;

pub use aggregator::{aggregate, Thresholds};
pub use executor::{BatchExecutor, BatchFailure, ExecutorSettings, GasEstimate};
pub use splitter::{split_orders, BatchSplitter};
