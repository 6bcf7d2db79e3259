//! Batch Executor
//!
//! One batch, one transaction:
//!   simulate (eth_call) -> estimate gas (+ fixed padding) -> submit -> confirm
//!
//! Every step's failure is classified into an `Outcome` and returned; nothing
//! is retried here. The run loop is the only retry point.
//!
//! Created: 2026-10-08

use crate::chain::{ChainWriter, ContractCall, TxOptions};
use crate::config::BotConfig;
use crate::error::{truncate_reason, ChainError};
use crate::fee::FeePolicy;
use crate::types::{Confirmation, ExecutionResult, Outcome};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Where in the sequence a batch stopped
#[derive(Debug, Error)]
pub enum BatchFailure {
    #[error("simulation failed: {0}")]
    Simulation(#[source] ChainError),

    #[error("gas estimation failed: {0}")]
    Estimation(#[source] ChainError),

    #[error("submission failed: {0}")]
    Submission(#[source] ChainError),
}

impl BatchFailure {
    fn into_outcome(self, method: &str) -> Outcome {
        match self {
            BatchFailure::Simulation(e) => {
                Outcome::SimulationFailed(truncate_reason(format!("callStatic {} failed: {}", method, e)))
            }
            BatchFailure::Estimation(e) => {
                Outcome::EstimationFailed(truncate_reason(format!("estimateGas {} failed: {}", method, e)))
            }
            BatchFailure::Submission(e) => {
                Outcome::SubmissionFailed(truncate_reason(format!("{} failed: {}", method, e)))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub skip_simulation: bool,
    pub force_gas_limit: bool,
    pub forced_gas_limit: u64,
    pub gas_padding: u64,
    pub confirmation_timeout: Duration,
    pub fee_policy: FeePolicy,
}

impl ExecutorSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            skip_simulation: config.execution.skip_simulation,
            force_gas_limit: config.execution.force_gas_limit,
            forced_gas_limit: config.execution.forced_gas_limit,
            gas_padding: config.execution.gas_padding,
            confirmation_timeout: config.confirmation_timeout(),
            fee_policy: FeePolicy::new(config.network, config.execution.priority_fee_gwei),
        }
    }
}

/// Gas projection for one batch in estimate-only mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    /// Padded gas limit that would be submitted
    pub gas_limit: u64,
    pub gas_price: u128,
}

impl GasEstimate {
    pub fn fee_wei(&self) -> u128 {
        u128::from(self.gas_limit) * self.gas_price
    }
}

pub struct BatchExecutor {
    writer: Arc<dyn ChainWriter>,
    settings: ExecutorSettings,
}

impl BatchExecutor {
    pub fn new(writer: Arc<dyn ChainWriter>, settings: ExecutorSettings) -> Self {
        Self { writer, settings }
    }

    /// Run one call through the full sequence. `label` identifies the batch in
    /// logs and in the returned result.
    pub async fn execute(&self, call: &ContractCall, label: &str, confirmations: u64) -> ExecutionResult {
        info!("{} [{}] signer {}", call.method, label, self.writer.signer());

        let outcome = match self.try_execute(call, confirmations).await {
            Ok(confirmation) => {
                info!(
                    "{} [{}] confirmed: tx {} gas_used {}",
                    call.method, label, confirmation.tx_hash, confirmation.gas_used
                );
                Outcome::Confirmed(confirmation)
            }
            Err(failure) => {
                let outcome = failure.into_outcome(call.method);
                error!("{} [{}] {}: {}", call.method, label, outcome.kind(), outcome.failure_reason().unwrap_or_default());
                outcome
            }
        };

        ExecutionResult {
            batch: label.to_string(),
            method: call.method,
            outcome,
        }
    }

    async fn try_execute(&self, call: &ContractCall, confirmations: u64) -> Result<Confirmation, BatchFailure> {
        if !self.settings.skip_simulation {
            self.writer.simulate(call).await.map_err(BatchFailure::Simulation)?;
            debug!("{} simulation ok", call.method);
        }

        let gas_limit = self.gas_limit(call).await?;
        let gas_price = self.writer.gas_price().await.map_err(BatchFailure::Estimation)?;
        let max_fee_per_gas = self.settings.fee_policy.max_fee_per_gas(gas_price);
        let opts = TxOptions {
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas: self.settings.fee_policy.max_priority_fee_per_gas(max_fee_per_gas),
        };

        let tx_hash = self.writer.submit(call, &opts).await.map_err(BatchFailure::Submission)?;
        debug!("{} tx hash: {}, waiting for {} confirmations", call.method, tx_hash, confirmations);

        self.writer
            .wait_for_confirmation(tx_hash, confirmations, self.settings.confirmation_timeout)
            .await
            .map_err(BatchFailure::Submission)
    }

    async fn gas_limit(&self, call: &ContractCall) -> Result<u64, BatchFailure> {
        if self.settings.force_gas_limit {
            return Ok(self.settings.forced_gas_limit);
        }
        let estimate = self.writer.estimate_gas(call).await.map_err(BatchFailure::Estimation)?;
        debug!("estimateGas {} {}", call.method, estimate);
        Ok(estimate.saturating_add(self.settings.gas_padding))
    }

    /// Estimate-only: padded gas and current price, nothing is submitted
    pub async fn estimate(&self, call: &ContractCall) -> Result<GasEstimate, BatchFailure> {
        let gas_limit = self.gas_limit(call).await?;
        let gas_price = self.writer.gas_price().await.map_err(BatchFailure::Estimation)?;
        Ok(GasEstimate { gas_limit, gas_price })
    }
}
