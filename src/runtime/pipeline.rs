//! Harvest Pipeline
//!
//! One run, in order:
//!   1. scan every tracked collection (concurrently)
//!   2. aggregate + split: bayc/solo, mayc/solo, bayc/paired, mayc/paired
//!   3. execute position batches one at a time
//!   4. scan, split and execute P2P matched orders
//!
//! Scan errors abort the run. Batch failures are reported and the run moves
//! on to the next batch.
//!
//! Created: 2026-10-09

use super::run_loop::RunJob;
use crate::alert::{self, Notifier};
use crate::chain::{ChainReader, ChainWriter};
use crate::compound::calls::{compound_call, order_call};
use crate::compound::{aggregate, split_orders, BatchExecutor, BatchFailure, BatchSplitter, ExecutorSettings, GasEstimate, Thresholds};
use crate::config::BotConfig;
use crate::scanner::{CollectionScan, MatchedOrderScanner, ScanSettings, StakeScanner};
use crate::types::{Collection, CompoundBatch, ExecutionResult, MatchedOrder, Outcome, PoolKind};
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Decimal amount with at most 5 fractional digits
pub fn format_amount(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, frac)) => format!("{}.{}", whole, &frac[..frac.len().min(5)]),
        None => formatted,
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Every batch outcome of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<ExecutionResult>,
}

impl RunSummary {
    pub fn confirmed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_confirmed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.confirmed()
    }
}

/// Totals of an estimate-only run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimateReport {
    pub batches: usize,
    pub failed: usize,
    pub total_gas: u64,
    pub total_fee_wei: u128,
    pub total_reward: U256,
}

impl EstimateReport {
    fn record(&mut self, label: &str, reward: U256, estimate: Result<GasEstimate, BatchFailure>) {
        self.batches += 1;
        self.total_reward = self.total_reward.saturating_add(reward);
        match estimate {
            Ok(estimate) => {
                info!("[estimate] {}: gas {} fee {} ETH", label, estimate.gas_limit, format_amount(U256::from(estimate.fee_wei())));
                self.total_gas = self.total_gas.saturating_add(estimate.gas_limit);
                self.total_fee_wei = self.total_fee_wei.saturating_add(estimate.fee_wei());
            }
            Err(e) => {
                warn!("[estimate] {}: {}", label, e);
                self.failed += 1;
            }
        }
    }
}

pub struct Pipeline {
    config: Arc<BotConfig>,
    scanner: StakeScanner,
    orders: Option<MatchedOrderScanner>,
    splitter: BatchSplitter,
    executor: BatchExecutor,
    notifier: Notifier,
    signer: Address,
}

impl Pipeline {
    pub fn new(
        config: Arc<BotConfig>,
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        notifier: Notifier,
    ) -> Self {
        let orders = MatchedOrderScanner::from_config(reader.clone(), &config);
        if orders.is_none() {
            info!("P2P pair staking not configured for {}, matched orders skipped", config.network);
        }
        Self {
            scanner: StakeScanner::new(reader, config.batch.owner_chunk_size, ScanSettings::from_config(&config)),
            orders,
            splitter: BatchSplitter::from_config(&config),
            executor: BatchExecutor::new(writer.clone(), ExecutorSettings::from_config(&config)),
            signer: writer.signer(),
            notifier,
            config,
        }
    }

    /// Full run: position batches first, then matched orders
    pub async fn harvest(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let batches = self.plan().await?;
        info!("Executing {} position batches", batches.len());
        for batch in &batches {
            let call = compound_call(self.config.contracts.pool, batch);
            let result = self
                .executor
                .execute(&call, &batch.label(), self.config.execution.confirmations)
                .await;
            self.report(&result, self.batch_fields(batch)).await;
            summary.results.push(result);
        }

        if let Some(scanner) = &self.orders {
            let orders = scanner.scan().await.context("matched order scan failed")?;
            for chunk in split_orders(&orders, self.config.batch.order_limit) {
                let call = order_call(scanner.contract(), &chunk);
                let label = format!("p2p ({} orders)", chunk.len());
                let result = self
                    .executor
                    .execute(&call, &label, self.config.execution.order_confirmations)
                    .await;
                self.report(&result, self.order_fields(&chunk)).await;
                summary.results.push(result);
            }
        }

        info!(
            "Run finished: {} batches, {} confirmed, {} failed",
            summary.results.len(),
            summary.confirmed(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Gas projection for everything a run would submit
    pub async fn estimate(&self) -> Result<EstimateReport> {
        let mut report = EstimateReport::default();

        for batch in self.plan().await? {
            let call = compound_call(self.config.contracts.pool, &batch);
            report.record(&batch.label(), batch.pending_reward, self.executor.estimate(&call).await);
        }
        if let Some(scanner) = &self.orders {
            let orders = scanner.scan().await.context("matched order scan failed")?;
            for chunk in split_orders(&orders, self.config.batch.order_limit) {
                let call = order_call(scanner.contract(), &chunk);
                let reward = chunk.iter().fold(U256::ZERO, |acc, o| acc.saturating_add(o.pending_reward));
                report.record(&format!("p2p ({} orders)", chunk.len()), reward, self.executor.estimate(&call).await);
            }
        }

        info!(
            "Estimate: {} batches ({} failed), gas {}, fee {} ETH, reward {} APE",
            report.batches,
            report.failed,
            report.total_gas,
            format_amount(U256::from(report.total_fee_wei)),
            format_amount(report.total_reward)
        );
        Ok(report)
    }

    /// Scan, aggregate and split every tracked collection
    pub async fn plan(&self) -> Result<Vec<CompoundBatch>> {
        let scans = self.scan_collections().await?;

        let mut batches = Vec::new();
        for kind in [PoolKind::Solo, PoolKind::Paired] {
            for (collection, asset, scan) in &scans {
                let positions = match kind {
                    PoolKind::Solo => &scan.solo,
                    PoolKind::Paired => &scan.paired,
                };
                let thresholds = Thresholds::for_kind(&self.config.thresholds, *collection, kind);
                let group = aggregate(*collection, kind, positions, thresholds);
                if group.is_empty() {
                    continue;
                }
                info!(
                    "{}/{}: {} owners, {} tokens, {} APE pending",
                    collection,
                    kind,
                    group.owner_count(),
                    group.token_count(),
                    format_amount(group.total_reward())
                );
                batches.extend(self.splitter.split(&group, *asset));
            }
        }
        Ok(batches)
    }

    async fn scan_collections(&self) -> Result<Vec<(Collection, Address, CollectionScan)>> {
        let scans = self.config.tracked_collections().into_iter().map(|(collection, cfg)| async move {
            let scan = self
                .scanner
                .scan(collection, cfg.ntoken)
                .await
                .with_context(|| format!("{} scan failed", collection))?;
            Ok::<_, anyhow::Error>((collection, cfg.asset, scan))
        });
        try_join_all(scans).await
    }

    fn batch_fields(&self, batch: &CompoundBatch) -> Vec<(String, String)> {
        alert::fields([
            ("network", self.config.network.to_string()),
            ("signer", self.signer.to_string()),
            ("collection", batch.collection.to_string()),
            ("pool kind", batch.pool_kind.to_string()),
            ("pending reward", format!("{} APE", format_amount(batch.pending_reward))),
            ("owners", join(&batch.owners)),
            ("token ids", format!("{:?}", batch.items.token_ids_per_owner())),
        ])
    }

    fn order_fields(&self, orders: &[MatchedOrder]) -> Vec<(String, String)> {
        let reward = orders.iter().fold(U256::ZERO, |acc, o| acc.saturating_add(o.pending_reward));
        let hashes: Vec<_> = orders.iter().map(|o| o.order_hash).collect();
        alert::fields([
            ("network", self.config.network.to_string()),
            ("signer", self.signer.to_string()),
            ("pending reward", format!("{} APE", format_amount(reward))),
            ("orders", join(&hashes)),
        ])
    }

    /// Exactly one notification per batch, plus a page for failures when enabled
    async fn report(&self, result: &ExecutionResult, mut details: Vec<(String, String)>) {
        match &result.outcome {
            Outcome::Confirmed(confirmation) => {
                let link = self.config.network.tx_link(&confirmation.tx_hash.to_string());
                details.push(("tx".to_string(), link));
                details.push(("gas fee".to_string(), format!("{} ETH", format_amount(confirmation.fee_wei()))));
                self.notifier.info(&format!("{} succeeded", result.method), &details).await;
            }
            failure => {
                let reason = failure.failure_reason().unwrap_or_default().to_string();
                details.push(("reason".to_string(), reason));
                self.notifier
                    .error(&format!("{} {}", result.method, failure.kind()), &details)
                    .await;
                if self.config.alerts.page_on_batch_failure {
                    let summary = format!("{} {} for {}", result.method, failure.kind(), result.batch);
                    self.notifier
                        .page(&summary, self.config.alerts.batch_failure_severity, &details)
                        .await;
                }
            }
        }
    }
}

#[async_trait]
impl RunJob for Pipeline {
    async fn run(&self) -> Result<RunSummary> {
        self.harvest().await
    }
}
