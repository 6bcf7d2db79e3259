//! P2P Matched Order Scanner
//!
//! Discovers live pair-staking orders from `PairStakingMatched` /
//! `PairStakingBreakUp` events, resolves their details, and keeps the ones
//! whose pending reward clears the per-type threshold.
//!
//! Created: 2026-10-07

use super::owner_resolver::{scatter_gather, GatherError};
use crate::chain::{ChainReader, MatchedOrderInfo, OrderEventKind};
use crate::config::{BotConfig, RewardThresholds};
use crate::error::ScanError;
use crate::types::{MatchedOrder, StakingType};
use alloy::primitives::{Address, B256, U256};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Inclusive block ranges of at most `size` blocks covering `[start, end]`.
/// A start past the head collapses to the single block `end`.
pub fn block_ranges(start: u64, end: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let start = start.min(end);
    let mut ranges = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(size - 1).min(end);
        ranges.push((from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    ranges
}

/// Remove one matched hash per broken-up hash, keeping discovery order
pub fn cancel_broken(matched: Vec<B256>, broken: &[B256]) -> Vec<B256> {
    let mut pending: HashMap<B256, usize> = HashMap::new();
    for hash in broken {
        *pending.entry(*hash).or_default() += 1;
    }
    matched
        .into_iter()
        .filter(|hash| match pending.get_mut(hash) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .collect()
}

pub struct MatchedOrderScanner {
    reader: Arc<dyn ChainReader>,
    contract: Address,
    start_block: u64,
    block_range: u64,
    range_concurrency: usize,
    chunk_size: usize,
    thresholds: RewardThresholds,
}

impl MatchedOrderScanner {
    /// `None` when no P2P contract or start block is configured for the network
    pub fn from_config(reader: Arc<dyn ChainReader>, config: &BotConfig) -> Option<Self> {
        Some(Self {
            reader,
            contract: config.contracts.p2p_pair_staking?,
            start_block: config.p2p_start_block()?,
            block_range: config.p2p.block_range,
            range_concurrency: config.p2p.range_concurrency,
            chunk_size: config.batch.owner_chunk_size,
            thresholds: config.thresholds.clone(),
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub async fn scan(&self) -> Result<Vec<MatchedOrder>, ScanError> {
        let hashes = self.live_order_hashes().await?;
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let infos = self.order_details(&hashes).await?;

        let stakes = self
            .reader
            .all_stakes(self.contract)
            .await
            .map_err(|source| ScanError::StakeRead {
                staker: self.contract,
                source,
            })?;
        let mut rewards: HashMap<(u64, U256), U256> = HashMap::new();
        for stake in stakes {
            rewards.entry((stake.pool_id, stake.token_id)).or_insert(stake.unclaimed);
        }

        let mut orders = Vec::new();
        for (order_hash, info) in hashes.into_iter().zip(infos) {
            if info.ape_principle_amount.is_zero() {
                continue;
            }
            let Some(staking_type) = StakingType::from_u8(info.staking_type) else {
                debug!("Skipping order {} with unknown staking type {}", order_hash, info.staking_type);
                continue;
            };
            let mut order = MatchedOrder {
                order_hash,
                staking_type,
                ape_token: info.ape_token,
                ape_token_id: info.ape_token_id,
                bakc_token_id: info.bakc_token_id,
                pending_reward: U256::ZERO,
            };
            let key = (staking_type.pool_id(), U256::from(order.reward_token_id()));
            order.pending_reward = rewards.get(&key).copied().unwrap_or_default();

            if order.pending_reward > self.thresholds.p2p_token(staking_type) {
                orders.push(order);
            }
        }

        info!("P2P: {} live orders above threshold", orders.len());
        Ok(orders)
    }

    /// Matched order hashes minus broken-up ones, in discovery order
    async fn live_order_hashes(&self) -> Result<Vec<B256>, ScanError> {
        let head = self
            .reader
            .block_number()
            .await
            .map_err(ScanError::BlockNumber)?;
        let ranges = block_ranges(self.start_block, head, self.block_range);
        debug!(
            "Requesting P2P orders from {} to {} in {} ranges",
            self.start_block,
            head,
            ranges.len()
        );

        let mut matched = Vec::new();
        let mut broken = Vec::new();
        for batch in ranges.chunks(self.range_concurrency.max(1)) {
            matched.extend(self.events(OrderEventKind::Matched, batch).await?);
            broken.extend(self.events(OrderEventKind::BrokenUp, batch).await?);
        }
        Ok(cancel_broken(matched, &broken))
    }

    async fn events(
        &self,
        kind: OrderEventKind,
        ranges: &[(u64, u64)],
    ) -> Result<Vec<B256>, ScanError> {
        let queries = ranges.iter().map(|&(from, to)| async move {
            self.reader
                .order_events(self.contract, kind, from, to)
                .await
                .map_err(|source| ScanError::OrderEvents { from, to, source })
        });
        Ok(try_join_all(queries).await?.into_iter().flatten().collect())
    }

    async fn order_details(&self, hashes: &[B256]) -> Result<Vec<MatchedOrderInfo>, ScanError> {
        let reader = &self.reader;
        let contract = self.contract;
        scatter_gather(hashes, self.chunk_size, |chunk| async move {
            reader.matched_orders(contract, chunk).await
        })
        .await
        .map_err(|e| match e {
            GatherError::Read(source) => ScanError::OrderRead(source),
            GatherError::Count { expected, got } => ScanError::OwnerCountMismatch { expected, got },
        })
    }
}
