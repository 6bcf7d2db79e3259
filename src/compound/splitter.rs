//! Batch Splitter
//!
//! Greedy single-pass fill of owner groups into transactions of at most
//! `limit` flattened items. Owner order and per-owner token order are kept;
//! one owner's tokens may straddle two consecutive batches.
//!
//! Created: 2026-10-07

use crate::config::BotConfig;
use crate::types::{BatchItems, Collection, CompoundBatch, MatchedOrder, OwnerGroup, StakedPosition};
use alloy::primitives::{Address, U256};
use std::collections::HashMap;

pub struct BatchSplitter {
    default_limit: usize,
    collection_limits: HashMap<Collection, usize>,
}

impl BatchSplitter {
    pub fn new(default_limit: usize) -> Self {
        Self {
            default_limit: default_limit.max(1),
            collection_limits: HashMap::new(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        let mut splitter = Self::new(config.batch.limit);
        for (collection, limit) in &config.batch.collection_limits {
            splitter = splitter.with_collection_limit(*collection, *limit);
        }
        splitter
    }

    pub fn with_collection_limit(mut self, collection: Collection, limit: usize) -> Self {
        self.collection_limits.insert(collection, limit.max(1));
        self
    }

    fn limit(&self, collection: Collection) -> usize {
        self.collection_limits
            .get(&collection)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn split(&self, group: &OwnerGroup, nft_asset: Address) -> Vec<CompoundBatch> {
        let mut batches = Vec::new();
        let mut current = BatchBuilder::new(group, nft_asset);
        let mut capacity = self.limit(group.collection);

        for (owner, positions) in &group.owners {
            let mut rest: &[StakedPosition] = positions;
            while !rest.is_empty() {
                let take = capacity.min(rest.len());
                let (slice, tail) = rest.split_at(take);
                current.push(*owner, slice);
                capacity -= take;
                rest = tail;

                if capacity == 0 {
                    batches.push(current.finish());
                    current = BatchBuilder::new(group, nft_asset);
                    capacity = self.limit(group.collection);
                }
            }
        }
        if !current.is_empty() {
            batches.push(current.finish());
        }
        batches
    }
}

struct BatchBuilder {
    batch: CompoundBatch,
}

impl BatchBuilder {
    fn new(group: &OwnerGroup, nft_asset: Address) -> Self {
        Self {
            batch: CompoundBatch {
                collection: group.collection,
                pool_kind: group.pool_kind,
                nft_asset,
                owners: Vec::new(),
                items: BatchItems::empty(group.pool_kind),
                pending_reward: U256::ZERO,
            },
        }
    }

    fn push(&mut self, owner: Address, positions: &[StakedPosition]) {
        self.batch.owners.push(owner);
        self.batch.items.push_owner(positions);
        for p in positions {
            self.batch.pending_reward = self.batch.pending_reward.saturating_add(p.pending_reward);
        }
    }

    fn is_empty(&self) -> bool {
        self.batch.owners.is_empty()
    }

    fn finish(self) -> CompoundBatch {
        self.batch
    }
}

/// Fixed-size chunks of matched orders, in discovery order
pub fn split_orders(orders: &[MatchedOrder], limit: usize) -> Vec<Vec<MatchedOrder>> {
    orders.chunks(limit.max(1)).map(<[MatchedOrder]>::to_vec).collect()
}
