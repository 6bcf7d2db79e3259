//! Reward Aggregator
//!
//! Two-tier threshold filter over scanned positions:
//!   1. drop positions whose own pending reward is at or below the per-token threshold
//!   2. group survivors by owner (first-seen order)
//!   3. drop owners whose summed reward is at or below the per-owner threshold
//!
//! Created: 2026-10-07

use crate::config::RewardThresholds;
use crate::types::{Collection, OwnerGroup, PoolKind, StakedPosition};
use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

/// Token and owner thresholds for one (collection, pool kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub token: U256,
    pub owner: U256,
}

impl Thresholds {
    pub fn for_kind(all: &RewardThresholds, collection: Collection, kind: PoolKind) -> Self {
        Self {
            token: all.token(collection, kind),
            owner: all.owner(collection, kind),
        }
    }
}

pub fn aggregate(
    collection: Collection,
    pool_kind: PoolKind,
    positions: &[StakedPosition],
    thresholds: Thresholds,
) -> OwnerGroup {
    // owner -> index into `owners`, keeps grouping linear
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut owners: Vec<(Address, Vec<StakedPosition>)> = Vec::new();

    for position in positions.iter().filter(|p| p.pending_reward > thresholds.token) {
        match index.get(&position.owner) {
            Some(&i) => owners[i].1.push(position.clone()),
            None => {
                index.insert(position.owner, owners.len());
                owners.push((position.owner, vec![position.clone()]));
            }
        }
    }

    let before = owners.len();
    owners.retain(|(_, positions)| {
        let total = positions
            .iter()
            .fold(U256::ZERO, |acc, p| acc.saturating_add(p.pending_reward));
        total > thresholds.owner
    });

    debug!(
        "{}/{}: {} positions -> {} owners ({} below owner threshold)",
        collection,
        pool_kind,
        positions.len(),
        owners.len(),
        before - owners.len()
    );

    OwnerGroup {
        collection,
        pool_kind,
        owners,
    }
}
