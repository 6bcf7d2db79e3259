//! Core data structures
//!
//! Positions read from the staking ledger, the owner-grouped work derived from
//! them, the transaction-sized batches the splitter produces, and the outcome
//! of executing one batch.
//!
//! Created: 2026-10-03

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collateral token id. Ape collections (BAYC/MAYC/BAKC) all fit in 32 bits,
/// which is also the width the lending pool's claim entry points take.
pub type TokenId = u32;

/// Raw staking pool ids used by the ApeCoin staking ledger.
pub mod pool_id {
    pub const APE: u64 = 0;
    pub const BAYC: u64 = 1;
    pub const MAYC: u64 = 2;
    pub const BAKC: u64 = 3;
}

/// Tracked collateral collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Bayc,
    Mayc,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Bayc, Collection::Mayc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Bayc => "bayc",
            Collection::Mayc => "mayc",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solo = position backed by a single collateral token.
/// Paired = BAKC position paired with a primary BAYC/MAYC token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Solo,
    Paired,
}

impl PoolKind {
    /// Classify a raw staking pool id. The APE coin pool (and anything unknown)
    /// is never harvested by this bot.
    pub fn classify(pool_id: u64) -> Option<PoolKind> {
        match pool_id {
            pool_id::BAYC | pool_id::MAYC => Some(PoolKind::Solo),
            pool_id::BAKC => Some(PoolKind::Paired),
            _ => None,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolKind::Solo => write!(f, "solo"),
            PoolKind::Paired => write!(f, "paired"),
        }
    }
}

/// A (primary, BAKC) token pair as the paired claim entry point expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairNft {
    pub main_token_id: TokenId,
    pub bakc_token_id: TokenId,
}

/// Immutable snapshot of one staking position at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakedPosition {
    /// The staked token. For paired positions this is the BAKC token.
    pub token_id: TokenId,
    /// Effective owner. For paired positions, the owner of the primary token.
    pub owner: Address,
    pub pool_kind: PoolKind,
    /// Primary token a paired position is attached to
    pub paired_token_id: Option<TokenId>,
    pub pending_reward: U256,
}

impl StakedPosition {
    pub fn solo(token_id: TokenId, owner: Address, pending_reward: U256) -> Self {
        Self {
            token_id,
            owner,
            pool_kind: PoolKind::Solo,
            paired_token_id: None,
            pending_reward,
        }
    }

    pub fn paired(
        bakc_token_id: TokenId,
        main_token_id: TokenId,
        owner: Address,
        pending_reward: U256,
    ) -> Self {
        Self {
            token_id: bakc_token_id,
            owner,
            pool_kind: PoolKind::Paired,
            paired_token_id: Some(main_token_id),
            pending_reward,
        }
    }

    /// The pair this position claims through, if it is a paired position
    pub fn pair(&self) -> Option<PairNft> {
        match (self.pool_kind, self.paired_token_id) {
            (PoolKind::Paired, Some(main_token_id)) => Some(PairNft {
                main_token_id,
                bakc_token_id: self.token_id,
            }),
            _ => None,
        }
    }
}

/// Owner-grouped positions for one collection and pool kind.
///
/// Insertion-ordered: owners appear in first-seen scan order, and each owner's
/// positions keep their scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerGroup {
    pub collection: Collection,
    pub pool_kind: PoolKind,
    pub owners: Vec<(Address, Vec<StakedPosition>)>,
}

impl OwnerGroup {
    pub fn new(collection: Collection, pool_kind: PoolKind) -> Self {
        Self {
            collection,
            pool_kind,
            owners: Vec::new(),
        }
    }

    /// Append a position to its owner's list, creating the owner entry on first sight
    pub fn push(&mut self, position: StakedPosition) {
        match self.owners.iter_mut().find(|(owner, _)| *owner == position.owner) {
            Some((_, positions)) => positions.push(position),
            None => self.owners.push((position.owner, vec![position])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn token_count(&self) -> usize {
        self.owners.iter().map(|(_, p)| p.len()).sum()
    }

    pub fn total_reward(&self) -> U256 {
        self.owners
            .iter()
            .flat_map(|(_, p)| p.iter())
            .fold(U256::ZERO, |acc, p| acc + p.pending_reward)
    }
}

/// Per-owner claim arguments, tagged by pool kind.
/// One inner list per owner, parallel to `CompoundBatch::owners`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItems {
    Solo { token_ids: Vec<Vec<TokenId>> },
    Paired { pairs: Vec<Vec<PairNft>> },
}

impl BatchItems {
    pub fn empty(pool_kind: PoolKind) -> Self {
        match pool_kind {
            PoolKind::Solo => BatchItems::Solo { token_ids: Vec::new() },
            PoolKind::Paired => BatchItems::Paired { pairs: Vec::new() },
        }
    }

    /// Append one owner's slice of positions as a new per-owner sublist
    pub fn push_owner(&mut self, positions: &[StakedPosition]) {
        match self {
            BatchItems::Solo { token_ids } => {
                token_ids.push(positions.iter().map(|p| p.token_id).collect())
            }
            BatchItems::Paired { pairs } => {
                pairs.push(positions.iter().filter_map(StakedPosition::pair).collect())
            }
        }
    }

    /// Flattened item count across all owners
    pub fn len(&self) -> usize {
        match self {
            BatchItems::Solo { token_ids } => token_ids.iter().map(Vec::len).sum(),
            BatchItems::Paired { pairs } => pairs.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Staked token ids per owner (BAKC ids for paired batches)
    pub fn token_ids_per_owner(&self) -> Vec<Vec<TokenId>> {
        match self {
            BatchItems::Solo { token_ids } => token_ids.clone(),
            BatchItems::Paired { pairs } => pairs
                .iter()
                .map(|owner_pairs| owner_pairs.iter().map(|p| p.bakc_token_id).collect())
                .collect(),
        }
    }
}

/// One transaction's worth of harvesting work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundBatch {
    pub collection: Collection,
    pub pool_kind: PoolKind,
    /// Underlying collection asset passed to the claim entry point
    pub nft_asset: Address,
    pub owners: Vec<Address>,
    pub items: BatchItems,
    /// Sum of pending rewards of every position in this batch
    pub pending_reward: U256,
}

impl CompoundBatch {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn label(&self) -> String {
        format!(
            "{}/{} ({} owners, {} tokens)",
            self.collection,
            self.pool_kind,
            self.owners.len(),
            self.item_count()
        )
    }
}

/// P2P pair-staking order type, as encoded by the P2P staking contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakingType {
    BaycStaking,
    MaycStaking,
    BakcPairStaking,
}

impl StakingType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(StakingType::BaycStaking),
            1 => Some(StakingType::MaycStaking),
            2 => Some(StakingType::BakcPairStaking),
            _ => None,
        }
    }

    /// Staking pool the order's reward accrues in
    pub fn pool_id(&self) -> u64 {
        match self {
            StakingType::BaycStaking => pool_id::BAYC,
            StakingType::MaycStaking => pool_id::MAYC,
            StakingType::BakcPairStaking => pool_id::BAKC,
        }
    }
}

impl fmt::Display for StakingType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StakingType::BaycStaking => write!(f, "bayc"),
            StakingType::MaycStaking => write!(f, "mayc"),
            StakingType::BakcPairStaking => write!(f, "bakc"),
        }
    }
}

/// A live P2P matched order eligible for harvesting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOrder {
    pub order_hash: B256,
    pub staking_type: StakingType,
    pub ape_token: Address,
    pub ape_token_id: TokenId,
    pub bakc_token_id: TokenId,
    pub pending_reward: U256,
}

impl MatchedOrder {
    /// The token whose stake carries this order's reward
    pub fn reward_token_id(&self) -> TokenId {
        match self.staking_type {
            StakingType::BakcPairStaking => self.bakc_token_id,
            _ => self.ape_token_id,
        }
    }
}

/// A mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub block_number: Option<u64>,
}

impl Confirmation {
    /// Fee actually paid, in wei
    pub fn fee_wei(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Terminal outcome of executing one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Confirmed(Confirmation),
    SimulationFailed(String),
    EstimationFailed(String),
    SubmissionFailed(String),
}

impl Outcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }

    /// Failure reason, if the batch did not confirm
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Outcome::Confirmed(_) => None,
            Outcome::SimulationFailed(r)
            | Outcome::EstimationFailed(r)
            | Outcome::SubmissionFailed(r) => Some(r),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Confirmed(_) => "confirmed",
            Outcome::SimulationFailed(_) => "simulation failed",
            Outcome::EstimationFailed(_) => "estimation failed",
            Outcome::SubmissionFailed(_) => "submission failed",
        }
    }
}

/// Result of executing one batch: what was attempted and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Human-readable batch reference (e.g. "bayc/solo (3 owners, 10 tokens)")
    pub batch: String,
    /// Contract method the batch called
    pub method: &'static str,
    pub outcome: Outcome,
}
