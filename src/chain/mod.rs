//! Chain access
//!
//! Narrow async interfaces the pipeline reads and writes through, plus the
//! alloy-backed implementation (`RpcChain`).

pub mod rpc;

pub use rpc::RpcChain;

use crate::error::ChainError;
use crate::types::{Confirmation, TokenId};
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::time::Duration;

/// One raw record from the staking ledger's `getAllStakes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStake {
    pub pool_id: u64,
    pub token_id: U256,
    pub unclaimed: U256,
    /// Primary token of a paired (BAKC) stake, zero otherwise
    pub main_token_id: U256,
    pub main_type_pool_id: u64,
}

/// Which P2P order event to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventKind {
    Matched,
    BrokenUp,
}

/// Decoded `matchedOrders(hash)` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOrderInfo {
    pub staking_type: u8,
    pub ape_token: Address,
    pub ape_token_id: TokenId,
    pub bakc_token_id: TokenId,
    pub ape_principle_amount: U256,
}

/// A state-changing call, ready to simulate, estimate or submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub calldata: Bytes,
    /// Contract method name, for logs and alerts
    pub method: &'static str,
}

/// Gas and fee parameters for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOptions {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn all_stakes(&self, staker: Address) -> Result<Vec<RawStake>, ChainError>;

    /// Owners of `token_ids` on `token`, in input order. One batched read;
    /// chunking is the caller's job.
    async fn owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Address>, ChainError>;

    /// Like `owners_of`, but a reverted read is `None` instead of failing
    /// the batch
    async fn try_owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Option<Address>>, ChainError>;

    /// `isApprovedForAll(owner, operator)` on `token` for each owner, in input order
    async fn approvals_for_all(
        &self,
        token: Address,
        owners: &[Address],
        operator: Address,
    ) -> Result<Vec<bool>, ChainError>;

    /// Order hashes emitted by `contract` in the inclusive block range
    async fn order_events(
        &self,
        contract: Address,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<B256>, ChainError>;

    async fn matched_orders(
        &self,
        contract: Address,
        order_hashes: &[B256],
    ) -> Result<Vec<MatchedOrderInfo>, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn balance(&self, account: Address) -> Result<U256, ChainError>;
}

#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// The signing account
    fn signer(&self) -> Address;

    /// Dry-run the call against latest state; a revert is an error
    async fn simulate(&self, call: &ContractCall) -> Result<(), ChainError>;

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    async fn submit(&self, call: &ContractCall, opts: &TxOptions) -> Result<B256, ChainError>;

    /// Wait until the transaction has `confirmations` confirmations. A mined
    /// but reverted transaction is `ChainError::Reverted`.
    async fn wait_for_confirmation(
        &self,
        tx_hash: B256,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError>;
}
