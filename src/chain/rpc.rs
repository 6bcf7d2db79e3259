//! alloy-backed chain reader/writer
//!
//! Batched reads (ownerOf, isApprovedForAll, matchedOrders) go through a single
//! Multicall3 `aggregate3` eth_call per chunk with `allowFailure = false`, so
//! one failing sub-call fails the whole chunk. `try_owners_of` is the
//! exception: it allows failure and reports a reverted read as `None`. Writes go through the provider's
//! wallet filler; the provider passed in must be built with `.wallet(...)`.
//!
//! Created: 2026-10-04

use super::{
    ChainReader, ChainWriter, ContractCall, MatchedOrderInfo, OrderEventKind, RawStake, TxOptions,
};
use crate::config::ContractsConfig;
use crate::contracts::{IApeCoinStaking, IERC721, IMulticall3, IP2PPairStaking};
use crate::error::ChainError;
use crate::types::{Confirmation, TokenId};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{PendingTransactionBuilder, PendingTransactionError, Provider, WatchTxError};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub struct RpcChain<P> {
    provider: P,
    signer: Address,
    multicall: Address,
    staking_ledger: Address,
}

impl<P: Provider> RpcChain<P> {
    pub fn new(provider: P, signer: Address, contracts: &ContractsConfig) -> Self {
        Self {
            provider,
            signer,
            multicall: contracts.multicall,
            staking_ledger: contracts.ape_coin_staking,
        }
    }

    fn request(&self, call: &ContractCall) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.signer)
            .with_to(call.to)
            .with_input(call.calldata.clone())
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(tx).await.map_err(classify)
    }

    /// Run `calls` through Multicall3, one result per call
    async fn aggregate3(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();
        let data = IMulticall3::aggregate3Call { calls }.abi_encode();
        let raw = self.eth_call(self.multicall, data).await?;
        let results =
            IMulticall3::aggregate3Call::abi_decode_returns(&raw).map_err(ChainError::decode)?;

        if results.len() != expected {
            return Err(ChainError::Decode(format!(
                "multicall returned {} results, expected {}",
                results.len(),
                expected
            )));
        }
        Ok(results)
    }

    /// Return data of every sub-call; any failed sub-call fails the batch
    async fn aggregate(&self, calls: Vec<IMulticall3::Call3>) -> Result<Vec<Bytes>, ChainError> {
        self.aggregate3(calls)
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                if r.success {
                    Ok(r.returnData)
                } else {
                    Err(ChainError::Reverted(format!("multicall sub-call {} failed", i)))
                }
            })
            .collect()
    }
}

fn sub_call(target: Address, data: Vec<u8>) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: false,
        callData: data.into(),
    }
}

fn lenient_sub_call(target: Address, data: Vec<u8>) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        allowFailure: true,
        ..sub_call(target, data)
    }
}

fn owner_of_call(token: Address, id: TokenId, lenient: bool) -> IMulticall3::Call3 {
    let data = IERC721::ownerOfCall { tokenId: U256::from(id) }.abi_encode();
    if lenient {
        lenient_sub_call(token, data)
    } else {
        sub_call(token, data)
    }
}

/// Owner per sub-call result; a reverted or undecodable read is `None`
fn decode_owners(results: Vec<IMulticall3::Result>) -> Vec<Option<Address>> {
    results
        .into_iter()
        .map(|r| {
            r.success
                .then(|| IERC721::ownerOfCall::abi_decode_returns(&r.returnData).ok())
                .flatten()
        })
        .collect()
}

fn to_u64(value: U256) -> Result<u64, ChainError> {
    u64::try_from(value).map_err(ChainError::decode)
}

/// Map a transport error onto the chain error taxonomy. Node revert messages
/// are not structured, so this goes by the message text.
fn classify(err: impl std::fmt::Display) -> ChainError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("revert") {
        ChainError::Reverted(msg)
    } else {
        ChainError::Rpc(msg)
    }
}

#[async_trait]
impl<P: Provider> ChainReader for RpcChain<P> {
    async fn all_stakes(&self, staker: Address) -> Result<Vec<RawStake>, ChainError> {
        let data = IApeCoinStaking::getAllStakesCall { _address: staker }.abi_encode();
        let raw = self.eth_call(self.staking_ledger, data).await?;
        let stakes = IApeCoinStaking::getAllStakesCall::abi_decode_returns(&raw)
            .map_err(ChainError::decode)?;

        stakes
            .into_iter()
            .map(|s| {
                Ok(RawStake {
                    pool_id: to_u64(s.poolId)?,
                    token_id: s.tokenId,
                    unclaimed: s.unclaimed,
                    main_token_id: s.pair.mainTokenId,
                    main_type_pool_id: to_u64(s.pair.mainTypePoolId)?,
                })
            })
            .collect()
    }

    async fn owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Address>, ChainError> {
        let calls = token_ids.iter().map(|id| owner_of_call(token, *id, false)).collect();

        self.aggregate(calls)
            .await?
            .iter()
            .map(|data| IERC721::ownerOfCall::abi_decode_returns(data).map_err(ChainError::decode))
            .collect()
    }

    async fn try_owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Option<Address>>, ChainError> {
        let calls = token_ids.iter().map(|id| owner_of_call(token, *id, true)).collect();
        let owners = decode_owners(self.aggregate3(calls).await?);
        let missing = owners.iter().filter(|o| o.is_none()).count();
        if missing > 0 {
            debug!("{} of {} ownerOf reads on {} failed", missing, owners.len(), token);
        }
        Ok(owners)
    }

    async fn approvals_for_all(
        &self,
        token: Address,
        owners: &[Address],
        operator: Address,
    ) -> Result<Vec<bool>, ChainError> {
        let calls = owners
            .iter()
            .map(|owner| {
                sub_call(
                    token,
                    IERC721::isApprovedForAllCall { owner: *owner, operator }.abi_encode(),
                )
            })
            .collect();

        self.aggregate(calls)
            .await?
            .iter()
            .map(|data| {
                IERC721::isApprovedForAllCall::abi_decode_returns(data).map_err(ChainError::decode)
            })
            .collect()
    }

    async fn order_events(
        &self,
        contract: Address,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<B256>, ChainError> {
        let topic = match kind {
            OrderEventKind::Matched => IP2PPairStaking::PairStakingMatched::SIGNATURE_HASH,
            OrderEventKind::BrokenUp => IP2PPairStaking::PairStakingBreakUp::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(contract)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(classify)?;
        debug!("{:?} events in blocks {}-{}: {}", kind, from_block, to_block, logs.len());

        logs.iter()
            .map(|log| match kind {
                OrderEventKind::Matched => log
                    .log_decode::<IP2PPairStaking::PairStakingMatched>()
                    .map(|l| l.inner.data.orderHash),
                OrderEventKind::BrokenUp => log
                    .log_decode::<IP2PPairStaking::PairStakingBreakUp>()
                    .map(|l| l.inner.data.orderHash),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(ChainError::decode)
    }

    async fn matched_orders(
        &self,
        contract: Address,
        order_hashes: &[B256],
    ) -> Result<Vec<MatchedOrderInfo>, ChainError> {
        let calls = order_hashes
            .iter()
            .map(|hash| {
                sub_call(
                    contract,
                    IP2PPairStaking::matchedOrdersCall { orderHash: *hash }.abi_encode(),
                )
            })
            .collect();

        self.aggregate(calls)
            .await?
            .iter()
            .map(|data| {
                let order = IP2PPairStaking::matchedOrdersCall::abi_decode_returns(data)
                    .map_err(ChainError::decode)?;
                Ok(MatchedOrderInfo {
                    staking_type: order.stakingType,
                    ape_token: order.apeToken,
                    ape_token_id: order.apeTokenId,
                    bakc_token_id: order.bakcTokenId,
                    ape_principle_amount: order.apePrincipleAmount,
                })
            })
            .collect()
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(classify)
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        self.provider.get_balance(account).await.map_err(classify)
    }
}

#[async_trait]
impl<P: Provider> ChainWriter for RpcChain<P> {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn simulate(&self, call: &ContractCall) -> Result<(), ChainError> {
        self.provider
            .call(self.request(call))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64, ChainError> {
        self.provider
            .estimate_gas(self.request(call))
            .await
            .map_err(classify)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.provider.get_gas_price().await.map_err(classify)
    }

    async fn submit(&self, call: &ContractCall, opts: &TxOptions) -> Result<B256, ChainError> {
        let tx = self
            .request(call)
            .with_gas_limit(opts.gas_limit)
            .with_max_fee_per_gas(opts.max_fee_per_gas)
            .with_max_priority_fee_per_gas(opts.max_priority_fee_per_gas);

        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: B256,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(confirmations)
            .with_timeout(Some(timeout))
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    ChainError::Timeout(format!("{} confirmations of {}", confirmations, tx_hash))
                }
                other => classify(other),
            })?;

        if !receipt.status() {
            return Err(ChainError::Reverted(format!(
                "transaction {} reverted in block {:?}",
                tx_hash, receipt.block_number
            )));
        }

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            block_number: receipt.block_number,
        })
    }
}
