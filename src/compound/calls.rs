//! Claim-and-compound calldata

use crate::chain::ContractCall;
use crate::contracts::{IP2PPairStaking, IPoolApeStaking};
use crate::types::{BatchItems, CompoundBatch, MatchedOrder};
use alloy::primitives::Address;
use alloy::sol_types::SolCall;

pub const CLAIM_SOLO: &str = "claimApeAndCompound";
pub const CLAIM_PAIRED: &str = "claimPairedApeAndCompound";
pub const CLAIM_ORDERS: &str = "claimForMatchedOrderAndCompound";

/// Pool call for one position batch; the entry point follows the batch's pool kind
pub fn compound_call(pool: Address, batch: &CompoundBatch) -> ContractCall {
    match &batch.items {
        BatchItems::Solo { token_ids } => ContractCall {
            to: pool,
            calldata: IPoolApeStaking::claimApeAndCompoundCall {
                nftAsset: batch.nft_asset,
                users: batch.owners.clone(),
                tokenIds: token_ids.clone(),
            }
            .abi_encode()
            .into(),
            method: CLAIM_SOLO,
        },
        BatchItems::Paired { pairs } => ContractCall {
            to: pool,
            calldata: IPoolApeStaking::claimPairedApeAndCompoundCall {
                nftAsset: batch.nft_asset,
                users: batch.owners.clone(),
                _nftPairs: pairs
                    .iter()
                    .map(|owner_pairs| {
                        owner_pairs
                            .iter()
                            .map(|p| IPoolApeStaking::PairNft {
                                mainTokenId: u128::from(p.main_token_id),
                                bakcTokenId: u128::from(p.bakc_token_id),
                            })
                            .collect()
                    })
                    .collect(),
            }
            .abi_encode()
            .into(),
            method: CLAIM_PAIRED,
        },
    }
}

pub fn order_call(p2p: Address, orders: &[MatchedOrder]) -> ContractCall {
    ContractCall {
        to: p2p,
        calldata: IP2PPairStaking::claimForMatchedOrderAndCompoundCall {
            orderHashes: orders.iter().map(|o| o.order_hash).collect(),
        }
        .abi_encode()
        .into(),
        method: CLAIM_ORDERS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::addr;
    use crate::types::{Collection, PairNft, PoolKind};
    use alloy::primitives::U256;

    #[test]
    fn test_solo_batch_encodes_claim_ape_and_compound() {
        let batch = CompoundBatch {
            collection: Collection::Bayc,
            pool_kind: PoolKind::Solo,
            nft_asset: addr(0xB1),
            owners: vec![addr(1), addr(2)],
            items: BatchItems::Solo {
                token_ids: vec![vec![1, 2], vec![3]],
            },
            pending_reward: U256::ZERO,
        };
        let call = compound_call(addr(0x99), &batch);

        assert_eq!(call.to, addr(0x99));
        assert_eq!(call.method, CLAIM_SOLO);
        let decoded = IPoolApeStaking::claimApeAndCompoundCall::abi_decode(&call.calldata).unwrap();
        assert_eq!(decoded.nftAsset, addr(0xB1));
        assert_eq!(decoded.users, vec![addr(1), addr(2)]);
        assert_eq!(decoded.tokenIds, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_paired_batch_encodes_pairs() {
        let batch = CompoundBatch {
            collection: Collection::Mayc,
            pool_kind: PoolKind::Paired,
            nft_asset: addr(0xB2),
            owners: vec![addr(1)],
            items: BatchItems::Paired {
                pairs: vec![vec![PairNft { main_token_id: 11, bakc_token_id: 7 }]],
            },
            pending_reward: U256::ZERO,
        };
        let call = compound_call(addr(0x99), &batch);

        assert_eq!(call.method, CLAIM_PAIRED);
        let decoded =
            IPoolApeStaking::claimPairedApeAndCompoundCall::abi_decode(&call.calldata).unwrap();
        assert_eq!(decoded._nftPairs[0][0].mainTokenId, 11);
        assert_eq!(decoded._nftPairs[0][0].bakcTokenId, 7);
    }
}
