//! Stake Scanner
//!
//! Reads every staking record held by a collection's collateral wrapper,
//! classifies it by pool kind, and attaches the effective owner:
//!   - Solo: owner of the staked token on the wrapper
//!   - Paired: owner of the *primary* token on the wrapper
//!
//! Paired positions are only kept when the BAKC side lines up with the primary
//! owner (direct or through the nBAKC wrapper) and the BAKC owner has approved
//! the lending pool. A mismatch drops the position; a failed read fails the scan.
//!
//! Created: 2026-10-06

use super::owner_resolver::OwnerResolver;
use crate::chain::{ChainReader, RawStake};
use crate::config::BotConfig;
use crate::error::ScanError;
use crate::types::{Collection, PoolKind, StakedPosition, TokenId};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Positions found for one collection, in ledger order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionScan {
    pub solo: Vec<StakedPosition>,
    pub paired: Vec<StakedPosition>,
}

/// Contract addresses and switches the scanner needs, lifted out of `BotConfig`
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub pool: Address,
    pub bakc: Address,
    pub nbakc: Option<Address>,
    pub compound_paired: bool,
    pub accept_wrapper_owner: bool,
}

impl ScanSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            pool: config.contracts.pool,
            bakc: config.contracts.bakc,
            nbakc: config.contracts.nbakc,
            compound_paired: config.scan.compound_paired,
            accept_wrapper_owner: config.scan.paired_accept_wrapper_owner,
        }
    }
}

pub struct StakeScanner {
    reader: Arc<dyn ChainReader>,
    resolver: OwnerResolver,
    settings: ScanSettings,
}

fn token_id(raw: U256) -> Result<TokenId, ScanError> {
    TokenId::try_from(raw).map_err(|_| ScanError::TokenIdOverflow(raw))
}

impl StakeScanner {
    pub fn new(reader: Arc<dyn ChainReader>, chunk_size: usize, settings: ScanSettings) -> Self {
        Self {
            resolver: OwnerResolver::new(reader.clone(), chunk_size),
            reader,
            settings,
        }
    }

    /// Scan all positions staked through `ntoken`
    pub async fn scan(
        &self,
        collection: Collection,
        ntoken: Address,
    ) -> Result<CollectionScan, ScanError> {
        let stakes = self
            .reader
            .all_stakes(ntoken)
            .await
            .map_err(|source| ScanError::StakeRead {
                staker: ntoken,
                source,
            })?;

        let mut solo_raw = Vec::new();
        let mut paired_raw = Vec::new();
        for stake in stakes {
            match PoolKind::classify(stake.pool_id) {
                Some(PoolKind::Solo) => solo_raw.push(stake),
                Some(PoolKind::Paired) if self.settings.compound_paired => paired_raw.push(stake),
                _ => {}
            }
        }

        let solo = self.resolve_solo(ntoken, &solo_raw).await?;
        let paired = self.resolve_paired(ntoken, &paired_raw).await?;

        debug!(
            "{}: {} solo / {} paired positions (of {} paired records)",
            collection,
            solo.len(),
            paired.len(),
            paired_raw.len()
        );
        Ok(CollectionScan { solo, paired })
    }

    async fn resolve_solo(
        &self,
        ntoken: Address,
        stakes: &[RawStake],
    ) -> Result<Vec<StakedPosition>, ScanError> {
        let ids = stakes
            .iter()
            .map(|s| token_id(s.token_id))
            .collect::<Result<Vec<_>, _>>()?;
        let owners = self.resolver.owners(ntoken, &ids).await?;

        Ok(stakes
            .iter()
            .zip(ids)
            .zip(owners)
            .map(|((stake, id), owner)| StakedPosition::solo(id, owner, stake.unclaimed))
            .collect())
    }

    async fn resolve_paired(
        &self,
        ntoken: Address,
        stakes: &[RawStake],
    ) -> Result<Vec<StakedPosition>, ScanError> {
        if stakes.is_empty() {
            return Ok(Vec::new());
        }
        let bakc_ids = stakes
            .iter()
            .map(|s| token_id(s.token_id))
            .collect::<Result<Vec<_>, _>>()?;
        let main_ids = stakes
            .iter()
            .map(|s| token_id(s.main_token_id))
            .collect::<Result<Vec<_>, _>>()?;

        let main_owners = self.resolver.owners(ntoken, &main_ids).await?;
        let bakc_owners = self.resolver.owners(self.settings.bakc, &bakc_ids).await?;
        let wrapper_owners = match self.settings.nbakc {
            Some(nbakc) if self.settings.accept_wrapper_owner => {
                Some(self.resolver.try_owners(nbakc, &bakc_ids).await?)
            }
            _ => None,
        };
        let approved = self
            .resolver
            .approvals(self.settings.bakc, &bakc_owners, self.settings.pool)
            .await?;

        let mut positions = Vec::with_capacity(stakes.len());
        for (i, stake) in stakes.iter().enumerate() {
            let main_owner = main_owners[i];
            let owner_matches = main_owner == bakc_owners[i]
                || wrapper_owners
                    .as_ref()
                    .is_some_and(|w| w[i] == Some(main_owner));

            if !owner_matches {
                debug!(
                    "Dropping BAKC #{}: primary #{} owner {} does not hold it",
                    bakc_ids[i], main_ids[i], main_owner
                );
                continue;
            }
            if !approved[i] {
                debug!(
                    "Dropping BAKC #{}: owner {} has not approved the pool",
                    bakc_ids[i], bakc_owners[i]
                );
                continue;
            }
            positions.push(StakedPosition::paired(
                bakc_ids[i],
                main_ids[i],
                main_owner,
                stake.unclaimed,
            ));
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, ape, bakc_stake, solo_stake, MockChain};
    use crate::types::pool_id;

    const NBAYC: u8 = 0xB1;
    const BAKC: u8 = 0xBA;
    const NBAKC: u8 = 0xBB;
    const POOL: u8 = 0x99;

    fn settings() -> ScanSettings {
        ScanSettings {
            pool: addr(POOL),
            bakc: addr(BAKC),
            nbakc: Some(addr(NBAKC)),
            compound_paired: true,
            accept_wrapper_owner: true,
        }
    }

    fn scanner(chain: MockChain, settings: ScanSettings) -> StakeScanner {
        StakeScanner::new(Arc::new(chain), 1000, settings)
    }

    #[tokio::test]
    async fn test_solo_positions_get_wrapper_owner() {
        let chain = MockChain::new()
            .with_stakes(
                addr(NBAYC),
                vec![
                    solo_stake(pool_id::APE, 0, ape(5)),
                    solo_stake(pool_id::BAYC, 11, ape(150)),
                    solo_stake(pool_id::BAYC, 12, ape(20)),
                ],
            )
            .with_owner(addr(NBAYC), 11, addr(1))
            .with_owner(addr(NBAYC), 12, addr(2));

        let scan = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();

        assert_eq!(
            scan.solo,
            vec![
                StakedPosition::solo(11, addr(1), ape(150)),
                StakedPosition::solo(12, addr(2), ape(20)),
            ]
        );
        assert!(scan.paired.is_empty());
    }

    #[tokio::test]
    async fn test_paired_owned_directly_and_approved_is_kept() {
        let user = addr(1);
        let chain = MockChain::new()
            .with_stakes(addr(NBAYC), vec![bakc_stake(7, 11, pool_id::BAYC, ape(30))])
            .with_owner(addr(NBAYC), 11, user)
            .with_owner(addr(BAKC), 7, user)
            .with_approval(addr(BAKC), user, addr(POOL));

        let scan = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();

        assert_eq!(scan.paired, vec![StakedPosition::paired(7, 11, user, ape(30))]);
    }

    fn wrapped_bakc_chain() -> MockChain {
        let user = addr(1);
        // BAKC itself sits in the wrapper; the wrapper token belongs to the user
        MockChain::new()
            .with_stakes(addr(NBAYC), vec![bakc_stake(7, 11, pool_id::BAYC, ape(30))])
            .with_owner(addr(NBAYC), 11, user)
            .with_owner(addr(BAKC), 7, addr(NBAKC))
            .with_owner(addr(NBAKC), 7, user)
            .with_approval(addr(BAKC), addr(NBAKC), addr(POOL))
    }

    #[tokio::test]
    async fn test_paired_held_through_wrapper_is_kept() {
        let scan = scanner(wrapped_bakc_chain(), settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();
        assert_eq!(scan.paired, vec![StakedPosition::paired(7, 11, addr(1), ape(30))]);
    }

    #[tokio::test]
    async fn test_reverted_wrapper_read_is_no_match() {
        let mut chain = wrapped_bakc_chain()
            .with_stakes(
                addr(NBAYC),
                vec![
                    bakc_stake(7, 11, pool_id::BAYC, ape(30)),
                    bakc_stake(8, 12, pool_id::BAYC, ape(40)),
                    bakc_stake(9, 13, pool_id::BAYC, ape(50)),
                ],
            )
            // #8 held directly, never wrapped
            .with_owner(addr(NBAYC), 12, addr(2))
            .with_owner(addr(BAKC), 8, addr(2))
            .with_approval(addr(BAKC), addr(2), addr(POOL))
            // #9 sits in the wrapper but its wrapper token cannot be read
            .with_owner(addr(NBAYC), 13, addr(3))
            .with_owner(addr(BAKC), 9, addr(NBAKC));
        chain.reverting_owner_reads.insert((addr(NBAKC), 8));
        chain.reverting_owner_reads.insert((addr(NBAKC), 9));

        let scan = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();

        assert_eq!(
            scan.paired,
            vec![
                StakedPosition::paired(7, 11, addr(1), ape(30)),
                StakedPosition::paired(8, 12, addr(2), ape(40)),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrapper_owner_rejected_when_disabled() {
        let strict = ScanSettings {
            accept_wrapper_owner: false,
            ..settings()
        };
        let scan = scanner(wrapped_bakc_chain(), strict)
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();
        assert!(scan.paired.is_empty());
    }

    #[tokio::test]
    async fn test_paired_owner_mismatch_is_dropped() {
        let chain = MockChain::new()
            .with_stakes(
                addr(NBAYC),
                vec![
                    bakc_stake(7, 11, pool_id::BAYC, ape(30)),
                    bakc_stake(8, 12, pool_id::BAYC, ape(30)),
                ],
            )
            .with_owner(addr(NBAYC), 11, addr(1))
            .with_owner(addr(NBAYC), 12, addr(2))
            .with_owner(addr(BAKC), 7, addr(3))
            .with_owner(addr(BAKC), 8, addr(2))
            .with_approval(addr(BAKC), addr(3), addr(POOL))
            .with_approval(addr(BAKC), addr(2), addr(POOL));

        let scan = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();

        assert_eq!(scan.paired, vec![StakedPosition::paired(8, 12, addr(2), ape(30))]);
    }

    #[tokio::test]
    async fn test_paired_without_approval_is_dropped() {
        let user = addr(1);
        let chain = MockChain::new()
            .with_stakes(addr(NBAYC), vec![bakc_stake(7, 11, pool_id::BAYC, ape(30))])
            .with_owner(addr(NBAYC), 11, user)
            .with_owner(addr(BAKC), 7, user);

        let scan = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();
        assert!(scan.paired.is_empty());
    }

    #[tokio::test]
    async fn test_owner_read_error_fails_scan() {
        let mut chain = MockChain::new()
            .with_stakes(addr(NBAYC), vec![bakc_stake(7, 11, pool_id::BAYC, ape(30))])
            .with_owner(addr(NBAYC), 11, addr(1));
        chain.failing_owner_reads.insert(addr(BAKC));

        let err = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::OwnerRead { contract, .. } if contract == addr(BAKC)));
    }

    #[tokio::test]
    async fn test_paired_skipped_when_disabled() {
        let chain = MockChain::new()
            .with_stakes(addr(NBAYC), vec![bakc_stake(7, 11, pool_id::BAYC, ape(30))]);
        let off = ScanSettings {
            compound_paired: false,
            ..settings()
        };

        let scan = scanner(chain, off)
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap();
        assert!(scan.paired.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_token_id_is_an_error() {
        let mut stake = solo_stake(pool_id::BAYC, 0, ape(1));
        stake.token_id = U256::from(u64::MAX);
        let chain = MockChain::new().with_stakes(addr(NBAYC), vec![stake]);

        let err = scanner(chain, settings())
            .scan(Collection::Bayc, addr(NBAYC))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::TokenIdOverflow(_)));
    }
}
