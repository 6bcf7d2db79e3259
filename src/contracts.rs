//! Centralized Contract Definitions
//!
//! Solidity interfaces the harvester talks to, defined with alloy's `sol!`
//! macro. Reads go through Multicall3 `aggregate3`, so most interfaces here
//! are only used for ABI encoding/decoding of individual sub-calls.
//!
//! Created: 2026-10-03

use alloy::sol;

// ── Multicall3 ────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

// ── ApeCoin staking ledger ────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IApeCoinStaking {
        struct DashboardPair {
            uint256 mainTokenId;
            uint256 mainTypePoolId;
        }

        struct DashboardStake {
            uint256 poolId;
            uint256 tokenId;
            uint256 deposited;
            uint256 unclaimed;
            uint256 rewards24hr;
            DashboardPair pair;
        }

        function getAllStakes(address _address) external view returns (DashboardStake[] memory);
    }
}

// ── ERC721 (collections and their collateral wrappers) ───────────────

sol! {
    #[sol(rpc)]
    interface IERC721 {
        function ownerOf(uint256 tokenId) external view returns (address owner);
        function isApprovedForAll(address owner, address operator) external view returns (bool);
    }
}

// ── Lending pool claim-and-compound entry points ─────────────────────

sol! {
    #[sol(rpc)]
    interface IPoolApeStaking {
        struct PairNft {
            uint128 mainTokenId;
            uint128 bakcTokenId;
        }

        function claimApeAndCompound(address nftAsset, address[] calldata users, uint32[][] calldata tokenIds) external;
        function claimPairedApeAndCompound(address nftAsset, address[] calldata users, PairNft[][] calldata _nftPairs) external;
    }
}

// ── P2P pair staking ──────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IP2PPairStaking {
        event PairStakingMatched(bytes32 orderHash);
        event PairStakingBreakUp(bytes32 orderHash);

        function matchedOrders(bytes32 orderHash) external view returns (
            uint8 stakingType,
            address apeToken,
            uint32 apeTokenId,
            uint32 apeShare,
            uint32 bakcTokenId,
            uint32 bakcShare,
            address apeCoinOfferer,
            uint32 apeCoinShare,
            uint256 apePrincipleAmount,
            bytes32 apeCoinListingOrderHash
        );

        function claimForMatchedOrderAndCompound(bytes32[] calldata orderHashes) external;
    }
}
