//! EIP-1559 fee policy
//!
//! Bounded `max_fee_per_gas` derived from the current gas price. On mainnet
//! the fee tracks the market with a 1 gwei margin but is clamped into two
//! steps so a gas spike never makes the bot overpay. Testnets use a flat fee.

use crate::config::Network;

pub const GWEI: u128 = 1_000_000_000;

/// Fee caps applied on mainnet
const MAINNET_HIGH_CAP: u128 = 30 * GWEI;
const MAINNET_LOW_CAP: u128 = 25 * GWEI;
const MARGIN: u128 = GWEI;

/// Flat fee used on every other network
const TESTNET_MAX_FEE: u128 = 30 * GWEI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    network: Network,
    priority_fee: u128,
}

impl FeePolicy {
    pub fn new(network: Network, priority_fee_gwei: u64) -> Self {
        Self {
            network,
            priority_fee: u128::from(priority_fee_gwei) * GWEI,
        }
    }

    pub fn max_fee_per_gas(&self, gas_price: u128) -> u128 {
        if !self.network.is_mainnet() {
            return TESTNET_MAX_FEE;
        }
        if gas_price >= MAINNET_HIGH_CAP {
            MAINNET_HIGH_CAP
        } else if gas_price >= MAINNET_LOW_CAP {
            MAINNET_LOW_CAP
        } else {
            gas_price + MARGIN
        }
    }

    /// Priority fee, never above the max fee it is paired with
    pub fn max_priority_fee_per_gas(&self, max_fee_per_gas: u128) -> u128 {
        self.priority_fee.min(max_fee_per_gas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_tracks_gas_price_with_margin() {
        let policy = FeePolicy::new(Network::Mainnet, 1);
        assert_eq!(policy.max_fee_per_gas(12 * GWEI), 13 * GWEI);
    }

    #[test]
    fn test_mainnet_step_caps() {
        let policy = FeePolicy::new(Network::Mainnet, 1);
        assert_eq!(policy.max_fee_per_gas(25 * GWEI), 25 * GWEI);
        assert_eq!(policy.max_fee_per_gas(29 * GWEI), 25 * GWEI);
        assert_eq!(policy.max_fee_per_gas(30 * GWEI), 30 * GWEI);
        assert_eq!(policy.max_fee_per_gas(300 * GWEI), 30 * GWEI);
        // just under the low step still gets the margin
        assert_eq!(policy.max_fee_per_gas(24 * GWEI + 1), 25 * GWEI + 1);
    }

    #[test]
    fn test_fork_counts_as_mainnet() {
        let policy = FeePolicy::new(Network::ForkMainnet, 1);
        assert_eq!(policy.max_fee_per_gas(5 * GWEI), 6 * GWEI);
    }

    #[test]
    fn test_testnet_flat_fee() {
        let policy = FeePolicy::new(Network::Goerli, 1);
        assert_eq!(policy.max_fee_per_gas(1), 30 * GWEI);
        assert_eq!(policy.max_fee_per_gas(500 * GWEI), 30 * GWEI);
    }

    #[test]
    fn test_priority_fee_bounded_by_max_fee() {
        let policy = FeePolicy::new(Network::Mainnet, 1);
        assert_eq!(policy.max_priority_fee_per_gas(13 * GWEI), GWEI);
        assert_eq!(policy.max_priority_fee_per_gas(GWEI / 2), GWEI / 2);
    }
}
