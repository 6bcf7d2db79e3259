//! Configuration management
//!
//! Settings come from a TOML file (contracts, thresholds, batching, schedule)
//! and secrets from the environment / `.env` file. Everything is resolved once
//! at startup into an immutable `BotConfig` that components borrow.
//!
//! Created: 2026-10-03
//! Modified: 2026-10-09 - Per-network threshold tables, per-collection batch caps
//! Modified: 2026-10-18 - Paired thresholds per primary collection, page severities

use crate::alert::Severity;
use crate::error::ConfigError;
use crate::types::{Collection, PoolKind, StakingType};
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Multicall3 deployed address (same on all EVM chains)
pub const MULTICALL3_ADDRESS: Address =
    alloy::primitives::address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Networks the bot knows how to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    ForkMainnet,
    Goerli,
    Sepolia,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::ForkMainnet => "fork_mainnet",
            Network::Goerli => "goerli",
            Network::Sepolia => "sepolia",
        }
    }

    /// Fork-mainnet counts as mainnet for fee policy purposes
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet | Network::ForkMainnet)
    }

    /// Block explorer link for a transaction, or the bare hash when the
    /// network has no public explorer
    pub fn tx_link(&self, tx_hash: &str) -> String {
        match self {
            Network::Mainnet => format!("https://etherscan.io/tx/{}", tx_hash),
            Network::Goerli => format!("https://goerli.etherscan.io/tx/{}", tx_hash),
            Network::Sepolia => format!("https://sepolia.etherscan.io/tx/{}", tx_hash),
            Network::ForkMainnet => tx_hash.to_string(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "fork_mainnet" => Ok(Network::ForkMainnet),
            "goerli" => Ok(Network::Goerli),
            "sepolia" => Ok(Network::Sepolia),
            other => bail!(
                "Unsupported network: '{}'. Supported: mainnet, fork_mainnet, goerli, sepolia",
                other
            ),
        }
    }
}

// ── File format ─────────────────────────────────────────────────────────

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub network: Network,
    pub contracts: ContractsConfig,
    pub collections: HashMap<Collection, CollectionConfig>,
    /// Reward thresholds keyed by network name
    pub thresholds: HashMap<String, ThresholdTable>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub p2p: P2pConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    /// Lending pool exposing the claim-and-compound entry points
    pub pool: Address,
    pub ape_coin_staking: Address,
    pub bakc: Address,
    /// BAKC collateral wrapper; when set, a BAKC held through the wrapper by
    /// the primary owner also passes paired validation
    pub nbakc: Option<Address>,
    /// P2P pair staking; the matched-order path is skipped when unset
    pub p2p_pair_staking: Option<Address>,
    #[serde(default = "default_multicall")]
    pub multicall: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Underlying collection (the claim call's `nftAsset`)
    pub asset: Address,
    /// Collateral wrapper that holds the stakes
    pub ntoken: Address,
}

/// Thresholds for one network, in whole reward-token units (e.g. "120" APE)
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdTable {
    pub bayc_token: String,
    pub bayc_owner: String,
    pub mayc_token: String,
    pub mayc_owner: String,
    #[serde(default = "default_threshold")]
    pub bakc_token: String,
    #[serde(default = "default_threshold")]
    pub bakc_owner: String,
    /// BAKC paired with BAYC; falls back to `bakc_token` / `bakc_owner`
    pub bayc_paired_token: Option<String>,
    pub bayc_paired_owner: Option<String>,
    /// BAKC paired with MAYC; falls back to `bakc_token` / `bakc_owner`
    pub mayc_paired_token: Option<String>,
    pub mayc_paired_owner: Option<String>,
    #[serde(default = "default_threshold")]
    pub p2p_bayc_token: String,
    #[serde(default = "default_threshold")]
    pub p2p_mayc_token: String,
    #[serde(default = "default_threshold")]
    pub p2p_bakc_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Harvest BAKC paired positions as well as solo ones
    #[serde(default = "default_true")]
    pub compound_paired: bool,
    /// Accept a BAKC held through the nBAKC wrapper by the primary owner
    #[serde(default = "default_true")]
    pub paired_accept_wrapper_owner: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Max flattened tokens per claim transaction
    #[serde(default = "default_batch_limit")]
    pub limit: usize,
    /// Per-collection overrides of `limit`
    #[serde(default)]
    pub collection_limits: HashMap<Collection, usize>,
    /// Max matched orders per transaction
    #[serde(default = "default_order_limit")]
    pub order_limit: usize,
    /// Max ownerOf calls per multicall round-trip
    #[serde(default = "default_owner_chunk")]
    pub owner_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub skip_simulation: bool,
    #[serde(default)]
    pub force_gas_limit: bool,
    #[serde(default = "default_forced_gas_limit")]
    pub forced_gas_limit: u64,
    /// Absolute gas added on top of every estimate
    #[serde(default = "default_gas_padding")]
    pub gas_padding: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_order_confirmations")]
    pub order_confirmations: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_priority_fee")]
    pub priority_fee_gwei: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// UTC hour in which a run is eligible
    #[serde(default = "default_run_hour")]
    pub run_hour_utc: u32,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Consecutive failed runs tolerated before paging
    #[serde(default = "default_failure_budget")]
    pub failure_budget: u32,
    /// Minimum operating balance, in ether
    #[serde(default = "default_min_balance")]
    pub min_balance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct P2pConfig {
    /// First block to scan for matched-order events, per network name
    #[serde(default)]
    pub start_blocks: HashMap<String, u64>,
    #[serde(default = "default_block_range")]
    pub block_range: u64,
    #[serde(default = "default_range_concurrency")]
    pub range_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_true")]
    pub page_on_batch_failure: bool,
    #[serde(default = "default_severity")]
    pub batch_failure_severity: Severity,
    /// Severity of the page raised when the failure budget runs out
    #[serde(default = "default_severity")]
    pub exhaustion_severity: Severity,
}

fn default_multicall() -> Address {
    MULTICALL3_ADDRESS
}

fn default_threshold() -> String {
    "0".to_string()
}

fn default_batch_limit() -> usize {
    150
}

fn default_order_limit() -> usize {
    10
}

fn default_owner_chunk() -> usize {
    1000
}

fn default_forced_gas_limit() -> u64 {
    10_000_000
}

fn default_gas_padding() -> u64 {
    100_000
}

fn default_confirmations() -> u64 {
    2
}

fn default_order_confirmations() -> u64 {
    1
}

fn default_confirmation_timeout() -> u64 {
    600
}

fn default_priority_fee() -> u64 {
    1
}

fn default_run_hour() -> u32 {
    7
}

fn default_scan_interval() -> u64 {
    600
}

fn default_failure_budget() -> u32 {
    5
}

fn default_min_balance() -> String {
    "0.2".to_string()
}

fn default_block_range() -> u64 {
    1500
}

fn default_range_concurrency() -> usize {
    5
}

fn default_app_name() -> String {
    "ape-compound-bot".to_string()
}

fn default_true() -> bool {
    true
}

fn default_severity() -> Severity {
    Severity::Critical
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            compound_paired: true,
            paired_accept_wrapper_owner: true,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit: default_batch_limit(),
            collection_limits: HashMap::new(),
            order_limit: default_order_limit(),
            owner_chunk_size: default_owner_chunk(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            skip_simulation: false,
            force_gas_limit: false,
            forced_gas_limit: default_forced_gas_limit(),
            gas_padding: default_gas_padding(),
            confirmations: default_confirmations(),
            order_confirmations: default_order_confirmations(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            priority_fee_gwei: default_priority_fee(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_hour_utc: default_run_hour(),
            scan_interval_secs: default_scan_interval(),
            failure_budget: default_failure_budget(),
            min_balance: default_min_balance(),
        }
    }
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            start_blocks: HashMap::new(),
            block_range: default_block_range(),
            range_concurrency: default_range_concurrency(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            page_on_batch_failure: true,
            batch_failure_severity: default_severity(),
            exhaustion_severity: default_severity(),
        }
    }
}

// ── Resolved configuration ──────────────────────────────────────────────

/// Reward thresholds for the active network, in wei
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardThresholds {
    pub bayc_token: U256,
    pub bayc_owner: U256,
    pub mayc_token: U256,
    pub mayc_owner: U256,
    pub bayc_paired_token: U256,
    pub bayc_paired_owner: U256,
    pub mayc_paired_token: U256,
    pub mayc_paired_owner: U256,
    pub p2p_bayc_token: U256,
    pub p2p_mayc_token: U256,
    pub p2p_bakc_token: U256,
}

impl RewardThresholds {
    pub fn from_table(table: &ThresholdTable) -> Result<Self, ConfigError> {
        let parse = |name: &str, value: &str| parse_amount(&format!("thresholds.{}", name), value);
        Ok(Self {
            bayc_token: parse("bayc_token", &table.bayc_token)?,
            bayc_owner: parse("bayc_owner", &table.bayc_owner)?,
            mayc_token: parse("mayc_token", &table.mayc_token)?,
            mayc_owner: parse("mayc_owner", &table.mayc_owner)?,
            bayc_paired_token: match &table.bayc_paired_token {
                Some(v) => parse("bayc_paired_token", v)?,
                None => parse("bakc_token", &table.bakc_token)?,
            },
            bayc_paired_owner: match &table.bayc_paired_owner {
                Some(v) => parse("bayc_paired_owner", v)?,
                None => parse("bakc_owner", &table.bakc_owner)?,
            },
            mayc_paired_token: match &table.mayc_paired_token {
                Some(v) => parse("mayc_paired_token", v)?,
                None => parse("bakc_token", &table.bakc_token)?,
            },
            mayc_paired_owner: match &table.mayc_paired_owner {
                Some(v) => parse("mayc_paired_owner", v)?,
                None => parse("bakc_owner", &table.bakc_owner)?,
            },
            p2p_bayc_token: parse("p2p_bayc_token", &table.p2p_bayc_token)?,
            p2p_mayc_token: parse("p2p_mayc_token", &table.p2p_mayc_token)?,
            p2p_bakc_token: parse("p2p_bakc_token", &table.p2p_bakc_token)?,
        })
    }

    /// Per-token threshold. Paired positions are keyed by their primary collection.
    pub fn token(&self, collection: Collection, kind: PoolKind) -> U256 {
        match (kind, collection) {
            (PoolKind::Solo, Collection::Bayc) => self.bayc_token,
            (PoolKind::Solo, Collection::Mayc) => self.mayc_token,
            (PoolKind::Paired, Collection::Bayc) => self.bayc_paired_token,
            (PoolKind::Paired, Collection::Mayc) => self.mayc_paired_token,
        }
    }

    pub fn owner(&self, collection: Collection, kind: PoolKind) -> U256 {
        match (kind, collection) {
            (PoolKind::Solo, Collection::Bayc) => self.bayc_owner,
            (PoolKind::Solo, Collection::Mayc) => self.mayc_owner,
            (PoolKind::Paired, Collection::Bayc) => self.bayc_paired_owner,
            (PoolKind::Paired, Collection::Mayc) => self.mayc_paired_owner,
        }
    }

    pub fn p2p_token(&self, staking_type: StakingType) -> U256 {
        match staking_type {
            StakingType::BaycStaking => self.p2p_bayc_token,
            StakingType::MaycStaking => self.p2p_mayc_token,
            StakingType::BakcPairStaking => self.p2p_bakc_token,
        }
    }
}

/// Parse a decimal ether-denominated amount ("0.2", "120") into wei
fn parse_amount(field: &str, value: &str) -> Result<U256, ConfigError> {
    parse_ether(value.trim()).map_err(|_| ConfigError::InvalidAmount {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Secrets and endpoints read from the environment
#[derive(Clone, Default)]
pub struct Secrets {
    pub rpc_url: String,
    pub private_key: String,
    pub slack_webhook: Option<String>,
    pub pagerduty_routing_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("rpc_url", &redact_url(&self.rpc_url))
            .field("private_key", &"<redacted>")
            .field("slack_webhook", &self.slack_webhook.as_ref().map(|_| "<set>"))
            .field("pagerduty_routing_key", &self.pagerduty_routing_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Keep scheme and host only, RPC URLs often embed API keys
fn redact_url(url: &str) -> String {
    url.splitn(4, '/').take(3).collect::<Vec<_>>().join("/")
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        let non_empty = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(Self {
            rpc_url: non_empty("RPC_URL").context("RPC_URL not set")?,
            private_key: non_empty("PRIVATE_KEY").context("PRIVATE_KEY not set")?,
            slack_webhook: non_empty("SLACK_WEBHOOK"),
            pagerduty_routing_key: non_empty("PAGERDUTY_ROUTING_KEY"),
        })
    }
}

/// Immutable bot configuration, built once at startup
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub network: Network,
    pub contracts: ContractsConfig,
    pub collections: HashMap<Collection, CollectionConfig>,
    pub thresholds: RewardThresholds,
    pub scan: ScanConfig,
    pub batch: BatchConfig,
    pub execution: ExecutionConfig,
    pub schedule: ScheduleConfig,
    pub p2p: P2pConfig,
    pub alerts: AlertsConfig,
    pub min_balance: U256,
    pub secrets: Secrets,
}

impl BotConfig {
    /// Resolve a parsed file config for the given network
    pub fn from_file_config(
        file: FileConfig,
        network_override: Option<Network>,
        secrets: Secrets,
    ) -> Result<Self> {
        let network = network_override.unwrap_or(file.network);

        let table = file
            .thresholds
            .get(network.as_str())
            .ok_or_else(|| ConfigError::MissingThresholds(network.to_string()))?;
        let thresholds = RewardThresholds::from_table(table)?;
        let min_balance = parse_amount("schedule.min_balance", &file.schedule.min_balance)?;

        let config = Self {
            network,
            contracts: file.contracts,
            collections: file.collections,
            thresholds,
            scan: file.scan,
            batch: file.batch,
            execution: file.execution,
            schedule: file.schedule,
            p2p: file.p2p,
            alerts: file.alerts,
            min_balance,
            secrets,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.limit == 0 {
            return Err(ConfigError::ZeroLimit("batch.limit"));
        }
        if self.batch.collection_limits.values().any(|l| *l == 0) {
            return Err(ConfigError::ZeroLimit("batch.collection_limits"));
        }
        if self.batch.order_limit == 0 {
            return Err(ConfigError::ZeroLimit("batch.order_limit"));
        }
        if self.batch.owner_chunk_size == 0 {
            return Err(ConfigError::ZeroLimit("batch.owner_chunk_size"));
        }
        if self.schedule.run_hour_utc >= 24 {
            return Err(ConfigError::RunHour(self.schedule.run_hour_utc));
        }
        if self.execution.confirmations == 0 {
            return Err(ConfigError::ZeroLimit("execution.confirmations"));
        }
        if self.execution.order_confirmations == 0 {
            return Err(ConfigError::ZeroLimit("execution.order_confirmations"));
        }
        if self.p2p.block_range == 0 {
            return Err(ConfigError::ZeroLimit("p2p.block_range"));
        }
        if self.p2p.range_concurrency == 0 {
            return Err(ConfigError::ZeroLimit("p2p.range_concurrency"));
        }
        if self.collections.is_empty() {
            return Err(ConfigError::NoCollections);
        }
        Ok(())
    }

    /// Batch cap for a collection (per-collection override or the default)
    pub fn batch_limit(&self, collection: Collection) -> usize {
        self.batch
            .collection_limits
            .get(&collection)
            .copied()
            .unwrap_or(self.batch.limit)
    }

    /// Tracked collections in a stable order
    pub fn tracked_collections(&self) -> Vec<(Collection, &CollectionConfig)> {
        Collection::ALL
            .iter()
            .filter_map(|c| self.collections.get(c).map(|cfg| (*c, cfg)))
            .collect()
    }

    pub fn p2p_start_block(&self) -> Option<u64> {
        self.p2p.start_blocks.get(self.network.as_str()).copied()
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.scan_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.confirmation_timeout_secs)
    }
}

/// Load configuration from a TOML file plus environment secrets
pub fn load_config_from_file<P: AsRef<Path>>(
    path: P,
    network_override: Option<Network>,
) -> Result<BotConfig> {
    dotenv::dotenv().ok();

    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    let file: FileConfig =
        toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

    BotConfig::from_file_config(file, network_override, Secrets::from_env()?)
}
