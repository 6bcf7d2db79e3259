//! In-memory chain and alert fakes for unit tests

use crate::alert::{AlertSink, Severity};
use crate::chain::{
    ChainReader, ChainWriter, ContractCall, MatchedOrderInfo, OrderEventKind, RawStake, TxOptions,
};
use crate::error::ChainError;
use crate::types::{pool_id, Confirmation, TokenId};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn addr(b: u8) -> Address {
    Address::repeat_byte(b)
}

pub fn ape(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18))
}

pub fn solo_stake(collection_pool: u64, token_id: u64, unclaimed: U256) -> RawStake {
    RawStake {
        pool_id: collection_pool,
        token_id: U256::from(token_id),
        unclaimed,
        main_token_id: U256::ZERO,
        main_type_pool_id: 0,
    }
}

pub fn bakc_stake(bakc_id: u64, main_id: u64, main_pool: u64, unclaimed: U256) -> RawStake {
    RawStake {
        pool_id: pool_id::BAKC,
        token_id: U256::from(bakc_id),
        unclaimed,
        main_token_id: U256::from(main_id),
        main_type_pool_id: main_pool,
    }
}

/// Scriptable chain. Reads come from the maps, writes are recorded, and the
/// n-th call of each write step can be made to fail.
#[derive(Default)]
pub struct MockChain {
    pub stakes: HashMap<Address, Vec<RawStake>>,
    pub owners: HashMap<(Address, TokenId), Address>,
    pub approvals: HashSet<(Address, Address, Address)>,
    pub events: Vec<(OrderEventKind, u64, B256)>,
    pub orders: HashMap<B256, MatchedOrderInfo>,
    pub latest_block: u64,
    pub balance: U256,
    pub gas_estimate: u64,
    pub gas_price: u128,

    /// Tokens whose ownerOf reads fail
    pub failing_owner_reads: HashSet<Address>,
    /// Single token ids whose ownerOf reverts
    pub reverting_owner_reads: HashSet<(Address, TokenId)>,
    pub fail_balance: bool,
    pub fail_simulation_on: HashSet<usize>,
    pub fail_estimate_on: HashSet<usize>,
    pub fail_submit_on: HashSet<usize>,
    pub fail_confirmation_on: HashSet<usize>,
    /// Per owners_of call, reversed delay so later chunks finish first
    pub owner_read_delay: Option<Duration>,

    pub owner_read_calls: AtomicUsize,
    pub event_queries: Mutex<Vec<(OrderEventKind, u64, u64)>>,
    pub simulated: Mutex<Vec<ContractCall>>,
    pub estimated: Mutex<Vec<ContractCall>>,
    pub submitted: Mutex<Vec<(ContractCall, TxOptions)>>,
    pub confirmations: Mutex<Vec<(B256, u64)>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            latest_block: 100,
            balance: ape(1),
            gas_estimate: 300_000,
            gas_price: 10_000_000_000,
            ..Default::default()
        }
    }

    pub fn with_stakes(mut self, staker: Address, stakes: Vec<RawStake>) -> Self {
        self.stakes.insert(staker, stakes);
        self
    }

    pub fn with_owner(mut self, token: Address, token_id: TokenId, owner: Address) -> Self {
        self.owners.insert((token, token_id), owner);
        self
    }

    pub fn with_approval(mut self, token: Address, owner: Address, operator: Address) -> Self {
        self.approvals.insert((token, owner, operator));
        self
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    fn index_of<T>(log: &Mutex<Vec<T>>, item: T) -> usize {
        let mut log = log.lock().unwrap();
        log.push(item);
        log.len() - 1
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn all_stakes(&self, staker: Address) -> Result<Vec<RawStake>, ChainError> {
        Ok(self.stakes.get(&staker).cloned().unwrap_or_default())
    }

    async fn owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Address>, ChainError> {
        let call = self.owner_read_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.owner_read_delay {
            // earlier calls sleep longer
            tokio::time::sleep(delay * (10u32.saturating_sub(call as u32))).await;
        }
        self.try_owners_of(token, token_ids)
            .await?
            .into_iter()
            .zip(token_ids)
            .map(|(owner, id)| {
                owner.ok_or_else(|| ChainError::Reverted(format!("ownerOf({}) reverted", id)))
            })
            .collect()
    }

    async fn try_owners_of(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Option<Address>>, ChainError> {
        if self.failing_owner_reads.contains(&token) {
            return Err(ChainError::Rpc("ownerOf reverted".into()));
        }
        Ok(token_ids
            .iter()
            .map(|id| {
                if self.reverting_owner_reads.contains(&(token, *id)) {
                    None
                } else {
                    Some(self.owners.get(&(token, *id)).copied().unwrap_or(Address::ZERO))
                }
            })
            .collect())
    }

    async fn approvals_for_all(
        &self,
        token: Address,
        owners: &[Address],
        operator: Address,
    ) -> Result<Vec<bool>, ChainError> {
        Ok(owners
            .iter()
            .map(|owner| self.approvals.contains(&(token, *owner, operator)))
            .collect())
    }

    async fn order_events(
        &self,
        _contract: Address,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<B256>, ChainError> {
        self.event_queries.lock().unwrap().push((kind, from_block, to_block));
        Ok(self
            .events
            .iter()
            .filter(|(k, block, _)| *k == kind && *block >= from_block && *block <= to_block)
            .map(|(_, _, hash)| *hash)
            .collect())
    }

    async fn matched_orders(
        &self,
        _contract: Address,
        order_hashes: &[B256],
    ) -> Result<Vec<MatchedOrderInfo>, ChainError> {
        order_hashes
            .iter()
            .map(|h| {
                self.orders
                    .get(h)
                    .cloned()
                    .ok_or_else(|| ChainError::Reverted(format!("unknown order {}", h)))
            })
            .collect()
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.latest_block)
    }

    async fn balance(&self, _account: Address) -> Result<U256, ChainError> {
        if self.fail_balance {
            return Err(ChainError::Rpc("balance unavailable".into()));
        }
        Ok(self.balance)
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn signer(&self) -> Address {
        addr(0xEE)
    }

    async fn simulate(&self, call: &ContractCall) -> Result<(), ChainError> {
        let n = Self::index_of(&self.simulated, call.clone());
        if self.fail_simulation_on.contains(&n) {
            return Err(ChainError::Reverted("execution reverted: nothing to claim".into()));
        }
        Ok(())
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64, ChainError> {
        let n = Self::index_of(&self.estimated, call.clone());
        if self.fail_estimate_on.contains(&n) {
            return Err(ChainError::Rpc("gas required exceeds allowance".into()));
        }
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.gas_price)
    }

    async fn submit(&self, call: &ContractCall, opts: &TxOptions) -> Result<B256, ChainError> {
        let n = Self::index_of(&self.submitted, (call.clone(), *opts));
        if self.fail_submit_on.contains(&n) {
            return Err(ChainError::Rpc("nonce too low".into()));
        }
        Ok(B256::with_last_byte(n as u8 + 1))
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: B256,
        confirmations: u64,
        _timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let n = Self::index_of(&self.confirmations, (tx_hash, confirmations));
        if self.fail_confirmation_on.contains(&n) {
            return Err(ChainError::Timeout(format!("{} confirmations of {}", confirmations, tx_hash)));
        }
        Ok(Confirmation {
            tx_hash,
            gas_used: 250_000,
            effective_gas_price: self.gas_price,
            block_number: Some(self.latest_block + 1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Info(String),
    Warning(String),
    Error(String),
    Page(String, Severity),
}

/// Records every alert it is given
#[derive(Default)]
pub struct RecordingSink {
    pub alerts: Mutex<Vec<Alert>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn pages(&self) -> usize {
        self.all().iter().filter(|a| matches!(a, Alert::Page(..))).count()
    }

    pub fn warnings(&self) -> usize {
        self.all().iter().filter(|a| matches!(a, Alert::Warning(..))).count()
    }

    pub fn errors(&self) -> usize {
        self.all().iter().filter(|a| matches!(a, Alert::Error(..))).count()
    }

    pub fn infos(&self) -> usize {
        self.all().iter().filter(|a| matches!(a, Alert::Info(..))).count()
    }

    fn record(&self, alert: Alert) -> anyhow::Result<()> {
        self.alerts.lock().unwrap().push(alert);
        if self.fail {
            anyhow::bail!("webhook returned 500");
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn notify_info(&self, title: &str, _fields: &[(String, String)]) -> anyhow::Result<()> {
        self.record(Alert::Info(title.to_string()))
    }

    async fn notify_warning(&self, title: &str, _fields: &[(String, String)]) -> anyhow::Result<()> {
        self.record(Alert::Warning(title.to_string()))
    }

    async fn notify_error(&self, title: &str, _fields: &[(String, String)]) -> anyhow::Result<()> {
        self.record(Alert::Error(title.to_string()))
    }

    async fn page(
        &self,
        summary: &str,
        severity: Severity,
        _details: &[(String, String)],
    ) -> anyhow::Result<()> {
        self.record(Alert::Page(summary.to_string(), severity))
    }
}
