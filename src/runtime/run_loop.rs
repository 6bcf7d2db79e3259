//! Run Loop: schedule window, failure budget, low-balance latch
//!
//! Wakes every `scan_interval`. Inside the daily run hour (UTC) it runs the
//! job until one run succeeds, then stays idle until the hour comes round
//! again. Errors are counted; the first error past the budget pages once.
//! A successful run clears the counter and re-arms the page.
//!
//! Created: 2026-10-09

use super::pipeline::{format_amount, RunSummary};
use crate::alert::{self, Notifier, Severity};
use crate::chain::ChainReader;
use crate::config::{BotConfig, Network};
use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One unit of scheduled work
#[async_trait]
pub trait RunJob: Send + Sync {
    async fn run(&self) -> Result<RunSummary>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Schedule {
    pub run_hour_utc: u32,
    pub interval: Duration,
    pub failure_budget: u32,
    pub min_balance: U256,
    /// Severity of the page raised when the budget runs out
    pub exhaustion_severity: Severity,
}

impl Schedule {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            run_hour_utc: config.schedule.run_hour_utc,
            interval: config.scan_interval(),
            failure_budget: config.schedule.failure_budget,
            min_balance: config.min_balance,
            exhaustion_severity: config.alerts.exhaustion_severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEdge {
    WentLow,
    Recovered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub consecutive_failures: u32,
    pub balance_low: bool,
    /// Budget exhaustion already paged
    pub paged: bool,
    /// A run succeeded in the current window
    pub has_started: bool,
}

impl RunState {
    /// Count a failed run. True when this failure should page.
    pub fn record_failure(&mut self, budget: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures > budget && !self.paged {
            self.paged = true;
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.paged = false;
    }

    /// Latch the low-balance flag, reporting only transitions
    pub fn observe_balance(&mut self, low: bool) -> Option<BalanceEdge> {
        match (low, self.balance_low) {
            (true, false) => {
                self.balance_low = true;
                Some(BalanceEdge::WentLow)
            }
            (false, true) => {
                self.balance_low = false;
                Some(BalanceEdge::Recovered)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    OutsideWindow,
    AlreadyRan,
    /// Ran the job; true if it succeeded
    Ran(bool),
}

pub struct RunLoop {
    job: Arc<dyn RunJob>,
    reader: Arc<dyn ChainReader>,
    account: Address,
    notifier: Notifier,
    schedule: Schedule,
    network: Network,
    clock: Clock,
    state: RunState,
}

impl RunLoop {
    pub fn new(
        job: Arc<dyn RunJob>,
        reader: Arc<dyn ChainReader>,
        account: Address,
        notifier: Notifier,
        schedule: Schedule,
        network: Network,
    ) -> Self {
        Self {
            job,
            reader,
            account,
            notifier,
            schedule,
            network,
            clock: Arc::new(Utc::now),
            state: RunState::default(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Tick until `shutdown` resolves. Shutdown is observed between ticks.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Run loop started: window {:02}:00 UTC, interval {}s, failure budget {}",
            self.schedule.run_hour_utc,
            self.schedule.interval.as_secs(),
            self.schedule.failure_budget
        );

        loop {
            self.tick().await;
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving run loop");
                    break;
                }
                _ = tokio::time::sleep(self.schedule.interval) => {}
            }
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let hour = (self.clock)().hour();
        if hour != self.schedule.run_hour_utc {
            if self.state.has_started {
                debug!("Left run window, re-arming for tomorrow");
            }
            self.state.has_started = false;
            return TickOutcome::OutsideWindow;
        }
        if self.state.has_started {
            return TickOutcome::AlreadyRan;
        }

        let ok = self.run_once().await;
        self.state.has_started = ok;
        TickOutcome::Ran(ok)
    }

    /// Balance check plus one job run, outside of any schedule
    pub async fn run_once(&mut self) -> bool {
        info!("Starting run...");
        self.check_balance().await;

        let ok = match self.job.run().await {
            Ok(summary) => {
                self.state.record_success();
                info!(
                    "Run succeeded: {} confirmed, {} failed batches",
                    summary.confirmed(),
                    summary.failed()
                );
                true
            }
            Err(e) => {
                self.on_failure(&e).await;
                false
            }
        };

        info!(
            "still alive, next check in {}m",
            self.schedule.interval.as_secs() / 60
        );
        ok
    }

    async fn on_failure(&mut self, e: &anyhow::Error) {
        let should_page = self.state.record_failure(self.schedule.failure_budget);
        let failures = self.state.consecutive_failures;

        if failures <= self.schedule.failure_budget {
            error!("Run failed ({}/{}): {:#}", failures, self.schedule.failure_budget, e);
            return;
        }

        let summary = format!(
            "Too many consecutive failures ({}), service failed to run: {:#}",
            failures, e
        );
        error!("{}", summary);
        if should_page {
            let details = alert::fields([
                ("network", self.network.to_string()),
                ("signer", self.account.to_string()),
                ("consecutive failures", failures.to_string()),
            ]);
            self.notifier
                .page(&summary, self.schedule.exhaustion_severity, &details)
                .await;
        }
    }

    async fn check_balance(&mut self) {
        let balance = match self.reader.balance(self.account).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Balance check failed: {}", e);
                return;
            }
        };

        let low = balance < self.schedule.min_balance;
        let details = alert::fields([
            ("network", self.network.to_string()),
            ("signer", self.account.to_string()),
            ("balance", format!("{} ETH", format_amount(balance))),
            ("minimum", format!("{} ETH", format_amount(self.schedule.min_balance))),
        ]);
        match self.state.observe_balance(low) {
            Some(BalanceEdge::WentLow) => {
                warn!("Balance of {} is low ({} ETH)", self.account, format_amount(balance));
                self.notifier.warn("Signer balance is low, please top up", &details).await;
            }
            Some(BalanceEdge::Recovered) => {
                info!("Balance of {} recovered ({} ETH)", self.account, format_amount(balance));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSink;
    use crate::testing::{addr, Alert, MockChain, RecordingSink};
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Pops one scripted outcome per run; succeeds once the script is exhausted
    #[derive(Default)]
    struct ScriptedJob {
        script: Mutex<VecDeque<bool>>,
        runs: AtomicUsize,
    }

    impl ScriptedJob {
        fn new(script: &[bool]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                runs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RunJob for ScriptedJob {
        async fn run(&self) -> Result<RunSummary> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(false) => anyhow::bail!("scan failed"),
                _ => Ok(RunSummary::default()),
            }
        }
    }

    fn schedule(budget: u32) -> Schedule {
        Schedule {
            run_hour_utc: 7,
            interval: Duration::from_millis(10),
            failure_budget: budget,
            min_balance: U256::from(1000),
            exhaustion_severity: Severity::Critical,
        }
    }

    fn clock_at(hour: Arc<AtomicU32>) -> Clock {
        Arc::new(move || {
            Utc.with_ymd_and_hms(2026, 10, 17, hour.load(Ordering::SeqCst), 0, 0)
                .unwrap()
        })
    }

    struct Fixture {
        run_loop: RunLoop,
        job: Arc<ScriptedJob>,
        sink: Arc<RecordingSink>,
        hour: Arc<AtomicU32>,
    }

    fn fixture(script: &[bool], budget: u32, chain: MockChain) -> Fixture {
        let job = Arc::new(ScriptedJob::new(script));
        let sink = Arc::new(RecordingSink::default());
        let hour = Arc::new(AtomicU32::new(7));
        let run_loop = RunLoop::new(
            job.clone(),
            Arc::new(chain),
            addr(0xEE),
            Notifier::new(vec![sink.clone() as Arc<dyn AlertSink>]),
            schedule(budget),
            Network::Mainnet,
        )
        .with_clock(clock_at(hour.clone()));
        Fixture { run_loop, job, sink, hour }
    }

    #[test]
    fn test_failure_budget_pages_once() {
        let mut state = RunState::default();
        let paged: Vec<bool> = (0..9).map(|_| state.record_failure(5)).collect();
        assert_eq!(paged, vec![false, false, false, false, false, true, false, false, false]);
        assert_eq!(state.consecutive_failures, 9);

        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert!(!state.paged);
        let paged: Vec<bool> = (0..6).map(|_| state.record_failure(5)).collect();
        assert_eq!(paged.iter().filter(|p| **p).count(), 1);
    }

    #[test]
    fn test_balance_latch_is_edge_triggered() {
        let mut state = RunState::default();
        assert_eq!(state.observe_balance(false), None);
        assert_eq!(state.observe_balance(true), Some(BalanceEdge::WentLow));
        assert_eq!(state.observe_balance(true), None);
        assert_eq!(state.observe_balance(false), Some(BalanceEdge::Recovered));
        assert_eq!(state.observe_balance(false), None);
    }

    #[tokio::test]
    async fn test_exhausted_budget_pages_exactly_once() {
        let mut f = fixture(&[false; 8], 5, MockChain::new());

        for _ in 0..8 {
            assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(false));
        }

        assert_eq!(f.job.runs.load(Ordering::SeqCst), 8);
        assert_eq!(f.sink.pages(), 1);
        assert_eq!(f.run_loop.state().consecutive_failures, 8);
    }

    #[tokio::test]
    async fn test_success_resets_counter_and_rearms_page() {
        let mut script = vec![false; 6];
        script.push(true);
        script.extend([false; 6]);
        let mut f = fixture(&script, 5, MockChain::new());

        for _ in 0..6 {
            f.run_loop.tick().await;
        }
        assert_eq!(f.sink.pages(), 1);

        assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(true));
        assert_eq!(f.run_loop.state().consecutive_failures, 0);

        // next day
        f.hour.store(8, Ordering::SeqCst);
        f.run_loop.tick().await;
        f.hour.store(7, Ordering::SeqCst);
        for _ in 0..6 {
            f.run_loop.tick().await;
        }
        assert_eq!(f.sink.pages(), 2);
    }

    #[tokio::test]
    async fn test_window_latch() {
        let mut f = fixture(&[], 5, MockChain::new());

        f.hour.store(6, Ordering::SeqCst);
        assert_eq!(f.run_loop.tick().await, TickOutcome::OutsideWindow);

        f.hour.store(7, Ordering::SeqCst);
        assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(true));
        assert_eq!(f.run_loop.tick().await, TickOutcome::AlreadyRan);

        f.hour.store(8, Ordering::SeqCst);
        assert_eq!(f.run_loop.tick().await, TickOutcome::OutsideWindow);

        f.hour.store(7, Ordering::SeqCst);
        assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(true));
        assert_eq!(f.job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_run_retries_within_window() {
        let mut f = fixture(&[false], 5, MockChain::new());

        assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(false));
        assert_eq!(f.run_loop.tick().await, TickOutcome::Ran(true));
        assert_eq!(f.run_loop.tick().await, TickOutcome::AlreadyRan);
        assert_eq!(f.sink.pages(), 0);
    }

    #[tokio::test]
    async fn test_low_balance_warns_once() {
        let mut chain = MockChain::new();
        chain.balance = U256::from(10);
        let mut f = fixture(&[], 5, chain);

        f.run_loop.run_once().await;
        f.run_loop.run_once().await;

        assert_eq!(f.sink.warnings(), 1);
        assert_eq!(f.sink.errors(), 0);
        assert!(f.run_loop.state().balance_low);
        assert_eq!(f.job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_balance_recovery_is_logged_only() {
        let mut f = fixture(&[], 5, MockChain::new());
        f.run_loop.state.balance_low = true;

        assert!(f.run_loop.run_once().await);

        assert!(!f.run_loop.state().balance_low);
        assert!(f.sink.all().is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_page_uses_configured_severity() {
        let mut f = fixture(&[false; 3], 1, MockChain::new());
        f.run_loop.schedule.exhaustion_severity = Severity::Error;

        for _ in 0..3 {
            f.run_loop.tick().await;
        }

        let pages: Vec<_> = f.sink.all().into_iter().filter(|a| matches!(a, Alert::Page(..))).collect();
        assert_eq!(pages.len(), 1);
        assert!(matches!(&pages[0], Alert::Page(_, Severity::Error)));
    }

    #[tokio::test]
    async fn test_balance_read_error_does_not_block_run() {
        let mut chain = MockChain::new();
        chain.fail_balance = true;
        let mut f = fixture(&[], 5, chain);

        assert!(f.run_loop.run_once().await);
        assert!(f.sink.all().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut f = fixture(&[], 5, MockChain::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();

        f.run_loop
            .run(async {
                let _ = rx.await;
            })
            .await;

        assert_eq!(f.job.runs.load(Ordering::SeqCst), 1);
    }
}
