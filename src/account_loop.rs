//! Per-account loop
//!
//! One loop per configured account, driven as an explicit state machine:
//!
//! ```text
//! Connect -> RefreshBalance -> Act -> Sleep(cycle interval) -> Connect
//!    ^                                                           |
//!    +------------------- Backoff <--- any error ----------------+
//! ```
//!
//! Errors never leave the loop. They are logged, counted as a restart and
//! followed by a fixed backoff before the cycle starts over at `Connect`.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::account::Account;
use crate::actions::ActionRunner;
use crate::config::{parse_address, Config};
use crate::errors::{BotError, BotResult};
use crate::executor::TransactionExecutor;
use crate::ledger::QuotaLedger;
use crate::metrics::Metrics;
use crate::planner::GasPlanner;
use crate::rpc::ChainClient;
use crate::selector::{random_delay, ActionSelector, Selection};
use crate::status::{format_duration, QuotaStatus, StatusReporter, StatusSnapshot};
use crate::types::{ActionKind, QuotaRecord};
use crate::wallet::TxSigner;

/// Shared collaborators handed to every loop
#[derive(Clone)]
pub struct LoopContext {
    pub client: Arc<dyn ChainClient>,
    pub ledger: Arc<dyn QuotaLedger>,
    pub metrics: Arc<Metrics>,
    pub reporter: StatusReporter,
    pub config: Arc<Config>,
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Connect,
    RefreshBalance,
    Act,
    /// Waiting for the next daily cycle
    Sleep(Duration),
    /// Waiting after an error
    Backoff,
}

/// Drives one account forever
pub struct AccountLoop {
    account: Account,
    client: Arc<dyn ChainClient>,
    ledger: Arc<dyn QuotaLedger>,
    metrics: Arc<Metrics>,
    reporter: StatusReporter,
    selector: ActionSelector,
    runner: ActionRunner,
    config: Arc<Config>,
    state: LoopState,
    restarts: u32,
    quotas: Vec<QuotaStatus>,
    cycle_id: Uuid,
}

impl AccountLoop {
    /// Settings are resolved when the loop first needs them, so a bad value
    /// sends only this account into backoff.
    pub fn new(index: usize, signer: Arc<dyn TxSigner>, ctx: LoopContext) -> Self {
        let config = ctx.config.clone();
        let planner = GasPlanner::new(
            ctx.client.clone(),
            config.gas.clone(),
            config.gas_floor_wei(),
            ctx.metrics.clone(),
        );
        let executor = TransactionExecutor::new(
            ctx.client.clone(),
            config.executor.clone(),
            config.rpc.chain_id,
            config.rpc.explorer.clone(),
            ctx.metrics.clone(),
        );

        Self {
            account: Account::new(index, signer, None),
            runner: ActionRunner::new(ctx.client.clone(), planner, executor),
            client: ctx.client,
            selector: ActionSelector::new(config.actions.clone(), ctx.ledger.clone()),
            ledger: ctx.ledger,
            metrics: ctx.metrics,
            reporter: ctx.reporter,
            config,
            state: LoopState::Connect,
            restarts: 0,
            quotas: Vec::new(),
            cycle_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Run forever
    pub async fn run(mut self) -> Infallible {
        loop {
            self.step().await;
        }
    }

    /// Execute the current state and move to the next one
    pub async fn step(&mut self) {
        let span = info_span!(
            "account",
            index = self.account.index + 1,
            address = %self.account.address,
            cycle = %self.cycle_id
        );
        let state = self.state;
        let result = self.execute(state).instrument(span.clone()).await;

        self.state = match result {
            Ok(next) => next,
            Err(err) => {
                self.restarts += 1;
                self.metrics.record_restart(&format!("{:#x}", self.account.address));
                error!(
                    parent: &span,
                    state = ?state,
                    restarts = self.restarts,
                    transient = err.is_transient(),
                    error = %err,
                    "Account cycle failed"
                );
                LoopState::Backoff
            }
        };

        if matches!(self.state, LoopState::Backoff) {
            let backoff = Duration::from_millis(self.config.timing.restart_backoff_ms);
            self.publish(format!("Error, restarting in {}", format_duration(backoff)), Some(backoff))
                .await;
        }
    }

    async fn execute(&mut self, state: LoopState) -> BotResult<LoopState> {
        match state {
            LoopState::Connect => {
                self.publish(format!("Connecting to Account : {}", self.account.index + 1), None)
                    .await;
                let wrapped_token = self
                    .config
                    .actions
                    .wrap_unwrap
                    .wrapped_token
                    .as_deref()
                    .map(|token| parse_address("actions.wrap_unwrap.wrapped_token", token))
                    .transpose()?;
                self.account.set_wrapped_token(wrapped_token);
                let nonce = self.account.sync_nonce(self.client.as_ref()).await?;
                info!(nonce, "Connected");
                self.step_pause().await;
                Ok(LoopState::RefreshBalance)
            }
            LoopState::RefreshBalance => {
                self.publish(
                    format!("Getting Wallet Balance of {:#x}", self.account.address),
                    None,
                )
                .await;
                self.account.refresh_balance(self.client.as_ref()).await?;
                self.quotas = self.selector.quotas(self.account.address).await?;
                self.publish("Balance updated".to_string(), None).await;
                self.step_pause().await;
                Ok(LoopState::Act)
            }
            LoopState::Act => {
                self.act().await?;
                Ok(LoopState::Sleep(Duration::from_secs(
                    self.config.timing.cycle_interval_secs,
                )))
            }
            LoopState::Sleep(duration) => {
                self.publish(
                    format!("Account {} processing done", self.account.index + 1),
                    Some(duration),
                )
                .await;
                sleep(duration).await;
                self.cycle_id = Uuid::new_v4();
                Ok(LoopState::Connect)
            }
            LoopState::Backoff => {
                sleep(Duration::from_millis(self.config.timing.restart_backoff_ms)).await;
                self.cycle_id = Uuid::new_v4();
                Ok(LoopState::Connect)
            }
        }
    }

    async fn act(&mut self) -> BotResult<()> {
        let index = self.account.index;
        let address = self.account.address;
        self.ensure_min_balance()?;

        let mut failed: HashMap<ActionKind, u32> = HashMap::new();
        let mut performed = 0u32;
        loop {
            let (kind, params) = match self.selector.select_next(index, address, &failed).await? {
                Selection::Next(kind, params) => (kind, params),
                Selection::Idle => break,
            };
            if kind == ActionKind::WrapUnwrap {
                self.ensure_min_balance()?;
            }
            let quota = self.selector.quota(address, kind).await?;
            let attempt = quota.today + failed.get(&kind).copied().unwrap_or(0) + 1;
            self.publish(format!("Executing {} ({}/{})", kind, attempt, quota.limit), None)
                .await;

            match self.runner.perform(&mut self.account, &params).await {
                Ok(()) => self.record(kind).await?,
                Err(err) if kind == ActionKind::WrapUnwrap && err.is_iteration_local() => {
                    *failed.entry(kind).or_default() += 1;
                    warn!(kind = %kind, attempt, error = %err, "Iteration failed, continuing");
                    let pause = Duration::from_millis(self.config.timing.iteration_backoff_ms);
                    self.publish(format!("Error: {}", err), Some(pause)).await;
                    sleep(pause).await;
                    continue;
                }
                Err(err) => return Err(err),
            }

            performed += 1;
            self.pause_between_transactions().await;
        }

        if performed == 0 && failed.is_empty() {
            info!("Every enabled action reached today's quota");
        }
        Ok(())
    }

    fn ensure_min_balance(&self) -> BotResult<()> {
        let minimum = self.config.actions.min_native_balance_wei()?;
        let balance = self.account.balance.native;
        if balance < minimum {
            return Err(BotError::InsufficientBalance {
                balance: format_ether(balance),
                minimum: format_ether(minimum),
                symbol: self.config.rpc.symbol.clone(),
            });
        }
        Ok(())
    }

    async fn record(&mut self, kind: ActionKind) -> BotResult<()> {
        let address = self.account.address;
        self.ledger.append(&QuotaRecord::now(address, kind)).await?;
        self.metrics.record_action(kind);
        self.quotas = self.selector.quotas(address).await?;
        Ok(())
    }

    async fn step_pause(&self) {
        sleep(Duration::from_millis(self.config.timing.step_delay_ms)).await;
    }

    async fn pause_between_transactions(&self) {
        let timing = &self.config.timing;
        let delay = random_delay(&mut rand::thread_rng(), timing.min_delay_ms, timing.max_delay_ms);
        self.publish(format!("Delaying for {}", format_duration(delay)), Some(delay))
            .await;
        sleep(delay).await;
    }

    fn snapshot(&self, message: String, remaining_delay: Option<Duration>) -> StatusSnapshot {
        StatusSnapshot {
            index: self.account.index,
            address: self.account.address,
            native_balance: self.account.balance.native,
            wrapped_balance: self.account.balance.wrapped,
            quotas: self.quotas.clone(),
            message,
            remaining_delay,
            restarts: self.restarts,
        }
    }

    async fn publish(&self, message: String, remaining_delay: Option<Duration>) {
        self.reporter
            .publish(self.snapshot(message, remaining_delay))
            .await;
    }
}

/// Stand-in loop for an account whose signer could not be built.
///
/// Behaves like a loop stuck in `Backoff`: it logs the error, counts a
/// restart, publishes an error status and waits the restart backoff, forever.
pub async fn run_unavailable(index: usize, err: BotError, ctx: LoopContext) -> Infallible {
    let backoff = Duration::from_millis(ctx.config.timing.restart_backoff_ms);
    let label = format!("account-{}", index + 1);
    let mut restarts = 0u32;
    loop {
        restarts += 1;
        ctx.metrics.record_restart(&label);
        error!(index = index + 1, restarts, error = %err, "Account unavailable");
        let snapshot = StatusSnapshot {
            index,
            address: Address::ZERO,
            native_balance: U256::ZERO,
            wrapped_balance: None,
            quotas: Vec::new(),
            message: format!("Error, restarting in {}", format_duration(backoff)),
            remaining_delay: Some(backoff),
            restarts,
        };
        ctx.reporter.publish(snapshot).await;
        sleep(backoff).await;
    }
}
