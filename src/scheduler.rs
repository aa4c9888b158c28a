//! Multi-account scheduler
//!
//! Launches one account loop per configured account on a `JoinSet` and
//! supervises them as a group. Account loops never return on their own, so
//! the scheduler only finishes when every loop has died (panic) or when no
//! account was configured. Both are fatal for the process.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::account_loop::{run_unavailable, AccountLoop, LoopContext};
use crate::errors::{BotError, BotResult};
use crate::wallet::TxSigner;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    /// Not started yet (initial state)
    Stopped = 0,
    /// Loops are being spawned
    Starting = 1,
    /// At least one loop is alive
    Running = 2,
    /// Every loop has exited
    Failed = 3,
}

impl From<u8> for SchedulerState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Stopped,
            1 => Self::Starting,
            2 => Self::Running,
            _ => Self::Failed,
        }
    }
}

/// Runs and supervises the account loops
pub struct Scheduler {
    ctx: LoopContext,
    state: Arc<AtomicU8>,
}

impl Scheduler {
    pub fn new(ctx: LoopContext) -> Self {
        Self {
            ctx,
            state: Arc::new(AtomicU8::new(SchedulerState::Stopped as u8)),
        }
    }

    /// Get current state
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, new_state: SchedulerState) {
        self.state.store(new_state as u8, Ordering::Release);
        debug!("Scheduler state changed to {:?}", new_state);
    }

    /// Run one loop per account until all of them are gone.
    ///
    /// An account whose signer failed to load gets a loop that only backs
    /// off, so it never takes the other accounts down.
    pub async fn run(&self, signers: Vec<BotResult<Arc<dyn TxSigner>>>) -> BotResult<()> {
        if signers.is_empty() {
            return Err(BotError::Configuration("no accounts configured".to_string()));
        }

        let mut workers: Vec<(String, Pin<Box<dyn Future<Output = ()> + Send>>)> =
            Vec::with_capacity(signers.len());
        for (index, signer) in signers.into_iter().enumerate() {
            let ctx = self.ctx.clone();
            match signer {
                Ok(signer) => {
                    let name = format!("account-{}-{:#x}", index + 1, signer.address());
                    let account_loop = AccountLoop::new(index, signer, ctx);
                    workers.push((name, Box::pin(async move {
                        account_loop.run().await;
                    })));
                }
                Err(err) => {
                    warn!("Account {} unavailable: {}", index + 1, err);
                    let name = format!("account-{}-unavailable", index + 1);
                    workers.push((name, Box::pin(async move {
                        run_unavailable(index, err, ctx).await;
                    })));
                }
            }
        }

        self.ctx
            .reporter
            .info(format!("Starting {} account loop(s)", workers.len()))
            .await;
        self.supervise(workers).await
    }

    /// Spawn `workers` and wait for all of them.
    ///
    /// Returns an error once the last worker has exited, whatever the reason.
    pub async fn supervise<F>(&self, workers: Vec<(String, F)>) -> BotResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if workers.is_empty() {
            return Err(BotError::Configuration("no accounts configured".to_string()));
        }

        self.set_state(SchedulerState::Starting);
        let mut set = JoinSet::new();
        for (name, worker) in workers {
            info!("Starting worker: {}", name);
            self.ctx.metrics.active_accounts.inc();
            set.spawn(async move {
                worker.await;
                name
            });
        }
        self.set_state(SchedulerState::Running);

        while let Some(result) = set.join_next().await {
            self.ctx.metrics.active_accounts.dec();
            match result {
                Ok(name) => warn!("Worker '{}' exited unexpectedly", name),
                Err(err) => error!("Worker panicked: {:?}", err),
            }
            if !set.is_empty() {
                warn!("{} worker(s) still running", set.len());
            }
        }

        self.set_state(SchedulerState::Failed);
        error!("Every account loop has exited");
        Err(BotError::Internal("every account loop has exited".to_string()))
    }
}
