//! Transaction executor
//!
//! Submits a planned transaction and supervises its confirmation as an
//! explicit state machine:
//!
//! ```text
//! Building -> Submitted -> Confirmed
//!                |  ^
//!        timeout v  | re-broadcast same payload
//!             Resubmit -> TimedOut (after max_resubmissions)
//! ```
//!
//! Gateway (5xx) broadcast failures pause and report `Failed`; every other
//! broadcast error propagates. After any terminal outcome the account's
//! balance and confirmed nonce are re-read.
//!
//! A transaction that times out is remembered on the account as stalled.
//! Until its nonce is confirmed, every submission from that account reuses
//! the stalled nonce with a bumped gas price and also watches the receipts
//! of the earlier hashes, so one nonce never carries two actions.

use alloy::primitives::B256;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::config::ExecutorConfig;
use crate::errors::{BotError, BotResult, ChainError};
use crate::metrics::Metrics;
use crate::planner::GasPlanner;
use crate::rpc::ChainClient;
use crate::types::{
    BlockTag, ExecutionOutcome, SignedTransaction, StalledTransaction, TransactionIntent, TransactionPlan,
    TxReceipt,
};

enum ExecState {
    Building(TransactionPlan),
    Submitted {
        plan: TransactionPlan,
        signed: SignedTransaction,
        resubmissions: u32,
    },
    Resubmit {
        plan: TransactionPlan,
        previous: SignedTransaction,
        resubmissions: u32,
    },
    Done(ExecutionOutcome),
}

enum Broadcast {
    Accepted(B256),
    Transient(String),
}

/// Signs, broadcasts and confirms transactions for one account at a time
#[derive(Clone)]
pub struct TransactionExecutor {
    client: Arc<dyn ChainClient>,
    config: ExecutorConfig,
    chain_id: u64,
    explorer: String,
    metrics: Arc<Metrics>,
}

impl TransactionExecutor {
    pub fn new(
        client: Arc<dyn ChainClient>,
        config: ExecutorConfig,
        chain_id: u64,
        explorer: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            config,
            chain_id,
            explorer: explorer.into(),
            metrics,
        }
    }

    /// Whether callers wait for receipts by default
    pub fn waits_for_confirmation(&self) -> bool {
        self.config.wait_for_confirmation
    }

    /// Block explorer link for a transaction
    pub fn explorer_link(&self, hash: B256) -> String {
        format!("{}tx/{:#x}", self.explorer, hash)
    }

    /// Execute `plan` from `account`, waiting for a receipt per configuration
    pub async fn execute(&self, plan: TransactionPlan, account: &mut Account) -> BotResult<ExecutionOutcome> {
        self.execute_with(plan, account, self.config.wait_for_confirmation)
            .await
    }

    /// Execute `plan`, overriding whether the receipt is awaited
    pub async fn execute_with(
        &self,
        plan: TransactionPlan,
        account: &mut Account,
        wait_for_confirmation: bool,
    ) -> BotResult<ExecutionOutcome> {
        self.execute_watching(plan, account, wait_for_confirmation, &[]).await
    }

    /// Execute `plan` while also accepting a receipt for any of `watch`
    async fn execute_watching(
        &self,
        plan: TransactionPlan,
        account: &mut Account,
        wait_for_confirmation: bool,
        watch: &[B256],
    ) -> BotResult<ExecutionOutcome> {
        let result = self.run(plan, account, wait_for_confirmation, watch).await;

        match &result {
            Ok(ExecutionOutcome::Confirmed { .. }) => self.metrics.tx_confirmed_total.inc(),
            Ok(ExecutionOutcome::TimedOut { .. }) => self.metrics.tx_timed_out_total.inc(),
            Ok(ExecutionOutcome::Failed { .. }) | Err(_) => self.metrics.tx_failed_total.inc(),
        }

        self.sync_account(account).await;
        result
    }

    async fn run(
        &self,
        plan: TransactionPlan,
        account: &Account,
        wait_for_confirmation: bool,
        watch: &[B256],
    ) -> BotResult<ExecutionOutcome> {
        let started = Instant::now();
        let mut state = ExecState::Building(plan);

        loop {
            state = match state {
                ExecState::Building(plan) => {
                    let signed = account.signer().sign(&plan, self.chain_id)?;
                    debug!(
                        address = %account.address,
                        kind = %plan.intent.kind,
                        nonce = plan.nonce,
                        hash = %signed.hash,
                        "Transaction signed"
                    );
                    match self.broadcast(&signed).await {
                        Ok(Broadcast::Transient(reason)) => ExecState::Done(ExecutionOutcome::Failed { reason }),
                        Ok(Broadcast::Accepted(hash)) if !wait_for_confirmation => {
                            info!(address = %account.address, hash = %hash, "Transaction sent, not waiting for receipt");
                            ExecState::Done(ExecutionOutcome::Confirmed { hash, receipt: None })
                        }
                        Ok(Broadcast::Accepted(_)) => ExecState::Submitted {
                            plan,
                            signed,
                            resubmissions: 0,
                        },
                        // "nonce too low" once an earlier hash at this nonce has landed
                        Err(err) => match self.find_receipt(watch).await {
                            Some(receipt) => {
                                info!(address = %account.address, error = %err, "Earlier transaction at this nonce landed");
                                self.confirmed(receipt, started)?
                            }
                            None => return Err(err),
                        },
                    }
                }

                ExecState::Submitted {
                    plan,
                    signed,
                    resubmissions,
                } => match timeout(self.config.confirmation_timeout(), self.poll_receipt(signed.hash, watch)).await {
                    Ok(receipt) => self.confirmed(receipt, started)?,
                    Err(_) => {
                        warn!(
                            address = %account.address,
                            hash = %signed.hash,
                            timeout_ms = self.config.confirmation_timeout_ms,
                            "Confirmation timed out"
                        );
                        ExecState::Resubmit {
                            plan,
                            previous: signed,
                            resubmissions,
                        }
                    }
                },

                ExecState::Resubmit {
                    plan,
                    previous,
                    resubmissions,
                } => {
                    // The payload may have landed while nobody was looking
                    let hashes: Vec<B256> = std::iter::once(previous.hash).chain(watch.iter().copied()).collect();
                    if let Some(receipt) = self.find_receipt(&hashes).await {
                        self.confirmed(receipt, started)?
                    } else if resubmissions >= self.config.max_resubmissions {
                        ExecState::Done(ExecutionOutcome::TimedOut { hash: previous.hash })
                    } else {
                        info!(
                            address = %account.address,
                            hash = %previous.hash,
                            attempt = resubmissions + 1,
                            "Re-broadcasting transaction"
                        );
                        self.rebroadcast(&previous).await?;
                        self.metrics.tx_resubmitted_total.inc();
                        ExecState::Submitted {
                            plan,
                            signed: previous,
                            resubmissions: resubmissions + 1,
                        }
                    }
                }

                ExecState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn confirmed(&self, receipt: TxReceipt, started: Instant) -> BotResult<ExecState> {
        self.metrics
            .confirmation_latency
            .observe(started.elapsed().as_secs_f64());
        if !receipt.success {
            return Err(BotError::Reverted(format!("{:#x}", receipt.hash)));
        }
        info!(
            hash = %receipt.hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction confirmed: {}",
            self.explorer_link(receipt.hash)
        );
        Ok(ExecState::Done(ExecutionOutcome::Confirmed {
            hash: receipt.hash,
            receipt: Some(receipt),
        }))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> BotResult<Broadcast> {
        self.metrics.tx_submitted_total.inc();
        match self.client.broadcast(signed).await {
            Ok(hash) => Ok(Broadcast::Accepted(hash)),
            Err(err) if err.is_gateway() => {
                warn!(
                    hash = %signed.hash,
                    error = %err,
                    backoff_ms = self.config.transient_backoff_ms,
                    "Gateway error while broadcasting"
                );
                sleep(self.config.transient_backoff()).await;
                Ok(Broadcast::Transient(err.to_string()))
            }
            Err(err) => Err(BotError::Broadcast(err)),
        }
    }

    async fn rebroadcast(&self, signed: &SignedTransaction) -> BotResult<()> {
        self.metrics.tx_submitted_total.inc();
        match self.client.broadcast(signed).await {
            Ok(_) => Ok(()),
            Err(err) if is_already_known(&err) => {
                debug!(hash = %signed.hash, "Node already knows the transaction");
                Ok(())
            }
            Err(err) => Err(BotError::Broadcast(err)),
        }
    }

    async fn poll_receipt(&self, hash: B256, watch: &[B256]) -> TxReceipt {
        let hashes: Vec<B256> = std::iter::once(hash).chain(watch.iter().copied()).collect();
        loop {
            if let Some(receipt) = self.find_receipt(&hashes).await {
                return receipt;
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// First receipt found among `hashes`
    async fn find_receipt(&self, hashes: &[B256]) -> Option<TxReceipt> {
        for hash in hashes {
            match self.client.receipt(*hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(err) => debug!(hash = %hash, error = %err, "Receipt poll failed"),
            }
        }
        None
    }

    async fn sync_account(&self, account: &mut Account) {
        if let Err(err) = account.refresh_balance(self.client.as_ref()).await {
            warn!(address = %account.address, error = %err, "Balance refresh failed");
        }
        if let Err(err) = account.sync_nonce(self.client.as_ref()).await {
            warn!(address = %account.address, error = %err, "Nonce resync failed");
        }
    }

    /// Plan and execute an intent, replacing it once if it stays unconfirmed.
    ///
    /// The replacement keeps the stalled nonce and outbids its gas price. A
    /// second timeout leaves the account's stalled record in place and
    /// surfaces [`BotError::ConfirmationTimeout`]; a `Failed` outcome
    /// surfaces [`BotError::TransientBroadcast`].
    pub async fn submit_intent(
        &self,
        planner: &GasPlanner,
        intent: TransactionIntent,
        account: &mut Account,
        wait_for_confirmation: bool,
    ) -> BotResult<ExecutionOutcome> {
        let started = Instant::now();
        let (mut plan, mut watch) = match self.live_stalled(account).await? {
            Some(stalled) => {
                info!(
                    address = %account.address,
                    nonce = stalled.nonce,
                    "Replacing stalled transaction"
                );
                let plan = planner
                    .plan_replacement(intent.clone(), account.address, &stalled)
                    .await?;
                (plan, stalled.hashes)
            }
            None => (planner.plan(intent.clone(), account.address).await?, Vec::new()),
        };
        let mut replacements_left = 1u32;

        loop {
            let pending = StalledTransaction::new(&plan, Vec::new());
            match self
                .execute_watching(plan, account, wait_for_confirmation, &watch)
                .await?
            {
                ExecutionOutcome::TimedOut { hash } => {
                    watch.push(hash);
                    let stalled = StalledTransaction {
                        hashes: watch.clone(),
                        ..pending
                    };
                    account.stalled = Some(stalled.clone());
                    if replacements_left == 0 {
                        return Err(BotError::ConfirmationTimeout {
                            hash: format!("{:#x}", hash),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    replacements_left -= 1;
                    warn!(
                        address = %account.address,
                        hash = %hash,
                        nonce = stalled.nonce,
                        "Transaction still pending after resubmission, replacing"
                    );
                    plan = planner
                        .plan_replacement(intent.clone(), account.address, &stalled)
                        .await?;
                }
                ExecutionOutcome::Failed { reason } => return Err(BotError::TransientBroadcast(reason)),
                confirmed => {
                    account.stalled = None;
                    return Ok(confirmed);
                }
            }
        }
    }

    /// The account's stalled transaction, unless its nonce has since confirmed
    async fn live_stalled(&self, account: &mut Account) -> BotResult<Option<StalledTransaction>> {
        let Some(stalled) = account.stalled.clone() else {
            return Ok(None);
        };
        let latest = self
            .client
            .transaction_count(account.address, BlockTag::Latest)
            .await?;
        if latest > stalled.nonce {
            warn!(
                address = %account.address,
                nonce = stalled.nonce,
                "Stalled nonce confirmed outside the cycle"
            );
            account.stalled = None;
            return Ok(None);
        }
        Ok(Some(stalled))
    }
}

fn is_already_known(err: &ChainError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("already known") || message.contains("known transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GasConfig;
    use crate::test_utils::{test_metrics, test_wallet, MockChainClient, ReceiptMode};
    use crate::types::ActionKind;
    use alloy::primitives::{Address, U256};
    use std::time::Duration;

    struct Harness {
        client: MockChainClient,
        executor: TransactionExecutor,
        planner: GasPlanner,
        account: Account,
    }

    fn harness(config: ExecutorConfig) -> Harness {
        let client = MockChainClient::new();
        let metrics = test_metrics();
        let shared: Arc<dyn ChainClient> = Arc::new(client.clone());
        Harness {
            executor: TransactionExecutor::new(
                shared.clone(),
                config,
                1301,
                "https://explorer.test/",
                metrics.clone(),
            ),
            planner: GasPlanner::new(shared, GasConfig::default(), 0, metrics),
            account: Account::new(0, Arc::new(test_wallet()), None),
            client,
        }
    }

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            confirmation_timeout_ms: 5_000,
            receipt_poll_interval_ms: 2_000,
            ..ExecutorConfig::default()
        }
    }

    async fn plan(h: &Harness) -> TransactionPlan {
        let intent = TransactionIntent::new(h.account.address, U256::from(1_000), ActionKind::SelfTransfer);
        h.planner.plan(intent, h.account.address).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_and_resyncs_account() {
        let mut h = harness(fast_config());
        h.client.set_balance(U256::from(77)).await;
        let plan = plan(&h).await;

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        assert!(outcome.is_confirmed());
        assert!(matches!(outcome, ExecutionOutcome::Confirmed { receipt: Some(_), .. }));
        assert_eq!(h.account.onchain_nonce, 1);
        assert_eq!(h.account.balance.native, U256::from(77));
        assert_eq!(h.client.broadcasts().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_resubmission_at_timeout() {
        let mut h = harness(ExecutorConfig {
            max_resubmissions: 1,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let plan = plan(&h).await;

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        let broadcasts = h.client.broadcasts().await;
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].hash, broadcasts[1].hash);
        assert_eq!(broadcasts[1].at - broadcasts[0].at, Duration::from_millis(5_000));
        assert!(matches!(outcome, ExecutionOutcome::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmissions_are_bounded() {
        let mut h = harness(fast_config());
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let plan = plan(&h).await;

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        let broadcasts = h.client.broadcasts().await;
        assert_eq!(broadcasts.len(), 4);
        for pair in broadcasts.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, Duration::from_millis(5_000));
        }
        assert!(matches!(outcome, ExecutionOutcome::TimedOut { .. }));
        assert_eq!(h.executor.metrics.tx_resubmitted_total.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_lookup_short_circuits_resubmission() {
        let mut h = harness(fast_config());
        // polls at 0s, 2s, 4s miss; the check at the 5s timeout finds it
        h.client.set_receipt_mode(ReceiptMode::AfterPolls(3)).await;
        let plan = plan(&h).await;

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(h.client.broadcasts().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_error_reports_failed_after_backoff() {
        let mut h = harness(fast_config());
        h.client
            .push_broadcast_error(ChainError::Transport {
                message: "HTTP error 502 Bad Gateway".to_string(),
                status: Some(502),
            })
            .await;
        let plan = plan(&h).await;
        let start = Instant::now();

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Failed { .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_broadcast_errors_propagate() {
        let mut h = harness(fast_config());
        h.client
            .push_broadcast_error(ChainError::RpcResponse {
                message: "insufficient funds for gas * price + value".to_string(),
                code: Some(-32000),
            })
            .await;
        let plan = plan(&h).await;

        let err = h.executor.execute(plan, &mut h.account).await.unwrap_err();
        assert!(matches!(err, BotError::Broadcast(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_numbers_in_node_errors_are_not_gateway_errors() {
        let mut h = harness(fast_config());
        h.client
            .push_broadcast_error(ChainError::RpcResponse {
                message: "insufficient funds for gas * price + value: have 1500000 want 2504000".to_string(),
                code: Some(-32000),
            })
            .await;
        let plan = plan(&h).await;
        let start = Instant::now();

        let err = h.executor.execute(plan, &mut h.account).await.unwrap_err();

        assert!(matches!(err, BotError::Broadcast(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_confirmation_without_wait() {
        let mut h = harness(ExecutorConfig {
            wait_for_confirmation: false,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let plan = plan(&h).await;
        let start = Instant::now();

        let outcome = h.executor.execute(plan, &mut h.account).await.unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Confirmed { receipt: None, .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(h.client.receipt_polls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_receipt_is_an_error() {
        let mut h = harness(fast_config());
        h.client.set_revert(true).await;
        let plan = plan(&h).await;

        let err = h.executor.execute(plan, &mut h.account).await.unwrap_err();
        assert!(matches!(err, BotError::Reverted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_intent_replaces_stalled_transaction_at_same_nonce() {
        let mut h = harness(ExecutorConfig {
            max_resubmissions: 0,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let intent = TransactionIntent::new(Address::repeat_byte(3), U256::from(1), ActionKind::PeerTransfer);

        let err = h
            .executor
            .submit_intent(&h.planner, intent, &mut h.account, true)
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::ConfirmationTimeout { .. }));
        let broadcasts = h.client.broadcasts().await;
        assert_eq!(broadcasts.len(), 2);
        assert_ne!(broadcasts[0].hash, broadcasts[1].hash);
        assert_eq!(broadcasts[0].nonce, broadcasts[1].nonce);
        assert!(broadcasts[1].gas_price > broadcasts[0].gas_price);

        let stalled = h.account.stalled.clone().unwrap();
        assert_eq!(stalled.nonce, 0);
        assert_eq!(stalled.gas_price, broadcasts[1].gas_price);
        assert_eq!(stalled.hashes, vec![broadcasts[0].hash, broadcasts[1].hash]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_submission_reuses_stalled_nonce() {
        let mut h = harness(ExecutorConfig {
            max_resubmissions: 0,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        for _ in 0..2 {
            let intent = TransactionIntent::new(h.account.address, U256::from(1), ActionKind::SelfTransfer);
            let err = h
                .executor
                .submit_intent(&h.planner, intent, &mut h.account, true)
                .await
                .unwrap_err();
            assert!(matches!(err, BotError::ConfirmationTimeout { .. }));
        }

        let broadcasts = h.client.broadcasts().await;
        assert_eq!(broadcasts.len(), 4);
        assert!(broadcasts.iter().all(|b| b.nonce == 0));
        for pair in broadcasts.windows(2) {
            assert!(pair[1].gas_price > pair[0].gas_price);
        }
        assert_eq!(h.account.stalled.as_ref().unwrap().hashes.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_landed_stalled_transaction_confirms_the_replacement_cycle() {
        let mut h = harness(ExecutorConfig {
            max_resubmissions: 0,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let intent = TransactionIntent::new(h.account.address, U256::from(1), ActionKind::SelfTransfer);
        h.executor
            .submit_intent(&h.planner, intent.clone(), &mut h.account, true)
            .await
            .unwrap_err();
        let first = h.client.broadcasts().await[0].hash;

        // the first hash gets mined; the node now rejects the nonce
        h.client.set_receipt_mode(ReceiptMode::Immediate).await;
        h.client
            .push_broadcast_error(ChainError::RpcResponse {
                message: "nonce too low".to_string(),
                code: Some(-32000),
            })
            .await;

        let outcome = h
            .executor
            .submit_intent(&h.planner, intent, &mut h.account, true)
            .await
            .unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Confirmed { hash, .. } if hash == first));
        assert!(h.account.stalled.is_none());
        assert_eq!(h.client.broadcasts().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_stalled_nonce_is_forgotten() {
        let mut h = harness(ExecutorConfig {
            max_resubmissions: 0,
            ..fast_config()
        });
        h.client.set_receipt_mode(ReceiptMode::Never).await;
        let intent = TransactionIntent::new(h.account.address, U256::from(1), ActionKind::SelfTransfer);
        h.executor
            .submit_intent(&h.planner, intent.clone(), &mut h.account, true)
            .await
            .unwrap_err();

        h.client.set_nonces(1, 1).await;
        h.client.set_receipt_mode(ReceiptMode::Immediate).await;
        h.executor
            .submit_intent(&h.planner, intent, &mut h.account, true)
            .await
            .unwrap();

        let broadcasts = h.client.broadcasts().await;
        assert_eq!(broadcasts.last().unwrap().nonce, 1);
        assert!(h.account.stalled.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_submissions_use_increasing_nonces() {
        let mut h = harness(fast_config());
        for _ in 0..3 {
            let intent = TransactionIntent::new(h.account.address, U256::from(1), ActionKind::SelfTransfer);
            h.executor
                .submit_intent(&h.planner, intent, &mut h.account, true)
                .await
                .unwrap();
        }

        let nonces: Vec<u64> = h.client.broadcasts().await.iter().map(|b| b.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
        let pending = h
            .client
            .transaction_count(h.account.address, BlockTag::Pending)
            .await
            .unwrap();
        assert_eq!(pending, 3);
    }

    #[test]
    fn test_already_known_detection() {
        assert!(is_already_known(&ChainError::RpcResponse {
            message: "already known".to_string(),
            code: Some(-32000)
        }));
        assert!(!is_already_known(&ChainError::RpcResponse {
            message: "nonce too low".to_string(),
            code: Some(-32000)
        }));
    }
}
