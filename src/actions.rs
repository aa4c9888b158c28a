//! Action execution
//!
//! Turns [`ActionParams`] into one or more transactions and runs them through
//! the planner and the executor.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::Account;
use crate::contracts::{
    allowance_calldata, approve_max_calldata, balance_of_calldata, decode_u256, deposit_calldata,
    ping_calldata, withdraw_calldata,
};
use crate::errors::BotResult;
use crate::executor::TransactionExecutor;
use crate::planner::GasPlanner;
use crate::rpc::ChainClient;
use crate::selector::ActionParams;
use crate::types::{ActionKind, CallRequest, ExecutionOutcome, TransactionIntent};

/// Value sent with the interaction contract's `ping`
const PING_VALUE_WEI: u64 = 1;

/// Executes selected actions for an account
#[derive(Clone)]
pub struct ActionRunner {
    client: Arc<dyn ChainClient>,
    planner: GasPlanner,
    executor: TransactionExecutor,
}

impl ActionRunner {
    pub fn new(
        client: Arc<dyn ChainClient>,
        planner: GasPlanner,
        executor: TransactionExecutor,
    ) -> Self {
        Self {
            client,
            planner,
            executor,
        }
    }

    /// Run one action instance. A `WrapUnwrap` instance is the deposit and
    /// the withdraw together.
    pub async fn perform(&self, account: &mut Account, params: &ActionParams) -> BotResult<()> {
        match params {
            ActionParams::WrapUnwrap { token, amount } => {
                self.wrap(account, *token, *amount).await?;
                self.unwrap(account, *token).await
            }
            ActionParams::SelfTransfer { amount } => {
                info!(address = %account.address, amount = %format_ether(*amount), "Transferring to self");
                let intent = TransactionIntent::new(account.address, *amount, ActionKind::SelfTransfer);
                self.submit(account, intent).await
            }
            ActionParams::PeerTransfer { recipient, amount } => {
                info!(
                    address = %account.address,
                    recipient = %recipient,
                    amount = %format_ether(*amount),
                    "Transferring to peer"
                );
                let intent = TransactionIntent::new(*recipient, *amount, ActionKind::PeerTransfer);
                self.submit(account, intent).await
            }
            ActionParams::ContractCall {
                contract,
                spender,
                min_allowance,
            } => {
                self.ensure_allowance(account, *contract, *spender, *min_allowance, ActionKind::ContractCall)
                    .await?;
                let value = U256::from(PING_VALUE_WEI);
                let intent = TransactionIntent::new(*contract, value, ActionKind::ContractCall)
                    .with_data(ping_calldata(value));
                self.submit(account, intent).await
            }
            ActionParams::RawCall {
                contract,
                value,
                data,
                approval_token,
                min_allowance,
            } => {
                if let Some(token) = approval_token {
                    self.ensure_allowance(account, *token, *contract, *min_allowance, ActionKind::RawCall)
                        .await?;
                }
                info!(address = %account.address, contract = %contract, "Executing raw transaction");
                let intent =
                    TransactionIntent::new(*contract, *value, ActionKind::RawCall).with_data(data.clone());
                self.submit(account, intent).await
            }
        }
    }

    /// Approve `spender` for the maximum amount when the current allowance
    /// is below `min_allowance`. Returns whether an approval was sent.
    pub async fn ensure_allowance(
        &self,
        account: &mut Account,
        token: Address,
        spender: Address,
        min_allowance: U256,
        kind: ActionKind,
    ) -> BotResult<bool> {
        let data = self
            .client
            .call(&CallRequest::read(token, allowance_calldata(account.address, spender)))
            .await?;
        let allowance = decode_u256(&data)?;
        if allowance >= min_allowance {
            return Ok(false);
        }

        info!(address = %account.address, token = %token, spender = %spender, "Approving token spend");
        let intent = TransactionIntent::new(token, U256::ZERO, kind).with_data(approve_max_calldata(spender));
        // Approval is always awaited, whatever the configured default
        self.executor
            .submit_intent(&self.planner, intent, account, true)
            .await?;
        info!(address = %account.address, token = %token, "Token approved");
        Ok(true)
    }

    async fn wrap(&self, account: &mut Account, token: Address, amount: U256) -> BotResult<()> {
        info!(address = %account.address, amount = %format_ether(amount), "Wrapping native coin");
        let intent = TransactionIntent::new(token, amount, ActionKind::WrapUnwrap).with_data(deposit_calldata());
        self.submit(account, intent).await
    }

    async fn unwrap(&self, account: &mut Account, token: Address) -> BotResult<()> {
        let data = self
            .client
            .call(&CallRequest::read(token, balance_of_calldata(account.address)))
            .await?;
        let wrapped = decode_u256(&data)?;
        if wrapped.is_zero() {
            warn!(address = %account.address, "Nothing to unwrap");
            return Ok(());
        }

        info!(address = %account.address, amount = %format_ether(wrapped), "Unwrapping token");
        let intent = TransactionIntent::new(token, U256::ZERO, ActionKind::WrapUnwrap)
            .with_data(withdraw_calldata(wrapped));
        self.submit(account, intent).await
    }

    async fn submit(&self, account: &mut Account, intent: TransactionIntent) -> BotResult<()> {
        let wait = self.executor.waits_for_confirmation();
        let outcome = self
            .executor
            .submit_intent(&self.planner, intent, account, wait)
            .await?;
        if let ExecutionOutcome::Confirmed { hash, .. } = outcome {
            info!(address = %account.address, "{}", self.executor.explorer_link(hash));
        }
        Ok(())
    }
}
