//! Test Utilities Module
//!
//! Deterministic stand-ins for the chain client and the signer, used by unit
//! and scenario tests. Nothing here touches the network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::errors::{ChainError, ChainResult};
use crate::metrics::Metrics;
use crate::rpc::ChainClient;
use crate::types::{BlockTag, CallRequest, SignedTransaction, TxReceipt};
use crate::wallet::{Credential, LocalWallet};

/// Anvil/hardhat development account #0
pub const DEV_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Anvil/hardhat development account #1
pub const DEV_KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

const SELECTOR_DEPOSIT: [u8; 4] = [0xd0, 0xe3, 0x0d, 0xb0];
const SELECTOR_WITHDRAW: [u8; 4] = [0x2e, 0x1a, 0x7d, 0x4d];
const SELECTOR_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const SELECTOR_ALLOWANCE: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
const SELECTOR_APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// How the mock answers receipt polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    /// Every broadcast transaction is mined before the first poll
    Immediate,
    /// Receipts never appear
    Never,
    /// Receipts appear once more than `n` polls have been served
    AfterPolls(u32),
}

/// One accepted broadcast
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub hash: B256,
    pub nonce: u64,
    pub gas_price: u128,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub at: Instant,
}

impl BroadcastRecord {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Debug)]
struct MockState {
    balance: U256,
    wrapped_balance: U256,
    allowance: U256,
    latest_nonce: u64,
    pending_nonce: u64,
    gas_price: u128,
    gas_estimate: u64,
    estimate_failures_remaining: u32,
    estimate_calls: u32,
    receipt_mode: ReceiptMode,
    receipt_polls: u32,
    revert: bool,
    broadcast_errors: VecDeque<ChainError>,
    broadcasts: Vec<BroadcastRecord>,
    mined: HashSet<B256>,
}

/// Mock chain client with a single account's view of the chain
///
/// Broadcasting advances the pending nonce; serving a receipt moves the
/// latest nonce up to the pending one. Wrapped-token deposits, withdrawals
/// and approvals are reflected in the `balanceOf`/`allowance` answers.
#[derive(Clone)]
pub struct MockChainClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    /// 1 ETH balance, nonce 0, 1 gwei gas price, receipts mined immediately
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                balance: U256::from(1_000_000_000_000_000_000u64),
                wrapped_balance: U256::ZERO,
                allowance: U256::ZERO,
                latest_nonce: 0,
                pending_nonce: 0,
                gas_price: 1_000_000_000,
                gas_estimate: 50_000,
                estimate_failures_remaining: 0,
                estimate_calls: 0,
                receipt_mode: ReceiptMode::Immediate,
                receipt_polls: 0,
                revert: false,
                broadcast_errors: VecDeque::new(),
                broadcasts: Vec::new(),
                mined: HashSet::new(),
            })),
        }
    }

    pub async fn set_balance(&self, balance: U256) {
        self.state.lock().await.balance = balance;
    }

    pub async fn set_wrapped_balance(&self, balance: U256) {
        self.state.lock().await.wrapped_balance = balance;
    }

    pub async fn set_allowance(&self, allowance: U256) {
        self.state.lock().await.allowance = allowance;
    }

    pub async fn set_nonces(&self, latest: u64, pending: u64) {
        let mut state = self.state.lock().await;
        state.latest_nonce = latest;
        state.pending_nonce = pending;
    }

    pub async fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().await.gas_price = gas_price;
    }

    pub async fn set_gas_estimate(&self, gas: u64) {
        self.state.lock().await.gas_estimate = gas;
    }

    /// Fail the next `n` estimation calls
    pub async fn fail_estimates(&self, n: u32) {
        self.state.lock().await.estimate_failures_remaining = n;
    }

    pub async fn set_receipt_mode(&self, mode: ReceiptMode) {
        let mut state = self.state.lock().await;
        state.receipt_mode = mode;
        state.receipt_polls = 0;
    }

    /// Mined receipts report execution failure
    pub async fn set_revert(&self, revert: bool) {
        self.state.lock().await.revert = revert;
    }

    /// Queue an error for the next broadcast
    pub async fn push_broadcast_error(&self, err: ChainError) {
        self.state.lock().await.broadcast_errors.push_back(err);
    }

    pub async fn estimate_calls(&self) -> u32 {
        self.state.lock().await.estimate_calls
    }

    pub async fn receipt_polls(&self) -> u32 {
        self.state.lock().await.receipt_polls
    }

    pub async fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.state.lock().await.broadcasts.clone()
    }

    pub async fn wrapped_balance(&self) -> U256 {
        self.state.lock().await.wrapped_balance
    }
}

fn word(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

fn apply_effects(state: &mut MockState, value: U256, input: &Bytes) {
    let Some(selector) = input.get(..4) else {
        return;
    };
    if selector == SELECTOR_DEPOSIT {
        state.wrapped_balance += value;
    } else if selector == SELECTOR_WITHDRAW && input.len() >= 36 {
        let amount = U256::from_be_slice(&input[4..36]);
        state.wrapped_balance = state.wrapped_balance.saturating_sub(amount);
    } else if selector == SELECTOR_APPROVE {
        state.allowance = U256::MAX;
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn balance(&self, _address: Address) -> ChainResult<U256> {
        Ok(self.state.lock().await.balance)
    }

    async fn transaction_count(&self, _address: Address, tag: BlockTag) -> ChainResult<u64> {
        let state = self.state.lock().await;
        Ok(match tag {
            BlockTag::Latest => state.latest_nonce,
            BlockTag::Pending => state.pending_nonce,
        })
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> ChainResult<u64> {
        let mut state = self.state.lock().await;
        state.estimate_calls += 1;
        if state.estimate_failures_remaining > 0 {
            state.estimate_failures_remaining -= 1;
            return Err(ChainError::transport("mock estimation failure"));
        }
        Ok(state.gas_estimate)
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(self.state.lock().await.gas_price)
    }

    async fn call(&self, request: &CallRequest) -> ChainResult<Bytes> {
        let state = self.state.lock().await;
        let selector = request.data.as_ref().and_then(|d| d.get(..4));
        match selector {
            Some(s) if s == SELECTOR_BALANCE_OF => Ok(word(state.wrapped_balance)),
            Some(s) if s == SELECTOR_ALLOWANCE => Ok(word(state.allowance)),
            _ => Ok(Bytes::new()),
        }
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<B256> {
        let envelope = TxEnvelope::decode_2718(&mut tx.raw.as_ref())
            .map_err(|err| ChainError::Decoding(err.to_string()))?;

        let mut state = self.state.lock().await;
        if let Some(err) = state.broadcast_errors.pop_front() {
            return Err(err);
        }

        let first_sight = !state.broadcasts.iter().any(|b| b.hash == tx.hash);
        if first_sight {
            if tx.nonce >= state.pending_nonce {
                state.pending_nonce = tx.nonce + 1;
            }
            apply_effects(&mut state, envelope.value(), envelope.input());
        }

        state.broadcasts.push(BroadcastRecord {
            hash: tx.hash,
            nonce: tx.nonce,
            gas_price: envelope.gas_price().unwrap_or_default(),
            to: envelope.to(),
            value: envelope.value(),
            input: envelope.input().clone(),
            at: Instant::now(),
        });
        Ok(tx.hash)
    }

    async fn receipt(&self, hash: B256) -> ChainResult<Option<TxReceipt>> {
        let mut state = self.state.lock().await;
        state.receipt_polls += 1;

        let known = state.broadcasts.iter().any(|b| b.hash == hash);
        let available = known
            && match state.receipt_mode {
                ReceiptMode::Immediate => true,
                ReceiptMode::Never => false,
                ReceiptMode::AfterPolls(n) => state.receipt_polls > n,
            };
        if !available && !state.mined.contains(&hash) {
            return Ok(None);
        }

        state.mined.insert(hash);
        state.latest_nonce = state.pending_nonce;
        Ok(Some(TxReceipt {
            hash,
            block_number: Some(1),
            gas_used: 21_000,
            success: !state.revert,
        }))
    }
}

/// Wallet for anvil development account #0
pub fn test_wallet() -> LocalWallet {
    wallet_from_key(DEV_KEY_0)
}

/// Wallet for anvil development account #1
pub fn second_test_wallet() -> LocalWallet {
    wallet_from_key(DEV_KEY_1)
}

fn wallet_from_key(key: &str) -> LocalWallet {
    let credential = Credential::parse(key, 0).expect("valid development key");
    LocalWallet::from_credential(&credential).expect("development key derives")
}

/// Fresh metrics registry
pub fn test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().expect("metrics registry"))
}

/// Configuration tuned for fast, deterministic tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.gas.estimate_delay_ms = 3_000;
    config.executor.confirmation_timeout_ms = 5_000;
    config.executor.receipt_poll_interval_ms = 2_000;
    config.timing.min_delay_ms = 1_000;
    config.timing.max_delay_ms = 2_000;
    config.timing.step_delay_ms = 10;
    config.actions.wrap_unwrap.wrapped_token =
        Some("0x4200000000000000000000000000000000000006".to_string());
    config
}
