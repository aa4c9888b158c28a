//! RPC Module
//!
//! The chain client abstraction every other component talks to, plus the
//! alloy-backed HTTP implementation.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::errors::ChainResult;
use crate::types::{BlockTag, CallRequest, SignedTransaction, TxReceipt};

pub mod client;

pub use client::AlloyChainClient;

/// Outbound JSON-RPC surface used by the bot
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in wei
    async fn balance(&self, address: Address) -> ChainResult<U256>;

    /// `eth_getTransactionCount` at the given tag
    async fn transaction_count(&self, address: Address, tag: BlockTag) -> ChainResult<u64>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, request: &CallRequest) -> ChainResult<u64>;

    /// Suggested legacy gas price in wei
    async fn gas_price(&self) -> ChainResult<u128>;

    /// Read-only `eth_call`
    async fn call(&self, request: &CallRequest) -> ChainResult<Bytes>;

    /// `eth_sendRawTransaction`, returns the transaction hash
    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<B256>;

    /// `eth_getTransactionReceipt`, `None` while the transaction is pending
    async fn receipt(&self, hash: B256) -> ChainResult<Option<TxReceipt>>;
}
