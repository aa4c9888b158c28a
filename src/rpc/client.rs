//! HTTP JSON-RPC client backed by an alloy `RootProvider`
//!
//! All requests from every account loop share one direct rate limiter so the
//! upstream endpoint sees at most `rate_limit_rps` requests per second.

use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::{Client, Url};
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::ChainClient;
use crate::config::RpcConfig;
use crate::errors::{ChainError, ChainResult};
use crate::types::{BlockTag, CallRequest, SignedTransaction, TxReceipt};

/// Rate-limited alloy provider
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: RootProvider,
    limiter: Arc<DefaultDirectRateLimiter>,
    url: String,
}

impl std::fmt::Debug for AlloyChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyChainClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl AlloyChainClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &RpcConfig) -> ChainResult<Self> {
        let url: Url = config
            .url
            .parse()
            .map_err(|err| ChainError::Configuration(format!("invalid rpc.url {}: {}", config.url, err)))?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| ChainError::Configuration(err.to_string()))?;

        let rps = NonZeroU32::new(config.rate_limit_rps)
            .ok_or_else(|| ChainError::Configuration("rpc.rate_limit_rps must be non-zero".to_string()))?;

        let transport = Http::with_client(http_client, url);
        let provider = RootProvider::new(RpcClient::new(transport, false));

        Ok(Self {
            provider,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            url: config.url.clone(),
        })
    }

    async fn throttle(&self) {
        self.limiter.until_ready().await;
    }
}

fn to_request(request: &CallRequest) -> TransactionRequest {
    let mut tx = TransactionRequest::default()
        .with_to(request.to)
        .with_value(request.value);
    if let Some(from) = request.from {
        tx = tx.with_from(from);
    }
    if let Some(data) = &request.data {
        tx = tx.with_input(data.clone());
    }
    tx
}

/// Classify an alloy transport error
pub(crate) fn map_transport_error(err: TransportError) -> ChainError {
    match err {
        RpcError::ErrorResp(payload) => ChainError::RpcResponse {
            message: payload.message.to_string(),
            code: Some(payload.code),
        },
        RpcError::Transport(kind) => {
            let status = match &kind {
                TransportErrorKind::HttpError(http) => Some(http.status),
                _ => None,
            };
            ChainError::Transport {
                message: kind.to_string(),
                status,
            }
        }
        RpcError::DeserError { err, text } => {
            ChainError::Decoding(format!("{} (response: {})", err, text))
        }
        other => ChainError::transport(other.to_string()),
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    #[instrument(skip(self), level = "debug")]
    async fn balance(&self, address: Address) -> ChainResult<U256> {
        self.throttle().await;
        self.provider
            .get_balance(address)
            .await
            .map_err(map_transport_error)
    }

    #[instrument(skip(self), level = "debug")]
    async fn transaction_count(&self, address: Address, tag: BlockTag) -> ChainResult<u64> {
        self.throttle().await;
        let call = self.provider.get_transaction_count(address);
        let call = match tag {
            BlockTag::Latest => call.latest(),
            BlockTag::Pending => call.pending(),
        };
        call.await.map_err(map_transport_error)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> ChainResult<u64> {
        self.throttle().await;
        self.provider
            .estimate_gas(to_request(request))
            .await
            .map_err(map_transport_error)
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        self.throttle().await;
        self.provider.get_gas_price().await.map_err(map_transport_error)
    }

    async fn call(&self, request: &CallRequest) -> ChainResult<Bytes> {
        self.throttle().await;
        self.provider
            .call(to_request(request))
            .await
            .map_err(map_transport_error)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<B256> {
        self.throttle().await;
        let pending = self
            .provider
            .send_raw_transaction(&tx.raw)
            .await
            .map_err(map_transport_error)?;
        debug!(hash = %pending.tx_hash(), nonce = tx.nonce, "Raw transaction accepted");
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: B256) -> ChainResult<Option<TxReceipt>> {
        self.throttle().await;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(map_transport_error)?;

        Ok(receipt.map(|receipt| TxReceipt {
            hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
            success: receipt.status(),
        }))
    }
}
