//! Gas & nonce planner
//!
//! Turns a [`TransactionIntent`] into a [`TransactionPlan`]. Nothing is
//! cached between calls: the nonce and the gas price are read from the
//! endpoint every time a plan is built.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::GasConfig;
use crate::errors::{BotError, BotResult};
use crate::metrics::Metrics;
use crate::retry::{retry_fixed, RetryConfig};
use crate::rpc::ChainClient;
use crate::types::{BlockTag, CallRequest, StalledTransaction, TransactionIntent, TransactionPlan};

/// Price a replacement must beat: +12.5%, above the 10% most nodes require
pub fn bumped_gas_price(price: u128) -> u128 {
    price.saturating_add((price / 8).max(1))
}

/// Computes nonce, gas limit and gas price for pending transactions
#[derive(Clone)]
pub struct GasPlanner {
    client: Arc<dyn ChainClient>,
    config: GasConfig,
    floor_price: u128,
    metrics: Arc<Metrics>,
}

impl GasPlanner {
    pub fn new(
        client: Arc<dyn ChainClient>,
        config: GasConfig,
        floor_price: u128,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            config,
            floor_price,
            metrics,
        }
    }

    /// Plan an intent sent from `from`
    pub async fn plan(&self, intent: TransactionIntent, from: Address) -> BotResult<TransactionPlan> {
        let nonce = self.next_nonce(from).await?;
        let gas_price = self.gas_price().await?;
        let gas_limit = self.gas_limit(&intent, from).await?;
        Ok(self.finish(intent, from, nonce, gas_limit, gas_price))
    }

    /// Plan an intent that replaces `stalled`.
    ///
    /// The nonce is the stalled one. The gas price is at least the stalled
    /// price bumped by 12.5% and the gas limit never drops below the stalled
    /// limit or the configured static limit.
    pub async fn plan_replacement(
        &self,
        intent: TransactionIntent,
        from: Address,
        stalled: &StalledTransaction,
    ) -> BotResult<TransactionPlan> {
        let gas_price = self.gas_price().await?.max(bumped_gas_price(stalled.gas_price));
        let gas_limit = self
            .gas_limit(&intent, from)
            .await?
            .max(stalled.gas_limit)
            .max(self.config.gas_limit);
        Ok(self.finish(intent, from, stalled.nonce, gas_limit, gas_price))
    }

    fn finish(
        &self,
        intent: TransactionIntent,
        from: Address,
        nonce: u64,
        gas_limit: u64,
        gas_price: u128,
    ) -> TransactionPlan {
        debug!(
            address = %from,
            kind = %intent.kind,
            nonce,
            gas_limit,
            gas_price,
            "Transaction planned"
        );
        TransactionPlan {
            intent,
            nonce,
            gas_limit,
            gas_price,
        }
    }

    async fn gas_limit(&self, intent: &TransactionIntent, from: Address) -> BotResult<u64> {
        if self.config.force_estimation {
            self.estimate(intent, from).await
        } else {
            Ok(self.config.gas_limit)
        }
    }

    /// Larger of the latest and pending transaction counts
    pub async fn next_nonce(&self, from: Address) -> BotResult<u64> {
        let latest = self.client.transaction_count(from, BlockTag::Latest).await?;
        let pending = self.client.transaction_count(from, BlockTag::Pending).await?;
        Ok(latest.max(pending))
    }

    /// Suggested gas price raised to the configured floor
    pub async fn gas_price(&self) -> BotResult<u128> {
        let suggested = self.client.gas_price().await?;
        Ok(suggested.max(self.floor_price))
    }

    async fn estimate(&self, intent: &TransactionIntent, from: Address) -> BotResult<u64> {
        let request = CallRequest::from((intent, from));
        let retry = RetryConfig::new(
            self.config.estimate_retries,
            Duration::from_millis(self.config.estimate_delay_ms),
        );

        let client = &self.client;
        let metrics = &self.metrics;
        let request = &request;
        retry_fixed("estimate_gas", &retry, || async move {
            let result = client.estimate_gas(request).await;
            if result.is_err() {
                metrics.gas_estimate_retries_total.inc();
            }
            result
        })
        .await
        .map_err(|exhausted| BotError::EstimationFailed {
            attempts: exhausted.attempts,
            last_error: exhausted.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_metrics, MockChainClient};
    use crate::types::ActionKind;
    use alloy::primitives::U256;
    use tokio::time::Instant;

    fn planner(client: &MockChainClient, config: GasConfig, floor: u128) -> GasPlanner {
        GasPlanner::new(Arc::new(client.clone()), config, floor, test_metrics())
    }

    fn intent() -> TransactionIntent {
        TransactionIntent::new(Address::repeat_byte(2), U256::from(1), ActionKind::SelfTransfer)
    }

    #[tokio::test]
    async fn test_nonce_is_max_of_latest_and_pending() {
        let client = MockChainClient::new();
        let planner = planner(&client, GasConfig::default(), 0);

        client.set_nonces(4, 7).await;
        assert_eq!(planner.plan(intent(), Address::ZERO).await.unwrap().nonce, 7);

        client.set_nonces(9, 3).await;
        assert_eq!(planner.plan(intent(), Address::ZERO).await.unwrap().nonce, 9);
    }

    #[tokio::test]
    async fn test_gas_price_respects_floor() {
        let client = MockChainClient::new();
        client.set_gas_price(100).await;

        let floored = planner(&client, GasConfig::default(), 2_000_000_000);
        assert_eq!(floored.plan(intent(), Address::ZERO).await.unwrap().gas_price, 2_000_000_000);

        let unfloored = planner(&client, GasConfig::default(), 0);
        assert_eq!(unfloored.plan(intent(), Address::ZERO).await.unwrap().gas_price, 100);
    }

    #[tokio::test]
    async fn test_static_limit_skips_estimation() {
        let client = MockChainClient::new();
        let config = GasConfig {
            force_estimation: false,
            gas_limit: 123_456,
            ..GasConfig::default()
        };
        let plan = planner(&client, config, 0).plan(intent(), Address::ZERO).await.unwrap();

        assert_eq!(plan.gas_limit, 123_456);
        assert_eq!(client.estimate_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimation_recovers_before_retries_exhausted() {
        let client = MockChainClient::new();
        client.set_gas_estimate(42_000).await;
        client.fail_estimates(2).await;
        let planner = planner(&client, GasConfig::default(), 0);
        let start = Instant::now();

        let plan = planner.plan(intent(), Address::ZERO).await.unwrap();

        assert_eq!(plan.gas_limit, 42_000);
        assert_eq!(client.estimate_calls().await, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(planner.metrics.gas_estimate_retries_total.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimation_fails_after_exactly_retries_attempts() {
        for failures in [3, 4, 10] {
            let client = MockChainClient::new();
            client.fail_estimates(failures).await;
            let planner = planner(&client, GasConfig::default(), 0);

            let err = planner.plan(intent(), Address::ZERO).await.unwrap_err();

            assert!(matches!(err, BotError::EstimationFailed { attempts: 3, .. }));
            assert_eq!(client.estimate_calls().await, 3);
        }
    }

    #[tokio::test]
    async fn test_replacement_keeps_nonce_and_outbids_stalled() {
        let client = MockChainClient::new();
        client.set_gas_estimate(21_000).await;
        client.set_gas_price(1_000).await;
        client.set_nonces(4, 5).await;
        let planner = planner(&client, GasConfig::default(), 0);
        let stalled = StalledTransaction {
            nonce: 4,
            gas_price: 2_000,
            gas_limit: 400_000,
            hashes: Vec::new(),
        };

        let plan = planner
            .plan_replacement(intent(), Address::ZERO, &stalled)
            .await
            .unwrap();
        assert_eq!(plan.nonce, 4);
        assert_eq!(plan.gas_price, 2_250);
        assert_eq!(plan.gas_limit, 400_000);

        // a network price above the bump wins; the static limit is a floor
        client.set_gas_price(9_000).await;
        let cheap = StalledTransaction {
            gas_limit: 30_000,
            ..stalled
        };
        let plan = planner
            .plan_replacement(intent(), Address::ZERO, &cheap)
            .await
            .unwrap();
        assert_eq!(plan.gas_price, 9_000);
        assert_eq!(plan.gas_limit, 300_000);
    }

    #[test]
    fn test_bumped_gas_price() {
        assert_eq!(bumped_gas_price(1_000_000_000), 1_125_000_000);
        assert_eq!(bumped_gas_price(0), 1);
        assert_eq!(bumped_gas_price(u128::MAX), u128::MAX);
    }
}
