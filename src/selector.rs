//! Action selector
//!
//! Decides which action an account runs next and builds its parameters from
//! the configuration and today's quota-ledger counts.

use alloy::primitives::{Address, Bytes, U256};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{parse_address, required_address, ActionsConfig, ConfigError};
use crate::errors::{BotError, BotResult};
use crate::ledger::QuotaLedger;
use crate::status::QuotaStatus;
use crate::types::ActionKind;

/// Fractional digits kept when drawing random amounts
pub const AMOUNT_DECIMALS: u32 = 4;

/// Wei per smallest drawable unit (1e-4 native)
const WEI_PER_UNIT: u64 = 100_000_000_000_000;

/// Parameters of one action instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParams {
    /// deposit(`amount`) then withdraw of the whole wrapped balance
    WrapUnwrap { token: Address, amount: U256 },
    SelfTransfer { amount: U256 },
    PeerTransfer { recipient: Address, amount: U256 },
    /// `ping(1)` after the allowance gate
    ContractCall {
        contract: Address,
        spender: Address,
        /// Allowance below this triggers an unlimited approval
        min_allowance: U256,
    },
    RawCall {
        contract: Address,
        value: U256,
        data: Bytes,
        approval_token: Option<Address>,
        min_allowance: U256,
    },
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionParams::WrapUnwrap { .. } => ActionKind::WrapUnwrap,
            ActionParams::SelfTransfer { .. } => ActionKind::SelfTransfer,
            ActionParams::PeerTransfer { .. } => ActionKind::PeerTransfer,
            ActionParams::ContractCall { .. } => ActionKind::ContractCall,
            ActionParams::RawCall { .. } => ActionKind::RawCall,
        }
    }
}

/// Result of [`ActionSelector::select_next`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Next(ActionKind, ActionParams),
    /// Every enabled quota is used up for today
    Idle,
}

/// `limit - today`, floored at zero
pub fn remaining_quota(limit: u32, today: u32) -> u32 {
    limit.saturating_sub(today)
}

/// Draw an amount in `[min, max]` (native units) at 4 decimals, in wei
pub fn random_amount<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> BotResult<U256> {
    let scale = 10f64.powi(AMOUNT_DECIMALS as i32);
    // Tolerate binary representation noise such as 0.0003 * 1e4 = 2.9999999999999996
    let low = (min * scale - 1e-6).ceil().max(0.0) as u64;
    let high = (max * scale + 1e-6).floor() as u64;
    if !(min <= max) || low > high {
        return Err(BotError::Configuration(format!(
            "amount range [{}, {}] contains no value with {} decimals",
            min, max, AMOUNT_DECIMALS
        )));
    }
    let units = rng.gen_range(low..=high);
    Ok(U256::from(units) * U256::from(WEI_PER_UNIT))
}

/// Uniform pause between two transactions
pub fn random_delay<R: Rng + ?Sized>(rng: &mut R, min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rng.gen_range(min_ms..=max_ms.max(min_ms)))
}

/// Chooses actions and their parameters for one account
#[derive(Clone)]
pub struct ActionSelector {
    config: ActionsConfig,
    ledger: Arc<dyn QuotaLedger>,
}

impl ActionSelector {
    pub fn new(config: ActionsConfig, ledger: Arc<dyn QuotaLedger>) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &ActionsConfig {
        &self.config
    }

    /// Today's progress of `kind` for `address`
    pub async fn quota(&self, address: Address, kind: ActionKind) -> BotResult<QuotaStatus> {
        let (enabled, limit) = self.config.limit(kind);
        let today = self.ledger.count_today(address, kind).await?;
        Ok(QuotaStatus {
            kind,
            today,
            limit,
            enabled,
        })
    }

    /// Progress of every kind, in priority order
    pub async fn quotas(&self, address: Address) -> BotResult<Vec<QuotaStatus>> {
        let mut quotas = Vec::with_capacity(ActionKind::PRIORITY.len());
        for kind in ActionKind::PRIORITY {
            quotas.push(self.quota(address, kind).await?);
        }
        Ok(quotas)
    }

    /// Executions of `kind` still allowed today; zero when disabled
    pub async fn remaining(&self, address: Address, kind: ActionKind) -> BotResult<u32> {
        let quota = self.quota(address, kind).await?;
        Ok(if quota.enabled {
            remaining_quota(quota.limit, quota.today)
        } else {
            0
        })
    }

    /// First kind in priority order with quota left, with fresh parameters.
    ///
    /// `failed` counts executions per kind that ended without a ledger
    /// record in the current cycle; they use up quota until the next cycle.
    pub async fn select_next(
        &self,
        index: usize,
        address: Address,
        failed: &HashMap<ActionKind, u32>,
    ) -> BotResult<Selection> {
        for kind in ActionKind::PRIORITY {
            let spent = failed.get(&kind).copied().unwrap_or(0);
            if self.remaining(address, kind).await?.saturating_sub(spent) > 0 {
                let params = self.params(kind, index, address)?;
                return Ok(Selection::Next(kind, params));
            }
        }
        Ok(Selection::Idle)
    }

    /// Build parameters for one execution of `kind`.
    ///
    /// Missing or inconsistent settings raise `BotError::Configuration`.
    pub fn params(&self, kind: ActionKind, index: usize, address: Address) -> BotResult<ActionParams> {
        let config = &self.config;
        match kind {
            ActionKind::WrapUnwrap => {
                let token = required_address(
                    "actions.wrap_unwrap.wrapped_token",
                    config.wrap_unwrap.wrapped_token.as_deref(),
                )?;
                Ok(ActionParams::WrapUnwrap {
                    token,
                    amount: self.amount()?,
                })
            }
            ActionKind::SelfTransfer => Ok(ActionParams::SelfTransfer {
                amount: self.amount()?,
            }),
            ActionKind::PeerTransfer => Ok(ActionParams::PeerTransfer {
                recipient: self.pick_peer()?,
                amount: self.amount()?,
            }),
            ActionKind::ContractCall => {
                let contract =
                    required_address("actions.contract_call.contract", config.contract_call.contract.as_deref())?;
                let spender = match config.contract_call.spender.as_deref() {
                    Some(spender) => parse_address("actions.contract_call.spender", spender)?,
                    None => address,
                };
                Ok(ActionParams::ContractCall {
                    contract,
                    spender,
                    min_allowance: config.amount_max_wei()?,
                })
            }
            ActionKind::RawCall => {
                let contract =
                    required_address("actions.raw_call.contract", config.raw_call.contract.as_deref())?;
                let raw = config.raw_call.data.get(index).ok_or_else(|| {
                    BotError::Configuration(format!(
                        "actions.raw_call.data has no entry for account {}",
                        index + 1
                    ))
                })?;
                let data = hex::decode(raw.trim().trim_start_matches("0x")).map_err(|err| {
                    BotError::Configuration(format!("actions.raw_call.data[{}] is not hex: {}", index, err))
                })?;
                let approval_token = config
                    .raw_call
                    .approval_token
                    .as_deref()
                    .map(|token| parse_address("actions.raw_call.approval_token", token))
                    .transpose()?;
                Ok(ActionParams::RawCall {
                    contract,
                    value: config.raw_call_amount_wei()?,
                    data: Bytes::from(data),
                    approval_token,
                    min_allowance: config.amount_max_wei()?,
                })
            }
        }
    }

    fn amount(&self) -> BotResult<U256> {
        random_amount(&mut rand::thread_rng(), self.config.amount_min, self.config.amount_max)
    }

    fn pick_peer(&self) -> BotResult<Address> {
        let pool = &self.config.peer_transfer.addresses;
        if pool.len() <= 1 {
            return Err(ConfigError::Invalid(
                "actions.peer_transfer.addresses needs at least two addresses".to_string(),
            )
            .into());
        }
        let choice = rand::thread_rng().gen_range(0..pool.len());
        Ok(parse_address("actions.peer_transfer.addresses", &pool[choice])?)
    }
}
