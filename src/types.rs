//! Common types used throughout the application

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of action an account loop can perform.
///
/// The tag selects the quota-ledger bucket and the parameter builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Wrap native coin into the wrapped token and unwrap it back
    WrapUnwrap,
    /// Native transfer to the account's own address
    SelfTransfer,
    /// Native transfer to a random address from the peer pool
    PeerTransfer,
    /// Pre-encoded calldata sent to a configured contract
    RawCall,
    /// `ping` call against the configured interaction contract
    ContractCall,
}

impl ActionKind {
    /// Fixed execution order inside one account cycle
    pub const PRIORITY: [ActionKind; 5] = [
        ActionKind::WrapUnwrap,
        ActionKind::SelfTransfer,
        ActionKind::PeerTransfer,
        ActionKind::ContractCall,
        ActionKind::RawCall,
    ];

    /// Stable tag stored in the quota ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::WrapUnwrap => "wrap_unwrap",
            ActionKind::SelfTransfer => "self_transfer",
            ActionKind::PeerTransfer => "peer_transfer",
            ActionKind::RawCall => "raw_call",
            ActionKind::ContractCall => "contract_call",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to send, before nonce and gas are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub to: Address,
    pub value: U256,
    pub data: Option<Bytes>,
    pub kind: ActionKind,
}

impl TransactionIntent {
    pub fn new(to: Address, value: U256, kind: ActionKind) -> Self {
        Self {
            to,
            value,
            data: None,
            kind,
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Intent plus the nonce and gas parameters computed by the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    pub intent: TransactionIntent,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
}

/// Block tag for `eth_getTransactionCount`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

/// Parameters of a read-only call or a gas estimation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Option<Bytes>,
}

impl CallRequest {
    /// Read-only contract call without sender or value
    pub fn read(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            value: U256::ZERO,
            data: Some(data.into()),
        }
    }
}

impl From<(&TransactionIntent, Address)> for CallRequest {
    fn from((intent, from): (&TransactionIntent, Address)) -> Self {
        Self {
            from: Some(from),
            to: intent.to,
            value: intent.value,
            data: intent.data.clone(),
        }
    }
}

/// Signed, RLP-encoded transaction ready for broadcast.
///
/// The same handle is re-broadcast when confirmation times out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
    pub nonce: u64,
}

/// Subset of a transaction receipt the bot cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Terminal result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Included on chain. `receipt` is `None` when confirmation waiting is disabled.
    Confirmed {
        hash: B256,
        receipt: Option<TxReceipt>,
    },
    /// No receipt after every allowed re-observation
    TimedOut { hash: B256 },
    /// Retryable failure reported to the caller instead of an error
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ExecutionOutcome::Confirmed { .. })
    }
}

/// A transaction left unconfirmed when its cycle gave up on it.
///
/// The account's next submission is planned at the same nonce with a higher
/// gas price, so at most one transaction ever lands on that nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Every hash broadcast at this nonce, oldest first
    pub hashes: Vec<B256>,
}

impl StalledTransaction {
    pub fn new(plan: &TransactionPlan, hashes: Vec<B256>) -> Self {
        Self {
            nonce: plan.nonce,
            gas_price: plan.gas_price,
            gas_limit: plan.gas_limit,
            hashes,
        }
    }
}

/// Live balances of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub native: U256,
    pub wrapped: Option<U256>,
}

/// One quota-ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRecord {
    pub address: Address,
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
}

impl QuotaRecord {
    /// Record stamped with the current time
    pub fn now(address: Address, kind: ActionKind) -> Self {
        Self {
            address,
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(ActionKind::PRIORITY[0], ActionKind::WrapUnwrap);
        assert_eq!(ActionKind::PRIORITY[4], ActionKind::RawCall);
    }

    #[test]
    fn test_call_request_from_intent() {
        let from = Address::repeat_byte(1);
        let intent = TransactionIntent::new(Address::repeat_byte(2), U256::from(7), ActionKind::RawCall)
            .with_data(vec![0xde, 0xad]);
        let call = CallRequest::from((&intent, from));
        assert_eq!(call.from, Some(from));
        assert_eq!(call.value, U256::from(7));
        assert_eq!(call.data, Some(Bytes::from(vec![0xde, 0xad])));
    }
}
