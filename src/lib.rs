//! EVM multi-account transaction bot
//!
//! Runs one long-lived loop per configured account. Each loop picks the next
//! action whose daily quota is not yet used up, plans gas and nonce, signs,
//! broadcasts and confirms the transaction (re-broadcasting or replacing it
//! on timeout) and records completed actions in a persistent quota ledger.

pub mod account;
pub mod account_loop;
pub mod actions;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod executor;
pub mod ledger;
pub mod metrics;
pub mod planner;
pub mod retry;
pub mod rpc;
pub mod scheduler;
pub mod selector;
pub mod status;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use account_loop::{AccountLoop, LoopContext, LoopState};
pub use config::Config;
pub use errors::{BotError, BotResult, ChainError};
pub use executor::TransactionExecutor;
pub use ledger::{QuotaLedger, SledLedger};
pub use planner::GasPlanner;
pub use rpc::{AlloyChainClient, ChainClient};
pub use scheduler::{Scheduler, SchedulerState};
pub use types::{ActionKind, ExecutionOutcome, TransactionIntent, TransactionPlan};
