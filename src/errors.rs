//! Error types for the transaction lifecycle
//!
//! `ChainError` covers everything the RPC endpoint can report. `BotError` is
//! the taxonomy the account loop reasons about: configuration problems,
//! insufficient balance, exhausted gas estimation, transient broadcast
//! failures, confirmation timeouts and the catch-all variants.

use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::wallet::WalletError;

/// Errors reported by the chain client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    /// Transport-level errors (network, connection, HTTP status)
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status of the response, when one was received
        status: Option<u16>,
    },

    /// JSON-RPC error object returned by the node
    #[error("RPC response error: {message} (code: {code:?})")]
    RpcResponse { message: String, code: Option<i64> },

    /// Response could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Invalid endpoint configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ChainError {
    /// Transport failure without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        ChainError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport { .. } => true,
            ChainError::RpcResponse { .. } => self.is_gateway(),
            ChainError::Decoding(_) => false,
            ChainError::Configuration(_) => false,
        }
    }

    /// Whether the upstream endpoint failed with a 5xx/gateway error, as
    /// opposed to the node rejecting the request.
    ///
    /// A node rejection's message is never scanned for status numbers: it
    /// routinely carries balances and gas figures.
    pub fn is_gateway(&self) -> bool {
        match self {
            ChainError::Transport {
                status: Some(status),
                ..
            } => is_server_status(*status),
            ChainError::Transport { message, status: None } => is_gateway_error(message),
            ChainError::RpcResponse { message, code } => {
                matches!(code, Some(c) if (500..600).contains(c)) || has_gateway_phrase(message)
            }
            ChainError::Decoding(_) | ChainError::Configuration(_) => false,
        }
    }
}

fn is_server_status(status: u16) -> bool {
    (500..600).contains(&status)
}

fn has_gateway_phrase(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["bad gateway", "gateway timeout", "service unavailable", "internal server error"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

/// Returns true when a transport message describes a 5xx/gateway failure of
/// the upstream endpoint: a gateway phrase, or a standalone 500/502/503/504
/// token.
pub fn is_gateway_error(message: &str) -> bool {
    has_gateway_phrase(message)
        || message
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| matches!(token, "500" | "502" | "503" | "504"))
}

/// Bot-level error taxonomy
#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// Missing or invalid account, empty recipient pool, invalid action parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Native balance below the configured minimum
    #[error("Insufficient balance: {balance} {symbol} available, minimum is {minimum} {symbol}")]
    InsufficientBalance {
        balance: String,
        minimum: String,
        symbol: String,
    },

    /// Gas estimation failed on every attempt
    #[error("Failed to estimate gas after {attempts} attempts: {last_error}")]
    EstimationFailed { attempts: u32, last_error: ChainError },

    /// Gateway/5xx broadcast failure
    #[error("Transient broadcast error: {0}")]
    TransientBroadcast(String),

    /// Broadcast rejected by the node
    #[error("Broadcast failed: {0}")]
    Broadcast(ChainError),

    /// No receipt even after resubmission and replacement
    #[error("Transaction {hash} was not confirmed after {waited_ms}ms")]
    ConfirmationTimeout { hash: String, waited_ms: u64 },

    /// Receipt reports execution failure
    #[error("Transaction {0} reverted")]
    Reverted(String),

    /// Read call failed
    #[error("RPC error: {0}")]
    Rpc(#[from] ChainError),

    /// Credential or signing failure
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Quota ledger failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Check if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::TransientBroadcast(_) => true,
            BotError::Rpc(err) => err.is_retryable(),
            BotError::EstimationFailed { .. } => true,
            BotError::ConfirmationTimeout { .. } => true,

            BotError::Configuration(_) => false,
            BotError::InsufficientBalance { .. } => false,
            BotError::Broadcast(_) => false,
            BotError::Reverted(_) => false,
            BotError::Wallet(_) => false,
            BotError::Ledger(_) => false,
            BotError::Internal(_) => false,
        }
    }

    /// Errors that only abort the current iteration of an action and can be
    /// contained inside the wrap/unwrap repetition
    pub fn is_iteration_local(&self) -> bool {
        !matches!(
            self,
            BotError::Configuration(_) | BotError::InsufficientBalance { .. }
        )
    }
}

impl From<ConfigError> for BotError {
    fn from(err: ConfigError) -> Self {
        BotError::Configuration(err.to_string())
    }
}

/// Result type for bot operations
pub type BotResult<T> = Result<T, BotError>;

/// Result type for chain client operations
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_detection() {
        assert!(is_gateway_error("server returned an error response: error code 504"));
        assert!(is_gateway_error("HTTP error 502 Bad Gateway"));
        assert!(is_gateway_error("Service Unavailable"));
        assert!(!is_gateway_error("nonce too low"));
        assert!(!is_gateway_error("insufficient funds for gas * price + value"));
        // numbers that merely contain a status code
        assert!(!is_gateway_error(
            "insufficient funds for gas * price + value: have 1500000 want 2504000"
        ));
        assert!(!is_gateway_error("intrinsic gas too low: have 5000, want 21000"));
        assert!(!is_gateway_error("gas limit 25030000 exceeds block gas limit"));
    }

    #[test]
    fn test_gateway_classification_is_structural() {
        let http = |status| ChainError::Transport {
            message: "HTTP error".to_string(),
            status: Some(status),
        };
        assert!(http(504).is_gateway());
        assert!(http(500).is_gateway());
        assert!(!http(429).is_gateway());
        assert!(!http(400).is_gateway());

        // node rejections are never gateway errors because of their numbers
        let rejection = ChainError::RpcResponse {
            message: "insufficient funds for gas * price + value: have 1500000 want 2504000".to_string(),
            code: Some(-32000),
        };
        assert!(!rejection.is_gateway());
        let numeric = ChainError::RpcResponse {
            message: "replacement fee too low: 503".to_string(),
            code: Some(-32000),
        };
        assert!(!numeric.is_gateway());
        assert!(ChainError::RpcResponse {
            message: "upstream".to_string(),
            code: Some(502)
        }
        .is_gateway());
        assert!(ChainError::transport("connection closed: 503 Service Unavailable").is_gateway());
        assert!(!ChainError::transport("connection reset by peer").is_gateway());
    }

    #[test]
    fn test_chain_error_retryable() {
        assert!(ChainError::transport("connection reset").is_retryable());
        assert!(ChainError::RpcResponse {
            message: "upstream".to_string(),
            code: Some(503)
        }
        .is_retryable());
        assert!(!ChainError::RpcResponse {
            message: "execution reverted".to_string(),
            code: Some(3)
        }
        .is_retryable());
        assert!(!ChainError::Decoding("bad hex".to_string()).is_retryable());
    }

    #[test]
    fn test_bot_error_transient_classification() {
        assert!(BotError::TransientBroadcast("504".to_string()).is_transient());
        assert!(BotError::EstimationFailed {
            attempts: 3,
            last_error: ChainError::Decoding("x".to_string())
        }
        .is_transient());

        assert!(!BotError::Configuration("missing".to_string()).is_transient());
        assert!(!BotError::Reverted("0x01".to_string()).is_transient());
        assert!(!BotError::InsufficientBalance {
            balance: "0.001".to_string(),
            minimum: "0.0015".to_string(),
            symbol: "ETH".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_iteration_local_errors() {
        assert!(BotError::Reverted("0x01".to_string()).is_iteration_local());
        assert!(!BotError::Configuration("pool".to_string()).is_iteration_local());
    }

    #[test]
    fn test_error_display() {
        let err = BotError::EstimationFailed {
            attempts: 3,
            last_error: ChainError::RpcResponse {
                message: "execution reverted".to_string(),
                code: Some(3),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("execution reverted"));
    }
}
