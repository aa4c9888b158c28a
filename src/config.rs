//! Configuration module for the EVM transaction bot
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and provides structured configuration types.

use alloy::primitives::{utils::parse_ether, Address, U256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::ActionKind;

/// Environment variable holding credentials, one per line or comma separated
pub const ACCOUNTS_ENV: &str = "EVM_TX_BOT_ACCOUNTS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Please configure {0} first")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Account credential source
    pub accounts: AccountsConfig,

    /// Gas pricing and estimation
    pub gas: GasConfig,

    /// Submission and confirmation behaviour
    pub executor: ExecutorConfig,

    /// Delays between transactions and cycles
    pub timing: TimingConfig,

    /// Quota ledger storage
    pub ledger: LedgerConfig,

    /// Enabled actions and their parameters
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC HTTP endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Chain id used for EIP-155 signing
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Block explorer base URL, used for log links
    #[serde(default = "default_explorer")]
    pub explorer: String,

    /// Native coin symbol
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Rate limit shared by all accounts (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// File with one mnemonic phrase or private key per line
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Minimum gas price in gwei, applied when the node suggests less
    #[serde(default)]
    pub floor_gwei: f64,

    /// Gas limit used when estimation is not forced
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Estimate the gas limit for every transaction
    #[serde(default = "default_true")]
    pub force_estimation: bool,

    /// Estimation attempts before giving up
    #[serde(default = "default_estimate_retries")]
    pub estimate_retries: u32,

    /// Delay between estimation attempts in milliseconds
    #[serde(default = "default_estimate_delay")]
    pub estimate_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Wait for a receipt after broadcast
    #[serde(default = "default_true")]
    pub wait_for_confirmation: bool,

    /// Receipt wait before the signed payload is re-broadcast
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_ms: u64,

    /// Interval between receipt polls
    #[serde(default = "default_poll_interval")]
    pub receipt_poll_interval_ms: u64,

    /// Pause after a gateway (5xx) broadcast failure
    #[serde(default = "default_transient_backoff")]
    pub transient_backoff_ms: u64,

    /// Re-broadcasts of the same payload before reporting a timeout
    #[serde(default = "default_max_resubmissions")]
    pub max_resubmissions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Lower bound of the random pause between transactions
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the random pause between transactions
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Pause after a finished cycle
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Pause before a failed cycle restarts
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_ms: u64,

    /// Short pause between status steps
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,

    /// Pause after a failed wrap/unwrap iteration
    #[serde(default = "default_iteration_backoff")]
    pub iteration_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// sled database directory
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Lower bound of random transfer/wrap amounts (native units)
    #[serde(default = "default_amount_min")]
    pub amount_min: f64,

    /// Upper bound of random transfer/wrap amounts (native units)
    #[serde(default = "default_amount_max")]
    pub amount_max: f64,

    /// Native balance required before acting (native units)
    #[serde(default = "default_min_native_balance")]
    pub min_native_balance: f64,

    #[serde(default)]
    pub wrap_unwrap: WrapUnwrapConfig,

    #[serde(default)]
    pub self_transfer: TransferConfig,

    #[serde(default)]
    pub peer_transfer: PeerTransferConfig,

    #[serde(default)]
    pub contract_call: ContractCallConfig,

    #[serde(default)]
    pub raw_call: RawCallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapUnwrapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_action_count")]
    pub count: u32,
    /// Wrapped native token contract
    #[serde(default)]
    pub wrapped_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_action_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerTransferConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_action_count")]
    pub count: u32,
    /// Recipient pool
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractCallConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_action_count")]
    pub count: u32,
    /// Interaction contract, also the token whose allowance is checked
    #[serde(default)]
    pub contract: Option<String>,
    /// Allowance spender; the account itself when unset
    #[serde(default)]
    pub spender: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCallConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_action_count")]
    pub count: u32,
    /// Target contract for the raw calldata
    #[serde(default)]
    pub contract: Option<String>,
    /// Value sent with every raw call (native units)
    #[serde(default)]
    pub amount: f64,
    /// Hex calldata, indexed by account position
    #[serde(default)]
    pub data: Vec<String>,
    /// Token approved for the target contract before calling it
    #[serde(default)]
    pub approval_token: Option<String>,
}

// Default value functions
fn default_rpc_url() -> String { "https://sepolia.unichain.org".to_string() }
fn default_chain_id() -> u64 { 1301 }
fn default_explorer() -> String { "https://sepolia.uniscan.xyz/".to_string() }
fn default_symbol() -> String { "ETH".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_rpc_timeout() -> u64 { 30 }
fn default_gas_limit() -> u64 { 300_000 }
fn default_estimate_retries() -> u32 { 3 }
fn default_estimate_delay() -> u64 { 3_000 }
fn default_confirmation_timeout() -> u64 { 5 * 60 * 1_000 }
fn default_poll_interval() -> u64 { 2_000 }
fn default_transient_backoff() -> u64 { 5_000 }
fn default_max_resubmissions() -> u32 { 3 }
fn default_min_delay() -> u64 { 10_000 }
fn default_max_delay() -> u64 { 120_000 }
fn default_cycle_interval() -> u64 { 24 * 60 * 60 }
fn default_restart_backoff() -> u64 { 10_000 }
fn default_step_delay() -> u64 { 500 }
fn default_iteration_backoff() -> u64 { 3_000 }
fn default_ledger_path() -> PathBuf { PathBuf::from("data/quota-ledger") }
fn default_amount_min() -> f64 { 0.0001 }
fn default_amount_max() -> f64 { 0.001 }
fn default_min_native_balance() -> f64 { 0.0015 }
fn default_action_count() -> u32 { 5 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            chain_id: default_chain_id(),
            explorer: default_explorer(),
            symbol: default_symbol(),
            rate_limit_rps: default_rate_limit(),
            request_timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            floor_gwei: 0.0,
            gas_limit: default_gas_limit(),
            force_estimation: default_true(),
            estimate_retries: default_estimate_retries(),
            estimate_delay_ms: default_estimate_delay(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            wait_for_confirmation: default_true(),
            confirmation_timeout_ms: default_confirmation_timeout(),
            receipt_poll_interval_ms: default_poll_interval(),
            transient_backoff_ms: default_transient_backoff(),
            max_resubmissions: default_max_resubmissions(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            cycle_interval_secs: default_cycle_interval(),
            restart_backoff_ms: default_restart_backoff(),
            step_delay_ms: default_step_delay(),
            iteration_backoff_ms: default_iteration_backoff(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

impl Default for WrapUnwrapConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            count: default_action_count(),
            wrapped_token: None,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            amount_min: default_amount_min(),
            amount_max: default_amount_max(),
            min_native_balance: default_min_native_balance(),
            wrap_unwrap: WrapUnwrapConfig::default(),
            self_transfer: TransferConfig::default(),
            peer_transfer: PeerTransferConfig::default(),
            contract_call: ContractCallConfig::default(),
            raw_call: RawCallConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` support
    pub fn from_file_with_env(path: &str) -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rpc.chain_id == 0 {
            return Err(ConfigError::Invalid("rpc.chain_id must be non-zero".to_string()));
        }
        if self.rpc.rate_limit_rps == 0 {
            return Err(ConfigError::Invalid("rpc.rate_limit_rps must be non-zero".to_string()));
        }
        if self.gas.estimate_retries == 0 {
            return Err(ConfigError::Invalid("gas.estimate_retries must be at least 1".to_string()));
        }
        if self.gas.floor_gwei < 0.0 {
            return Err(ConfigError::Invalid("gas.floor_gwei must not be negative".to_string()));
        }
        if self.executor.confirmation_timeout_ms == 0 || self.executor.receipt_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "executor timeouts and poll interval must be non-zero".to_string(),
            ));
        }
        if self.timing.min_delay_ms > self.timing.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "timing.min_delay_ms ({}) exceeds timing.max_delay_ms ({})",
                self.timing.min_delay_ms, self.timing.max_delay_ms
            )));
        }
        let actions = &self.actions;
        if !(actions.amount_min >= 0.0 && actions.amount_min <= actions.amount_max) {
            return Err(ConfigError::Invalid(format!(
                "actions.amount_min ({}) must be between 0 and actions.amount_max ({})",
                actions.amount_min, actions.amount_max
            )));
        }
        if actions.min_native_balance < 0.0 || actions.raw_call.amount < 0.0 {
            return Err(ConfigError::Invalid("native amounts must not be negative".to_string()));
        }
        Ok(())
    }

    /// Read raw credential strings from the environment or the accounts file
    pub fn load_credentials(&self) -> ConfigResult<Vec<String>> {
        let raw = match std::env::var(ACCOUNTS_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => {
                let path = self.accounts.path.as_ref().ok_or(ConfigError::Missing("accounts.path"))?;
                std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?
            }
        };
        Ok(split_credentials(&raw))
    }

    /// Gas price floor in wei
    pub fn gas_floor_wei(&self) -> u128 {
        (self.gas.floor_gwei * 1e9).round() as u128
    }
}

impl ExecutorConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }
}

impl ActionsConfig {
    /// Enabled flag and daily limit for a kind
    pub fn limit(&self, kind: ActionKind) -> (bool, u32) {
        match kind {
            ActionKind::WrapUnwrap => (self.wrap_unwrap.enabled, self.wrap_unwrap.count),
            ActionKind::SelfTransfer => (self.self_transfer.enabled, self.self_transfer.count),
            ActionKind::PeerTransfer => (self.peer_transfer.enabled, self.peer_transfer.count),
            ActionKind::ContractCall => (self.contract_call.enabled, self.contract_call.count),
            ActionKind::RawCall => (self.raw_call.enabled, self.raw_call.count),
        }
    }

    /// Minimum native balance in wei
    pub fn min_native_balance_wei(&self) -> ConfigResult<U256> {
        native_to_wei("actions.min_native_balance", self.min_native_balance)
    }

    /// Raw call value in wei
    pub fn raw_call_amount_wei(&self) -> ConfigResult<U256> {
        native_to_wei("actions.raw_call.amount", self.raw_call.amount)
    }

    /// Upper bound of random amounts in wei
    pub fn amount_max_wei(&self) -> ConfigResult<U256> {
        native_to_wei("actions.amount_max", self.amount_max)
    }
}

/// Parse an optional address setting, failing with the setting's name
pub fn required_address(field: &'static str, value: Option<&str>) -> ConfigResult<Address> {
    let value = value.map(str::trim).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(field))?;
    parse_address(field, value)
}

/// Parse an address setting
pub fn parse_address(field: &str, value: &str) -> ConfigResult<Address> {
    Address::from_str(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{} is not a valid address ({}): {}", field, value, err)))
}

fn native_to_wei(field: &str, amount: f64) -> ConfigResult<U256> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{} ({}) must be a non-negative number",
            field, amount
        )));
    }
    // `Display` may print more fractional digits than ether has
    parse_ether(&format!("{:.18}", amount))
        .map_err(|err| ConfigError::Invalid(format!("{} ({}) is not a valid amount: {}", field, amount, err)))
}

fn split_credentials(raw: &str) -> Vec<String> {
    raw.split(|c| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gas.estimate_retries, 3);
        assert_eq!(config.gas.estimate_delay_ms, 3_000);
        assert_eq!(config.executor.confirmation_timeout_ms, 300_000);
        assert_eq!(config.timing.restart_backoff_ms, 10_000);
        assert_eq!(config.actions.min_native_balance, 0.0015);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [rpc]
            url = "http://localhost:8545"
            chain_id = 31337

            [gas]
            floor_gwei = 1.5

            [actions.wrap_unwrap]
            count = 2
            wrapped_token = "0x4200000000000000000000000000000000000006"

            [actions.peer_transfer]
            enabled = true
            addresses = ["0x0000000000000000000000000000000000000001", "0x0000000000000000000000000000000000000002"]
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.chain_id, 31337);
        assert_eq!(config.rpc.symbol, "ETH");
        assert_eq!(config.gas_floor_wei(), 1_500_000_000);
        assert_eq!(config.actions.limit(ActionKind::WrapUnwrap), (true, 2));
        assert_eq!(config.actions.limit(ActionKind::PeerTransfer), (true, 5));
        assert_eq!(config.actions.limit(ActionKind::RawCall), (false, 5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_ranges() {
        let mut config = Config::default();
        config.actions.amount_min = 1.0;
        config.actions.amount_max = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.timing.min_delay_ms = 10;
        config.timing.max_delay_ms = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_required_address() {
        assert!(matches!(
            required_address("actions.raw_call.contract", None),
            Err(ConfigError::Missing("actions.raw_call.contract"))
        ));
        assert!(matches!(
            required_address("actions.raw_call.contract", Some("  ")),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            required_address("x", Some("0x1234")),
            Err(ConfigError::Invalid(_))
        ));
        let address = required_address("x", Some("0x4200000000000000000000000000000000000006")).unwrap();
        assert_eq!(address, Address::from_str("0x4200000000000000000000000000000000000006").unwrap());
    }

    #[test]
    fn test_split_credentials() {
        let raw = "# main\nkey-one\n\n  key-two  ,key-three\n";
        assert_eq!(split_credentials(raw), vec!["key-one", "key-two", "key-three"]);
    }

    #[test]
    fn test_native_amounts_in_wei() {
        let config = ActionsConfig::default();
        assert_eq!(
            config.min_native_balance_wei().unwrap(),
            U256::from(1_500_000_000_000_000u64)
        );
        assert_eq!(config.raw_call_amount_wei().unwrap(), U256::ZERO);
    }

    #[test]
    fn test_amounts_with_binary_noise_convert() {
        let mut config = ActionsConfig::default();
        config.amount_max = 0.1 + 0.2;
        assert_eq!(
            config.amount_max_wei().unwrap(),
            U256::from(300_000_000_000_000_044u64)
        );

        config.raw_call.amount = 0.001;
        assert_eq!(config.raw_call_amount_wei().unwrap(), U256::from(1_000_000_000_000_000u64));

        config.min_native_balance = -0.5;
        assert!(config.min_native_balance_wei().is_err());
        config.min_native_balance = f64::NAN;
        assert!(config.min_native_balance_wei().is_err());
    }
}
