//! Wallet management module
//!
//! Credentials are classified once, at load time, into a typed
//! [`Credential`]. Ordered validators decide the variant: a BIP-39 checksum
//! check first, then a 32-byte hex check. Anything else is rejected.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::types::{SignedTransaction, TransactionPlan};

/// Wallet errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WalletError {
    #[error("Invalid account Secret Phrase or Private Key (account {0})")]
    UnknownCredential(usize),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Secret material of one account
pub enum Credential {
    /// BIP-39 mnemonic phrase
    Mnemonic(Zeroizing<String>),
    /// Raw secp256k1 private key, hex without `0x`
    PrivateKey(Zeroizing<String>),
}

impl Credential {
    /// Classify a raw credential string. `index` is only used for error messages.
    pub fn parse(raw: &str, index: usize) -> WalletResult<Self> {
        let input = raw.trim();
        if is_mnemonic(input) {
            return Ok(Credential::Mnemonic(Zeroizing::new(normalize_phrase(input))));
        }
        if is_private_key(input) {
            let key = input.trim_start_matches("0x").trim_start_matches("0X");
            return Ok(Credential::PrivateKey(Zeroizing::new(key.to_string())));
        }
        Err(WalletError::UnknownCredential(index + 1))
    }

    /// Human readable variant name
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Mnemonic(_) => "Secret Phrase",
            Credential::PrivateKey(_) => "Private Key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}(<redacted>)", self.kind())
    }
}

fn normalize_phrase(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_mnemonic(input: &str) -> bool {
    Mnemonic::<English>::new_from_phrase(&normalize_phrase(input)).is_ok()
}

fn is_private_key(input: &str) -> bool {
    let key = input.trim_start_matches("0x").trim_start_matches("0X");
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}

/// Signs transaction plans for one account
pub trait TxSigner: Send + Sync {
    /// Address derived from the credential
    fn address(&self) -> Address;

    /// Sign a plan as a legacy (gas price) EIP-155 transaction
    fn sign(&self, plan: &TransactionPlan, chain_id: u64) -> WalletResult<SignedTransaction>;
}

/// Local key wallet
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Derive the signer from a credential
    pub fn from_credential(credential: &Credential) -> WalletResult<Self> {
        let signer = match credential {
            Credential::Mnemonic(phrase) => MnemonicBuilder::<English>::default()
                .phrase(phrase.as_str())
                .build()
                .map_err(|err| WalletError::Derivation(err.to_string()))?,
            Credential::PrivateKey(key) => {
                let bytes = Zeroizing::new(
                    hex::decode(key.as_str()).map_err(|err| WalletError::Derivation(err.to_string()))?,
                );
                PrivateKeySigner::from_slice(&bytes)
                    .map_err(|err| WalletError::Derivation(err.to_string()))?
            }
        };
        Ok(Self { signer })
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .finish()
    }
}

impl TxSigner for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign(&self, plan: &TransactionPlan, chain_id: u64) -> WalletResult<SignedTransaction> {
        let mut tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce: plan.nonce,
            gas_price: plan.gas_price,
            gas_limit: plan.gas_limit,
            to: TxKind::Call(plan.intent.to),
            value: plan.intent.value,
            input: plan.intent.data.clone().unwrap_or_default(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|err| WalletError::Signing(err.to_string()))?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
            nonce: plan.nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionKind, TransactionIntent};
    use alloy::primitives::U256;
    use std::str::FromStr;

    // Well-known development key and mnemonic (anvil/hardhat account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_PHRASE: &str = "test test test test test test test test test test test junk";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_credential_classification_order() {
        assert!(matches!(Credential::parse(DEV_PHRASE, 0), Ok(Credential::Mnemonic(_))));
        assert!(matches!(Credential::parse(DEV_KEY, 0), Ok(Credential::PrivateKey(_))));
        assert!(matches!(
            Credential::parse(&DEV_KEY[2..], 0),
            Ok(Credential::PrivateKey(_))
        ));
    }

    #[test]
    fn test_credential_rejects_garbage() {
        assert_eq!(
            Credential::parse("not a key", 2).unwrap_err(),
            WalletError::UnknownCredential(3)
        );
        assert!(Credential::parse("test test test", 0).is_err());
        // 31 bytes
        assert!(Credential::parse(&DEV_KEY[..64], 0).is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::parse(DEV_KEY, 0).unwrap();
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("ac0974"));
        assert!(debug.contains("Private Key"));
    }

    #[test]
    fn test_both_credentials_derive_same_address() {
        let expected = Address::from_str(DEV_ADDRESS).unwrap();
        let from_key = LocalWallet::from_credential(&Credential::parse(DEV_KEY, 0).unwrap()).unwrap();
        let from_phrase =
            LocalWallet::from_credential(&Credential::parse(DEV_PHRASE, 0).unwrap()).unwrap();
        assert_eq!(from_key.address(), expected);
        assert_eq!(from_phrase.address(), expected);
    }

    #[test]
    fn test_sign_is_deterministic_per_plan() {
        let wallet = LocalWallet::from_credential(&Credential::parse(DEV_KEY, 0).unwrap()).unwrap();
        let plan = TransactionPlan {
            intent: TransactionIntent::new(wallet.address(), U256::from(1_000u64), ActionKind::SelfTransfer),
            nonce: 7,
            gas_limit: 21_000,
            gas_price: 1_000_000_000,
        };

        let first = wallet.sign(&plan, 1301).unwrap();
        let second = wallet.sign(&plan, 1301).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.nonce, 7);

        let mut bumped = plan.clone();
        bumped.nonce = 8;
        assert_ne!(wallet.sign(&bumped, 1301).unwrap().hash, first.hash);
    }
}
