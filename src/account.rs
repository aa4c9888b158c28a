//! Account state owned by one account loop

use alloy::primitives::Address;
use std::fmt;
use std::sync::Arc;

use crate::contracts::{balance_of_calldata, decode_u256};
use crate::errors::BotResult;
use crate::rpc::ChainClient;
use crate::types::{BalanceSnapshot, BlockTag, CallRequest, StalledTransaction};
use crate::wallet::TxSigner;

/// One configured account
///
/// Exclusively owned by its loop; mutated on every balance refresh and after
/// every submission.
pub struct Account {
    /// Position in the credential list
    pub index: usize,
    pub address: Address,
    pub balance: BalanceSnapshot,
    /// Latest confirmed transaction count
    pub onchain_nonce: u64,
    /// Unconfirmed transaction the next submission must replace
    pub stalled: Option<StalledTransaction>,
    wrapped_token: Option<Address>,
    signer: Arc<dyn TxSigner>,
}

impl Account {
    pub fn new(index: usize, signer: Arc<dyn TxSigner>, wrapped_token: Option<Address>) -> Self {
        Self {
            index,
            address: signer.address(),
            balance: BalanceSnapshot::default(),
            onchain_nonce: 0,
            stalled: None,
            wrapped_token,
            signer,
        }
    }

    pub fn signer(&self) -> &dyn TxSigner {
        self.signer.as_ref()
    }

    pub fn wrapped_token(&self) -> Option<Address> {
        self.wrapped_token
    }

    pub fn set_wrapped_token(&mut self, token: Option<Address>) {
        self.wrapped_token = token;
    }

    /// Re-read native and wrapped balances
    pub async fn refresh_balance(&mut self, client: &dyn ChainClient) -> BotResult<BalanceSnapshot> {
        let native = client.balance(self.address).await?;
        let wrapped = match self.wrapped_token {
            Some(token) => {
                let data = client
                    .call(&CallRequest::read(token, balance_of_calldata(self.address)))
                    .await?;
                Some(decode_u256(&data)?)
            }
            None => None,
        };
        self.balance = BalanceSnapshot { native, wrapped };
        Ok(self.balance)
    }

    /// Re-read the confirmed transaction count
    pub async fn sync_nonce(&mut self, client: &dyn ChainClient) -> BotResult<u64> {
        self.onchain_nonce = client.transaction_count(self.address, BlockTag::Latest).await?;
        Ok(self.onchain_nonce)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("balance", &self.balance)
            .field("onchain_nonce", &self.onchain_nonce)
            .field("stalled", &self.stalled)
            .finish()
    }
}
