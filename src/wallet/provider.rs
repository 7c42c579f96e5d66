use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::{UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE};

/// Failure reported by a wallet provider call.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} (code {code:?})")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// The user declined the wallet prompt.
    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(USER_REJECTED_CODE)
    }

    /// The requested chain has not been added to the wallet.
    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == Some(UNRECOGNIZED_CHAIN_CODE)
    }
}

/// Notifications pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    /// New chain id as a hex quantity, e.g. `0x61`.
    ChainChanged(String),
}

/// Capability interface of a chain wallet.
///
/// `request` is a JSON-RPC style call (`eth_requestAccounts`, `eth_chainId`,
/// `eth_sendTransaction`, ...). `subscribe` hands out a listener for
/// account / chain notifications; dropping the receiver removes the listener.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
