use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{CHANNEL_CAPACITY, METHOD_NOT_FOUND_CODE, PROVIDER_POLL_INTERVAL_SECS};
use crate::error::Result;
use crate::wallet::provider::{ProviderError, ProviderEvent, WalletProvider};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Wallet reached over JSON-RPC on HTTP, e.g. a local signer or dev node
/// holding unlocked accounts.
///
/// HTTP has no push channel, so account and chain changes are detected by
/// polling and re-emitted as provider events.
pub struct HttpWalletProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    events_tx: broadcast::Sender<ProviderEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl HttpWalletProvider {
    /// Build the provider and start its change watcher. Must run inside a tokio runtime.
    pub fn connect(url: String, timeout: Duration) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let (events_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let provider = Arc::new(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
            events_tx,
            watcher: Mutex::new(None),
        });

        let handle = tokio::spawn(watch_changes(Arc::downgrade(&provider)));
        if let Ok(mut slot) = provider.watcher.lock() {
            *slot = Some(handle);
        }
        info!(url = %provider.url, "HTTP wallet provider attached");
        Ok(provider)
    }

    async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!(method, id = request.id, "wallet rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("RPC request failed: {e}")))?;

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to parse RPC response: {e}")))?;

        if let Some(error) = rpc.error {
            return Err(ProviderError::new(Some(error.code), error.message));
        }
        Ok(rpc.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
        match self.call(method, params.clone()).await {
            // Plain nodes expose their unlocked accounts without an approval prompt.
            Err(e) if method == "eth_requestAccounts" && e.code == Some(METHOD_NOT_FOUND_CODE) => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.call("eth_accounts", params).await
            }
            other => other,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events_tx.subscribe()
    }
}

impl Drop for HttpWalletProvider {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Last observed accounts and chain id of a polled wallet.
#[derive(Debug, Default)]
struct ChangeTracker {
    last_accounts: Option<Vec<String>>,
    last_chain: Option<String>,
}

impl ChangeTracker {
    /// Feed an `eth_accounts` result. Only a well-formed list that differs
    /// from the previous one produces an event; anything else is skipped.
    fn accounts(&mut self, result: Value) -> Option<ProviderEvent> {
        let accounts: Vec<String> = match serde_json::from_value(result) {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("ignoring malformed eth_accounts result: {e}");
                return None;
            }
        };
        let changed = self.last_accounts.as_ref().is_some_and(|prev| *prev != accounts);
        self.last_accounts = Some(accounts.clone());
        changed.then(|| {
            info!(count = accounts.len(), "wallet accounts changed");
            ProviderEvent::AccountsChanged(accounts)
        })
    }

    fn chain(&mut self, result: Value) -> Option<ProviderEvent> {
        let Value::String(chain) = result else {
            warn!("unexpected eth_chainId result: {result}");
            return None;
        };
        let changed = self.last_chain.as_ref().is_some_and(|prev| *prev != chain);
        self.last_chain = Some(chain.clone());
        changed.then(|| {
            info!(chain = %chain, "wallet chain changed");
            ProviderEvent::ChainChanged(chain)
        })
    }
}

/// Poll accounts and chain id; emit an event whenever either differs from the last poll.
async fn watch_changes(provider: Weak<HttpWalletProvider>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(PROVIDER_POLL_INTERVAL_SECS));
    let mut tracker = ChangeTracker::default();

    loop {
        ticker.tick().await;
        let Some(provider) = provider.upgrade() else {
            return;
        };

        match provider.call("eth_accounts", Value::Array(vec![])).await {
            Ok(v) => {
                if let Some(event) = tracker.accounts(v) {
                    let _ = provider.events_tx.send(event);
                }
            }
            Err(e) => warn!("wallet account poll failed: {e}"),
        }

        match provider.call("eth_chainId", Value::Array(vec![])).await {
            Ok(v) => {
                if let Some(event) = tracker.chain(v) {
                    let _ = provider.events_tx.send(event);
                }
            }
            Err(e) => warn!("wallet chain poll failed: {e}"),
        }
    }
}
