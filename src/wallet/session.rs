use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{TargetNetwork, TARGET_NETWORK};
use crate::error::{AppError, Result};
use crate::types::WalletState;
use crate::wallet::provider::{ProviderError, ProviderEvent, WalletProvider};
use crate::wallet::units::{format_balance, is_valid_address, parse_hex_quantity};

/// Wallet connection state machine.
///
/// `Disconnected --connect--> Connected` once accounts are granted, the wallet
/// sits on the target network and the balance has been read. Provider events
/// arrive as messages through [`WalletSession::handle_event`]. A failed call
/// leaves the previous state untouched.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    target: TargetNetwork,
    state_tx: watch::Sender<WalletState>,
    /// Serializes connect sequences (user click vs. chain-changed re-validation)
    /// and account revocations, so a revoked address is never republished.
    connect_lock: Mutex<()>,
}

impl WalletSession {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Arc<Self> {
        Self::with_target(provider, TARGET_NETWORK)
    }

    pub fn with_target(provider: Option<Arc<dyn WalletProvider>>, target: TargetNetwork) -> Arc<Self> {
        let (state_tx, _) = watch::channel(WalletState::default());
        Arc::new(Self {
            provider,
            target,
            state_tx,
            connect_lock: Mutex::new(()),
        })
    }

    pub fn state(&self) -> WalletState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().connected
    }

    pub fn target(&self) -> &TargetNetwork {
        &self.target
    }

    pub fn provider(&self) -> Result<Arc<dyn WalletProvider>> {
        self.provider.clone().ok_or(AppError::ProviderMissing)
    }

    /// Full connect sequence: accounts, network check (switch / add chain), balance.
    pub async fn connect(&self) -> Result<WalletState> {
        let provider = self.provider()?;
        let _guard = self.connect_lock.lock().await;

        let granted = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(classify)?;
        let accounts: Vec<String> = serde_json::from_value(granted)?;
        let Some(address) = accounts.into_iter().next() else {
            return Err(ProviderError::transport("wallet granted no accounts").into());
        };
        if !is_valid_address(&address) {
            return Err(ProviderError::transport(format!("malformed account: {address}")).into());
        }

        self.ensure_target_network(provider.as_ref()).await?;
        let balance_display = self.read_balance(provider.as_ref(), &address).await?;

        let state = WalletState {
            address,
            balance_display,
            chain_id: self.target.chain_id,
            connected: true,
        };
        self.state_tx.send_replace(state.clone());
        info!(
            address = %state.address,
            balance = %state.balance_display,
            chain_id = state.chain_id,
            "Wallet connected"
        );
        Ok(state)
    }

    /// Re-read the balance of the active account. No-op while disconnected.
    pub async fn refresh_balance(&self) -> Result<()> {
        let current = self.state();
        if !current.connected {
            return Ok(());
        }
        let provider = self.provider()?;
        let balance = self.read_balance(provider.as_ref(), &current.address).await?;

        self.state_tx.send_if_modified(|state| {
            // The account may have changed while the read was in flight.
            if state.connected && state.address == current.address && state.balance_display != balance {
                state.balance_display = balance;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts).await,
            ProviderEvent::ChainChanged(chain) => {
                if !self.is_connected() {
                    debug!(chain = %chain, "chain changed while disconnected");
                    return;
                }
                info!(chain = %chain, "Wallet chain changed, re-validating");
                if let Err(e) = self.connect().await {
                    warn!("Wallet re-validation failed: {e}");
                }
            }
        }
    }

    async fn on_accounts_changed(&self, accounts: Vec<String>) {
        let _guard = self.connect_lock.lock().await;
        match accounts.into_iter().next() {
            None => {
                let was_connected = self.is_connected();
                self.state_tx.send_replace(WalletState::default());
                if was_connected {
                    info!("Wallet disconnected: no authorized accounts");
                }
            }
            Some(address) if is_valid_address(&address) => {
                self.state_tx.send_if_modified(|state| {
                    if state.connected && state.address != address {
                        info!(address = %address, "Wallet account changed");
                        state.address = address;
                        true
                    } else {
                        false
                    }
                });
            }
            Some(address) => warn!("ignoring malformed account from provider: {address}"),
        }
    }

    /// Forward provider notifications into the state machine until the
    /// provider goes away or the returned handle is aborted.
    pub fn spawn_event_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.provider.as_ref()?.subscribe();
        let session = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => session.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("wallet event listener lagged by {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }))
    }

    async fn ensure_target_network(&self, provider: &dyn WalletProvider) -> Result<()> {
        let chain = provider.request("eth_chainId", json!([])).await.map_err(classify)?;
        let chain_id = chain
            .as_str()
            .and_then(parse_hex_quantity)
            .ok_or_else(|| ProviderError::transport(format!("unreadable chain id: {chain}")))?;

        if chain_id == u128::from(self.target.chain_id) {
            return Ok(());
        }
        warn!(
            current = chain_id as u64,
            target = self.target.chain_id,
            "Wallet on wrong network, requesting switch"
        );

        let switch = self.target.switch_params();
        match provider.request("wallet_switchEthereumChain", switch.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                info!(chain = self.target.chain_name, "Target network unknown to wallet, adding it");
                provider
                    .request("wallet_addEthereumChain", self.target.add_chain_params())
                    .await
                    .map_err(|e| self.remediation_failed(e))?;
                provider
                    .request("wallet_switchEthereumChain", switch)
                    .await
                    .map_err(|e| self.remediation_failed(e))?;
                Ok(())
            }
            Err(e) => Err(self.remediation_failed(e)),
        }
    }

    async fn read_balance(&self, provider: &dyn WalletProvider, address: &str) -> Result<String> {
        let raw: Value = provider
            .request("eth_getBalance", json!([address, "latest"]))
            .await
            .map_err(classify)?;
        let wei = raw
            .as_str()
            .and_then(parse_hex_quantity)
            .ok_or_else(|| ProviderError::transport(format!("unreadable balance: {raw}")))?;
        Ok(format_balance(wei))
    }

    fn remediation_failed(&self, e: ProviderError) -> AppError {
        if e.is_user_rejection() {
            return AppError::UserRejected;
        }
        AppError::NetworkMismatch(format!(
            "could not switch wallet to {}: {}",
            self.target.chain_name, e.message
        ))
    }
}

fn classify(e: ProviderError) -> AppError {
    if e.is_user_rejection() {
        AppError::UserRejected
    } else {
        AppError::Provider(e)
    }
}
