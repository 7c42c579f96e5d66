//! Scripted wallet provider for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};

use crate::wallet::provider::{ProviderError, ProviderEvent, WalletProvider};

pub const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const OTHER_ACCOUNT: &str = "0x2222222222222222222222222222222222222222";
pub const TX_HASH: &str = "0xabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabca";

/// Replies from a per-method queue, falling back to a sticky default per method.
pub struct MockProvider {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    defaults: Mutex<HashMap<String, Result<Value, ProviderError>>>,
    calls: Mutex<Vec<(String, Value)>>,
    events_tx: broadcast::Sender<ProviderEvent>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockProvider {
    /// A wallet already on the target chain with one account and 2 native units.
    pub fn on_target_chain() -> Arc<Self> {
        let mock = Self::empty();
        mock.set_default("eth_requestAccounts", Ok(json!([ACCOUNT])));
        mock.set_default("eth_chainId", Ok(json!("0x61")));
        mock.set_default("eth_getBalance", Ok(json!("0x1bc16d674ec80000")));
        mock.set_default("eth_sendTransaction", Ok(json!(TX_HASH)));
        mock.set_default("wallet_switchEthereumChain", Ok(Value::Null));
        mock.set_default("wallet_addEthereumChain", Ok(Value::Null));
        Arc::new(mock)
    }

    fn empty() -> Self {
        let (events_tx, _) = broadcast::channel(16);
        Self {
            queued: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events_tx,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_default(&self, method: &str, reply: Result<Value, ProviderError>) {
        self.defaults.lock().unwrap().insert(method.to_string(), reply);
    }

    /// Reply once with `reply` before falling back to the default.
    pub fn push_reply(&self, method: &str, reply: Result<Value, ProviderError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Hold every `eth_sendTransaction` until the returned gate is notified.
    pub fn hold_sends(&self) -> Arc<Notify> {
        self.hold("eth_sendTransaction")
    }

    /// Hold every call to `method` until the returned gate is notified.
    pub fn hold(&self, method: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(method.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events_tx.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push((method.to_string(), params));

        let gate = self.gates.lock().unwrap().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|q| q.pop_front());
        match queued {
            Some(reply) => reply,
            None => self
                .defaults
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::new(Some(-32601), "method not found"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events_tx.subscribe()
    }
}
