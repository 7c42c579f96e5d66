pub mod provider;
pub mod rpc;
pub mod session;
pub mod units;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
pub use provider::{ProviderError, ProviderEvent, WalletProvider};
pub use session::WalletSession;

/// The one place a wallet provider is looked up. Everything else programs
/// against [`WalletProvider`].
pub fn detect_provider(config: &Config) -> Option<Arc<dyn WalletProvider>> {
    let Some(url) = config.wallet_rpc_url.clone() else {
        info!("WALLET_RPC_URL not set, betting disabled until a wallet is configured");
        return None;
    };
    match rpc::HttpWalletProvider::connect(url, Duration::from_secs(config.http_timeout_secs)) {
        Ok(provider) => Some(provider as Arc<dyn WalletProvider>),
        Err(e) => {
            warn!("Failed to set up wallet provider: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_no_provider() {
        let config = Config {
            wallet_rpc_url: None,
            ..Config::default()
        };
        assert!(detect_provider(&config).is_none());
    }

    #[tokio::test]
    async fn configured_url_yields_provider() {
        let config = Config {
            wallet_rpc_url: Some("http://127.0.0.1:1".to_string()),
            ..Config::default()
        };
        assert!(detect_provider(&config).is_some());
    }
}
