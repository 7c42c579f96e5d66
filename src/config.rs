use crate::error::{AppError, Result};
use crate::wallet::units::is_valid_address;

pub const API_URL: &str = "http://localhost:8000";

/// Pool address every wager is sent to.
pub const BET_RECIPIENT: &str = "0x7Ba8FA52dAEd1c1Ea1acEB26E52339946458DeDa";

/// Upper bound on a single wager, in native units.
pub const MAX_BET_AMOUNT: f64 = 1.0;

/// Amount pre-filled in the bet input.
pub const DEFAULT_BET_AMOUNT: f64 = 0.001;

/// Decimal places shown for the wallet balance.
pub const BALANCE_DISPLAY_DECIMALS: usize = 4;

/// Deadline given to bets created from the form.
pub const DEFAULT_BET_DEADLINE: &str = "2026-03-07";

/// EIP-1193 error code: the user declined the wallet prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-3326 error code: the chain is not known to the wallet.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// JSON-RPC error code for an unimplemented method.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Reconnect delay used by the stream until the server sends a `retry:` hint.
pub const SSE_DEFAULT_RETRY_MS: u64 = 3_000;

/// How often the HTTP wallet provider polls for account / chain changes.
pub const PROVIDER_POLL_INTERVAL_SECS: u64 = 4;

/// Capacity of the provider event broadcast channel.
pub const CHANNEL_CAPACITY: usize = 64;

pub const WEI_PER_NATIVE: f64 = 1e18;

/// Chain parameters the wallet must be on before any wager is sent.
#[derive(Debug, Clone, Copy)]
pub struct TargetNetwork {
    pub chain_id: u64,
    pub chain_id_hex: &'static str,
    pub chain_name: &'static str,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub currency_name: &'static str,
    pub currency_symbol: &'static str,
    pub decimals: u8,
}

pub const TARGET_NETWORK: TargetNetwork = TargetNetwork {
    chain_id: 97,
    chain_id_hex: "0x61",
    chain_name: "BNB Smart Chain Testnet",
    rpc_url: "https://data-seed-prebsc-1-s1.bnbchain.org:8545",
    explorer_url: "https://testnet.bscscan.com",
    currency_name: "tBNB",
    currency_symbol: "tBNB",
    decimals: 18,
};

impl TargetNetwork {
    /// Params for `wallet_switchEthereumChain`.
    pub fn switch_params(&self) -> serde_json::Value {
        serde_json::json!([{ "chainId": self.chain_id_hex }])
    }

    /// Params for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!([{
            "chainId": self.chain_id_hex,
            "chainName": self.chain_name,
            "rpcUrls": [self.rpc_url],
            "blockExplorerUrls": [self.explorer_url],
            "nativeCurrency": {
                "name": self.currency_name,
                "symbol": self.currency_symbol,
                "decimals": self.decimals,
            },
        }])
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub log_level: String,
    pub log_file: String,
    /// JSON-RPC endpoint of the signing wallet (WALLET_RPC_URL). None = no provider.
    pub wallet_rpc_url: Option<String>,
    pub bet_recipient: String,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            api_url: std::env::var("API_URL")
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: std::env::var("LOG_FILE").unwrap_or_else(|_| "dashboard.log".to_string()),
            wallet_rpc_url: std::env::var("WALLET_RPC_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            bet_recipient: std::env::var("BET_RECIPIENT")
                .unwrap_or_else(|_| BET_RECIPIENT.to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("HTTP_TIMEOUT_SECS must be a whole number of seconds".to_string())
                })?,
        };
        if !is_valid_address(&cfg.bet_recipient) {
            return Err(AppError::Config(format!(
                "BET_RECIPIENT is not an address: {}",
                cfg.bet_recipient
            )));
        }
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            log_level: "info".to_string(),
            log_file: "dashboard.log".to_string(),
            wallet_rpc_url: None,
            bet_recipient: BET_RECIPIENT.to_string(),
            http_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_network_params() {
        assert_eq!(TARGET_NETWORK.switch_params()[0]["chainId"], "0x61");
        let add = TARGET_NETWORK.add_chain_params();
        assert_eq!(add[0]["rpcUrls"][0], TARGET_NETWORK.rpc_url);
        assert_eq!(add[0]["nativeCurrency"]["symbol"], "tBNB");
        assert_eq!(
            TARGET_NETWORK.tx_url("0xabc"),
            "https://testnet.bscscan.com/tx/0xabc"
        );
    }

    #[test]
    fn defaults_are_usable() {
        let cfg = Config::default();
        assert!(cfg.wallet_rpc_url.is_none());
        assert!(is_valid_address(&cfg.bet_recipient));
        assert_eq!(cfg.api_url, API_URL);
    }
}
