use thiserror::Error;

use crate::wallet::provider::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("No wallet provider detected. Configure WALLET_RPC_URL to place bets.")]
    ProviderMissing,

    #[error("Request rejected in wallet")]
    UserRejected,

    #[error("Wrong network: {0}")]
    NetworkMismatch(String),

    #[error("{0}")]
    Validation(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Bet {0} already has a transaction in flight")]
    AlreadyPending(String),

    #[error("Unknown bet: {0}")]
    UnknownBet(String),

    #[error("Wallet provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Inline notice for the user, or `None` when the failure stays silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AppError::UserRejected | AppError::DataUnavailable(_) | AppError::AlreadyPending(_) => {
                None
            }
            AppError::Provider(e) if e.is_user_rejection() => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USER_REJECTED_CODE;

    #[test]
    fn silent_kinds_have_no_notice() {
        assert!(AppError::UserRejected.user_message().is_none());
        assert!(AppError::DataUnavailable("/stats".into()).user_message().is_none());
        assert!(AppError::AlreadyPending("bet-1".into()).user_message().is_none());
        let rejected = ProviderError::new(Some(USER_REJECTED_CODE), "User denied");
        assert!(AppError::Provider(rejected).user_message().is_none());
    }

    #[test]
    fn validation_notice_is_the_message() {
        let err = AppError::Validation("Bet amount must be between 0.001 and 1 tBNB".into());
        assert_eq!(
            err.user_message().as_deref(),
            Some("Bet amount must be between 0.001 and 1 tBNB")
        );
    }

    #[test]
    fn provider_missing_is_surfaced() {
        let msg = AppError::ProviderMissing.user_message().unwrap();
        assert!(msg.contains("WALLET_RPC_URL"));
    }
}
