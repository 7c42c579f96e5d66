use std::sync::{Mutex, PoisonError};

use dashmap::{DashMap, DashSet};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{DEFAULT_BET_DEADLINE, MAX_BET_AMOUNT};
use crate::error::{AppError, Result};
use crate::types::{Bet, BetCategory, BetDefinition, BetStatus, Side};
use crate::wallet::units::{bet_payload, native_to_wei, wei_to_hex};
use crate::wallet::WalletSession;

/// How a `place_bet` call resolved when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WagerOutcome {
    /// Wallet was disconnected; the connect flow ran instead of a submission.
    ConnectRequested,
    /// The wallet signed and sent the transaction.
    Submitted { tx_hash: String },
    /// The user declined the signing prompt.
    Declined,
}

// ---------------------------------------------------------------------------
// WagerLedger
// ---------------------------------------------------------------------------

/// Local, optimistic view of bet pools plus the single-flight submission path.
///
/// Pools only ever grow, and only after the wallet accepted a transaction.
/// Nothing here tracks confirmation; the chain stays the source of truth.
pub struct WagerLedger {
    bets: DashMap<String, Bet>,
    /// Bet ids, newest first.
    order: Mutex<Vec<String>>,
    /// Bet ids with a submission in flight.
    pending: DashSet<String>,
    last_tx: Mutex<Option<String>>,
    recipient: String,
}

impl WagerLedger {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            bets: DashMap::new(),
            order: Mutex::new(Vec::new()),
            pending: DashSet::new(),
            last_tx: Mutex::new(None),
            recipient: recipient.into(),
        }
    }

    pub fn with_seed_bets(recipient: impl Into<String>) -> Self {
        let ledger = Self::new(recipient);
        for bet in seed_bets() {
            ledger.order.lock().unwrap_or_else(PoisonError::into_inner).push(bet.id.clone());
            ledger.bets.insert(bet.id.clone(), bet);
        }
        ledger
    }

    /// All bets, newest first.
    pub fn bets(&self) -> Vec<Bet> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|id| self.bets.get(id).map(|b| b.clone()))
            .collect()
    }

    pub fn bets_in(&self, category: BetCategory) -> Vec<Bet> {
        self.bets().into_iter().filter(|b| b.category == category).collect()
    }

    pub fn bet(&self, id: &str) -> Option<Bet> {
        self.bets.get(id).map(|b| b.clone())
    }

    pub fn last_tx(&self) -> Option<String> {
        self.last_tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_pending(&self, bet_id: &str) -> bool {
        self.pending.contains(bet_id)
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Wager `amount` native units on `side` of `bet_id`.
    ///
    /// The amount is checked before anything else so a bad amount never
    /// reaches the provider. A disconnected wallet gets the connect flow and
    /// no submission. A second call for a bet that is already in flight
    /// fails with [`AppError::AlreadyPending`] without touching the wallet.
    pub async fn place_bet(
        &self,
        session: &WalletSession,
        bet_id: &str,
        side: Side,
        amount: f64,
    ) -> Result<WagerOutcome> {
        validate_amount(amount)?;

        if !session.is_connected() {
            info!(bet_id, "Wallet not connected, starting connect flow");
            session.connect().await?;
            return Ok(WagerOutcome::ConnectRequested);
        }

        let bet = self
            .bet(bet_id)
            .ok_or_else(|| AppError::UnknownBet(bet_id.to_string()))?;
        if bet.status != BetStatus::Open {
            return Err(AppError::Validation(format!("Bet \"{}\" is already resolved", bet.title)));
        }

        // Claimed before the first await; released on every exit path.
        if !self.pending.insert(bet_id.to_string()) {
            return Err(AppError::AlreadyPending(bet_id.to_string()));
        }
        let _pending = PendingGuard {
            pending: &self.pending,
            bet_id,
        };

        let provider = session.provider()?;
        let wallet = session.state();
        let tx = json!([{
            "from": wallet.address,
            "to": self.recipient,
            "value": wei_to_hex(native_to_wei(amount)),
            "data": bet_payload(bet_id, side),
        }]);
        info!(bet_id, %side, amount, "Submitting wager");

        let tx_hash = match provider.request("eth_sendTransaction", tx).await {
            Ok(serde_json::Value::String(hash)) => hash,
            Ok(other) => {
                warn!(bet_id, "wallet returned no transaction id: {other}");
                return Err(AppError::TransactionFailed(
                    "wallet returned no transaction id".to_string(),
                ));
            }
            Err(e) if e.is_user_rejection() => {
                info!(bet_id, "Wager declined in wallet");
                return Ok(WagerOutcome::Declined);
            }
            Err(e) => {
                warn!(bet_id, "Wager submission failed: {e}");
                return Err(AppError::TransactionFailed(e.message));
            }
        };

        *self.last_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx_hash.clone());
        self.credit(bet_id, side, amount);
        info!(bet_id, tx_hash = %tx_hash, "Wager sent");

        if let Err(e) = session.refresh_balance().await {
            warn!("Balance refresh after wager failed: {e}");
        }
        Ok(WagerOutcome::Submitted { tx_hash })
    }

    /// Add a user-defined bet at the top of the list. Local only.
    pub fn create_bet(&self, definition: BetDefinition) -> Result<Bet> {
        let title = definition.title.trim();
        let option_a = definition.option_a.trim();
        let option_b = definition.option_b.trim();
        if title.is_empty() || option_a.is_empty() || option_b.is_empty() {
            return Err(AppError::Validation(
                "Title and both options are required".to_string(),
            ));
        }

        let bet = Bet {
            id: format!("custom-{}", uuid::Uuid::new_v4().simple()),
            title: title.to_string(),
            description: "Custom bet created by you.".to_string(),
            category: definition.category,
            option_a: option_a.to_string(),
            option_b: option_b.to_string(),
            pool_a: 0.0,
            pool_b: 0.0,
            deadline: DEFAULT_BET_DEADLINE.to_string(),
            status: BetStatus::Open,
        };

        self.bets.insert(bet.id.clone(), bet.clone());
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, bet.id.clone());
        info!(bet_id = %bet.id, category = %bet.category, "Custom bet created");
        Ok(bet)
    }

    fn credit(&self, bet_id: &str, side: Side, amount: f64) {
        if let Some(mut bet) = self.bets.get_mut(bet_id) {
            match side {
                Side::A => bet.pool_a += amount,
                Side::B => bet.pool_b += amount,
            }
        }
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 && amount <= MAX_BET_AMOUNT {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Bet amount must be between 0.001 and 1 tBNB".to_string(),
        ))
    }
}

struct PendingGuard<'a> {
    pending: &'a DashSet<String>,
    bet_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.bet_id);
    }
}

// ---------------------------------------------------------------------------
// Seed bets
// ---------------------------------------------------------------------------

fn seed(
    id: &str,
    category: BetCategory,
    title: &str,
    description: &str,
    options: (&str, &str),
    pools: (f64, f64),
    deadline: &str,
) -> Bet {
    Bet {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        category,
        option_a: options.0.to_string(),
        option_b: options.1.to_string(),
        pool_a: pools.0,
        pool_b: pools.1,
        deadline: deadline.to_string(),
        status: BetStatus::Open,
    }
}

pub fn seed_bets() -> Vec<Bet> {
    use BetCategory::{Fun, Habit};
    vec![
        seed(
            "habit-gym-5d",
            Habit,
            "Will I hit the gym 5 days this week?",
            "Stake tBNB on your discipline. Resolves Sunday midnight.",
            ("YES - I will", "NO - I won't"),
            (0.05, 0.02),
            "2026-03-07",
        ),
        seed(
            "habit-no-sugar-7d",
            Habit,
            "Zero sugar for 7 straight days?",
            "Put money where your mouth is. No sugar, no cheat days.",
            ("YES - Clean week", "NO - Will break"),
            (0.03, 0.04),
            "2026-03-07",
        ),
        seed(
            "habit-read-30min",
            Habit,
            "Read 30 min every day this week?",
            "Bet on building a reading habit. No audiobooks.",
            ("YES - Every day", "NO - Will skip"),
            (0.02, 0.03),
            "2026-03-07",
        ),
        seed(
            "habit-wake-6am",
            Habit,
            "Wake up before 6 AM for 5 days?",
            "Early bird gets the tBNB. Alarm proof required.",
            ("YES - Early bird", "NO - Snooze king"),
            (0.04, 0.02),
            "2026-03-07",
        ),
        seed(
            "fun-vlad-lucas-tower",
            Fun,
            "Vlad vs Lucas: Water Bottle Tower Showdown",
            "Who knocks down the water bottle tower first? Judges decide. Place your bet now.",
            ("VLAD wins", "LUCAS wins"),
            (0.06, 0.08),
            "2026-03-01",
        ),
        seed(
            "fun-coding-race",
            Fun,
            "Who ships the feature first?",
            "Dev A vs Dev B: first to push a working PR wins the pot.",
            ("Dev A ships first", "Dev B ships first"),
            (0.03, 0.03),
            "2026-03-02",
        ),
        seed(
            "fun-spicy-challenge",
            Fun,
            "Can Vlad finish the Carolina Reaper wing?",
            "One wing. No milk for 5 minutes. Judges: Lucas & the crowd.",
            ("YES - He survives", "NO - Taps out"),
            (0.02, 0.07),
            "2026-03-01",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BET_RECIPIENT, USER_REJECTED_CODE};
    use crate::wallet::mock::{MockProvider, ACCOUNT, TX_HASH};
    use crate::wallet::{ProviderError, WalletProvider};
    use std::sync::Arc;
    use std::time::Duration;

    const BET: &str = "fun-coding-race";

    async fn connected(mock: &Arc<MockProvider>) -> Arc<WalletSession> {
        let session = WalletSession::new(Some(Arc::clone(mock) as Arc<dyn WalletProvider>));
        session.connect().await.unwrap();
        mock.clear_calls();
        session
    }

    fn pools(ledger: &WagerLedger, id: &str) -> (f64, f64) {
        let bet = ledger.bet(id).unwrap();
        (bet.pool_a, bet.pool_b)
    }

    #[test]
    fn seeded_ledger_has_seven_open_bets() {
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        let bets = ledger.bets();
        assert_eq!(bets.len(), 7);
        assert_eq!(bets[0].id, "habit-gym-5d");
        assert!(bets.iter().all(|b| b.status == BetStatus::Open));
        assert_eq!(ledger.bets_in(BetCategory::Habit).len(), 4);
        assert_eq!(ledger.bets_in(BetCategory::Fun).len(), 3);
    }

    #[tokio::test]
    async fn disconnected_wallet_triggers_connect_not_send() {
        let mock = MockProvider::on_target_chain();
        let session = WalletSession::new(Some(Arc::clone(&mock) as Arc<dyn WalletProvider>));
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);

        let outcome = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap();
        assert_eq!(outcome, WagerOutcome::ConnectRequested);
        assert_eq!(mock.count("eth_sendTransaction"), 0);
        assert_eq!(mock.count("eth_requestAccounts"), 1);
        assert_eq!(pools(&ledger, BET), (0.03, 0.03));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn missing_provider_surfaces_on_place() {
        let session = WalletSession::new(None);
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        let err = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderMissing));
        assert!(err.user_message().is_some());
    }

    #[tokio::test]
    async fn out_of_range_amounts_never_reach_provider() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);

        for amount in [0.0, -0.5, 1.0001, 5.0, f64::NAN] {
            let err = ledger.place_bet(&session, BET, Side::A, amount).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "amount {amount}");
        }
        assert!(mock.calls().is_empty());

        // Same check applies while disconnected: no connect attempt either.
        let fresh = MockProvider::on_target_chain();
        let idle = WalletSession::new(Some(Arc::clone(&fresh) as Arc<dyn WalletProvider>));
        assert!(ledger.place_bet(&idle, BET, Side::B, 0.0).await.is_err());
        assert!(fresh.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_wager_credits_chosen_side() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        let (p, q) = pools(&ledger, BET);

        let outcome = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap();
        assert_eq!(
            outcome,
            WagerOutcome::Submitted {
                tx_hash: TX_HASH.to_string()
            }
        );
        let (a, b) = pools(&ledger, BET);
        assert!((a - (p + 0.01)).abs() < 1e-12);
        assert_eq!(b, q);
        assert_eq!(ledger.last_tx().as_deref(), Some(TX_HASH));
        assert!(!ledger.is_pending(BET));
        assert_eq!(mock.methods(), vec!["eth_sendTransaction", "eth_getBalance"]);
    }

    #[tokio::test]
    async fn transaction_payload_shape() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);

        ledger.place_bet(&session, BET, Side::B, 0.01).await.unwrap();

        let (method, params) = &mock.calls()[0];
        assert_eq!(method, "eth_sendTransaction");
        let tx = &params[0];
        assert_eq!(tx["from"], ACCOUNT);
        assert_eq!(tx["to"], BET_RECIPIENT);
        assert_eq!(tx["value"], "0x2386f26fc10000");
        assert_eq!(tx["data"], bet_payload(BET, Side::B));
    }

    #[tokio::test]
    async fn unknown_bet_is_rejected_before_submission() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);

        let err = ledger.place_bet(&session, "nope", Side::A, 0.01).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownBet(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn user_rejection_is_silent_and_retryable() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        mock.push_reply(
            "eth_sendTransaction",
            Err(ProviderError::new(Some(USER_REJECTED_CODE), "User denied transaction signature")),
        );

        let outcome = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap();
        assert_eq!(outcome, WagerOutcome::Declined);
        assert_eq!(pools(&ledger, BET), (0.03, 0.03));
        assert!(ledger.last_tx().is_none());
        assert!(!ledger.is_pending(BET));

        let retry = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap();
        assert!(matches!(retry, WagerOutcome::Submitted { .. }));
    }

    #[tokio::test]
    async fn other_failures_surface_and_leave_state() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        mock.push_reply(
            "eth_sendTransaction",
            Err(ProviderError::new(Some(-32000), "insufficient funds for gas")),
        );

        let err = ledger.place_bet(&session, BET, Side::B, 0.5).await.unwrap_err();
        assert!(matches!(err, AppError::TransactionFailed(_)));
        assert!(err.user_message().unwrap().contains("insufficient funds"));
        assert_eq!(pools(&ledger, BET), (0.03, 0.03));
        assert!(!ledger.is_pending(BET));
        assert_eq!(mock.count("eth_getBalance"), 0);
    }

    #[tokio::test]
    async fn second_submission_for_pending_bet_is_rejected() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = Arc::new(WagerLedger::with_seed_bets(BET_RECIPIENT));
        let gate = mock.hold_sends();

        let first = {
            let ledger = Arc::clone(&ledger);
            let session = Arc::clone(&session);
            tokio::spawn(async move { ledger.place_bet(&session, BET, Side::A, 0.01).await })
        };
        tokio::time::timeout(Duration::from_secs(2), async {
            while mock.count("eth_sendTransaction") == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first submission in flight");
        assert!(ledger.is_pending(BET));

        let err = ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPending(_)));
        assert!(err.user_message().is_none());
        assert_eq!(mock.count("eth_sendTransaction"), 1);

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, WagerOutcome::Submitted { .. }));
        assert!(!ledger.is_pending(BET));

        // Eligible again once resolved.
        gate.notify_one();
        ledger.place_bet(&session, BET, Side::A, 0.01).await.unwrap();
        assert_eq!(mock.count("eth_sendTransaction"), 2);
        let (a, _) = pools(&ledger, BET);
        assert!((a - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn different_bets_may_be_in_flight_together() {
        let mock = MockProvider::on_target_chain();
        let session = connected(&mock).await;
        let ledger = Arc::new(WagerLedger::with_seed_bets(BET_RECIPIENT));
        let gate = mock.hold_sends();

        let spawn = |id: &'static str| {
            let ledger = Arc::clone(&ledger);
            let session = Arc::clone(&session);
            tokio::spawn(async move { ledger.place_bet(&session, id, Side::B, 0.01).await })
        };
        let first = spawn("habit-gym-5d");
        let second = spawn("habit-wake-6am");
        tokio::time::timeout(Duration::from_secs(2), async {
            while mock.count("eth_sendTransaction") < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("both submissions in flight");

        gate.notify_waiters();
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
    }

    #[test]
    fn create_bet_with_missing_option_leaves_list_unchanged() {
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        let before = ledger.bets();

        let err = ledger
            .create_bet(BetDefinition {
                title: "Will it rain?".into(),
                option_a: "Yes".into(),
                option_b: "   ".into(),
                category: BetCategory::Fun,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(ledger.bets(), before);
    }

    #[test]
    fn create_bet_prepends_with_zero_pools() {
        let ledger = WagerLedger::with_seed_bets(BET_RECIPIENT);
        let def = BetDefinition {
            title: "Will it rain?".into(),
            option_a: "Yes".into(),
            option_b: "No".into(),
            category: BetCategory::Habit,
        };
        let first = ledger.create_bet(def.clone()).unwrap();
        let second = ledger.create_bet(def).unwrap();

        assert!(first.id.starts_with("custom-"));
        assert_ne!(first.id, second.id);
        assert_eq!((first.pool_a, first.pool_b), (0.0, 0.0));
        assert_eq!(first.description, "Custom bet created by you.");
        assert_eq!(first.deadline, DEFAULT_BET_DEADLINE);

        let bets = ledger.bets();
        assert_eq!(bets.len(), 9);
        assert_eq!(bets[0].id, second.id);
        assert_eq!(bets[1].id, first.id);
    }
}
