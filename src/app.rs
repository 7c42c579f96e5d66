use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{Config, TargetNetwork, CHANNEL_CAPACITY, DEFAULT_BET_AMOUNT, TARGET_NETWORK};
use crate::error::{AppError, Result};
use crate::fetcher::{Snapshot, SnapshotFetcher};
use crate::ledger::{WagerLedger, WagerOutcome};
use crate::reconciler::{bets_view, DashboardStats, Reconciler, Tab, TabView};
use crate::stream::{LiveState, LiveStream};
use crate::types::{Bet, BetCategory, BetDefinition, Side, WalletState};
use crate::wallet::units::short_tx_hash;
use crate::wallet::{detect_provider, WalletSession};

/// Completion of a background wallet action.
#[derive(Debug)]
pub enum AppEvent {
    Connected(Result<WalletState>),
    Wager(Result<WagerOutcome>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(s) | Notice::Error(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Input modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    OptionA,
    OptionB,
}

/// In-progress "create bet" form.
#[derive(Debug, Clone, PartialEq)]
pub struct BetForm {
    pub title: String,
    pub option_a: String,
    pub option_b: String,
    pub category: BetCategory,
    pub field: FormField,
}

impl Default for BetForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            option_a: String::new(),
            option_b: String::new(),
            category: BetCategory::Fun,
            field: FormField::Title,
        }
    }
}

impl BetForm {
    fn active(&mut self) -> &mut String {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::OptionA => &mut self.option_a,
            FormField::OptionB => &mut self.option_b,
        }
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::OptionA,
            FormField::OptionA => FormField::OptionB,
            FormField::OptionB => FormField::Title,
        };
    }

    pub fn toggle_category(&mut self) {
        self.category = match self.category {
            BetCategory::Fun => BetCategory::Habit,
            BetCategory::Habit => BetCategory::Fun,
        };
    }

    pub fn push(&mut self, c: char) {
        self.active().push(c);
    }

    pub fn backspace(&mut self) {
        self.active().pop();
    }

    fn definition(&self) -> BetDefinition {
        BetDefinition {
            title: self.title.clone(),
            option_a: self.option_a.clone(),
            option_b: self.option_b.clone(),
            category: self.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputMode {
    #[default]
    Browse,
    /// Editing the wager amount; holds the raw text.
    Amount(String),
    CreateBet(BetForm),
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// State behind the terminal view. Owns the live stream and the wallet
/// event listener; both are torn down by [`Dashboard::shutdown`] or on drop.
pub struct Dashboard {
    pub snapshot: Snapshot,
    pub tab: Tab,
    pub selected_bet: usize,
    pub amount: f64,
    pub mode: InputMode,
    pub notice: Option<Notice>,
    pub target: TargetNetwork,
    reconciler: Reconciler,
    stream: LiveStream,
    session: Arc<WalletSession>,
    ledger: Arc<WagerLedger>,
    wallet_listener: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
}

impl Dashboard {
    /// Load the snapshot, open the live stream and attach the wallet, if any.
    pub async fn start(cfg: &Config) -> Result<Self> {
        let fetcher = SnapshotFetcher::new(cfg)?;
        let snapshot = fetcher.fetch_snapshot().await;
        let stream = LiveStream::open(cfg)?;
        let session = WalletSession::new(detect_provider(cfg));
        let ledger = Arc::new(WagerLedger::with_seed_bets(cfg.bet_recipient.clone()));
        Ok(Self::new(snapshot, stream, session, ledger))
    }

    pub fn new(
        snapshot: Snapshot,
        stream: LiveStream,
        session: Arc<WalletSession>,
        ledger: Arc<WagerLedger>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let wallet_listener = session.spawn_event_listener();
        Self {
            snapshot,
            tab: Tab::default(),
            selected_bet: 0,
            amount: DEFAULT_BET_AMOUNT,
            mode: InputMode::Browse,
            notice: None,
            target: TARGET_NETWORK,
            reconciler: Reconciler::new(),
            stream,
            session,
            ledger,
            wallet_listener,
            events_tx,
            events_rx,
        }
    }

    // --- view data ---

    pub fn live(&self) -> LiveState {
        self.stream.state()
    }

    pub fn header(&mut self) -> Arc<DashboardStats> {
        let live = self.stream.state();
        self.reconciler.header(&self.snapshot, live.sample.as_ref())
    }

    pub fn tab_view(&mut self) -> Arc<TabView> {
        match self.reconciler.tab_view(self.tab, &self.snapshot) {
            Some(view) => view,
            None => Arc::new(bets_view(&self.ledger.bets(), |id| self.ledger.is_pending(id))),
        }
    }

    pub fn wallet(&self) -> WalletState {
        self.session.state()
    }

    pub fn bets(&self) -> Vec<Bet> {
        self.ledger.bets()
    }

    pub fn last_tx(&self) -> Option<String> {
        self.ledger.last_tx()
    }

    pub fn selected(&self) -> Option<Bet> {
        self.ledger.bets().into_iter().nth(self.selected_bet)
    }

    // --- navigation ---

    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
    }

    pub fn prev_tab(&mut self) {
        self.tab = self.tab.prev();
    }

    pub fn select_next_bet(&mut self) {
        let max = self.ledger.bets().len().saturating_sub(1);
        self.selected_bet = (self.selected_bet + 1).min(max);
    }

    pub fn select_prev_bet(&mut self) {
        self.selected_bet = self.selected_bet.saturating_sub(1);
    }

    // --- actions ---

    /// Fire-and-forget `POST /refresh`; new figures arrive on the stream.
    pub fn request_refresh(&self) {
        drop(self.stream.trigger_refresh());
    }

    /// Start the wallet connect flow in the background.
    pub fn connect_wallet(&mut self) {
        self.notice = Some(Notice::Info("Connecting wallet...".to_string()));
        let session = Arc::clone(&self.session);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = session.connect().await;
            let _ = tx.send(AppEvent::Connected(result)).await;
        });
    }

    /// Wager the current amount on `side` of the selected bet in the background.
    pub fn place_selected_bet(&mut self, side: Side) {
        let Some(bet) = self.selected() else {
            return;
        };
        if self.ledger.is_pending(&bet.id) {
            return;
        }
        let amount = self.amount;
        let option = match side {
            Side::A => bet.option_a.clone(),
            Side::B => bet.option_b.clone(),
        };
        self.notice = Some(Notice::Info(format!("Sending {amount} tBNB on \"{option}\"...")));

        let session = Arc::clone(&self.session);
        let ledger = Arc::clone(&self.ledger);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = ledger.place_bet(&session, &bet.id, side, amount).await;
            let _ = tx.send(AppEvent::Wager(result)).await;
        });
    }

    pub fn begin_amount_edit(&mut self) {
        self.mode = InputMode::Amount(self.amount.to_string());
    }

    /// Apply the amount being edited. Range checks happen when the bet is placed.
    pub fn commit_amount(&mut self) {
        let InputMode::Amount(raw) = std::mem::take(&mut self.mode) else {
            return;
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                self.amount = v;
                self.notice = None;
            }
            _ => self.notice = Some(Notice::Error(format!("Not a number: {raw}"))),
        }
    }

    pub fn begin_create_bet(&mut self) {
        self.mode = InputMode::CreateBet(BetForm::default());
    }

    /// Submit the create-bet form. On a validation error the form stays open.
    pub fn submit_bet_form(&mut self) {
        let InputMode::CreateBet(form) = &self.mode else {
            return;
        };
        match self.ledger.create_bet(form.definition()) {
            Ok(bet) => {
                self.mode = InputMode::Browse;
                self.selected_bet = 0;
                self.notice = Some(Notice::Info(format!("Created \"{}\"", bet.title)));
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn cancel_input(&mut self) {
        self.mode = InputMode::Browse;
    }

    // --- background results ---

    /// Apply every finished background action without waiting.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }

    /// Wait for the next finished background action.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events_rx.recv().await
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::Connected(Ok(state)) => {
                self.notice = Some(Notice::Info(format!(
                    "Wallet connected on {}",
                    self.target.chain_name
                )));
                info!(address = %state.address, "wallet ready");
            }
            AppEvent::Wager(Ok(WagerOutcome::Submitted { tx_hash })) => {
                self.notice = Some(Notice::Info(format!(
                    "Bet placed! Tx: {}",
                    short_tx_hash(&tx_hash)
                )));
            }
            AppEvent::Wager(Ok(WagerOutcome::ConnectRequested)) => {
                self.notice = Some(Notice::Info(
                    "Wallet connected. Place your bet again.".to_string(),
                ));
            }
            AppEvent::Wager(Ok(WagerOutcome::Declined)) => self.notice = None,
            AppEvent::Connected(Err(e)) | AppEvent::Wager(Err(e)) => self.report(&e),
        }
    }

    fn report(&mut self, e: &AppError) {
        warn!("{e}");
        self.notice = e.user_message().map(Notice::Error);
    }

    /// Close the live stream and stop listening to the wallet.
    pub fn shutdown(&mut self) {
        self.stream.close();
        if let Some(handle) = self.wallet_listener.take() {
            handle.abort();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BET_RECIPIENT, USER_REJECTED_CODE};
    use crate::wallet::mock::{MockProvider, TX_HASH};
    use crate::wallet::{ProviderError, WalletProvider};
    use std::time::Duration;

    fn dashboard(provider: Option<Arc<MockProvider>>) -> Dashboard {
        let stream = LiveStream::open_with_client(reqwest::Client::new(), "http://127.0.0.1:1".into());
        let session = WalletSession::new(provider.map(|p| p as Arc<dyn WalletProvider>));
        let ledger = Arc::new(WagerLedger::with_seed_bets(BET_RECIPIENT));
        Dashboard::new(Snapshot::default(), stream, session, ledger)
    }

    async fn settle(app: &mut Dashboard) {
        let event = tokio::time::timeout(Duration::from_secs(2), app.next_event())
            .await
            .expect("background action finished")
            .expect("channel open");
        app.apply(event);
    }

    #[tokio::test]
    async fn connect_then_bet_reports_tx() {
        let mock = MockProvider::on_target_chain();
        let mut app = dashboard(Some(Arc::clone(&mock)));

        app.connect_wallet();
        settle(&mut app).await;
        assert!(app.wallet().connected);

        app.amount = 0.01;
        app.place_selected_bet(Side::A);
        settle(&mut app).await;
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice, Notice::Info(format!("Bet placed! Tx: {}", short_tx_hash(TX_HASH))));
        assert_eq!(app.last_tx().as_deref(), Some(TX_HASH));
        assert!((app.bets()[0].pool_a - 0.06).abs() < 1e-12);
    }

    #[tokio::test]
    async fn missing_wallet_shows_instruction() {
        let mut app = dashboard(None);
        app.place_selected_bet(Side::B);
        settle(&mut app).await;
        match app.notice.clone() {
            Some(Notice::Error(text)) => assert!(text.contains("WALLET_RPC_URL")),
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[tokio::test]
    async fn declined_wager_clears_notice() {
        let mock = MockProvider::on_target_chain();
        mock.push_reply(
            "eth_sendTransaction",
            Err(ProviderError::new(Some(USER_REJECTED_CODE), "denied")),
        );
        let mut app = dashboard(Some(Arc::clone(&mock)));
        app.connect_wallet();
        settle(&mut app).await;

        app.place_selected_bet(Side::A);
        settle(&mut app).await;
        assert!(app.notice.is_none());
        assert!(app.last_tx().is_none());
    }

    #[tokio::test]
    async fn bad_amount_is_reported_without_provider_call() {
        let mock = MockProvider::on_target_chain();
        let mut app = dashboard(Some(Arc::clone(&mock)));

        app.begin_amount_edit();
        app.mode = InputMode::Amount("2".to_string());
        app.commit_amount();
        assert_eq!(app.amount, 2.0);

        app.place_selected_bet(Side::A);
        settle(&mut app).await;
        assert_eq!(
            app.notice,
            Some(Notice::Error("Bet amount must be between 0.001 and 1 tBNB".to_string()))
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn unparsable_amount_keeps_previous_value() {
        let mut app = dashboard(None);
        app.mode = InputMode::Amount("abc".to_string());
        app.commit_amount();
        assert_eq!(app.amount, DEFAULT_BET_AMOUNT);
        assert!(matches!(app.notice, Some(Notice::Error(_))));
        assert_eq!(app.mode, InputMode::Browse);
    }

    #[tokio::test]
    async fn bet_form_validation_keeps_form_open() {
        let mut app = dashboard(None);
        let before = app.bets();

        app.begin_create_bet();
        for c in "Rain tomorrow?".chars() {
            if let InputMode::CreateBet(form) = &mut app.mode {
                form.push(c);
            }
        }
        if let InputMode::CreateBet(form) = &mut app.mode {
            form.next_field();
            form.push('Y');
        }
        app.submit_bet_form();
        assert!(matches!(app.mode, InputMode::CreateBet(_)));
        assert!(matches!(app.notice, Some(Notice::Error(_))));
        assert_eq!(app.bets(), before);

        if let InputMode::CreateBet(form) = &mut app.mode {
            form.next_field();
            form.push('N');
        }
        app.submit_bet_form();
        assert_eq!(app.mode, InputMode::Browse);
        assert_eq!(app.bets().len(), before.len() + 1);
        assert_eq!(app.selected().unwrap().title, "Rain tomorrow?");
    }

    #[tokio::test]
    async fn fun_bets_tab_comes_from_ledger() {
        let mut app = dashboard(None);
        app.tab = Tab::FunBets;
        let view = app.tab_view();
        assert_eq!(view.sections[0].rows.len(), 7);

        app.tab = Tab::AgentFeed;
        let a = app.tab_view();
        let b = app.tab_view();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn shutdown_closes_stream() {
        let mut app = dashboard(None);
        app.shutdown();
        assert!(app.stream.is_closed());
        app.shutdown();
    }
}
