use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Markets and matches (backend-computed, display only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketOutcome {
    pub name: String,
    pub price: f64,
    pub liquidity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Market {
    pub platform: String,
    pub market_id: String,
    pub title: String,
    pub description: String,
    pub outcomes: Vec<MarketOutcome>,
    pub resolution_date: String,
    pub category: String,
    pub quality_score: Option<f64>,
    pub quality_grade: Option<String>,
    pub quality_reasoning: Option<String>,
}

/// Verdict of the external matching pipeline on resolution compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyBadge {
    Safe,
    #[default]
    Caution,
    Danger,
}

impl std::fmt::Display for SafetyBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SafetyBadge::Safe => "SAFE",
            SafetyBadge::Caution => "CAUTION",
            SafetyBadge::Danger => "DANGER",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRow {
    pub is_match: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub market_a: Market,
    pub market_b: Market,
    pub platform_a: String,
    pub platform_b: String,
    pub embedding_similarity: f64,
    pub resolution_conflict_score: f64,
    pub safety_badge: SafetyBadge,
    pub resolution_risks: Vec<String>,
    pub resolution_criteria_a: String,
    pub resolution_criteria_b: String,
    pub edge_cases: Vec<String>,
    /// Either a list of mappings or a single mapping object.
    pub outcome_mapping: serde_json::Value,
    pub event_summary: String,
}

impl MatchRow {
    /// Event summary, falling back to the first market's title.
    pub fn label(&self) -> &str {
        if self.event_summary.is_empty() {
            &self.market_a.title
        } else {
            &self.event_summary
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityLeg {
    pub platform: String,
    pub title: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub liquidity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityRow {
    pub event_summary: String,
    pub market_a: OpportunityLeg,
    pub market_b: OpportunityLeg,
    pub spread_pct: f64,
    pub score: f64,
    pub action: String,
    pub ai_confidence: f64,
    pub profit_pct: f64,
    pub safety_badge: SafetyBadge,
    pub resolution_conflict_score: f64,
    pub reasoning: String,
    pub resolution_risks: Vec<String>,
    pub outcome_mapping: serde_json::Value,
    pub time_decay_flag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Aggregate stats
// ---------------------------------------------------------------------------

/// Counts and ratios produced once per snapshot fetch (`GET /stats`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateStats {
    pub markets_scanned: u64,
    pub platforms_count: u64,
    pub platform_names: Vec<String>,
    pub matched_pairs: u64,
    pub total_opportunities: u64,
    pub safe_opportunities: u64,
    pub caution_opportunities: u64,
    pub danger_opportunities: u64,
    pub avg_spread_pct: f64,
    pub best_spread_pct: f64,
    pub avg_confidence: f64,
    pub avg_quality_score: f64,
}

/// One push-delivered aggregate reading from `GET /stream`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSample {
    pub markets_scanned: u64,
    pub opportunities: u64,
    pub avg_spread: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Chain info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainDeployment {
    pub contract_address: String,
    pub explorer_url: String,
    pub verified: bool,
    pub opportunity_count: u64,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainInfo {
    pub bsc: ChainDeployment,
    pub opbnb: ChainDeployment,
    pub wallet_address: String,
    pub wallet_balance_bsc: String,
    pub wallet_balance_opbnb: String,
}

impl Default for ChainInfo {
    fn default() -> Self {
        Self {
            bsc: ChainDeployment::default(),
            opbnb: ChainDeployment::default(),
            wallet_address: String::new(),
            wallet_balance_bsc: "N/A".to_string(),
            wallet_balance_opbnb: "N/A".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Observable wallet session state.
/// `connected` implies a well-formed `address`; disconnected implies an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub address: String,
    pub balance_display: String,
    pub chain_id: u64,
    pub connected: bool,
}

impl Default for WalletState {
    fn default() -> Self {
        Self {
            address: String::new(),
            balance_display: "0".to_string(),
            chain_id: 0,
            connected: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetCategory {
    Habit,
    Fun,
}

impl std::fmt::Display for BetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetCategory::Habit => write!(f, "habit"),
            BetCategory::Fun => write!(f, "fun"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Open,
    Resolved,
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetStatus::Open => write!(f, "open"),
            BetStatus::Resolved => write!(f, "resolved"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// A two-sided wager. Pools are local approximations in native units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: BetCategory,
    pub option_a: String,
    pub option_b: String,
    pub pool_a: f64,
    pub pool_b: f64,
    pub deadline: String,
    pub status: BetStatus,
}

impl Bet {
    pub fn total_pool(&self) -> f64 {
        self.pool_a + self.pool_b
    }

    /// Share of the total pool on each side, in percent. Empty pools split 50/50.
    pub fn pool_split_pct(&self) -> (f64, f64) {
        let total = self.total_pool();
        let pct_a = if total > 0.0 { self.pool_a / total * 100.0 } else { 50.0 };
        (pct_a, 100.0 - pct_a)
    }
}

/// User-entered fields for a new bet.
#[derive(Debug, Clone, PartialEq)]
pub struct BetDefinition {
    pub title: String,
    pub option_a: String,
    pub option_b: String,
    pub category: BetCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_missing_fields_default_to_zero() {
        let stats: AggregateStats =
            serde_json::from_str(r#"{"markets_scanned":10,"platforms_count":2}"#).unwrap();
        assert_eq!(stats.markets_scanned, 10);
        assert_eq!(stats.platforms_count, 2);
        assert_eq!(stats.matched_pairs, 0);
        assert!(stats.platform_names.is_empty());
    }

    #[test]
    fn safety_badge_parses_uppercase() {
        let row: MatchRow =
            serde_json::from_str(r#"{"safety_badge":"DANGER","event_summary":""}"#).unwrap();
        assert_eq!(row.safety_badge, SafetyBadge::Danger);
    }

    #[test]
    fn match_label_falls_back_to_market_title() {
        let mut row = MatchRow::default();
        row.market_a.title = "Fed cuts in March?".to_string();
        assert_eq!(row.label(), "Fed cuts in March?");
        row.event_summary = "FOMC March decision".to_string();
        assert_eq!(row.label(), "FOMC March decision");
    }

    #[test]
    fn log_entry_reads_type_field() {
        let log: LogEntry =
            serde_json::from_str(r#"{"timestamp":"12:00","type":"match","message":"ok"}"#).unwrap();
        assert_eq!(log.kind, "match");
    }

    #[test]
    fn pool_split_defaults_to_even() {
        let bet = Bet {
            id: "b".into(),
            title: "t".into(),
            description: String::new(),
            category: BetCategory::Fun,
            option_a: "a".into(),
            option_b: "b".into(),
            pool_a: 0.0,
            pool_b: 0.0,
            deadline: String::new(),
            status: BetStatus::Open,
        };
        assert_eq!(bet.pool_split_pct(), (50.0, 50.0));

        let bet = Bet { pool_a: 0.03, pool_b: 0.01, ..bet };
        let (a, b) = bet.pool_split_pct();
        assert!((a - 75.0).abs() < 1e-9);
        assert!((b - 25.0).abs() < 1e-9);
    }
}
