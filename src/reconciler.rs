use std::collections::HashMap;
use std::sync::Arc;

use crate::fetcher::Snapshot;
use crate::types::{AggregateStats, Bet, ChainDeployment, LiveSample, Market, MatchRow};
use crate::wallet::units::short_address;

// ---------------------------------------------------------------------------
// Header stats
// ---------------------------------------------------------------------------

/// Figures shown in the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DashboardStats {
    pub markets_scanned: u64,
    pub platforms: u64,
    pub ai_matches: u64,
    pub opportunities: u64,
    pub time_value_spreads: u64,
    pub average_spread_pct: f64,
}

impl From<&AggregateStats> for DashboardStats {
    fn from(stats: &AggregateStats) -> Self {
        Self {
            markets_scanned: stats.markets_scanned,
            platforms: stats.platforms_count,
            ai_matches: stats.matched_pairs,
            opportunities: stats.safe_opportunities,
            time_value_spreads: stats
                .total_opportunities
                .saturating_sub(stats.safe_opportunities),
            average_spread_pct: stats.avg_spread_pct,
        }
    }
}

/// Live fields win over snapshot fields; everything else comes from the snapshot.
pub fn reconcile(base: &DashboardStats, live: Option<&LiveSample>) -> DashboardStats {
    match live {
        Some(sample) => DashboardStats {
            markets_scanned: sample.markets_scanned,
            opportunities: sample.opportunities,
            average_spread_pct: sample.avg_spread,
            ..*base
        },
        None => *base,
    }
}

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    Aggregator,
    SafeOpportunities,
    ResolutionRisks,
    AiAnalysis,
    AgentFeed,
    OnChain,
    FunBets,
}

impl Tab {
    pub const ALL: [Tab; 7] = [
        Tab::Aggregator,
        Tab::SafeOpportunities,
        Tab::ResolutionRisks,
        Tab::AiAnalysis,
        Tab::AgentFeed,
        Tab::OnChain,
        Tab::FunBets,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Aggregator => "Aggregator",
            Tab::SafeOpportunities => "Safe Opportunities",
            Tab::ResolutionRisks => "Resolution Risks",
            Tab::AiAnalysis => "AI Analysis",
            Tab::AgentFeed => "Agent Feed",
            Tab::OnChain => "On-Chain",
            Tab::FunBets => "Fun Bets",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<String>,
    /// Render emphasised (e.g. cheapest YES in an event group).
    pub highlight: bool,
}

impl TableRow {
    fn plain(cells: Vec<String>) -> Self {
        Self {
            cells,
            highlight: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSection {
    pub title: String,
    pub header: Vec<&'static str>,
    pub rows: Vec<TableRow>,
    /// Shown instead of the table when `rows` is empty.
    pub empty_message: &'static str,
}

/// Render-ready content of one tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabView {
    pub sections: Vec<TableSection>,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Memoizes header stats and tab content so unchanged inputs hand back the
/// same `Arc` (callers can compare with `Arc::ptr_eq` and skip work).
#[derive(Debug, Default)]
pub struct Reconciler {
    header: Option<((u64, Option<LiveSample>), Arc<DashboardStats>)>,
    tab: Option<((Tab, u64), Arc<TabView>)>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&mut self, snapshot: &Snapshot, live: Option<&LiveSample>) -> Arc<DashboardStats> {
        let key = (snapshot.generation, live.copied());
        if let Some((cached_key, stats)) = &self.header {
            if *cached_key == key {
                return Arc::clone(stats);
            }
        }
        let stats = Arc::new(reconcile(&DashboardStats::from(&snapshot.stats), live));
        self.header = Some((key, Arc::clone(&stats)));
        stats
    }

    /// Content of a snapshot-backed tab. `FunBets` is driven by the ledger,
    /// see [`bets_view`].
    pub fn tab_view(&mut self, tab: Tab, snapshot: &Snapshot) -> Option<Arc<TabView>> {
        if tab == Tab::FunBets {
            return None;
        }
        let key = (tab, snapshot.generation);
        if let Some((cached_key, view)) = &self.tab {
            if *cached_key == key {
                return Some(Arc::clone(view));
            }
        }
        let view = Arc::new(build_tab(tab, snapshot));
        self.tab = Some((key, Arc::clone(&view)));
        Some(view)
    }
}

pub fn build_tab(tab: Tab, snapshot: &Snapshot) -> TabView {
    match tab {
        Tab::Aggregator => aggregator(&snapshot.markets),
        Tab::SafeOpportunities => safe_opportunities(snapshot),
        Tab::ResolutionRisks => resolution_risks(&snapshot.matches),
        Tab::AiAnalysis => ai_analysis(&snapshot.matches),
        Tab::AgentFeed => agent_feed(snapshot),
        Tab::OnChain => on_chain(snapshot),
        Tab::FunBets => TabView::default(),
    }
}

// ---------------------------------------------------------------------------
// Tab builders
// ---------------------------------------------------------------------------

const MAX_EVENT_GROUPS: usize = 25;

fn yes_price(market: &Market) -> f64 {
    market
        .outcomes
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case("yes"))
        .map(|o| o.price)
        .unwrap_or(0.0)
}

/// `B (72)` style badge. Missing scores count as 50; missing grades derive from the score.
fn quality_label(market: &Market) -> String {
    let score = market.quality_score.unwrap_or(50.0);
    let grade = match market.quality_grade.as_deref() {
        Some(g) if !g.is_empty() => g.to_string(),
        _ => match score {
            s if s >= 80.0 => "A".to_string(),
            s if s >= 65.0 => "B".to_string(),
            s if s >= 50.0 => "C".to_string(),
            _ => "D".to_string(),
        },
    };
    format!("{grade} ({score})")
}

fn aggregator(markets: &[Market]) -> TabView {
    // Event groups keyed by category and resolution date, first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Market>> = HashMap::new();
    for market in markets {
        let key = format!("{}|{}", market.category, market.resolution_date);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(market);
    }

    let sections = order
        .into_iter()
        .take(MAX_EVENT_GROUPS)
        .filter_map(|key| {
            let items = groups.remove(&key)?;
            let best = items
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| yes_price(a).total_cmp(&yes_price(b)))
                .map(|(i, _)| i);
            let rows = items
                .iter()
                .enumerate()
                .map(|(i, m)| TableRow {
                    cells: vec![
                        m.title.clone(),
                        m.platform.clone(),
                        quality_label(m),
                        format!("YES ${:.2}", yes_price(m)),
                    ],
                    highlight: Some(i) == best,
                })
                .collect();
            Some(TableSection {
                title: format!("Event Group: {key}"),
                header: vec!["Market", "Platform", "Quality", "Price"],
                rows,
                empty_message: "No market data available.",
            })
        })
        .collect::<Vec<_>>();

    if sections.is_empty() {
        return TabView {
            sections: vec![TableSection {
                title: "Aggregator".to_string(),
                header: vec!["Market", "Platform", "Quality", "Price"],
                rows: Vec::new(),
                empty_message: "No market data available.",
            }],
        };
    }
    TabView { sections }
}

fn safe_opportunities(snapshot: &Snapshot) -> TabView {
    let actionable = snapshot
        .opportunities
        .iter()
        .map(|o| {
            TableRow::plain(vec![
                o.event_summary.clone(),
                format!("{} ¢{:.1}", o.market_a.platform, o.market_a.yes_price * 100.0),
                format!("{} ¢{:.1}", o.market_b.platform, o.market_b.yes_price * 100.0),
                format!("+{:.2}%", o.spread_pct),
                format!("+{:.2}%", o.profit_pct),
                format!("{:.1}%", o.ai_confidence * 100.0),
                format!("{}/100", o.resolution_conflict_score),
                o.safety_badge.to_string(),
                o.action.clone(),
            ])
        })
        .collect();

    let time_value = snapshot
        .time_value_spreads
        .iter()
        .map(|o| {
            TableRow::plain(vec![
                o.event_summary.clone(),
                format!("{:.2}%", o.spread_pct),
                format!("{:.0}%", o.ai_confidence * 100.0),
            ])
        })
        .collect();

    TabView {
        sections: vec![
            TableSection {
                title: format!("Safe Opportunities ({} found)", snapshot.opportunities.len()),
                header: vec![
                    "Event", "Leg A", "Leg B", "Spread", "Profit", "AI Conf", "Conflict", "Safety",
                    "Action",
                ],
                rows: actionable,
                empty_message: "No safe opportunities right now.",
            },
            TableSection {
                title: format!("Time-Value Spreads ({})", snapshot.time_value_spreads.len()),
                header: vec!["Event", "Spread", "Conf"],
                rows: time_value,
                empty_message: "No time-value spreads.",
            },
        ],
    }
}

fn resolution_risks(matches: &[MatchRow]) -> TabView {
    let rows = matches
        .iter()
        .map(|m| {
            TableRow::plain(vec![
                m.label().to_string(),
                format!("{} vs {}", m.platform_a, m.platform_b),
                format!("{:.0}%", m.embedding_similarity * 100.0),
                format!("{}/100", m.resolution_conflict_score),
                m.safety_badge.to_string(),
                m.resolution_risks.join("; "),
            ])
        })
        .collect();

    TabView {
        sections: vec![TableSection {
            title: format!("{} matched pairs analyzed", matches.len()),
            header: vec!["Event", "Platforms", "Similarity", "Conflict", "Safety", "Risks"],
            rows,
            empty_message: "No resolution analysis available.",
        }],
    }
}

fn ai_analysis(matches: &[MatchRow]) -> TabView {
    let (verified, rejected): (Vec<&MatchRow>, Vec<&MatchRow>) =
        matches.iter().partition(|m| m.is_match);

    let verified_rows = verified
        .iter()
        .map(|m| {
            TableRow::plain(vec![
                m.label().to_string(),
                format!("{} x {}", m.platform_a, m.platform_b),
                format!("{:.1}%", m.confidence * 100.0),
                m.safety_badge.to_string(),
                m.reasoning.clone(),
            ])
        })
        .collect();
    let rejected_rows = rejected
        .iter()
        .map(|m| {
            TableRow::plain(vec![
                m.label().to_string(),
                format!("{} x {}", m.platform_a, m.platform_b),
                format!("{:.0}%", m.confidence * 100.0),
            ])
        })
        .collect();

    TabView {
        sections: vec![
            TableSection {
                title: format!("Verified Matches ({})", verified.len()),
                header: vec!["Event", "Platforms", "Confidence", "Verdict", "Reasoning"],
                rows: verified_rows,
                empty_message: "No verification data available.",
            },
            TableSection {
                title: format!("Rejected Pairs: {} discarded", rejected.len()),
                header: vec!["Event", "Platforms", "Confidence"],
                rows: rejected_rows,
                empty_message: "No rejected pairs.",
            },
        ],
    }
}

fn agent_feed(snapshot: &Snapshot) -> TabView {
    let rows = snapshot
        .logs
        .iter()
        .map(|log| TableRow::plain(vec![log.timestamp.clone(), log.kind.clone(), log.message.clone()]))
        .collect();
    TabView {
        sections: vec![TableSection {
            title: "Agent Feed".to_string(),
            header: vec!["Time", "Type", "Message"],
            rows,
            empty_message: "No agent activity yet.",
        }],
    }
}

fn deployment_row(label: &str, d: &ChainDeployment) -> TableRow {
    TableRow::plain(vec![
        label.to_string(),
        d.network.clone(),
        d.contract_address.clone(),
        if d.verified { "Yes" } else { "No" }.to_string(),
        d.opportunity_count.to_string(),
        d.explorer_url.clone(),
    ])
}

fn on_chain(snapshot: &Snapshot) -> TabView {
    let info = &snapshot.chain_info;
    let wallet = if info.wallet_address.is_empty() {
        "Not configured".to_string()
    } else {
        info.wallet_address.clone()
    };

    TabView {
        sections: vec![
            TableSection {
                title: "Contracts".to_string(),
                header: vec!["Chain", "Network", "Contract", "Verified", "Reports", "Explorer"],
                rows: vec![
                    deployment_row("BSC", &info.bsc),
                    deployment_row("opBNB", &info.opbnb),
                ],
                empty_message: "No deployments.",
            },
            TableSection {
                title: "Agent Wallet".to_string(),
                header: vec!["Field", "Value"],
                rows: vec![
                    TableRow::plain(vec!["Address".to_string(), wallet]),
                    TableRow::plain(vec!["BSC Balance".to_string(), info.wallet_balance_bsc.clone()]),
                    TableRow::plain(vec![
                        "opBNB Balance".to_string(),
                        info.wallet_balance_opbnb.clone(),
                    ]),
                ],
                empty_message: "",
            },
        ],
    }
}

/// Fun Bets table from the ledger's current bets.
pub fn bets_view(bets: &[Bet], pending: impl Fn(&str) -> bool) -> TabView {
    let rows = bets
        .iter()
        .map(|b| {
            let (pct_a, pct_b) = b.pool_split_pct();
            let status = if pending(&b.id) {
                "sending".to_string()
            } else {
                b.status.to_string()
            };
            TableRow::plain(vec![
                b.title.clone(),
                b.category.to_string(),
                b.option_a.clone(),
                b.option_b.clone(),
                format!("{:.3} / {:.3}", b.pool_a, b.pool_b),
                format!("{pct_a:.0}% / {pct_b:.0}%"),
                b.deadline.clone(),
                status,
            ])
        })
        .collect();
    TabView {
        sections: vec![TableSection {
            title: format!("Fun Bets ({})", bets.len()),
            header: vec!["Bet", "Type", "A", "B", "Pools (tBNB)", "Split", "Deadline", "Status"],
            rows,
            empty_message: "No bets yet. Create one with 'n'.",
        }],
    }
}

/// Wallet line for the Fun Bets panel.
pub fn wallet_summary(address: &str, balance: &str, symbol: &str) -> String {
    if address.is_empty() {
        "Wallet not connected".to_string()
    } else {
        format!("{} | {balance} {symbol}", short_address(address))
    }
}
