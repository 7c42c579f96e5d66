use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{AggregateStats, ChainInfo, LogEntry, Market, MatchRow, OpportunityRow};

static SNAPSHOT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Point-in-time state of all six REST resources, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub stats: AggregateStats,
    pub markets: Vec<Market>,
    pub matches: Vec<MatchRow>,
    /// Opportunities without the time-decay flag.
    pub opportunities: Vec<OpportunityRow>,
    /// Opportunities whose spread is explained by time value.
    pub time_value_spreads: Vec<OpportunityRow>,
    pub logs: Vec<LogEntry>,
    pub chain_info: ChainInfo,
    /// Unique per fetch; view memoization keys on it.
    pub generation: u64,
}

impl Snapshot {
    pub fn new(
        stats: AggregateStats,
        markets: Vec<Market>,
        matches: Vec<MatchRow>,
        opportunities: Vec<OpportunityRow>,
        logs: Vec<LogEntry>,
        chain_info: ChainInfo,
    ) -> Self {
        let (time_value_spreads, opportunities): (Vec<_>, Vec<_>) =
            opportunities.into_iter().partition(|o| o.time_decay_flag);
        Self {
            stats,
            markets,
            matches,
            opportunities,
            time_value_spreads,
            logs,
            chain_info,
            generation: SNAPSHOT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One-shot REST reader. Each resource degrades to its default on failure,
/// independently of the others. No retries, no caching.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl SnapshotFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, cfg.api_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn fetch_snapshot(&self) -> Snapshot {
        let (stats, markets, matches, opportunities, logs, chain_info) = tokio::join!(
            self.fetch_stats(),
            self.fetch_markets(),
            self.fetch_matches(),
            self.fetch_opportunities(),
            self.fetch_logs(),
            self.fetch_chain_info(),
        );

        let snapshot = Snapshot::new(stats, markets, matches, opportunities, logs, chain_info);
        info!(
            markets = snapshot.markets.len(),
            matches = snapshot.matches.len(),
            opportunities = snapshot.opportunities.len(),
            time_value = snapshot.time_value_spreads.len(),
            logs = snapshot.logs.len(),
            "Snapshot loaded"
        );
        snapshot
    }

    pub async fn fetch_markets(&self) -> Vec<Market> {
        self.get_json_or("/markets", Vec::new()).await
    }

    pub async fn fetch_matches(&self) -> Vec<MatchRow> {
        self.get_json_or("/matches", Vec::new()).await
    }

    pub async fn fetch_opportunities(&self) -> Vec<OpportunityRow> {
        self.get_json_or("/opportunities", Vec::new()).await
    }

    pub async fn fetch_logs(&self) -> Vec<LogEntry> {
        self.get_json_or("/logs", Vec::new()).await
    }

    pub async fn fetch_stats(&self) -> AggregateStats {
        self.get_json_or("/stats", AggregateStats::default()).await
    }

    pub async fn fetch_chain_info(&self) -> ChainInfo {
        self.get_json_or("/chain-info", ChainInfo::default()).await
    }

    async fn get_json_or<T: DeserializeOwned>(&self, path: &str, fallback: T) -> T {
        match self.get_json(path).await {
            Ok(v) => v,
            Err(e) => {
                warn!(path, "[SNAPSHOT] using default: {e}");
                fallback
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| AppError::DataUnavailable(format!("{path}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::DataUnavailable(format!("{path}: HTTP {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| AppError::DataUnavailable(format!("{path}: {e}")))?;
        debug!(path, bytes = body.len(), "snapshot resource read");
        serde_json::from_slice(&body).map_err(|e| AppError::DataUnavailable(format!("{path}: {e}")))
    }
}
