pub mod strategy;

pub use strategy::{AnalysisTable, StrategyTable};

use argus_catalog::{fallback::CRYPTO_EXPOSED_TICKERS, CatalogFilter, CompanyCatalog};
use argus_types::{AnalysisType, Query, QueryStrategy, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// How many recently queried tickers are held out of selection.
const COOLDOWN_CAPACITY: usize = 20;
/// How many times one sector may be drawn before rotation resets.
const SECTOR_ROTATION_CAP: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub total_queries: u64,
    pub by_strategy: HashMap<QueryStrategy, u64>,
    pub by_analysis: HashMap<AnalysisType, u64>,
    pub ticker_counts: HashMap<String, u64>,
}

impl QueryStats {
    /// Unique tickers over total queries; low values signal degenerate
    /// repeated targeting.
    pub fn diversity_ratio(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        self.ticker_counts.len() as f64 / self.total_queries as f64
    }
}

/// Produces the next query from a mixed sampling strategy. Selection is
/// randomized so miners cannot precompute answers; the query id alone is
/// derived deterministically for replay.
pub struct QueryGenerator {
    catalog: Arc<CompanyCatalog>,
    strategies: StrategyTable,
    analyses: AnalysisTable,
    cooldown: VecDeque<String>,
    cooldown_set: HashSet<String>,
    sector_rotation: HashMap<String, u32>,
    last_strategy: Option<QueryStrategy>,
    current_round: Option<u64>,
    round_seq: u32,
    stats: QueryStats,
}

impl QueryGenerator {
    pub fn new(
        catalog: Arc<CompanyCatalog>,
        strategy_weights: &HashMap<QueryStrategy, f64>,
        analysis_weights: &HashMap<AnalysisType, f64>,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            strategies: StrategyTable::new(strategy_weights)?,
            analyses: AnalysisTable::new(analysis_weights)?,
            cooldown: VecDeque::with_capacity(COOLDOWN_CAPACITY),
            cooldown_set: HashSet::new(),
            sector_rotation: HashMap::new(),
            last_strategy: None,
            current_round: None,
            round_seq: 0,
            stats: QueryStats::default(),
        })
    }

    pub async fn next(&mut self, round: u64) -> Query {
        // Cooldown fallbacks can repeat a ticker within a round; the seq
        // keeps each draw a distinct query.
        let seq = if self.current_round == Some(round) {
            self.round_seq + 1
        } else {
            0
        };
        self.current_round = Some(round);
        self.round_seq = seq;

        let strategy = self.strategies.draw(self.last_strategy);
        let analysis_type = self.analyses.draw();
        let ticker = self.pick_ticker(strategy).await;
        let request_params = request_params(analysis_type);

        self.record(&ticker, strategy, analysis_type);

        info!(
            round,
            seq,
            ticker = %ticker,
            strategy = %strategy,
            analysis = %analysis_type,
            "📝 Generated query"
        );
        Query::new(round, seq, ticker, analysis_type, strategy, request_params)
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    async fn pick_ticker(&mut self, strategy: QueryStrategy) -> String {
        let ticker = match strategy {
            QueryStrategy::Popular => {
                let pool = self.catalog.popular(50).await;
                self.choose_avoiding_cooldown(pool)
            }
            QueryStrategy::Emerging => {
                let pool = self.catalog.emerging(30).await;
                self.choose_avoiding_cooldown(pool)
            }
            QueryStrategy::Sector => self.pick_sector_ticker().await,
            QueryStrategy::CryptoFocused => self.pick_crypto_ticker().await,
            QueryStrategy::Random => None,
        };

        match ticker {
            Some(t) => t,
            None => self
                .catalog
                .sample(&CatalogFilter::default())
                .await
                .map(|r| r.ticker)
                // Catalog is non-empty by construction; this is unreachable
                // in practice but keeps query generation total.
                .unwrap_or_else(|| "AAPL".to_string()),
        }
    }

    async fn pick_sector_ticker(&mut self) -> Option<String> {
        let sectors = self.catalog.sectors().await;
        if sectors.is_empty() {
            return None;
        }

        let underused: Vec<&String> = sectors
            .iter()
            .filter(|s| {
                self.sector_rotation.get(s.as_str()).copied().unwrap_or(0) < SECTOR_ROTATION_CAP
            })
            .collect();

        let chosen = if let Some(sector) = underused.choose(&mut rand::thread_rng()) {
            (*sector).clone()
        } else {
            self.sector_rotation.clear();
            sectors.choose(&mut rand::thread_rng())?.clone()
        };
        *self.sector_rotation.entry(chosen.clone()).or_insert(0) += 1;

        debug!(sector = %chosen, "Sector rotation pick");
        let pool = self.catalog.by_sector(&chosen).await;
        self.choose_avoiding_cooldown(pool)
    }

    async fn pick_crypto_ticker(&self) -> Option<String> {
        let mut pool = Vec::new();
        for ticker in CRYPTO_EXPOSED_TICKERS {
            if self.catalog.contains(ticker).await {
                pool.push((*ticker).to_string());
            }
        }
        if pool.is_empty() {
            let tech = self.catalog.by_sector("Technology").await;
            return tech.choose(&mut rand::thread_rng()).cloned();
        }
        let unused: Vec<&String> = pool
            .iter()
            .filter(|t| !self.cooldown_set.contains(*t))
            .collect();
        if let Some(t) = unused.choose(&mut rand::thread_rng()) {
            Some((*t).clone())
        } else {
            pool.choose(&mut rand::thread_rng()).cloned()
        }
    }

    fn choose_avoiding_cooldown(&self, pool: Vec<String>) -> Option<String> {
        if pool.is_empty() {
            return None;
        }
        let available: Vec<&String> = pool
            .iter()
            .filter(|t| !self.cooldown_set.contains(*t))
            .collect();
        if let Some(t) = available.choose(&mut rand::thread_rng()) {
            Some((*t).clone())
        } else {
            pool.choose(&mut rand::thread_rng()).cloned()
        }
    }

    fn record(&mut self, ticker: &str, strategy: QueryStrategy, analysis: AnalysisType) {
        if self.cooldown_set.insert(ticker.to_string()) {
            self.cooldown.push_back(ticker.to_string());
            if self.cooldown.len() > COOLDOWN_CAPACITY {
                if let Some(oldest) = self.cooldown.pop_front() {
                    self.cooldown_set.remove(&oldest);
                }
            }
        }

        self.last_strategy = Some(strategy);
        self.stats.total_queries += 1;
        *self.stats.by_strategy.entry(strategy).or_insert(0) += 1;
        *self.stats.by_analysis.entry(analysis).or_insert(0) += 1;
        *self
            .stats
            .ticker_counts
            .entry(ticker.to_string())
            .or_insert(0) += 1;
    }
}

/// Extra request parameters shipped with the query, varied per analysis
/// type so miners cannot cache one canned answer shape.
fn request_params(analysis_type: AnalysisType) -> serde_json::Value {
    let mut rng = rand::thread_rng();
    match analysis_type {
        AnalysisType::Crypto => json!({
            "currentHoldings": true,
            "historicalHoldings": rng.gen_bool(0.5),
        }),
        AnalysisType::Financial => {
            let all_fields = [
                "marketCap",
                "sharePrice",
                "volume",
                "eps",
                "sector",
                "industry",
                "exchange",
                "sharesOutstanding",
            ];
            let count = rng.gen_range(3..=5);
            let fields: Vec<&str> = all_fields
                .choose_multiple(&mut rng, count)
                .copied()
                .collect();
            json!({ "fields": fields })
        }
        AnalysisType::Sentiment => {
            let timeframe = ["1D", "7D", "30D"].choose(&mut rng).copied();
            json!({
                "timeframe": timeframe,
                "sources": ["social", "news", "analyst"],
            })
        }
        AnalysisType::News => json!({
            "maxArticles": rng.gen_range(5..=20),
            "timeframe": (["1D", "3D", "7D", "14D"].choose(&mut rng).copied()),
            "includeSentiment": true,
        }),
    }
}
