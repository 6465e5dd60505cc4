pub mod fallback;

use argus_oracle::OracleClient;
use argus_types::{CapBracket, CompanyRecord, Provenance};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Selection constraint for `sample`.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub sector: Option<String>,
    pub bracket: Option<CapBracket>,
}

#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub total_companies: usize,
    pub sectors: usize,
    pub live_records: usize,
    pub fallback_records: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub needs_refresh: bool,
}

/// Market cap under which a company counts as "emerging".
const EMERGING_CAP_CEILING: f64 = 10e9;

/// The authoritative set of queryable entities. Read-mostly and shared: a
/// refresh assembles the replacement map off to the side and swaps it in,
/// so concurrent readers always see a complete catalog.
pub struct CompanyCatalog {
    records: Arc<RwLock<HashMap<String, CompanyRecord>>>,
    last_refresh: Arc<RwLock<Option<DateTime<Utc>>>>,
    refresh_interval: ChronoDuration,
}

impl CompanyCatalog {
    /// Starts populated with the static fallback list so sampling never sees
    /// an empty catalog.
    pub fn new(refresh_interval: std::time::Duration) -> Self {
        let mut records = HashMap::new();
        for (sector, tickers) in fallback::FALLBACK_SECTORS {
            for ticker in *tickers {
                records.insert(
                    (*ticker).to_string(),
                    CompanyRecord::fallback(ticker, sector),
                );
            }
        }
        info!(companies = records.len(), "📋 Loaded fallback company data");

        Self {
            records: Arc::new(RwLock::new(records)),
            last_refresh: Arc::new(RwLock::new(None)),
            refresh_interval: ChronoDuration::from_std(refresh_interval)
                .unwrap_or_else(|_| ChronoDuration::hours(1)),
        }
    }

    /// Attempts a live refresh through the oracle. On any failure the
    /// previous state is kept; a refresh failure is never fatal.
    pub async fn refresh(&self, oracle: &OracleClient) -> bool {
        let fetched = match oracle.fetch_companies().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Company refresh failed, keeping prior catalog");
                return false;
            }
        };
        if fetched.degraded {
            warn!("Company refresh returned degraded data, keeping prior catalog");
            return false;
        }

        let items = match fetched.value.as_array() {
            Some(items) if !items.is_empty() => items.clone(),
            _ => {
                warn!("Company refresh returned no rows, keeping prior catalog");
                return false;
            }
        };

        let now = Utc::now();
        let mut fresh: HashMap<String, CompanyRecord> = HashMap::new();
        for item in &items {
            if let Some(record) = parse_company(item, now) {
                fresh.insert(record.ticker.clone(), record);
            }
        }

        if fresh.is_empty() {
            warn!("No parseable companies in refresh payload, keeping prior catalog");
            return false;
        }

        let count = fresh.len();
        *self.records.write().await = fresh;
        *self.last_refresh.write().await = Some(now);
        info!(companies = count, "✅ Refreshed company catalog from live source");
        true
    }

    pub async fn needs_refresh(&self) -> bool {
        match *self.last_refresh.read().await {
            None => true,
            Some(at) => Utc::now() - at > self.refresh_interval,
        }
    }

    /// Uniform random choice within the filtered subset. Returns None only
    /// when the filter matches nothing; an unconstrained sample of a
    /// non-empty catalog always succeeds.
    pub async fn sample(&self, filter: &CatalogFilter) -> Option<CompanyRecord> {
        let records = self.records.read().await;
        let matching: Vec<&CompanyRecord> = records
            .values()
            .filter(|r| {
                filter
                    .sector
                    .as_ref()
                    .map(|s| r.sector.eq_ignore_ascii_case(s))
                    .unwrap_or(true)
                    && filter.bracket.map(|b| r.bracket() == b).unwrap_or(true)
            })
            .collect();
        matching.choose(&mut rand::thread_rng()).map(|r| (*r).clone())
    }

    pub async fn get(&self, ticker: &str) -> Option<CompanyRecord> {
        self.records.read().await.get(&ticker.to_uppercase()).cloned()
    }

    pub async fn contains(&self, ticker: &str) -> bool {
        self.records.read().await.contains_key(&ticker.to_uppercase())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn sectors(&self) -> Vec<String> {
        let records = self.records.read().await;
        let mut sectors: Vec<String> = records.values().map(|r| r.sector.clone()).collect();
        sectors.sort();
        sectors.dedup();
        sectors
    }

    pub async fn by_sector(&self, sector: &str) -> Vec<String> {
        let records = self.records.read().await;
        records
            .values()
            .filter(|r| r.sector.eq_ignore_ascii_case(sector))
            .map(|r| r.ticker.clone())
            .collect()
    }

    /// Highest market caps first. Falls back to the technology sector when
    /// no record carries a cap (pure-fallback catalog).
    pub async fn popular(&self, limit: usize) -> Vec<String> {
        let records = self.records.read().await;
        let mut with_cap: Vec<(&String, f64)> = records
            .iter()
            .filter(|(_, r)| r.market_cap > 0.0)
            .map(|(t, r)| (t, r.market_cap))
            .collect();

        if with_cap.is_empty() {
            drop(records);
            let mut tech = self.by_sector("Technology").await;
            tech.truncate(limit);
            return tech;
        }

        with_cap.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        with_cap.into_iter().take(limit).map(|(t, _)| t.clone()).collect()
    }

    /// Smallest positive market caps first.
    pub async fn emerging(&self, limit: usize) -> Vec<String> {
        let records = self.records.read().await;
        let mut small: Vec<(&String, f64)> = records
            .iter()
            .filter(|(_, r)| r.market_cap > 0.0 && r.market_cap < EMERGING_CAP_CEILING)
            .map(|(t, r)| (t, r.market_cap))
            .collect();

        if small.is_empty() {
            let mut all: Vec<String> = records.keys().cloned().collect();
            all.shuffle(&mut rand::thread_rng());
            all.truncate(limit);
            return all;
        }

        small.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        small.into_iter().take(limit).map(|(t, _)| t.clone()).collect()
    }

    pub async fn stats(&self) -> CatalogStats {
        let records = self.records.read().await;
        let live = records
            .values()
            .filter(|r| r.provenance == Provenance::Live)
            .count();
        let sectors: std::collections::HashSet<&str> =
            records.values().map(|r| r.sector.as_str()).collect();
        CatalogStats {
            total_companies: records.len(),
            sectors: sectors.len(),
            live_records: live,
            fallback_records: records.len() - live,
            last_refresh: *self.last_refresh.read().await,
            needs_refresh: match *self.last_refresh.read().await {
                None => true,
                Some(at) => Utc::now() - at > self.refresh_interval,
            },
        }
    }
}

fn parse_company(item: &Value, now: DateTime<Utc>) -> Option<CompanyRecord> {
    let ticker = item.get("ticker")?.as_str()?.to_uppercase();
    if !argus_types::company::is_valid_ticker(&ticker) {
        return None;
    }
    Some(CompanyRecord {
        name: item
            .get("companyName")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        sector: item
            .get("sector")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        exchange: item
            .get("exchange")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        country: item
            .get("country")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        market_cap: item.get("marketCap").and_then(|v| v.as_f64()).unwrap_or(0.0),
        provenance: Provenance::Live,
        last_refreshed: now,
        ticker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_oracle::{GroundTruthSource, OracleConfig};
    use argus_types::{ArgusError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct FixedSource {
        companies: Vec<Value>,
        fail: bool,
    }

    #[async_trait]
    impl GroundTruthSource for FixedSource {
        async fn fetch_company(&self, _ticker: &str) -> Result<Value> {
            Err(ArgusError::Upstream {
                status: 404,
                message: "unused".into(),
            })
        }

        async fn fetch_companies(&self) -> Result<Vec<Value>> {
            if self.fail {
                Err(ArgusError::Timeout("simulated".into()))
            } else {
                Ok(self.companies.clone())
            }
        }
    }

    fn oracle(source: FixedSource) -> OracleClient {
        let config = OracleConfig {
            max_retries: 0,
            backoff_base: Duration::from_millis(1),
            ..Default::default()
        };
        OracleClient::new(Arc::new(source), config)
    }

    fn live_rows() -> Vec<Value> {
        vec![
            json!({"ticker": "AAPL", "companyName": "Apple Inc.", "sector": "Technology", "marketCap": 2.8e12}),
            json!({"ticker": "RIOT", "companyName": "Riot Platforms", "sector": "Technology", "marketCap": 3.0e9}),
            json!({"ticker": "JPM", "companyName": "JPMorgan Chase", "sector": "Financial", "marketCap": 5.0e11}),
        ]
    }

    #[tokio::test]
    async fn test_starts_non_empty_with_unique_tickers() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        assert!(!catalog.is_empty().await);
        assert!(catalog.contains("AAPL").await);
        let stats = catalog.stats().await;
        assert_eq!(stats.live_records, 0);
        assert_eq!(stats.fallback_records, stats.total_companies);
    }

    #[tokio::test]
    async fn test_refresh_replaces_with_live_records() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let oracle = oracle(FixedSource {
            companies: live_rows(),
            fail: false,
        });

        assert!(catalog.refresh(&oracle).await);
        assert_eq!(catalog.len().await, 3);
        let rec = catalog.get("AAPL").await.unwrap();
        assert_eq!(rec.provenance, Provenance::Live);
        assert_eq!(rec.bracket(), CapBracket::Mega);
        assert!(!catalog.needs_refresh().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_prior_state() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let before = catalog.len().await;
        let oracle = oracle(FixedSource {
            companies: vec![],
            fail: true,
        });

        assert!(!catalog.refresh(&oracle).await);
        assert_eq!(catalog.len().await, before);
        assert!(catalog.needs_refresh().await);
        // Still satisfies sampling invariants in degraded mode.
        assert!(catalog.sample(&CatalogFilter::default()).await.is_some());
    }

    #[tokio::test]
    async fn test_sector_filter() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let filter = CatalogFilter {
            sector: Some("Energy".into()),
            bracket: None,
        };
        for _ in 0..10 {
            let rec = catalog.sample(&filter).await.unwrap();
            assert_eq!(rec.sector, "Energy");
        }
    }

    #[tokio::test]
    async fn test_bracket_filter_on_live_data() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let oracle = oracle(FixedSource {
            companies: live_rows(),
            fail: false,
        });
        catalog.refresh(&oracle).await;

        let filter = CatalogFilter {
            sector: None,
            bracket: Some(CapBracket::Mid),
        };
        let rec = catalog.sample(&filter).await.unwrap();
        assert_eq!(rec.ticker, "RIOT");
    }

    #[tokio::test]
    async fn test_popular_and_emerging_ordering() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let oracle = oracle(FixedSource {
            companies: live_rows(),
            fail: false,
        });
        catalog.refresh(&oracle).await;

        let popular = catalog.popular(2).await;
        assert_eq!(popular, vec!["AAPL".to_string(), "JPM".to_string()]);

        let emerging = catalog.emerging(5).await;
        assert_eq!(emerging, vec!["RIOT".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_tickers_skipped_on_refresh() {
        let catalog = CompanyCatalog::new(Duration::from_secs(3600));
        let oracle = oracle(FixedSource {
            companies: vec![
                json!({"ticker": "..BAD", "companyName": "x"}),
                json!({"companyName": "no ticker"}),
                json!({"ticker": "GOOD", "companyName": "Good Co", "sector": "Technology"}),
            ],
            fail: false,
        });
        assert!(catalog.refresh(&oracle).await);
        assert_eq!(catalog.len().await, 1);
        assert!(catalog.contains("GOOD").await);
    }
}
