use anyhow::{Context, Result};
use argus_oracle::{HttpSourceConfig, OracleConfig};
use argus_query::{AnalysisTable, StrategyTable};
use argus_types::{AnalysisType, QueryStrategy, ValidatorParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgusConfig {
    pub node: NodeSettings,
    pub oracle: OracleSettings,
    pub scoring: ValidatorParams,
    pub queries: QuerySettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
    pub data_dir: PathBuf,
    /// Seconds between round starts.
    pub round_interval_secs: u64,
    pub queries_per_round: usize,
    pub max_concurrent_queries: usize,
    pub query_timeout_secs: u64,
    /// Hard wall-clock budget for a whole round.
    pub round_deadline_secs: u64,
    pub catalog_refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    pub base_url: String,
    pub companies_endpoint: String,
    pub company_endpoint: String,
    /// Environment variable holding the upstream API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub breaker_threshold: usize,
    pub breaker_window_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub rate_limit_calls: usize,
    pub rate_limit_window_secs: u64,
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Stale cache entries are dropped after this many TTLs.
    pub stale_eviction_factor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    pub strategy_weights: HashMap<QueryStrategy, f64>,
    pub analysis_weights: HashMap<AnalysisType, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_output: Option<PathBuf>,
}

impl Default for ArgusConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "argus-validator".to_string(),
                data_dir: PathBuf::from("./data"),
                round_interval_secs: 300,
                queries_per_round: 4,
                max_concurrent_queries: 16,
                query_timeout_secs: 30,
                round_deadline_secs: 120,
                catalog_refresh_secs: 3600,
            },
            oracle: OracleSettings {
                base_url: "https://api.example.com".to_string(),
                companies_endpoint: "/validator/companies".to_string(),
                company_endpoint: "/validator/companies/<ticker>".to_string(),
                api_key_env: "ARGUS_API_KEY".to_string(),
                timeout_secs: 30,
                cache_ttl_secs: 300,
                breaker_threshold: 3,
                breaker_window_secs: 60,
                breaker_cooldown_secs: 60,
                rate_limit_calls: 30,
                rate_limit_window_secs: 60,
                max_retries: 2,
                backoff_base_ms: 500,
                backoff_max_ms: 5000,
                stale_eviction_factor: 12,
            },
            scoring: ValidatorParams::default(),
            queries: QuerySettings {
                strategy_weights: StrategyTable::default_weights(),
                analysis_weights: AnalysisTable::default_weights(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                file_output: None,
            },
        }
    }
}

impl ArgusConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config")?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment overrides, applied after file loading.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("ARGUS_NODE_NAME") {
            if !name.is_empty() {
                self.node.name = name;
            }
        }
        if let Ok(dir) = env::var("ARGUS_DATA_DIR") {
            self.node.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("ARGUS_ORACLE_URL") {
            self.oracle.base_url = url;
        }
        if let Ok(interval) = env::var("ARGUS_ROUND_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.node.round_interval_secs = secs;
            }
        }
        if let Ok(level) = env::var("ARGUS_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Startup validation. Any violation here aborts the process before a
    /// round ever runs.
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        StrategyTable::new(&self.queries.strategy_weights)?;
        AnalysisTable::new(&self.queries.analysis_weights)?;

        anyhow::ensure!(
            self.node.queries_per_round > 0,
            "queries_per_round must be positive"
        );
        anyhow::ensure!(
            self.node.max_concurrent_queries > 0,
            "max_concurrent_queries must be positive"
        );
        anyhow::ensure!(
            self.node.round_deadline_secs >= self.node.query_timeout_secs,
            "round_deadline_secs must cover at least one query timeout"
        );
        anyhow::ensure!(
            self.node.round_interval_secs > 0,
            "round_interval_secs must be positive"
        );
        anyhow::ensure!(self.oracle.breaker_threshold > 0, "breaker_threshold must be positive");
        anyhow::ensure!(self.oracle.rate_limit_calls > 0, "rate_limit_calls must be positive");
        anyhow::ensure!(
            self.oracle.stale_eviction_factor > 0,
            "stale_eviction_factor must be positive"
        );
        Ok(())
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            base_url: self.oracle.base_url.clone(),
            api_key: env::var(&self.oracle.api_key_env).unwrap_or_default(),
            companies_endpoint: self.oracle.companies_endpoint.clone(),
            company_endpoint: self.oracle.company_endpoint.clone(),
            timeout: Duration::from_secs(self.oracle.timeout_secs),
        }
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            cache_ttl: Duration::from_secs(self.oracle.cache_ttl_secs),
            breaker_threshold: self.oracle.breaker_threshold,
            breaker_window: Duration::from_secs(self.oracle.breaker_window_secs),
            breaker_cooldown: Duration::from_secs(self.oracle.breaker_cooldown_secs),
            rate_limit_calls: self.oracle.rate_limit_calls,
            rate_limit_window: Duration::from_secs(self.oracle.rate_limit_window_secs),
            max_retries: self.oracle.max_retries,
            backoff_base: Duration::from_millis(self.oracle.backoff_base_ms),
            backoff_max: Duration::from_millis(self.oracle.backoff_max_ms),
            stale_eviction_factor: self.oracle.stale_eviction_factor,
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.node.data_dir.join("validator-state.json")
    }
}
