use crate::breaker::{BreakerState, CircuitBreaker};
use crate::cache::TtlCache;
use crate::limiter::RateLimiter;
use crate::source::GroundTruthSource;
use argus_types::{ArgusError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub cache_ttl: Duration,
    pub breaker_threshold: usize,
    pub breaker_window: Duration,
    pub breaker_cooldown: Duration,
    pub rate_limit_calls: usize,
    pub rate_limit_window: Duration,
    pub max_retries: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Stale entries older than `cache_ttl * stale_eviction_factor` are
    /// dropped from the cache; until then they remain eligible for
    /// degraded serving.
    pub stale_eviction_factor: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            breaker_threshold: 3,
            breaker_window: Duration::from_secs(60),
            breaker_cooldown: Duration::from_secs(60),
            rate_limit_calls: 30,
            rate_limit_window: Duration::from_secs(60),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(5),
            stale_eviction_factor: 12,
        }
    }
}

/// A fetch outcome. `degraded` means the value came from stale cache or a
/// fallback path while the upstream was unreachable; callers must treat it
/// explicitly rather than as a normal success.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub value: Value,
    pub degraded: bool,
}

struct Inner {
    cache: TtlCache,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
}

/// The single resilient gateway to ground-truth data. Cache, rate limiter,
/// and breaker state are process-wide: one `OracleClient` is shared by the
/// catalog refresh and all concurrent validation tasks.
pub struct OracleClient {
    source: Arc<dyn GroundTruthSource>,
    inner: Mutex<Inner>,
    config: OracleConfig,
}

enum FetchKind {
    Company(String),
    Companies,
}

impl OracleClient {
    pub fn new(source: Arc<dyn GroundTruthSource>, config: OracleConfig) -> Self {
        let inner = Inner {
            cache: TtlCache::new(config.cache_ttl),
            breaker: CircuitBreaker::new(
                config.breaker_threshold,
                config.breaker_window,
                config.breaker_cooldown,
            ),
            limiter: RateLimiter::new(config.rate_limit_calls, config.rate_limit_window),
        };
        Self {
            source,
            inner: Mutex::new(inner),
            config,
        }
    }

    /// Ground-truth fields for one entity, with the full resilience stack.
    pub async fn fetch_company(&self, ticker: &str) -> Result<Fetched> {
        let key = format!("company:{}", ticker);
        self.resilient_fetch(key, FetchKind::Company(ticker.to_string()))
            .await
    }

    /// The entity universe for catalog refresh.
    pub async fn fetch_companies(&self) -> Result<Fetched> {
        self.resilient_fetch("companies".to_string(), FetchKind::Companies)
            .await
    }

    pub async fn breaker_state(&self) -> BreakerState {
        self.inner.lock().await.breaker.state()
    }

    async fn call_source(&self, kind: &FetchKind) -> Result<Value> {
        match kind {
            FetchKind::Company(ticker) => self.source.fetch_company(ticker).await,
            FetchKind::Companies => self
                .source
                .fetch_companies()
                .await
                .map(Value::Array),
        }
    }

    async fn resilient_fetch(&self, key: String, kind: FetchKind) -> Result<Fetched> {
        // Fresh cache hit short-circuits everything.
        {
            let inner = self.inner.lock().await;
            if let Some(value) = inner.cache.get_fresh(&key) {
                debug!(key = %key, "Cache hit");
                return Ok(Fetched {
                    value,
                    degraded: false,
                });
            }
        }

        let mut last_err: Option<ArgusError> = None;

        for attempt in 0..=self.config.max_retries {
            // Re-consult the breaker each attempt: in HalfOpen the single
            // trial slot is consumed by the first attempt.
            let allowed = {
                let mut inner = self.inner.lock().await;
                inner.breaker.allow_call()
            };
            if !allowed {
                return self.serve_degraded(&key, last_err).await;
            }

            {
                let mut inner = self.inner.lock().await;
                if let Err(e) = inner.limiter.try_acquire(&key) {
                    warn!(key = %key, attempt, "Rate limit hit");
                    last_err = Some(e);
                    drop(inner);
                    self.backoff(attempt).await;
                    continue;
                }
            }

            match self.call_source(&kind).await {
                Ok(value) => {
                    let mut inner = self.inner.lock().await;
                    inner.breaker.record_success();
                    inner.cache.insert(key.clone(), value.clone());
                    // Long-expired entries are useless even for stale
                    // serving; keep the map bounded.
                    inner.cache.evict_older_than(self.config.stale_eviction_factor);
                    return Ok(Fetched {
                        value,
                        degraded: false,
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!(key = %key, attempt, error = %e, "Transient upstream failure");
                    {
                        let mut inner = self.inner.lock().await;
                        inner.breaker.record_failure();
                    }
                    last_err = Some(e);
                    self.backoff(attempt).await;
                }
                Err(e) => {
                    // Permanent error: never retried, surfaced as degraded.
                    debug!(key = %key, error = %e, "Permanent upstream error");
                    return self.serve_degraded(&key, Some(e)).await;
                }
            }
        }

        self.serve_degraded(&key, last_err).await
    }

    /// Upstream is unreachable or short-circuited: serve any cached value
    /// (stale included) flagged degraded, or escalate.
    async fn serve_degraded(&self, key: &str, cause: Option<ArgusError>) -> Result<Fetched> {
        let inner = self.inner.lock().await;
        if let Some(value) = inner.cache.get_stale(key) {
            warn!(key = %key, "Serving stale cached value, upstream degraded");
            return Ok(Fetched {
                value,
                degraded: true,
            });
        }
        Err(ArgusError::Degraded(match cause {
            Some(e) => format!("{}: {}", key, e),
            None => key.to_string(),
        }))
    }

    async fn backoff(&self, attempt: usize) {
        let exp = 2u32.saturating_pow(attempt.min(10) as u32);
        let delay = (self.config.backoff_base * exp).min(self.config.backoff_max);
        tokio::time::sleep(delay).await;
    }
}
