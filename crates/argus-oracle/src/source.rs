use argus_types::{ArgusError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Capability interface over a ground-truth provider. The catalog refresh
/// and tier-2 validation both speak through this seam, so tests can swap in
/// doubles and the resilience layers never care what is underneath.
#[async_trait]
pub trait GroundTruthSource: Send + Sync {
    /// Authoritative fields for one entity.
    async fn fetch_company(&self, ticker: &str) -> Result<Value>;

    /// The full entity universe, used for catalog refresh.
    async fn fetch_companies(&self) -> Result<Vec<Value>>;
}

#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub companies_endpoint: String,
    pub company_endpoint: String,
    pub timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            api_key: String::new(),
            companies_endpoint: "/validator/companies".to_string(),
            company_endpoint: "/validator/companies/<ticker>".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Direct upstream HTTP implementation.
pub struct HttpSource {
    config: HttpSourceConfig,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArgusError::Configuration(format!("http client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        debug!(url = %url, "🔍 Ground-truth lookup");

        let mut request = self.client.get(&url);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ArgusError::Timeout(url.clone())
            } else {
                ArgusError::Upstream {
                    status: 0,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArgusError::Upstream {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        let body: Value = response.json().await.map_err(|e| ArgusError::Upstream {
            status: status.as_u16(),
            message: format!("invalid json body: {}", e),
        })?;

        // Responses wrap the payload in a "result" envelope.
        match body.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(ArgusError::Upstream {
                status: status.as_u16(),
                message: "missing 'result' in response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GroundTruthSource for HttpSource {
    async fn fetch_company(&self, ticker: &str) -> Result<Value> {
        let endpoint = self.config.company_endpoint.replace("<ticker>", ticker);
        self.get_json(&endpoint).await
    }

    async fn fetch_companies(&self) -> Result<Vec<Value>> {
        let result = self.get_json(&self.config.companies_endpoint).await?;
        match result {
            Value::Array(items) => Ok(items),
            Value::Object(ref obj) => match obj.get("companies").and_then(|c| c.as_array()) {
                Some(items) => Ok(items.clone()),
                None => Err(ArgusError::Upstream {
                    status: 200,
                    message: "companies list missing from response".to_string(),
                }),
            },
            _ => Err(ArgusError::Upstream {
                status: 200,
                message: "unexpected companies response shape".to_string(),
            }),
        }
    }
}
