use argus_incentive::WeightEntry;
use argus_types::{MinerResponse, MinerUid, Query, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerInfo {
    pub uid: MinerUid,
    pub hotkey: String,
    pub endpoint: String,
}

/// The miner-facing wire protocol. Owned by a collaborator; the core only
/// needs discovery and a request/response primitive.
#[async_trait]
pub trait MinerTransport: Send + Sync {
    async fn miners(&self) -> Result<Vec<MinerInfo>>;

    /// One query to one miner. Implementations surface their own transport
    /// timeouts as errors; the round engine adds its own budget on top.
    async fn query(&self, miner: &MinerInfo, query: &Query) -> Result<MinerResponse>;
}

/// Receives the per-round weight vector. Chain persistence is the
/// collaborator's concern.
#[async_trait]
pub trait WeightSink: Send + Sync {
    async fn submit_weights(&self, round: u64, weights: &[WeightEntry]) -> Result<()>;
}

/// Local stand-in miners for running the validator without a network.
/// Payloads are structurally complete but synthetic.
pub struct SimulatedTransport {
    miners: Vec<MinerInfo>,
}

impl SimulatedTransport {
    pub fn new(count: u16) -> Self {
        let miners = (0..count)
            .map(|uid| MinerInfo {
                uid,
                hotkey: format!("sim-hotkey-{}", uid),
                endpoint: format!("sim://miner/{}", uid),
            })
            .collect();
        Self { miners }
    }
}

#[async_trait]
impl MinerTransport for SimulatedTransport {
    async fn miners(&self) -> Result<Vec<MinerInfo>> {
        Ok(self.miners.clone())
    }

    async fn query(&self, miner: &MinerInfo, query: &Query) -> Result<MinerResponse> {
        let started = Instant::now();
        // Slower miners at higher uids, so latency ranking is visible.
        let delay = Duration::from_millis(50 + 40 * miner.uid as u64);
        tokio::time::sleep(delay).await;

        let payload = {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            let base: f64 = rng.gen_range(1.0e9..5.0e11);
            json!({
                "ticker": query.ticker,
                "companyName": format!("{} Holdings", query.ticker),
                "marketCap": base,
                "sharePrice": rng.gen_range(5.0..500.0),
                "sector": "Technology",
                "exchange": "NASDAQ",
                "sentiment": "neutral",
                "sentimentScore": rng.gen_range(-1.0..1.0),
                "cryptoHoldings": [{"asset": "BTC", "amount": rng.gen_range(1.0..1000.0)}],
                "totalCryptoValue": base / 100.0,
                "newsArticles": [{"title": "headline"}],
                "totalArticles": 1,
            })
        };

        let now = Utc::now();
        Ok(MinerResponse {
            uid: miner.uid,
            query_id: query.id.clone(),
            payload,
            declared_confidence: 0.6 + 0.3 / (1.0 + miner.uid as f64),
            reported_at: now,
            latency: started.elapsed(),
            received_at: now,
        })
    }
}

/// Weight sink that only logs. Used in simulation and as a fallback when no
/// chain collaborator is wired in.
pub struct LogWeightSink;

#[async_trait]
impl WeightSink for LogWeightSink {
    async fn submit_weights(&self, round: u64, weights: &[WeightEntry]) -> Result<()> {
        for entry in weights {
            info!(
                round,
                uid = entry.uid,
                weight = format!("{:.4}", entry.weight),
                reward = format!("{:.4}", entry.reward),
                "⚖️ Weight"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_types::{AnalysisType, QueryStrategy};

    #[tokio::test]
    async fn test_simulated_miners_answer_with_complete_payloads() {
        let transport = SimulatedTransport::new(3);
        let miners = transport.miners().await.unwrap();
        assert_eq!(miners.len(), 3);

        let query = Query::new(
            1,
            0,
            "AAPL".into(),
            AnalysisType::Financial,
            QueryStrategy::Popular,
            json!({}),
        );
        let response = transport.query(&miners[0], &query).await.unwrap();
        assert_eq!(response.uid, 0);
        assert_eq!(response.query_id, query.id);
        assert_eq!(
            argus_validation::structural_score(AnalysisType::Financial, &response.payload),
            1.0
        );
    }
}
