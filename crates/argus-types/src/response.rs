use crate::query::MinerUid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A miner's answer to one query. Lives only for the round that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerResponse {
    pub uid: MinerUid,
    pub query_id: String,
    pub payload: serde_json::Value,
    pub declared_confidence: f64,
    /// Timestamp the miner claims its data reflects.
    pub reported_at: DateTime<Utc>,
    pub latency: Duration,
    pub received_at: DateTime<Utc>,
}

/// Outcome of scoring one MinerResponse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub uid: MinerUid,
    pub query_id: String,
    /// Fraction of required fields present and well-typed, in [0, 1].
    pub structural_score: f64,
    /// Ground-truth accuracy in [0, 1]; None when external verification was
    /// skipped or fully degraded.
    pub api_score: Option<f64>,
    pub declared_confidence: f64,
    /// Alignment between declared confidence and realized accuracy, in [0, 1].
    pub confidence_alignment: f64,
    pub freshness_penalized: bool,
    /// True when tier 2 ran but every field lookup came back degraded.
    pub unverified: bool,
    pub final_score: f64,
    pub latency: Duration,
}

impl ValidationResult {
    /// A zero-score result for a miner whose response never arrived or could
    /// not be parsed. Keeps the round total finite.
    pub fn failed(uid: MinerUid, query_id: &str, latency: Duration) -> Self {
        Self {
            uid,
            query_id: query_id.to_string(),
            structural_score: 0.0,
            api_score: None,
            declared_confidence: 0.0,
            confidence_alignment: 0.0,
            freshness_penalized: false,
            unverified: false,
            final_score: 0.0,
            latency,
        }
    }
}

pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_finite_zero() {
        let r = ValidationResult::failed(3, "abc", Duration::from_secs(15));
        assert_eq!(r.final_score, 0.0);
        assert_eq!(r.structural_score, 0.0);
        assert!(r.api_score.is_none());
        assert!(!r.unverified);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.5), 0.5);
        assert_eq!(clamp01(1.5), 1.0);
    }
}
