use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network-assigned miner identifier.
pub type MinerUid = u16;

/// The closed set of analysis types a query can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Crypto,
    Financial,
    Sentiment,
    News,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 4] = [
        AnalysisType::Crypto,
        AnalysisType::Financial,
        AnalysisType::Sentiment,
        AnalysisType::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Crypto => "crypto",
            AnalysisType::Financial => "financial",
            AnalysisType::Sentiment => "sentiment",
            AnalysisType::News => "news",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of entity-selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    Popular,
    Emerging,
    Sector,
    CryptoFocused,
    Random,
}

impl QueryStrategy {
    pub const ALL: [QueryStrategy; 5] = [
        QueryStrategy::Popular,
        QueryStrategy::Emerging,
        QueryStrategy::Sector,
        QueryStrategy::CryptoFocused,
        QueryStrategy::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStrategy::Popular => "popular",
            QueryStrategy::Emerging => "emerging",
            QueryStrategy::Sector => "sector",
            QueryStrategy::CryptoFocused => "crypto_focused",
            QueryStrategy::Random => "random",
        }
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound query for a round. Entity selection is randomized, but the
/// id is derived from (round, seq, ticker) so a replayed round names the
/// same queries. The sequence number keeps ids distinct even when the
/// generator lands on the same ticker twice in one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub round: u64,
    /// Position within the round's batch.
    pub seq: u32,
    pub ticker: String,
    pub analysis_type: AnalysisType,
    pub strategy: QueryStrategy,
    pub request_params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Query {
    pub fn new(
        round: u64,
        seq: u32,
        ticker: String,
        analysis_type: AnalysisType,
        strategy: QueryStrategy,
        request_params: serde_json::Value,
    ) -> Self {
        let id = derive_query_id(round, seq, &ticker);
        Self {
            id,
            round,
            seq,
            ticker,
            analysis_type,
            strategy,
            request_params,
            created_at: Utc::now(),
        }
    }
}

/// blake3(round || seq || ticker), truncated to 16 hex chars.
pub fn derive_query_id(round: u64, seq: u32, ticker: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&round.to_be_bytes());
    hasher.update(&seq.to_be_bytes());
    hasher.update(ticker.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_id_deterministic() {
        let a = derive_query_id(42, 0, "AAPL");
        let b = derive_query_id(42, 0, "AAPL");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_query_id_varies_by_round_seq_and_ticker() {
        assert_ne!(derive_query_id(1, 0, "AAPL"), derive_query_id(2, 0, "AAPL"));
        assert_ne!(derive_query_id(1, 0, "AAPL"), derive_query_id(1, 0, "MSFT"));
        // Same ticker drawn twice in one round still names two queries.
        assert_ne!(derive_query_id(1, 0, "AAPL"), derive_query_id(1, 1, "AAPL"));
    }

    #[test]
    fn test_query_carries_derived_id() {
        let q = Query::new(
            7,
            2,
            "TSLA".into(),
            AnalysisType::Crypto,
            QueryStrategy::CryptoFocused,
            serde_json::json!({}),
        );
        assert_eq!(q.id, derive_query_id(7, 2, "TSLA"));
        assert_eq!(q.round, 7);
        assert_eq!(q.seq, 2);
    }
}
