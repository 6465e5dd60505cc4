use crate::schemas::{field_weight, required_fields, structural_score, FieldKind};
use argus_oracle::OracleClient;
use argus_types::{clamp01, MinerResponse, Query, ValidationResult, ValidatorParams};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Scores miner responses in two tiers: a local structural check, then a
/// comparison against ground truth fetched through the shared oracle.
/// Never returns an error; every response resolves to a finite result.
pub struct ResponseValidator {
    oracle: Arc<OracleClient>,
    params: ValidatorParams,
}

impl ResponseValidator {
    pub fn new(oracle: Arc<OracleClient>, params: ValidatorParams) -> Self {
        Self { oracle, params }
    }

    pub async fn validate(&self, query: &Query, response: &MinerResponse) -> ValidationResult {
        let structural = structural_score(query.analysis_type, &response.payload);

        // External verification only runs on a fully well-formed payload.
        // Partial or mistyped payloads are judged on structure alone.
        let (api_score, unverified) = if structural >= 1.0 {
            self.external_score(query, response).await
        } else {
            (None, false)
        };

        let (api_score, freshness_penalized) = self.apply_freshness(api_score, response);

        let declared = clamp01(if response.declared_confidence.is_finite() {
            response.declared_confidence
        } else {
            0.0
        });
        let realized = api_score.unwrap_or(structural);
        let confidence_alignment = self.alignment(declared, realized);

        let final_score = clamp01(
            self.params.structural_weight * structural
                + self.params.api_weight * api_score.unwrap_or(0.0),
        );
        let final_score = if final_score.is_finite() {
            final_score
        } else {
            0.0
        };

        debug!(
            uid = response.uid,
            query_id = %query.id,
            structural,
            api = ?api_score,
            unverified,
            final_score,
            "Scored response"
        );

        ValidationResult {
            uid: response.uid,
            query_id: query.id.clone(),
            structural_score: structural,
            api_score,
            declared_confidence: declared,
            confidence_alignment,
            freshness_penalized,
            unverified,
            final_score,
            latency: response.latency,
        }
    }

    /// Tier 2. Returns (score, unverified). A degraded or failed lookup
    /// yields no score and flags the result unverified so downstream
    /// discounting can distinguish it from a wrong answer.
    async fn external_score(&self, query: &Query, response: &MinerResponse) -> (Option<f64>, bool) {
        let fetched = match self.oracle.fetch_company(&query.ticker).await {
            Ok(f) => f,
            Err(e) => {
                warn!(ticker = %query.ticker, error = %e, "Ground truth unavailable, response unverified");
                return (None, true);
            }
        };
        if fetched.degraded {
            return (None, true);
        }

        let payload = match response.payload.as_object() {
            Some(obj) => obj,
            None => return (None, false),
        };

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (name, kind) in required_fields(query.analysis_type) {
            if *name == "ticker" {
                continue;
            }
            let (claimed, truth) = match (payload.get(*name), fetched.value.get(*name)) {
                (Some(c), Some(t)) => (c, t),
                // Fields the source does not carry are excluded, not wrong.
                _ => continue,
            };
            let w = field_weight(name);
            weighted_sum += w * self.field_accuracy(*kind, claimed, truth);
            weight_total += w;
        }

        if weight_total == 0.0 {
            return (None, true);
        }
        (Some(clamp01(weighted_sum / weight_total)), false)
    }

    fn field_accuracy(&self, kind: FieldKind, claimed: &Value, truth: &Value) -> f64 {
        match kind {
            FieldKind::Number => {
                let (c, t) = match (claimed.as_f64(), truth.as_f64()) {
                    (Some(c), Some(t)) if c.is_finite() && t.is_finite() => (c, t),
                    _ => return 0.0,
                };
                if t == 0.0 {
                    return if c == 0.0 { 1.0 } else { 0.0 };
                }
                self.banded(((c - t) / t).abs())
            }
            FieldKind::Text => {
                let (c, t) = match (claimed.as_str(), truth.as_str()) {
                    (Some(c), Some(t)) => (normalize_text(c), normalize_text(t)),
                    _ => return 0.0,
                };
                if c == t {
                    1.0
                } else if !c.is_empty() && (c.contains(&t) || t.contains(&c)) {
                    self.params.loose_band_score
                } else {
                    0.0
                }
            }
            FieldKind::Array => {
                let (c, t) = match (claimed.as_array(), truth.as_array()) {
                    (Some(c), Some(t)) => (c.len() as f64, t.len() as f64),
                    _ => return 0.0,
                };
                if t == 0.0 {
                    return if c == 0.0 { 1.0 } else { 0.0 };
                }
                self.banded((c - t).abs() / t)
            }
        }
    }

    fn banded(&self, relative_error: f64) -> f64 {
        if relative_error <= self.params.tight_tolerance {
            1.0
        } else if relative_error <= self.params.loose_tolerance {
            self.params.loose_band_score
        } else {
            0.0
        }
    }

    fn apply_freshness(
        &self,
        api_score: Option<f64>,
        response: &MinerResponse,
    ) -> (Option<f64>, bool) {
        let score = match api_score {
            Some(s) => s,
            None => return (None, false),
        };
        let age = (response.received_at - response.reported_at).num_seconds();
        if age > self.params.staleness_secs {
            (Some(score * self.params.freshness_penalty), true)
        } else {
            (Some(score), false)
        }
    }

    /// Overconfidence is penalized more steeply than underconfidence.
    fn alignment(&self, declared: f64, realized: f64) -> f64 {
        let gap = declared - realized;
        let penalty = if gap > 0.0 {
            gap * self.params.overconfidence_slope
        } else {
            -gap * self.params.underconfidence_slope
        };
        clamp01(1.0 - penalty)
    }
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_oracle::{GroundTruthSource, OracleConfig};
    use argus_types::{AnalysisType, ArgusError, QueryStrategy, Result};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        truth: Value,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl GroundTruthSource for CountingSource {
        async fn fetch_company(&self, _ticker: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ArgusError::Timeout("simulated".into()))
            } else {
                Ok(self.truth.clone())
            }
        }

        async fn fetch_companies(&self) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    fn validator_with(truth: Value, fail: bool) -> (ResponseValidator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            truth,
            calls: calls.clone(),
            fail,
        };
        let config = OracleConfig {
            max_retries: 0,
            backoff_base: Duration::from_millis(1),
            ..Default::default()
        };
        let oracle = Arc::new(OracleClient::new(Arc::new(source), config));
        (
            ResponseValidator::new(oracle, ValidatorParams::default()),
            calls,
        )
    }

    fn financial_query() -> Query {
        Query::new(
            1,
            0,
            "AAPL".into(),
            AnalysisType::Financial,
            QueryStrategy::Popular,
            json!({}),
        )
    }

    fn response(payload: Value, confidence: f64) -> MinerResponse {
        let now = Utc::now();
        MinerResponse {
            uid: 7,
            query_id: "q".into(),
            payload,
            declared_confidence: confidence,
            reported_at: now,
            latency: Duration::from_millis(800),
            received_at: now,
        }
    }

    fn truth_aapl() -> Value {
        json!({
            "ticker": "AAPL",
            "companyName": "Apple Inc.",
            "marketCap": 2.8e12,
            "sharePrice": 180.0,
            "sector": "Technology",
            "exchange": "NASDAQ",
        })
    }

    fn exact_payload() -> Value {
        truth_aapl()
    }

    #[tokio::test]
    async fn test_exact_match_scores_one() {
        let (validator, calls) = validator_with(truth_aapl(), false);
        let result = validator
            .validate(&financial_query(), &response(exact_payload(), 0.95))
            .await;

        assert_eq!(result.structural_score, 1.0);
        assert_eq!(result.api_score, Some(1.0));
        assert_eq!(result.final_score, 1.0);
        assert!(!result.unverified);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_required_field_skips_external_lookup() {
        let (validator, calls) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        payload.as_object_mut().unwrap().remove("marketCap");

        let result = validator
            .validate(&financial_query(), &response(payload, 0.9))
            .await;

        let expected_structural = 5.0 / 6.0;
        assert!((result.structural_score - expected_structural).abs() < 1e-9);
        assert!(result.api_score.is_none());
        assert!((result.final_score - 0.3 * expected_structural).abs() < 1e-9);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_zeroes_everything() {
        let (validator, calls) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        payload["marketCap"] = json!("big");

        let result = validator
            .validate(&financial_query(), &response(payload, 1.0))
            .await;

        assert_eq!(result.structural_score, 0.0);
        assert_eq!(result.final_score, 0.0);
        assert!(result.api_score.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loose_band_gives_partial_credit() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        // 5% off: outside tight (2%), inside loose (10%).
        payload["sharePrice"] = json!(189.0);

        let result = validator
            .validate(&financial_query(), &response(payload, 0.8))
            .await;

        let api = result.api_score.unwrap();
        assert!(api < 1.0);
        assert!(api > 0.5);
    }

    #[tokio::test]
    async fn test_far_off_numeric_scores_zero_for_field() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        payload["marketCap"] = json!(1.0e9);

        let result = validator
            .validate(&financial_query(), &response(payload, 0.8))
            .await;

        // marketCap carries weight 2.0 of 7.5 total scored weight.
        let api = result.api_score.unwrap();
        assert!((api - 5.5 / 7.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_degraded_truth_flags_unverified() {
        let (validator, _) = validator_with(Value::Null, true);
        let result = validator
            .validate(&financial_query(), &response(exact_payload(), 0.9))
            .await;

        assert!(result.unverified);
        assert!(result.api_score.is_none());
        assert!((result.final_score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stale_response_takes_freshness_penalty() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let mut resp = response(exact_payload(), 0.9);
        resp.reported_at = resp.received_at - ChronoDuration::seconds(7200);

        let result = validator.validate(&financial_query(), &resp).await;

        assert!(result.freshness_penalized);
        assert_eq!(result.api_score, Some(0.7));
        assert!((result.final_score - (0.3 + 0.7 * 0.7)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_overconfidence_penalized_more_than_underconfidence() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        payload["marketCap"] = json!(1.0e9);

        let over = validator
            .validate(&financial_query(), &response(payload.clone(), 1.0))
            .await;
        let under = validator
            .validate(
                &financial_query(),
                &response(payload, over.api_score.unwrap() - 0.2),
            )
            .await;

        assert!(over.confidence_alignment < under.confidence_alignment);
    }

    #[tokio::test]
    async fn test_adversarial_payloads_resolve_finite() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let cases = vec![
            json!(null),
            json!([1, 2, 3]),
            json!({"ticker": 42}),
            json!({"deep": {"nested": {"garbage": [null, {"x": 1e308}]}}}),
            json!("just a string"),
        ];
        for payload in cases {
            let result = validator
                .validate(&financial_query(), &response(payload, f64::NAN))
                .await;
            assert!(result.final_score.is_finite());
            assert!((0.0..=1.0).contains(&result.final_score));
            assert!((0.0..=1.0).contains(&result.confidence_alignment));
        }
    }

    #[tokio::test]
    async fn test_fuzzy_company_name_gets_partial_credit() {
        let (validator, _) = validator_with(truth_aapl(), false);
        let mut payload = exact_payload();
        payload["companyName"] = json!("  apple   inc.  ");

        let exact = validator
            .validate(&financial_query(), &response(payload.clone(), 0.9))
            .await;
        assert_eq!(exact.api_score, Some(1.0));

        payload["companyName"] = json!("Apple");
        let fuzzy = validator
            .validate(&financial_query(), &response(payload, 0.9))
            .await;
        let api = fuzzy.api_score.unwrap();
        assert!(api < 1.0 && api > 0.8);
    }
}
