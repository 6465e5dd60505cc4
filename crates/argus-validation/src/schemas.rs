use argus_types::AnalysisType;
use serde_json::Value;

/// Expected JSON shape of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Array,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => value.is_f64() || value.is_i64() || value.is_u64(),
            FieldKind::Array => value.is_array(),
        }
    }
}

/// Required fields per analysis type. Anything beyond these is allowed but
/// never scored.
pub fn required_fields(analysis_type: AnalysisType) -> &'static [(&'static str, FieldKind)] {
    match analysis_type {
        AnalysisType::Crypto => &[
            ("ticker", FieldKind::Text),
            ("companyName", FieldKind::Text),
            ("cryptoHoldings", FieldKind::Array),
            ("totalCryptoValue", FieldKind::Number),
        ],
        AnalysisType::Financial => &[
            ("ticker", FieldKind::Text),
            ("companyName", FieldKind::Text),
            ("marketCap", FieldKind::Number),
            ("sharePrice", FieldKind::Number),
            ("sector", FieldKind::Text),
            ("exchange", FieldKind::Text),
        ],
        AnalysisType::Sentiment => &[
            ("ticker", FieldKind::Text),
            ("companyName", FieldKind::Text),
            ("sentiment", FieldKind::Text),
            ("sentimentScore", FieldKind::Number),
        ],
        AnalysisType::News => &[
            ("ticker", FieldKind::Text),
            ("companyName", FieldKind::Text),
            ("newsArticles", FieldKind::Array),
            ("totalArticles", FieldKind::Number),
        ],
    }
}

/// Relative importance of a field when folding per-field accuracy into one
/// score. Unknown fields count at 1.0.
pub fn field_weight(field: &str) -> f64 {
    match field {
        "marketCap" => 2.0,
        "sharePrice" => 1.8,
        "cryptoHoldings" | "totalCryptoValue" => 1.8,
        "companyName" => 1.5,
        "sector" => 1.2,
        "exchange" => 1.0,
        "sentiment" | "sentimentScore" => 1.0,
        "newsArticles" | "totalArticles" => 0.8,
        "website" => 0.8,
        _ => 1.0,
    }
}

/// Tier 1: fraction of required fields present and well-typed. A field that
/// is present with the wrong type zeroes the whole score, and the caller
/// must skip external verification.
pub fn structural_score(analysis_type: AnalysisType, payload: &Value) -> f64 {
    let obj = match payload.as_object() {
        Some(obj) => obj,
        None => return 0.0,
    };

    let required = required_fields(analysis_type);
    let mut matched = 0usize;
    for (name, kind) in required {
        match obj.get(*name) {
            Some(value) if kind.matches(value) => matched += 1,
            Some(_) => return 0.0,
            None => {}
        }
    }
    matched as f64 / required.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_financial_payload_scores_one() {
        let payload = json!({
            "ticker": "AAPL",
            "companyName": "Apple Inc.",
            "marketCap": 2.8e12,
            "sharePrice": 180.5,
            "sector": "Technology",
            "exchange": "NASDAQ",
        });
        assert_eq!(structural_score(AnalysisType::Financial, &payload), 1.0);
    }

    #[test]
    fn test_missing_field_gives_partial_score() {
        let payload = json!({
            "ticker": "AAPL",
            "companyName": "Apple Inc.",
            "sharePrice": 180.5,
            "sector": "Technology",
            "exchange": "NASDAQ",
        });
        let score = structural_score(AnalysisType::Financial, &payload);
        assert!((score - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_type_zeroes_score() {
        let payload = json!({
            "ticker": "AAPL",
            "companyName": "Apple Inc.",
            "marketCap": "two trillion",
            "sharePrice": 180.5,
            "sector": "Technology",
            "exchange": "NASDAQ",
        });
        assert_eq!(structural_score(AnalysisType::Financial, &payload), 0.0);
    }

    #[test]
    fn test_non_object_payload_is_zero() {
        assert_eq!(structural_score(AnalysisType::Crypto, &json!("hi")), 0.0);
        assert_eq!(structural_score(AnalysisType::Crypto, &json!(null)), 0.0);
        assert_eq!(structural_score(AnalysisType::Crypto, &json!([1, 2])), 0.0);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let payload = json!({
            "ticker": "MSTR",
            "companyName": "Strategy",
            "cryptoHoldings": [{"asset": "BTC", "amount": 528185}],
            "totalCryptoValue": 3.1e10,
            "somethingElse": {"nested": true},
        });
        assert_eq!(structural_score(AnalysisType::Crypto, &payload), 1.0);
    }

    #[test]
    fn test_field_weights_favor_market_data() {
        assert!(field_weight("marketCap") > field_weight("exchange"));
        assert_eq!(field_weight("unknownField"), 1.0);
    }
}
