use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a catalog record came from. Fallback records are never replaced
/// by a failed live refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Fallback,
}

/// Market-cap bracket used by sampling filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapBracket {
    Mega,
    Large,
    Mid,
    Small,
    Unknown,
}

impl CapBracket {
    pub fn from_market_cap(cap: f64) -> Self {
        if cap <= 0.0 {
            CapBracket::Unknown
        } else if cap >= 200e9 {
            CapBracket::Mega
        } else if cap >= 10e9 {
            CapBracket::Large
        } else if cap >= 2e9 {
            CapBracket::Mid
        } else {
            CapBracket::Small
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub exchange: String,
    pub country: String,
    pub market_cap: f64,
    pub provenance: Provenance,
    pub last_refreshed: DateTime<Utc>,
}

impl CompanyRecord {
    pub fn fallback(ticker: &str, sector: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: format!("{} Corporation", ticker),
            sector: sector.to_string(),
            exchange: "NASDAQ".to_string(),
            country: "USA".to_string(),
            market_cap: 0.0,
            provenance: Provenance::Fallback,
            last_refreshed: Utc::now(),
        }
    }

    pub fn bracket(&self) -> CapBracket {
        CapBracket::from_market_cap(self.market_cap)
    }
}

/// Ticker symbols are 1-8 characters of [A-Za-z0-9.-], no leading/trailing
/// dots and no doubled separators.
pub fn is_valid_ticker(ticker: &str) -> bool {
    if ticker.is_empty() || ticker.len() > 8 {
        return false;
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }
    if ticker.starts_with('.') || ticker.ends_with('.') {
        return false;
    }
    !ticker.contains("..") && !ticker.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_boundaries() {
        assert_eq!(CapBracket::from_market_cap(2.8e12), CapBracket::Mega);
        assert_eq!(CapBracket::from_market_cap(50e9), CapBracket::Large);
        assert_eq!(CapBracket::from_market_cap(5e9), CapBracket::Mid);
        assert_eq!(CapBracket::from_market_cap(5e8), CapBracket::Small);
        assert_eq!(CapBracket::from_market_cap(0.0), CapBracket::Unknown);
    }

    #[test]
    fn test_ticker_validation() {
        assert!(is_valid_ticker("AAPL"));
        assert!(is_valid_ticker("BRK.B"));
        assert!(is_valid_ticker("X"));
        assert!(!is_valid_ticker(""));
        assert!(!is_valid_ticker("TOOLONGTICKER"));
        assert!(!is_valid_ticker(".AAPL"));
        assert!(!is_valid_ticker("AAPL."));
        assert!(!is_valid_ticker("AA..PL"));
        assert!(!is_valid_ticker("AA PL"));
    }

    #[test]
    fn test_fallback_record() {
        let rec = CompanyRecord::fallback("MSFT", "Technology");
        assert_eq!(rec.provenance, Provenance::Fallback);
        assert_eq!(rec.bracket(), CapBracket::Unknown);
        assert_eq!(rec.name, "MSFT Corporation");
    }
}
