use argus_types::{AnalysisType, ArgusError, QueryStrategy, Result};
use rand::distributions::{Distribution, WeightedIndex};
use std::collections::HashMap;

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Weighted table over the closed strategy set. Weights are validated at
/// construction; a bad table is a startup configuration error, never a
/// runtime one.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    entries: Vec<(QueryStrategy, f64)>,
}

impl StrategyTable {
    pub fn new(weights: &HashMap<QueryStrategy, f64>) -> Result<Self> {
        let entries: Vec<(QueryStrategy, f64)> = QueryStrategy::ALL
            .iter()
            .filter_map(|s| weights.get(s).map(|w| (*s, *w)))
            .collect();

        if entries.len() != weights.len() {
            return Err(ArgusError::Configuration(
                "strategy weight table contains duplicate entries".to_string(),
            ));
        }
        validate_weights(entries.iter().map(|(_, w)| *w), "strategy")?;
        Ok(Self { entries })
    }

    pub fn default_weights() -> HashMap<QueryStrategy, f64> {
        HashMap::from([
            (QueryStrategy::Popular, 0.4),
            (QueryStrategy::Emerging, 0.2),
            (QueryStrategy::Sector, 0.15),
            (QueryStrategy::CryptoFocused, 0.15),
            (QueryStrategy::Random, 0.1),
        ])
    }

    /// Weighted draw, with the previously used strategy damped to half
    /// weight so one strategy cannot dominate consecutive rounds.
    pub fn draw(&self, last_used: Option<QueryStrategy>) -> QueryStrategy {
        let weights: Vec<f64> = self
            .entries
            .iter()
            .map(|(s, w)| {
                if Some(*s) == last_used {
                    w * 0.5
                } else {
                    *w
                }
            })
            .collect();

        match WeightedIndex::new(&weights) {
            Ok(dist) => self.entries[dist.sample(&mut rand::thread_rng())].0,
            Err(_) => QueryStrategy::Random,
        }
    }
}

/// Weighted table over analysis types, drawn independently of the strategy.
#[derive(Debug, Clone)]
pub struct AnalysisTable {
    entries: Vec<(AnalysisType, f64)>,
}

impl AnalysisTable {
    pub fn new(weights: &HashMap<AnalysisType, f64>) -> Result<Self> {
        let entries: Vec<(AnalysisType, f64)> = AnalysisType::ALL
            .iter()
            .filter_map(|a| weights.get(a).map(|w| (*a, *w)))
            .collect();

        if entries.len() != weights.len() {
            return Err(ArgusError::Configuration(
                "analysis weight table contains duplicate entries".to_string(),
            ));
        }
        validate_weights(entries.iter().map(|(_, w)| *w), "analysis")?;
        Ok(Self { entries })
    }

    pub fn default_weights() -> HashMap<AnalysisType, f64> {
        HashMap::from([
            (AnalysisType::Crypto, 0.35),
            (AnalysisType::Financial, 0.35),
            (AnalysisType::Sentiment, 0.15),
            (AnalysisType::News, 0.15),
        ])
    }

    pub fn draw(&self) -> AnalysisType {
        match WeightedIndex::new(self.entries.iter().map(|(_, w)| *w)) {
            Ok(dist) => self.entries[dist.sample(&mut rand::thread_rng())].0,
            Err(_) => AnalysisType::Financial,
        }
    }
}

fn validate_weights(weights: impl Iterator<Item = f64>, table: &str) -> Result<()> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for w in weights {
        if !(0.0..=1.0).contains(&w) {
            return Err(ArgusError::Configuration(format!(
                "{} weight {} outside [0, 1]",
                table, w
            )));
        }
        sum += w;
        count += 1;
    }
    if count == 0 {
        return Err(ArgusError::Configuration(format!(
            "{} weight table is empty",
            table
        )));
    }
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ArgusError::Configuration(format!(
            "{} weights must sum to 1.0, got {}",
            table, sum
        )));
    }
    Ok(())
}
