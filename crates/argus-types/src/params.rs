use crate::error::{ArgusError, Result};
use serde::{Deserialize, Serialize};

/// Tunable scoring constants. Defaults are the operating values; anything a
/// deployment may want to change is here rather than hardcoded at the use
/// site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorParams {
    /// Weight of the structural tier in the final score.
    pub structural_weight: f64,
    /// Weight of the external-accuracy tier in the final score.
    pub api_weight: f64,

    /// Relative error at or under this scores 1.0 on a numeric field.
    pub tight_tolerance: f64,
    /// Relative error at or under this scores partial credit.
    pub loose_tolerance: f64,
    /// Score awarded inside the loose band.
    pub loose_band_score: f64,

    /// Penalty slope for confidence above realized accuracy.
    pub overconfidence_slope: f64,
    /// Penalty slope for confidence below realized accuracy.
    pub underconfidence_slope: f64,

    /// Responses older than this many seconds take the freshness penalty.
    pub staleness_secs: i64,
    /// Multiplier applied to the api score of a stale response.
    pub freshness_penalty: f64,

    /// Rolling window length per miner.
    pub history_window: usize,
    /// Per-silent-round multiplicative reward decay.
    pub absence_decay: f64,
    /// Window-fold weight given to unverified accuracy samples.
    pub unverified_sample_weight: f64,

    /// Reward component coefficients; must sum to 1.
    pub accuracy_coeff: f64,
    pub latency_coeff: f64,
    pub alignment_coeff: f64,
    pub consistency_coeff: f64,
}

impl Default for ValidatorParams {
    fn default() -> Self {
        Self {
            structural_weight: 0.3,
            api_weight: 0.7,
            tight_tolerance: 0.02,
            loose_tolerance: 0.10,
            loose_band_score: 0.5,
            overconfidence_slope: 1.5,
            underconfidence_slope: 0.75,
            staleness_secs: 3600,
            freshness_penalty: 0.7,
            history_window: 50,
            absence_decay: 0.8,
            unverified_sample_weight: 0.5,
            accuracy_coeff: 0.6,
            latency_coeff: 0.15,
            alignment_coeff: 0.15,
            consistency_coeff: 0.1,
        }
    }
}

impl ValidatorParams {
    /// Startup validation. Any violation is a fatal configuration error.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if (self.structural_weight + self.api_weight - 1.0).abs() > 0.01 {
            errors.push(format!(
                "structural_weight + api_weight must sum to 1.0, got {}",
                self.structural_weight + self.api_weight
            ));
        }
        if self.tight_tolerance <= 0.0 || self.tight_tolerance >= self.loose_tolerance {
            errors.push("tolerance bands must satisfy 0 < tight < loose".to_string());
        }
        if !(0.0..=1.0).contains(&self.loose_band_score) {
            errors.push("loose_band_score must be in [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.freshness_penalty) {
            errors.push("freshness_penalty must be in [0, 1]".to_string());
        }
        if !(0.0..1.0).contains(&self.absence_decay) {
            errors.push("absence_decay must be in [0, 1)".to_string());
        }
        if !(0.0..=1.0).contains(&self.unverified_sample_weight) {
            errors.push("unverified_sample_weight must be in [0, 1]".to_string());
        }
        if self.history_window == 0 {
            errors.push("history_window must be positive".to_string());
        }
        let coeff_sum =
            self.accuracy_coeff + self.latency_coeff + self.alignment_coeff + self.consistency_coeff;
        if (coeff_sum - 1.0).abs() > 0.01 {
            errors.push(format!(
                "reward coefficients must sum to 1.0, got {}",
                coeff_sum
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArgusError::Configuration(errors.join("; ")))
        }
    }
}
