pub mod history;

pub use history::{MinerHistory, Sample};

use argus_types::{MinerUid, ValidationResult, ValidatorParams};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// One miner's position in the emitted weight vector.
#[derive(Debug, Clone)]
pub struct WeightEntry {
    pub uid: MinerUid,
    pub weight: f64,
    pub reward: f64,
    pub variance: f64,
}

/// Folds per-round validation results into rolling per-miner histories and
/// turns them into a normalized weight vector. All history mutation goes
/// through `record_round`, once per round.
pub struct IncentiveEngine {
    histories: HashMap<MinerUid, MinerHistory>,
    params: ValidatorParams,
}

impl IncentiveEngine {
    pub fn new(params: ValidatorParams) -> Self {
        Self {
            histories: HashMap::new(),
            params,
        }
    }

    /// The single merge point for a round. Miners in `known_uids` without a
    /// result this round take one step of absence decay; responding miners
    /// get a new window sample with latency normalized against this round's
    /// observed spread.
    pub fn record_round(&mut self, round: u64, known_uids: &[MinerUid], results: &[ValidationResult]) {
        for uid in known_uids {
            self.histories
                .entry(*uid)
                .or_insert_with(|| MinerHistory::new(self.params.history_window));
        }

        let latencies: Vec<f64> = results.iter().map(|r| r.latency.as_secs_f64()).collect();
        let min = latencies.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = latencies.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mut responded: Vec<MinerUid> = Vec::with_capacity(results.len());
        for result in results {
            responded.push(result.uid);
            let latency_score = if max > min {
                1.0 - (result.latency.as_secs_f64() - min) / (max - min)
            } else {
                1.0
            };
            self.histories
                .entry(result.uid)
                .or_insert_with(|| MinerHistory::new(self.params.history_window))
                .push(Sample {
                    final_score: result.final_score,
                    latency_score,
                    confidence_alignment: result.confidence_alignment,
                    unverified: result.unverified,
                });
        }

        let mut decayed = 0usize;
        for (uid, history) in self.histories.iter_mut() {
            if !responded.contains(uid) {
                history.mark_absent(self.params.absence_decay);
                decayed += 1;
            }
        }

        info!(
            round,
            scored = responded.len(),
            absent = decayed,
            miners = self.histories.len(),
            "📊 Merged round results into score history"
        );
    }

    /// Window-mean accuracy, latency, alignment and a consistency bonus,
    /// scaled by any accumulated absence decay. Latency takes a square root
    /// so gains diminish as responses get faster.
    pub fn compute_reward(&self, uid: MinerUid) -> f64 {
        let history = match self.histories.get(&uid) {
            Some(h) if !h.is_empty() => h,
            _ => return 0.0,
        };
        let p = &self.params;
        let consistency = 1.0 / (1.0 + history.score_variance());
        let base = p.accuracy_coeff * history.mean_score(p.unverified_sample_weight)
            + p.latency_coeff * history.mean_latency_score().max(0.0).sqrt()
            + p.alignment_coeff * history.mean_alignment()
            + p.consistency_coeff * consistency;
        (base * history.decay).max(0.0)
    }

    /// Normalized weights over every known uid, ranked best first. Sums to
    /// 1 whenever any miner is known; uniform when all rewards are zero;
    /// empty only when no miner has ever been seen.
    pub fn emit_weights(&self) -> Vec<WeightEntry> {
        let mut entries: Vec<WeightEntry> = self
            .histories
            .keys()
            .map(|&uid| {
                let variance = self
                    .histories
                    .get(&uid)
                    .map(|h| h.score_variance())
                    .unwrap_or(0.0);
                WeightEntry {
                    uid,
                    weight: 0.0,
                    reward: self.compute_reward(uid),
                    variance,
                }
            })
            .collect();

        if entries.is_empty() {
            return entries;
        }

        sort_ranked(&mut entries);

        let total: f64 = entries.iter().map(|e| e.reward).sum();
        if total > 0.0 {
            for e in &mut entries {
                e.weight = e.reward / total;
            }
        } else {
            let uniform = 1.0 / entries.len() as f64;
            for e in &mut entries {
                e.weight = uniform;
            }
        }

        debug!(miners = entries.len(), total_reward = total, "Emitting weight vector");
        entries
    }

    pub fn current_scores(&self) -> BTreeMap<MinerUid, f64> {
        self.histories
            .keys()
            .map(|&uid| (uid, self.compute_reward(uid)))
            .collect()
    }

    pub fn known_uids(&self) -> Vec<MinerUid> {
        let mut uids: Vec<MinerUid> = self.histories.keys().copied().collect();
        uids.sort_unstable();
        uids
    }

    pub fn history(&self, uid: MinerUid) -> Option<&MinerHistory> {
        self.histories.get(&uid)
    }
}

/// Reward descending, then lower score variance, then lower uid. Total
/// order so rankings are deterministic.
fn sort_ranked(entries: &mut [WeightEntry]) {
    entries.sort_by(|a, b| {
        b.reward
            .partial_cmp(&a.reward)
            .unwrap_or(Ordering::Equal)
            .then(a.variance.partial_cmp(&b.variance).unwrap_or(Ordering::Equal))
            .then(a.uid.cmp(&b.uid))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(uid: MinerUid, final_score: f64, latency_ms: u64) -> ValidationResult {
        ValidationResult {
            uid,
            query_id: "q".into(),
            structural_score: 1.0,
            api_score: Some(final_score),
            declared_confidence: final_score,
            confidence_alignment: 0.9,
            freshness_penalized: false,
            unverified: false,
            final_score,
            latency: Duration::from_millis(latency_ms),
        }
    }

    fn engine() -> IncentiveEngine {
        IncentiveEngine::new(ValidatorParams::default())
    }

    #[test]
    fn test_weights_sum_to_one_and_are_non_negative() {
        let mut engine = engine();
        let uids = [1, 2, 3];
        for round in 0..5 {
            engine.record_round(
                round,
                &uids,
                &[
                    result(1, 0.9, 500),
                    result(2, 0.6, 1500),
                    result(3, 0.3, 3000),
                ],
            );
        }

        let weights = engine.emit_weights();
        assert_eq!(weights.len(), 3);
        let sum: f64 = weights.iter().map(|e| e.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(weights.iter().all(|e| e.weight >= 0.0));
        // Best accuracy and latency ranks first.
        assert_eq!(weights[0].uid, 1);
    }

    #[test]
    fn test_no_known_miners_emits_empty_vector() {
        assert!(engine().emit_weights().is_empty());
    }

    #[test]
    fn test_all_zero_rewards_emit_uniform_weights() {
        let mut engine = engine();
        // Known uids that have never produced a scored response.
        engine.record_round(0, &[4, 5], &[]);

        let weights = engine.emit_weights();
        assert_eq!(weights.len(), 2);
        for e in &weights {
            assert!((e.weight - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_absent_miner_reward_decays_monotonically() {
        let mut engine = engine();
        engine.record_round(0, &[9], &[result(9, 0.9, 400)]);
        let mut prev = engine.compute_reward(9);
        assert!(prev > 0.0);

        for round in 1..30 {
            engine.record_round(round, &[9], &[]);
            let now = engine.compute_reward(9);
            assert!(now <= prev);
            assert!(now >= 0.0);
            prev = now;
        }
        // Sustained absence drives the reward toward zero.
        assert!(prev < 0.01);
    }

    #[test]
    fn test_response_resets_absence_decay() {
        let mut engine = engine();
        engine.record_round(0, &[9], &[result(9, 0.9, 400)]);
        let fresh = engine.compute_reward(9);

        for round in 1..4 {
            engine.record_round(round, &[9], &[]);
        }
        assert!(engine.compute_reward(9) < fresh);

        engine.record_round(4, &[9], &[result(9, 0.9, 400)]);
        assert!((engine.compute_reward(9) - fresh).abs() < 1e-9);
    }

    #[test]
    fn test_lower_variance_wins_at_equal_reward() {
        // Remove the consistency coefficient so the two miners land on
        // exactly equal rewards and the variance tie-break decides.
        let params = ValidatorParams {
            accuracy_coeff: 0.7,
            latency_coeff: 0.15,
            alignment_coeff: 0.15,
            consistency_coeff: 0.0,
            ..Default::default()
        };
        let mut engine = IncentiveEngine::new(params);

        // Same mean score, same latency, same alignment.
        engine.record_round(0, &[1, 2], &[result(1, 0.91, 500), result(2, 0.86, 500)]);
        engine.record_round(1, &[1, 2], &[result(1, 0.91, 500), result(2, 0.96, 500)]);
        engine.record_round(2, &[1, 2], &[result(1, 0.91, 500), result(2, 0.91, 500)]);

        let r1 = engine.compute_reward(1);
        let r2 = engine.compute_reward(2);
        assert!((r1 - r2).abs() < 1e-9);

        let weights = engine.emit_weights();
        assert_eq!(weights[0].uid, 1);
        assert!(weights[0].variance < weights[1].variance);
    }

    #[test]
    fn test_uid_breaks_remaining_ties() {
        let mut entries = vec![
            WeightEntry {
                uid: 7,
                weight: 0.0,
                reward: 0.5,
                variance: 0.01,
            },
            WeightEntry {
                uid: 3,
                weight: 0.0,
                reward: 0.5,
                variance: 0.01,
            },
        ];
        sort_ranked(&mut entries);
        assert_eq!(entries[0].uid, 3);
    }

    #[test]
    fn test_consistency_bonus_rewards_steady_miners() {
        let mut engine = engine();
        for round in 0..6 {
            let volatile_score = if round % 2 == 0 { 0.6 } else { 1.0 };
            engine.record_round(
                round,
                &[1, 2],
                &[result(1, 0.8, 500), result(2, volatile_score, 500)],
            );
        }
        // Equal means, unequal variance.
        assert!(engine.compute_reward(1) > engine.compute_reward(2));
    }

    #[test]
    fn test_unverified_results_discounted_against_verified() {
        let mut engine = engine();
        // Identical raw score sequences, but miner 2's high scores arrived
        // unverified. Their reduced sample weight drags the weighted mean
        // toward the low verified samples.
        for round in 0..4 {
            let score = if round % 2 == 0 { 0.9 } else { 0.1 };
            let mut second = result(2, score, 500);
            second.unverified = score > 0.5;
            if second.unverified {
                second.api_score = None;
            }
            engine.record_round(round, &[1, 2], &[result(1, score, 500), second]);
        }
        assert!(engine.compute_reward(2) < engine.compute_reward(1));
    }

    #[test]
    fn test_latency_normalized_within_round() {
        let mut engine = engine();
        engine.record_round(
            0,
            &[1, 2],
            &[result(1, 0.8, 100), result(2, 0.8, 4000)],
        );
        // Faster miner earns the higher reward at equal accuracy.
        assert!(engine.compute_reward(1) > engine.compute_reward(2));
    }
}
