use std::collections::VecDeque;

/// One scored round for one miner, reduced to what reward computation needs.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub final_score: f64,
    /// Latency already normalized against the round it came from, in [0, 1]
    /// with 1.0 fastest.
    pub latency_score: f64,
    pub confidence_alignment: f64,
    pub unverified: bool,
}

/// Bounded rolling window of a miner's scored rounds. Oldest evicted first.
#[derive(Debug, Clone)]
pub struct MinerHistory {
    samples: VecDeque<Sample>,
    window: usize,
    /// Multiplicative decay accumulated over consecutive silent rounds.
    /// Reset to 1.0 whenever the miner responds.
    pub decay: f64,
    pub rounds_absent: u32,
}

impl MinerHistory {
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            decay: 1.0,
            rounds_absent: 0,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.decay = 1.0;
        self.rounds_absent = 0;
    }

    pub fn mark_absent(&mut self, decay_factor: f64) {
        self.decay *= decay_factor;
        self.rounds_absent += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window mean of final scores. Unverified samples count at a reduced
    /// weight instead of being dropped or treated as wrong.
    pub fn mean_score(&self, unverified_weight: f64) -> f64 {
        let mut sum = 0.0;
        let mut total = 0.0;
        for s in &self.samples {
            let w = if s.unverified { unverified_weight } else { 1.0 };
            sum += w * s.final_score;
            total += w;
        }
        if total == 0.0 {
            0.0
        } else {
            sum / total
        }
    }

    pub fn mean_latency_score(&self) -> f64 {
        mean(self.samples.iter().map(|s| s.latency_score))
    }

    pub fn mean_alignment(&self) -> f64 {
        mean(self.samples.iter().map(|s| s.confidence_alignment))
    }

    /// Population variance of final scores.
    pub fn score_variance(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let m = mean(self.samples.iter().map(|s| s.final_score));
        mean(self.samples.iter().map(|s| (s.final_score - m).powi(2)))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(score: f64) -> Sample {
        Sample {
            final_score: score,
            latency_score: 0.5,
            confidence_alignment: 0.9,
            unverified: false,
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut h = MinerHistory::new(3);
        for i in 0..5 {
            h.push(sample(i as f64 / 10.0));
        }
        assert_eq!(h.len(), 3);
        // Only 0.2, 0.3, 0.4 remain.
        assert!((h.mean_score(0.5) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unverified_samples_weigh_less() {
        let mut h = MinerHistory::new(10);
        h.push(sample(1.0));
        h.push(Sample {
            final_score: 0.0,
            unverified: true,
            ..sample(0.0)
        });
        // Full weighting would give 0.5; half-weighting the zero pulls the
        // mean up.
        assert!(h.mean_score(0.5) > 0.5);
        assert!((h.mean_score(0.5) - 1.0 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_variance_zero_for_steady_scores() {
        let mut h = MinerHistory::new(10);
        for _ in 0..5 {
            h.push(sample(0.91));
        }
        assert_eq!(h.score_variance(), 0.0);

        let mut volatile = MinerHistory::new(10);
        for i in 0..5 {
            volatile.push(sample(if i % 2 == 0 { 0.5 } else { 1.0 }));
        }
        assert!(volatile.score_variance() > 0.0);
    }

    #[test]
    fn test_absence_decays_and_response_resets() {
        let mut h = MinerHistory::new(10);
        h.push(sample(0.9));
        h.mark_absent(0.8);
        h.mark_absent(0.8);
        assert!((h.decay - 0.64).abs() < 1e-9);
        assert_eq!(h.rounds_absent, 2);

        h.push(sample(0.9));
        assert_eq!(h.decay, 1.0);
        assert_eq!(h.rounds_absent, 0);
    }

    #[test]
    fn test_empty_history_means_are_zero() {
        let h = MinerHistory::new(5);
        assert_eq!(h.mean_score(0.5), 0.0);
        assert_eq!(h.mean_alignment(), 0.0);
        assert_eq!(h.score_variance(), 0.0);
    }
}
