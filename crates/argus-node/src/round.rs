use crate::transport::MinerTransport;
use argus_types::{MinerUid, Query, Result, ValidationResult};
use argus_validation::ResponseValidator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u64,
    pub queries: usize,
    pub miners: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dispatches aborted before reporting, at the round deadline or on
    /// shutdown.
    pub dropped: usize,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Everything a finished round hands back for the single merge step. An
/// aborted round carries no results and must not touch score history.
pub struct RoundOutcome {
    pub results: Vec<ValidationResult>,
    pub known_uids: Vec<MinerUid>,
    pub summary: RoundSummary,
    pub aborted: bool,
}

/// Dispatches one round's queries to every known miner and validates the
/// responses concurrently. Results accumulate in a round-local vector; no
/// shared state is mutated here.
pub struct RoundEngine {
    transport: Arc<dyn MinerTransport>,
    validator: Arc<ResponseValidator>,
    max_in_flight: usize,
    query_timeout: Duration,
    round_deadline: Duration,
}

impl RoundEngine {
    pub fn new(
        transport: Arc<dyn MinerTransport>,
        validator: Arc<ResponseValidator>,
        max_in_flight: usize,
        query_timeout: Duration,
        round_deadline: Duration,
    ) -> Self {
        Self {
            transport,
            validator,
            max_in_flight,
            query_timeout,
            round_deadline,
        }
    }

    pub async fn run_round(
        &self,
        round: u64,
        queries: Vec<Query>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RoundOutcome> {
        let started = Instant::now();
        let miners = self.transport.miners().await?;
        let known_uids: Vec<MinerUid> = miners.iter().map(|m| m.uid).collect();

        if miners.is_empty() || queries.is_empty() {
            warn!(round, "No miners or queries, skipping round");
            return Ok(RoundOutcome {
                results: Vec::new(),
                known_uids,
                summary: self.summary(round, &queries, 0, 0, Vec::new(), started),
                aborted: false,
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<(ValidationResult, bool)> = JoinSet::new();
        let mut dispatched = 0usize;

        for query in &queries {
            for miner in &miners {
                let permit_pool = semaphore.clone();
                let transport = self.transport.clone();
                let validator = self.validator.clone();
                let query = query.clone();
                let miner = miner.clone();
                let query_timeout = self.query_timeout;
                dispatched += 1;

                tasks.spawn(async move {
                    // Bounded in-flight queries; a closed semaphore only
                    // happens at engine teardown.
                    let _permit = match permit_pool.acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => {
                            return (
                                ValidationResult::failed(miner.uid, &query.id, Duration::ZERO),
                                false,
                            )
                        }
                    };
                    let sent = Instant::now();
                    match timeout(query_timeout, transport.query(&miner, &query)).await {
                        Ok(Ok(response)) => {
                            let result = validator.validate(&query, &response).await;
                            (result, true)
                        }
                        Ok(Err(e)) => {
                            warn!(uid = miner.uid, query_id = %query.id, error = %e, "Miner query failed");
                            (
                                ValidationResult::failed(miner.uid, &query.id, sent.elapsed()),
                                false,
                            )
                        }
                        Err(_) => (
                            ValidationResult::failed(miner.uid, &query.id, query_timeout),
                            false,
                        ),
                    }
                });
            }
        }

        let mut results: Vec<(ValidationResult, bool)> = Vec::with_capacity(dispatched);
        let mut aborted = *shutdown.borrow();
        let deadline = tokio::time::sleep(self.round_deadline);
        tokio::pin!(deadline);

        while !aborted {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(round, collected = results.len(), "⏰ Round deadline reached, dropping stragglers");
                    tasks.abort_all();
                    break;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(round, "🛑 Round aborted by shutdown signal");
                        tasks.abort_all();
                        aborted = true;
                    }
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(entry)) => results.push(entry),
                    Some(Err(_)) => {}
                    None => break,
                }
            }
        }

        if aborted {
            return Ok(RoundOutcome {
                results: Vec::new(),
                known_uids,
                summary: self.summary(round, &queries, miners.len(), dispatched, Vec::new(), started),
                aborted: true,
            });
        }

        let summary = self.summary(round, &queries, miners.len(), dispatched, results.iter().map(|(_, ok)| *ok).collect(), started);
        info!(
            round,
            dispatched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            dropped = summary.dropped,
            duration_ms = summary.duration_ms,
            "✅ Round complete"
        );

        Ok(RoundOutcome {
            results: results.into_iter().map(|(r, _)| r).collect(),
            known_uids,
            summary,
            aborted: false,
        })
    }

    fn summary(
        &self,
        round: u64,
        queries: &[Query],
        miners: usize,
        dispatched: usize,
        outcomes: Vec<bool>,
        started: Instant,
    ) -> RoundSummary {
        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        RoundSummary {
            round,
            queries: queries.len(),
            miners,
            dispatched,
            succeeded,
            failed: outcomes.len() - succeeded,
            dropped: dispatched - outcomes.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        }
    }
}
