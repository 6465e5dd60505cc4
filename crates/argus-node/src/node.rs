use crate::config::ArgusConfig;
use crate::round::{RoundEngine, RoundSummary};
use crate::state::NodeState;
use crate::transport::{MinerInfo, MinerTransport, WeightSink};
use anyhow::Result;
use argus_catalog::CompanyCatalog;
use argus_incentive::IncentiveEngine;
use argus_oracle::{GroundTruthSource, HttpSource, OracleClient};
use argus_query::QueryGenerator;
use argus_types::{MinerUid, Query};
use argus_validation::ResponseValidator;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{error, info, warn};

/// Wires the catalog, query generator, validator, and incentive engine into
/// the round loop. One instance per process; the oracle behind it carries
/// the process-wide breaker and rate-limiter state.
pub struct ArgusNode {
    config: ArgusConfig,
    catalog: Arc<CompanyCatalog>,
    oracle: Arc<OracleClient>,
    generator: Mutex<QueryGenerator>,
    incentive: RwLock<IncentiveEngine>,
    engine: RoundEngine,
    transport: Arc<dyn MinerTransport>,
    sink: Arc<dyn WeightSink>,
    state: Mutex<NodeState>,
}

impl ArgusNode {
    pub fn new(
        config: ArgusConfig,
        transport: Arc<dyn MinerTransport>,
        sink: Arc<dyn WeightSink>,
    ) -> Result<Self> {
        let source = Arc::new(HttpSource::new(config.http_source_config())?);
        Self::with_source(config, source, transport, sink)
    }

    /// Same wiring with the ground-truth source injected, for tests and
    /// alternative providers.
    pub fn with_source(
        config: ArgusConfig,
        source: Arc<dyn GroundTruthSource>,
        transport: Arc<dyn MinerTransport>,
        sink: Arc<dyn WeightSink>,
    ) -> Result<Self> {
        config.validate()?;

        let oracle = Arc::new(OracleClient::new(source, config.oracle_config()));
        let catalog = Arc::new(CompanyCatalog::new(Duration::from_secs(
            config.node.catalog_refresh_secs,
        )));
        let generator = QueryGenerator::new(
            catalog.clone(),
            &config.queries.strategy_weights,
            &config.queries.analysis_weights,
        )?;
        let validator = Arc::new(ResponseValidator::new(
            oracle.clone(),
            config.scoring.clone(),
        ));
        let engine = RoundEngine::new(
            transport.clone(),
            validator,
            config.node.max_concurrent_queries,
            Duration::from_secs(config.node.query_timeout_secs),
            Duration::from_secs(config.node.round_deadline_secs),
        );
        let state = NodeState::load(&config.state_file());
        let incentive = IncentiveEngine::new(config.scoring.clone());

        info!(name = %config.node.name, round = state.round, "✨ Validator node initialized");

        Ok(Self {
            config,
            catalog,
            oracle,
            generator: Mutex::new(generator),
            incentive: RwLock::new(incentive),
            engine,
            transport,
            sink,
            state: Mutex::new(state),
        })
    }

    /// One full round: refresh, generate, dispatch, validate, merge, emit.
    /// Returns false when the round was aborted and history untouched.
    pub async fn run_single_round(&self, shutdown: watch::Receiver<bool>) -> Result<bool> {
        if self.catalog.needs_refresh().await {
            self.catalog.refresh(&self.oracle).await;
        }

        let round = self.state.lock().await.round + 1;
        let queries = self.generate_queries(round).await;

        let outcome = self.engine.run_round(round, queries, shutdown).await?;
        if outcome.aborted {
            return Ok(false);
        }

        let weights = {
            let mut incentive = self.incentive.write().await;
            incentive.record_round(round, &outcome.known_uids, &outcome.results);
            incentive.emit_weights()
        };

        if !weights.is_empty() {
            if let Err(e) = self.sink.submit_weights(round, &weights).await {
                error!(round, error = %e, "Weight submission failed");
            }
        }

        {
            let mut state = self.state.lock().await;
            state.round = round;
            state.last_summary = Some(outcome.summary);
            if let Err(e) = state.save(&self.config.state_file()) {
                warn!(error = %e, "Could not persist validator state");
            }
        }
        Ok(true)
    }

    /// The epoch loop. Rounds start on a fixed cadence; a slow round delays
    /// the next start rather than overlapping it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let interval = Duration::from_secs(self.config.node.round_interval_secs);

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.run_single_round(shutdown.clone()).await {
                error!(error = %e, "Round failed, continuing with next");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("🛑 Validator loop stopped");
        Ok(())
    }

    async fn generate_queries(&self, round: u64) -> Vec<Query> {
        let mut generator = self.generator.lock().await;
        let mut queries = Vec::with_capacity(self.config.node.queries_per_round);
        for _ in 0..self.config.node.queries_per_round {
            queries.push(generator.next(round).await);
        }
        queries
    }

    // Status surface, consumed by an external API layer.

    pub async fn current_scores(&self) -> BTreeMap<MinerUid, f64> {
        self.incentive.read().await.current_scores()
    }

    pub async fn miner_list(&self) -> Vec<MinerInfo> {
        match self.transport.miners().await {
            Ok(miners) => miners,
            Err(e) => {
                warn!(error = %e, "Miner discovery failed, listing known uids");
                self.incentive
                    .read()
                    .await
                    .known_uids()
                    .into_iter()
                    .map(|uid| MinerInfo {
                        uid,
                        hotkey: String::new(),
                        endpoint: String::new(),
                    })
                    .collect()
            }
        }
    }

    pub async fn last_round_summary(&self) -> Option<RoundSummary> {
        self.state.lock().await.last_summary.clone()
    }

    pub async fn current_round(&self) -> u64 {
        self.state.lock().await.round
    }
}
