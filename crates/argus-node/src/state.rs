use crate::round::RoundSummary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Persisted across restarts so round numbering continues instead of
/// resetting. Score history is intentionally not persisted; miners re-earn
/// standing after a validator restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeState {
    pub round: u64,
    pub last_summary: Option<RoundSummary>,
}

impl NodeState {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<NodeState>(&content) {
                Ok(state) => {
                    info!(round = state.round, "💾 Restored validator state");
                    state
                }
                Err(e) => {
                    warn!(error = %e, "State file unreadable, starting fresh");
                    NodeState::default()
                }
            },
            Err(_) => NodeState::default(),
        }
    }

    /// Write-then-rename so a crash mid-save never truncates good state.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, content)
            .with_context(|| format!("writing state to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("committing state to {}", path.display()))?;
        Ok(())
    }
}
