//! Orchestrator - one detect-then-remediate pass

use crate::config::PathsConfig;
use crate::error::AppResult;
use crate::pipeline::remediation::{is_failure, load_script_context, RecommendationMap, RemediationPlanner};
use crate::snapshot::{ChangeSet, Drift, DriftDetector, DriftSummary, SchemaSnapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Phases of a single run. Nothing survives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    Detecting,
    NoIssues,
    Remediating,
    Done,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Detecting => "detecting",
            AgentPhase::NoIssues => "no_issues",
            AgentPhase::Remediating => "remediating",
            AgentPhase::Done => "done",
        })
    }
}

/// Result of a run
#[derive(Debug)]
pub enum AgentOutcome {
    NoIssues,
    Remediated(RemediationReport),
}

impl AgentOutcome {
    pub fn has_drift(&self) -> bool {
        matches!(self, AgentOutcome::Remediated(_))
    }

    pub fn recommendations(&self) -> Option<&RecommendationMap> {
        match self {
            AgentOutcome::NoIssues => None,
            AgentOutcome::Remediated(report) => Some(&report.recommendations),
        }
    }
}

/// Everything produced by a run that found drift
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub previous_checksum: String,
    pub current_checksum: String,
    pub summary: DriftSummary,
    pub changes: ChangeSet,
    pub recommendations: RecommendationMap,
    pub failed_columns: usize,
}

/// Runs the drift detector and, when drift exists, the remediation planner
pub struct AgentOrchestrator {
    paths: PathsConfig,
    planner: RemediationPlanner,
}

impl AgentOrchestrator {
    pub fn new(paths: PathsConfig, planner: RemediationPlanner) -> Self {
        Self { paths, planner }
    }

    /// Load both snapshots from disk and run once.
    ///
    /// Snapshot load failures abort the run; nothing else does.
    pub async fn run(&self) -> AppResult<AgentOutcome> {
        info!("Running auto-remediation agent...");
        let previous = SnapshotStore::load(&self.paths.previous_schema)?;
        let current = SnapshotStore::load(&self.paths.current_schema)?;
        Ok(self.run_with(&previous, &current).await)
    }

    /// Run against snapshots that are already loaded
    pub async fn run_with(&self, previous: &SchemaSnapshot, current: &SchemaSnapshot) -> AgentOutcome {
        let run_id = Uuid::new_v4();
        let mut phase = AgentPhase::Idle;

        transition(run_id, &mut phase, AgentPhase::Detecting);
        let drift = if previous.checksum() == current.checksum() {
            debug!("[{}] Snapshot checksums match, skipping column comparison", run_id);
            Drift::NoDrift
        } else {
            DriftDetector::detect(previous, current)
        };

        let changes = match drift {
            Drift::NoDrift => {
                info!("No issues detected.");
                transition(run_id, &mut phase, AgentPhase::NoIssues);
                transition(run_id, &mut phase, AgentPhase::Done);
                return AgentOutcome::NoIssues;
            }
            Drift::Detected(changes) => changes,
        };

        let summary = changes.summary();
        info!(
            "Issues detected: {} added, {} removed, {} type changes (breaking: {})",
            summary.columns_added, summary.columns_removed, summary.columns_type_changed, summary.has_breaking_changes
        );
        for (column, record) in changes.iter() {
            debug!("[{}] {}", run_id, record.description(column));
        }

        transition(run_id, &mut phase, AgentPhase::Remediating);
        let script_context = match load_script_context(&self.paths.script) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not read transformation script {}: {}", self.paths.script.display(), e);
                String::new()
            }
        };
        let recommendations = self.planner.plan(&changes, &script_context).await;
        let failed_columns = recommendations.values().filter(|r| is_failure(r)).count();

        transition(run_id, &mut phase, AgentPhase::Done);
        AgentOutcome::Remediated(RemediationReport {
            run_id,
            generated_at: Utc::now(),
            previous_checksum: previous.checksum().to_string(),
            current_checksum: current.checksum().to_string(),
            summary,
            changes,
            recommendations,
            failed_columns,
        })
    }
}

fn transition(run_id: Uuid, phase: &mut AgentPhase, next: AgentPhase) {
    debug!("[{}] {} -> {}", run_id, phase, next);
    *phase = next;
}
