//! Run records and on-disk persistence.
//!
//! A `Run` owns everything mutable about one production attempt: current
//! stage, iteration counter, per-gate retry counters, the artifact store
//! (latest per role plus a superseded history), the append-only
//! transition history, and the gate-result history. Runs are mutated only
//! through the state machine's operations; nothing here is shared between
//! runs, so distinct runs are independent by construction.
//!
//! Persistence is a JSON record per run under `<base>/runs/<id>/` with an
//! `events.jsonl` journal beside it. The journal is append-only and never
//! rewritten.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::RunProfile;
use crate::gates::GateResult;
use crate::hash::sha256_canonical;
use crate::role::Role;
use crate::stage::Stage;

pub const SCHEMA_VERSION: u32 = 1;

/// One accepted artifact. Immutable once stored; resubmission pushes the
/// previous record into history rather than overwriting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactRecord {
    pub role: Role,
    pub schema_version: u32,
    pub payload: serde_json::Value,
    pub content_hash: String,
    pub iteration: u32,
    pub submitted_at: DateTime<Utc>,
}

/// One entry in the append-only transition history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionRecord {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub project_name: String,
    pub stage: Stage,
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub profile_hash: String,
    pub active_render_provider: String,
    /// Failed attempts used per gate number.
    #[serde(default)]
    pub retry_counts: BTreeMap<u8, u32>,
    /// Gates whose one-shot fallback has been consumed.
    #[serde(default)]
    pub fallback_used: BTreeSet<u8>,
    /// Current artifact per role.
    #[serde(default)]
    pub artifacts: BTreeMap<Role, ArtifactRecord>,
    /// Superseded artifacts, oldest first.
    #[serde(default)]
    pub artifact_history: Vec<ArtifactRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    #[serde(default)]
    pub gate_history: Vec<GateResult>,
    /// Spec hash recorded when LOCK_PREPROD froze the bundle.
    #[serde(default)]
    pub locked_spec_hash: Option<String>,
    #[serde(default)]
    pub locked_iteration: Option<u32>,
}

fn build_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix = uuid::Uuid::new_v4().to_string();
    format!("run-{stamp}-{}", &suffix[..8])
}

impl Run {
    pub fn new(profile: &RunProfile) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: build_run_id(),
            project_name: profile.project_name.clone(),
            stage: Stage::Init,
            iteration: 1,
            created_at: now,
            updated_at: now,
            profile_hash: sha256_canonical(profile).context("Failed to hash run profile")?,
            active_render_provider: profile.providers.render_primary.clone(),
            retry_counts: BTreeMap::new(),
            fallback_used: BTreeSet::new(),
            artifacts: BTreeMap::new(),
            artifact_history: Vec::new(),
            transitions: Vec::new(),
            gate_history: Vec::new(),
            locked_spec_hash: None,
            locked_iteration: None,
        })
    }

    pub fn current_artifact(&self, role: Role) -> Option<&ArtifactRecord> {
        self.artifacts.get(&role)
    }

    /// Content hash of the current artifact for a role.
    pub fn current_hash(&self, role: Role) -> Option<&str> {
        self.artifacts.get(&role).map(|a| a.content_hash.as_str())
    }

    /// Store an accepted artifact as current for its role, moving any
    /// previous current artifact into history.
    pub fn store_artifact(&mut self, record: ArtifactRecord) {
        if let Some(previous) = self.artifacts.insert(record.role, record) {
            self.artifact_history.push(previous);
        }
        self.updated_at = Utc::now();
    }

    pub fn record_transition(&mut self, to: Stage, reason: &str) {
        let from = self.stage;
        self.transitions.push(TransitionRecord {
            from_stage: from,
            to_stage: to,
            reason: reason.to_string(),
            at: Utc::now(),
        });
        self.stage = to;
        self.updated_at = Utc::now();
    }

    pub fn record_gate_result(&mut self, result: GateResult) {
        self.gate_history.push(result);
        self.updated_at = Utc::now();
    }

    /// Latest gate result for a gate number, if any.
    pub fn latest_gate_result(&self, gate: u8) -> Option<&GateResult> {
        self.gate_history.iter().rev().find(|r| r.gate == gate)
    }

    /// Begin a new iteration. Without carry-forward the preproduction
    /// artifacts are retired to history so the bundle is rebuilt from
    /// scratch; with carry-forward they stay current and resubmission
    /// replaces them one by one.
    pub fn start_next_iteration(&mut self, reason: &str, carry_forward: bool) {
        self.iteration += 1;
        if !carry_forward {
            for role in Role::PREPROD {
                if let Some(previous) = self.artifacts.remove(&role) {
                    self.artifact_history.push(previous);
                }
            }
        }
        tracing::info!(
            run_id = %self.id,
            iteration = self.iteration,
            reason,
            carry_forward,
            "started next iteration"
        );
        self.updated_at = Utc::now();
    }

    /// Deterministic digest of the preproduction bundle as of an
    /// iteration: run id, iteration, profile hash, active provider, and
    /// the content hash of every current preproduction artifact. Recorded
    /// at LOCK_PREPROD, re-recorded when a fallback switches the active
    /// provider, and recomputed at gate 4 to detect drift.
    pub fn spec_hash_for_iteration(&self, iteration: u32) -> Result<String, serde_json::Error> {
        let mut artifact_hashes = BTreeMap::new();
        for role in Role::PREPROD {
            if let Some(hash) = self.current_hash(role) {
                artifact_hashes.insert(role.to_string(), hash.to_string());
            }
        }
        let payload = serde_json::json!({
            "run_id": self.id,
            "iteration": iteration,
            "profile_hash": self.profile_hash,
            "active_render_provider": self.active_render_provider,
            "artifact_hashes": artifact_hashes,
        });
        sha256_canonical(&payload)
    }

    pub fn retry_count(&self, gate: u8) -> u32 {
        self.retry_counts.get(&gate).copied().unwrap_or(0)
    }

    pub fn bump_retry_count(&mut self, gate: u8) -> u32 {
        let counter = self.retry_counts.entry(gate).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// File-backed store for runs. One directory per run, with a pretty JSON
/// state record and an append-only event journal.
pub struct RunStore {
    base_dir: PathBuf,
}

impl RunStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join("runs").join(run_id)
    }

    fn state_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("state.json")
    }

    fn events_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("events.jsonl")
    }

    pub fn save(&self, run: &Run) -> Result<()> {
        let dir = self.run_dir(&run.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory: {}", dir.display()))?;
        let json = serde_json::to_string_pretty(run).context("Failed to serialize run state")?;
        fs::write(self.state_path(&run.id), json)
            .with_context(|| format!("Failed to write run state for {}", run.id))?;
        Ok(())
    }

    pub fn load(&self, run_id: &str) -> Result<Run> {
        let path = self.state_path(run_id);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read run state: {}", path.display()))?;
        let run: Run = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run state: {}", path.display()))?;
        Ok(run)
    }

    /// Append one event to the run's journal. The journal is never
    /// rewritten; readers may tail it concurrently.
    pub fn append_event(
        &self,
        run_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let line = serde_json::json!({
            "at": Utc::now().to_rfc3339(),
            "event": event,
            "payload": payload,
        });
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory: {}", dir.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(run_id))
            .context("Failed to open event journal")?;
        writeln!(file, "{line}").context("Failed to append event")?;
        Ok(())
    }

    pub fn list_runs(&self) -> Result<Vec<String>> {
        let runs_dir = self.base_dir.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&runs_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_run() -> Run {
        Run::new(&RunProfile::default()).unwrap()
    }

    fn sample_record(role: Role, payload: serde_json::Value) -> ArtifactRecord {
        let content_hash = sha256_canonical(&payload).unwrap();
        ArtifactRecord {
            role,
            schema_version: SCHEMA_VERSION,
            payload,
            content_hash,
            iteration: 1,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_run_starts_at_init() {
        let run = sample_run();
        assert_eq!(run.stage, Stage::Init);
        assert_eq!(run.iteration, 1);
        assert!(run.id.starts_with("run-"));
        assert!(run.artifacts.is_empty());
        assert!(run.transitions.is_empty());
    }

    #[test]
    fn test_store_artifact_supersedes_previous() {
        let mut run = sample_run();
        run.store_artifact(sample_record(Role::Direction, json!({"v": 1})));
        let first_hash = run.current_hash(Role::Direction).unwrap().to_string();

        run.store_artifact(sample_record(Role::Direction, json!({"v": 2})));
        assert_ne!(run.current_hash(Role::Direction).unwrap(), first_hash);
        assert_eq!(run.artifact_history.len(), 1);
        assert_eq!(run.artifact_history[0].content_hash, first_hash);
    }

    #[test]
    fn test_record_transition_appends_history() {
        let mut run = sample_run();
        run.record_transition(Stage::Gate0, "run_created");
        run.record_transition(Stage::CollectShowrunner, "gate0_passed");

        assert_eq!(run.stage, Stage::CollectShowrunner);
        assert_eq!(run.transitions.len(), 2);
        assert_eq!(run.transitions[0].from_stage, Stage::Init);
        assert_eq!(run.transitions[1].to_stage, Stage::CollectShowrunner);
    }

    #[test]
    fn test_next_iteration_without_carry_forward_clears_preprod() {
        let mut run = sample_run();
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 1})));
        run.store_artifact(sample_record(Role::DryrunMetrics, json!({"m": 1})));

        run.start_next_iteration("gate1_failed", false);
        assert_eq!(run.iteration, 2);
        assert!(run.current_artifact(Role::Showrunner).is_none());
        // Metrics artifacts are not part of the preprod bundle.
        assert!(run.current_artifact(Role::DryrunMetrics).is_some());
        assert_eq!(run.artifact_history.len(), 1);
    }

    #[test]
    fn test_next_iteration_with_carry_forward_keeps_artifacts() {
        let mut run = sample_run();
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 1})));
        run.start_next_iteration("gate2_failed", true);
        assert_eq!(run.iteration, 2);
        assert!(run.current_artifact(Role::Showrunner).is_some());
    }

    #[test]
    fn test_retry_counter_bumps() {
        let mut run = sample_run();
        assert_eq!(run.retry_count(3), 0);
        assert_eq!(run.bump_retry_count(3), 1);
        assert_eq!(run.bump_retry_count(3), 2);
        assert_eq!(run.retry_count(3), 2);
        assert_eq!(run.retry_count(1), 0);
    }

    #[test]
    fn test_spec_hash_tracks_preprod_changes() {
        let mut run = sample_run();
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 1})));
        let before = run.spec_hash_for_iteration(1).unwrap();

        // Same inputs, same hash.
        assert_eq!(run.spec_hash_for_iteration(1).unwrap(), before);
        // Different iteration or changed bundle, different hash.
        assert_ne!(run.spec_hash_for_iteration(2).unwrap(), before);
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 2})));
        assert_ne!(run.spec_hash_for_iteration(1).unwrap(), before);
    }

    #[test]
    fn test_spec_hash_tracks_active_provider() {
        let mut run = sample_run();
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 1})));
        let before = run.spec_hash_for_iteration(1).unwrap();
        run.active_render_provider = "higgsfield".to_string();
        assert_ne!(run.spec_hash_for_iteration(1).unwrap(), before);
    }

    #[test]
    fn test_store_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RunStore::new(dir.path());
        let mut run = sample_run();
        run.record_transition(Stage::Gate0, "run_created");
        run.store_artifact(sample_record(Role::Showrunner, json!({"s": 1})));
        store.save(&run).unwrap();

        let loaded = store.load(&run.id).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.stage, Stage::Gate0);
        assert_eq!(loaded.transitions.len(), 1);
        assert_eq!(
            loaded.current_hash(Role::Showrunner),
            run.current_hash(Role::Showrunner)
        );
    }

    #[test]
    fn test_load_unknown_run_fails() {
        let dir = tempdir().unwrap();
        let store = RunStore::new(dir.path());
        assert!(store.load("run-missing").is_err());
    }

    #[test]
    fn test_append_event_is_append_only() {
        let dir = tempdir().unwrap();
        let store = RunStore::new(dir.path());
        store
            .append_event("run-x", "run_created", json!({"id": "run-x"}))
            .unwrap();
        store
            .append_event("run-x", "artifact_submitted", json!({"role": "showrunner"}))
            .unwrap();

        let content = fs::read_to_string(store.events_path("run-x")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("run_created"));
        assert!(lines[1].contains("artifact_submitted"));
    }

    #[test]
    fn test_list_runs_sorted() {
        let dir = tempdir().unwrap();
        let store = RunStore::new(dir.path());
        let run_a = sample_run();
        let run_b = sample_run();
        store.save(&run_a).unwrap();
        store.save(&run_b).unwrap();

        let ids = store.list_runs().unwrap();
        assert_eq!(ids.len(), 2);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_runs_are_isolated() {
        let mut run_a = sample_run();
        let run_b = sample_run();
        run_a.record_transition(Stage::Gate0, "run_created");
        assert_eq!(run_a.stage, Stage::Gate0);
        assert_eq!(run_b.stage, Stage::Init);
        assert_ne!(run_a.id, run_b.id);
    }
}
