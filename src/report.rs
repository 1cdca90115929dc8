//! Final run reports: a flat summary of where a run ended up and how
//! every gate scored along the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::run::Run;
use crate::stage::Stage;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateSummary {
    pub gate: u8,
    pub passed: bool,
    pub iteration: u32,
    pub overall_score: f64,
    pub attempts: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub project_name: String,
    pub stage: Stage,
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active_render_provider: String,
    pub fallback_gates_used: Vec<u8>,
    pub locked_spec_hash: Option<String>,
    /// Latest result per gate.
    pub gates: Vec<GateSummary>,
    /// Scorecard components from the latest gate 4 evaluation, if any.
    pub final_scorecard: Option<BTreeMap<String, f64>>,
    pub transition_count: usize,
}

const SCORECARD_KEYS: [&str; 6] = [
    "narrative_clarity",
    "mapping_alignment",
    "cinematic_quality",
    "consistency",
    "audio_sync",
    "final_score",
];

impl RunReport {
    pub fn from_run(run: &Run) -> Self {
        let mut gates = Vec::new();
        for gate in 0..=4u8 {
            if let Some(result) = run.latest_gate_result(gate) {
                let attempts = run
                    .gate_history
                    .iter()
                    .filter(|r| r.gate == gate)
                    .count() as u32;
                gates.push(GateSummary {
                    gate,
                    passed: result.passed,
                    iteration: result.iteration,
                    overall_score: result.overall_score,
                    attempts,
                    reasons: result.reasons.clone(),
                });
            }
        }

        let final_scorecard = run.latest_gate_result(4).map(|result| {
            SCORECARD_KEYS
                .iter()
                .filter_map(|key| result.metrics.get(*key).map(|v| (key.to_string(), *v)))
                .collect()
        });

        Self {
            run_id: run.id.clone(),
            project_name: run.project_name.clone(),
            stage: run.stage,
            iteration: run.iteration,
            created_at: run.created_at,
            updated_at: run.updated_at,
            active_render_provider: run.active_render_provider.clone(),
            fallback_gates_used: run.fallback_used.iter().copied().collect(),
            locked_spec_hash: run.locked_spec_hash.clone(),
            gates,
            final_scorecard,
            transition_count: run.transitions.len(),
        }
    }

    /// Human-readable lines for terminal output.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Run:       {} ({})", self.run_id, self.project_name),
            format!("Stage:     {}", self.stage),
            format!("Iteration: {}", self.iteration),
            format!("Provider:  {}", self.active_render_provider),
        ];
        for gate in &self.gates {
            lines.push(format!(
                "Gate {}:    {} (score {:.2}, attempt {})",
                gate.gate,
                if gate.passed { "pass" } else { "fail" },
                gate.overall_score,
                gate.attempts,
            ));
        }
        if let Some(scorecard) = &self.final_scorecard {
            if let Some(final_score) = scorecard.get("final_score") {
                lines.push(format!("Final score: {final_score:.2}"));
            }
        }
        lines
    }
}
