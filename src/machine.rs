//! The run state machine: submission legality, the preproduction lock,
//! and verdict-driven stage routing.
//!
//! `advance` is the only place a run's stage moves. Everything else
//! (validation, gate evaluation, retry governance) produces values that
//! are fed into it, so every transition lands in the run's history with
//! a reason attached.

use anyhow::Context;

use crate::config::RunProfile;
use crate::errors::PipelineError;
use crate::gates::{self, GateResult};
use crate::retry::{self, RetryDecision};
use crate::role::Role;
use crate::run::Run;
use crate::stage::Stage;
use crate::validator;

/// Orchestrates one run against a profile. Holds no run state itself;
/// runs are passed in so concurrent runs stay independent.
pub struct Pipeline<'a> {
    profile: &'a RunProfile,
}

impl<'a> Pipeline<'a> {
    pub fn new(profile: &'a RunProfile) -> Self {
        Self { profile }
    }

    /// Create a run and move it to the first checkpoint.
    pub fn create_run(&self) -> anyhow::Result<Run> {
        let mut run = Run::new(self.profile).context("Failed to create run")?;
        run.record_transition(Stage::Gate0, "run_created");
        tracing::info!(run_id = %run.id, project = %run.project_name, "run created");
        Ok(run)
    }

    /// Validate and store one role submission. Rejected submissions
    /// leave the run untouched; accepted ones may advance a collect
    /// stage to the next stage in sequence.
    pub fn submit(
        &self,
        run: &mut Run,
        role: Role,
        raw: &serde_json::Value,
    ) -> Result<String, PipelineError> {
        if run.stage.is_terminal() {
            return Err(PipelineError::Terminal { stage: run.stage });
        }
        if !run.stage.accepts().contains(&role) {
            return Err(PipelineError::OutOfSequence {
                role,
                stage: run.stage,
            });
        }

        let record = validator::validate(run, role, raw)?;
        let content_hash = record.content_hash.clone();
        run.store_artifact(record);
        tracing::info!(run_id = %run.id, %role, hash = %content_hash, "artifact accepted");

        // Collect stages move on once their role has delivered. During
        // FINAL_RENDER a dry-run resubmission is allowed without moving;
        // only the final metrics unlock gate 4.
        let stage_done = match run.stage {
            Stage::FinalRender => role == Role::FinalMetrics,
            stage => stage.accepts() == [role],
        };
        if stage_done {
            if let Some(next) = run.stage.next() {
                run.record_transition(next, &format!("{role}_accepted"));
            }
        }
        Ok(content_hash)
    }

    /// Freeze the preproduction bundle. Requires every preproduction
    /// role's artifact to be present; records the spec hash that gate 4
    /// later verifies.
    pub fn lock_preprod(&self, run: &mut Run) -> Result<String, PipelineError> {
        if run.stage.is_terminal() {
            return Err(PipelineError::Terminal { stage: run.stage });
        }
        if run.stage != Stage::LockPreprod {
            return Err(PipelineError::WrongStage {
                expected: Stage::LockPreprod,
                actual: run.stage,
            });
        }
        for role in Role::PREPROD {
            if run.current_artifact(role).is_none() {
                return Err(PipelineError::LockIncomplete { role });
            }
        }

        let spec_hash = run.spec_hash_for_iteration(run.iteration)?;
        run.locked_spec_hash = Some(spec_hash.clone());
        run.locked_iteration = Some(run.iteration);
        run.record_transition(Stage::Gate1, "preprod_locked");
        tracing::info!(run_id = %run.id, spec_hash = %spec_hash, "preproduction locked");
        Ok(spec_hash)
    }

    /// Evaluate the gate the run is sitting at, govern the outcome, and
    /// route. Returns the gate result, the decision, and the stage the
    /// run landed in.
    pub fn run_gate(
        &self,
        run: &mut Run,
    ) -> Result<(GateResult, RetryDecision, Stage), PipelineError> {
        if run.stage.is_terminal() {
            return Err(PipelineError::Terminal { stage: run.stage });
        }
        let gate = match run.stage.gate_number() {
            Some(gate) => gate,
            None => {
                return Err(PipelineError::WrongStage {
                    expected: Stage::Gate0,
                    actual: run.stage,
                })
            }
        };
        let result = gates::evaluate(run, gate, self.profile)?;
        let decision = retry::govern(run, gate, result.passed, self.profile);
        let stage = advance(run, gate, &decision)?;
        Ok((result, decision, stage))
    }
}

/// Route a run according to a governed gate verdict. The only stage
/// mutator; never skips a stage in the forward sequence.
pub fn advance(run: &mut Run, gate: u8, decision: &RetryDecision) -> Result<Stage, PipelineError> {
    if run.stage.is_terminal() {
        return Err(PipelineError::Terminal { stage: run.stage });
    }
    let expected = Stage::for_gate(gate).ok_or(PipelineError::UnknownGate { gate })?;
    if run.stage != expected {
        return Err(PipelineError::WrongStage {
            expected,
            actual: run.stage,
        });
    }

    match decision {
        RetryDecision::Proceed => {
            let next = run
                .stage
                .next()
                .ok_or(PipelineError::Terminal { stage: run.stage })?;
            run.record_transition(next, &format!("gate{gate}_passed"));
        }
        RetryDecision::Retry => {
            route_back(run, gate, &format!("gate{gate}_retry"));
        }
        RetryDecision::Fallback { provider } => {
            run.active_render_provider = provider.clone();
            // The locked record folds in the active provider, so a
            // sanctioned provider switch re-records the lock; gate 4
            // then compares against the provider actually in use.
            if let Some(iteration) = run.locked_iteration {
                run.locked_spec_hash = Some(run.spec_hash_for_iteration(iteration)?);
            }
            route_back(run, gate, &format!("gate{gate}_fallback:{provider}"));
        }
        RetryDecision::Exhausted => {
            run.record_transition(Stage::Failed, &format!("gate{gate}_exhausted"));
        }
    }
    Ok(run.stage)
}

/// Take the gate's fail-back edge. Gate 0 re-runs in place without
/// burning an iteration; gate 1 rebuilds the bundle from scratch, later
/// gates carry the current artifacts forward for targeted resubmission.
fn route_back(run: &mut Run, gate: u8, reason: &str) {
    let target = run.stage.retry_target().unwrap_or(run.stage);
    if gate > 0 {
        run.start_next_iteration(reason, gate != 1);
    }
    run.record_transition(target, reason);
}
