//! Retry governance: converting gate failures into routing decisions.
//!
//! The governor owns the per-gate failure counters and the one-shot
//! fallback flag. It decides; the state machine routes. A FALLBACK
//! decision resets the gate's counter so the alternate provider gets the
//! same retry budget, and consumes the gate's fallback flag so the next
//! exhaustion is terminal.

use serde::{Deserialize, Serialize};

use crate::config::RunProfile;
use crate::run::Run;

/// Routing decision after a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum RetryDecision {
    /// Gate passed; advance.
    Proceed,
    /// Failure within budget; resubmit and re-evaluate.
    Retry,
    /// Budget exhausted but an unused fallback provider exists.
    Fallback { provider: String },
    /// Budget exhausted with no fallback left; terminal.
    Exhausted,
}

/// Record one gate attempt and decide the route. Counters only move on
/// failure; a pass never consumes budget.
pub fn govern(run: &mut Run, gate: u8, passed: bool, profile: &RunProfile) -> RetryDecision {
    if passed {
        return RetryDecision::Proceed;
    }

    let attempts = run.bump_retry_count(gate);
    let limit = profile.retry_limits.for_gate(gate);
    let within_budget = !profile.fail_fast && attempts <= limit;

    let decision = if within_budget {
        RetryDecision::Retry
    } else {
        match profile.fallback_provider_for_gate(gate) {
            Some(provider) if !run.fallback_used.contains(&gate) => {
                run.fallback_used.insert(gate);
                run.retry_counts.insert(gate, 0);
                RetryDecision::Fallback {
                    provider: provider.to_string(),
                }
            }
            _ => RetryDecision::Exhausted,
        }
    };

    tracing::info!(
        run_id = %run.id,
        gate,
        attempts,
        limit,
        decision = ?decision,
        "gate failure governed"
    );
    decision
}
