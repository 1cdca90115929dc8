//! Run profile configuration.
//!
//! A `RunProfile` is loaded once per run from a YAML file and carries
//! every tunable the core consults: gate thresholds and floors, per-gate
//! retry limits, the scorecard aggregation weights for the final gate,
//! provider names (the core never calls providers, it only tracks which
//! one is active and which fallback is available), and the fail-fast
//! switch for cost-constrained runs.
//!
//! # Profile file format
//!
//! ```yaml
//! project_name: aurora-short
//! core_concepts: [diffusion, entropy]
//! fail_fast: false
//!
//! render_candidates:
//!   - name: sora
//!     weighted_score: 0.82
//!     physics: 0.7
//!     human_fidelity: 0.75
//!     identity: 0.8
//!
//! providers:
//!   render_primary: sora
//!   render_fallback: higgsfield
//!
//! thresholds:
//!   videoscore2_threshold: 0.6
//!   identity_drift_ceiling: 0.25
//!
//! retry_limits:
//!   gate1: 3
//!   gate3: 2
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A candidate render model scored during gate 0 eligibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderCandidate {
    pub name: String,
    pub weighted_score: f64,
    pub physics: f64,
    pub human_fidelity: f64,
    pub identity: f64,
}

/// Provider names tracked by the run. The core only records which
/// provider is active; invoking one is the caller's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Providers {
    #[serde(default = "default_render_primary")]
    pub render_primary: String,
    /// Alternate render provider. When set, an exhausted render gate
    /// (gates 3 and 4) yields a FALLBACK decision once per run.
    #[serde(default)]
    pub render_fallback: Option<String>,
    #[serde(default = "default_audio_provider")]
    pub audio: String,
}

fn default_render_primary() -> String {
    "sora".to_string()
}

fn default_audio_provider() -> String {
    "elevenlabs".to_string()
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            render_primary: default_render_primary(),
            render_fallback: None,
            audio: default_audio_provider(),
        }
    }
}

/// Numeric thresholds and floors consulted by the gate evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub gate0_physics_floor: f64,
    pub gate0_human_fidelity_floor: f64,
    pub gate0_identity_floor: f64,

    pub duration_min_s: f64,
    pub duration_max_s: f64,

    pub videoscore2_threshold: f64,
    pub vbench2_physics_floor: f64,
    pub identity_drift_ceiling: f64,
    pub regression_epsilon: f64,

    pub shot_variety_min_types: u32,
    pub max_consecutive_identical_framing: u32,
    pub variety_score_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            gate0_physics_floor: 0.6,
            gate0_human_fidelity_floor: 0.6,
            gate0_identity_floor: 0.6,
            duration_min_s: 90.0,
            duration_max_s: 105.0,
            videoscore2_threshold: 0.6,
            vbench2_physics_floor: 0.6,
            identity_drift_ceiling: 0.25,
            regression_epsilon: 0.1,
            shot_variety_min_types: 3,
            max_consecutive_identical_framing: 2,
            variety_score_threshold: 70.0,
        }
    }
}

/// Maximum retries per gate. A limit of 0 means a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryLimits {
    pub gate0: u32,
    pub gate1: u32,
    pub gate2: u32,
    pub gate3: u32,
    pub gate4: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            gate0: 0,
            gate1: 3,
            gate2: 3,
            gate3: 2,
            gate4: 0,
        }
    }
}

impl RetryLimits {
    pub fn for_gate(&self, gate: u8) -> u32 {
        match gate {
            0 => self.gate0,
            1 => self.gate1,
            2 => self.gate2,
            3 => self.gate3,
            4 => self.gate4,
            _ => 0,
        }
    }
}

/// Weighted aggregation rule for the final scorecard (gate 4). The
/// weights should sum to 1.0; the pass threshold applies to the weighted
/// aggregate on a 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScorecardRule {
    pub narrative_clarity_weight: f64,
    pub mapping_alignment_weight: f64,
    pub cinematic_quality_weight: f64,
    pub consistency_weight: f64,
    pub audio_sync_weight: f64,
    pub pass_threshold: f64,
}

impl Default for ScorecardRule {
    fn default() -> Self {
        Self {
            narrative_clarity_weight: 0.35,
            mapping_alignment_weight: 0.25,
            cinematic_quality_weight: 0.20,
            consistency_weight: 0.10,
            audio_sync_weight: 0.10,
            pass_threshold: 70.0,
        }
    }
}

/// Full run profile. All sections default so a minimal profile is just a
/// project name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunProfile {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Concepts every script must cover (gate 1 coverage metric).
    #[serde(default)]
    pub core_concepts: Vec<String>,
    /// Candidate render models for gate 0 eligibility.
    #[serde(default)]
    pub render_candidates: Vec<RenderCandidate>,
    #[serde(default)]
    pub providers: Providers,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub retry_limits: RetryLimits,
    #[serde(default)]
    pub scorecard: ScorecardRule,
    /// Convert any gate failure directly to EXHAUSTED/FALLBACK,
    /// ignoring the retry budget.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_project_name() -> String {
    "greenlight".to_string()
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            core_concepts: Vec::new(),
            render_candidates: Vec::new(),
            providers: Providers::default(),
            thresholds: Thresholds::default(),
            retry_limits: RetryLimits::default(),
            scorecard: ScorecardRule::default(),
            fail_fast: false,
        }
    }
}

impl RunProfile {
    /// Load and validate a YAML profile.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
        let profile: RunProfile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse profile YAML: {}", path.display()))?;
        Ok(profile)
    }

    /// The fallback provider available to a gate, if any. Only the
    /// render gates (3 and 4) carry a fallback path.
    pub fn fallback_provider_for_gate(&self, gate: u8) -> Option<&str> {
        match gate {
            3 | 4 => self.providers.render_fallback.as_deref(),
            _ => None,
        }
    }
}
