//! Run stages and the canonical transition order.
//!
//! Stages advance strictly forward through a fixed sequence; the only
//! backward edges are the per-gate fail-back edges taken on a RETRY
//! verdict, and the jump to the terminal FAILED stage on exhaustion.

use serde::{Deserialize, Serialize};

use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "GATE0")]
    Gate0,
    #[serde(rename = "COLLECT_SHOWRUNNER")]
    CollectShowrunner,
    #[serde(rename = "COLLECT_DIRECTION")]
    CollectDirection,
    #[serde(rename = "COLLECT_DANCE_MAPPING")]
    CollectDanceMapping,
    #[serde(rename = "COLLECT_CINEMATOGRAPHY")]
    CollectCinematography,
    #[serde(rename = "COLLECT_AUDIO")]
    CollectAudio,
    #[serde(rename = "LOCK_PREPROD")]
    LockPreprod,
    #[serde(rename = "GATE1")]
    Gate1,
    #[serde(rename = "GATE2")]
    Gate2,
    #[serde(rename = "DRYRUN")]
    Dryrun,
    #[serde(rename = "GATE3")]
    Gate3,
    #[serde(rename = "FINAL_RENDER")]
    FinalRender,
    #[serde(rename = "GATE4")]
    Gate4,
    #[serde(rename = "COMPLETE")]
    Complete,
    #[serde(rename = "FAILED")]
    Failed,
}

impl Stage {
    /// The canonical forward sequence, INIT through COMPLETE. FAILED is
    /// not part of the sequence; it is reachable from any gate.
    pub const SEQUENCE: [Stage; 15] = [
        Stage::Init,
        Stage::Gate0,
        Stage::CollectShowrunner,
        Stage::CollectDirection,
        Stage::CollectDanceMapping,
        Stage::CollectCinematography,
        Stage::CollectAudio,
        Stage::LockPreprod,
        Stage::Gate1,
        Stage::Gate2,
        Stage::Dryrun,
        Stage::Gate3,
        Stage::FinalRender,
        Stage::Gate4,
        Stage::Complete,
    ];

    /// The next stage in the canonical order, if any.
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::SEQUENCE.iter().position(|s| s == self)?;
        Stage::SEQUENCE.get(idx + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    pub fn is_gate(&self) -> bool {
        self.gate_number().is_some()
    }

    /// Gate number for gate stages (0-4).
    pub fn gate_number(&self) -> Option<u8> {
        match self {
            Stage::Gate0 => Some(0),
            Stage::Gate1 => Some(1),
            Stage::Gate2 => Some(2),
            Stage::Gate3 => Some(3),
            Stage::Gate4 => Some(4),
            _ => None,
        }
    }

    /// The gate stage for a gate number.
    pub fn for_gate(gate: u8) -> Option<Stage> {
        match gate {
            0 => Some(Stage::Gate0),
            1 => Some(Stage::Gate1),
            2 => Some(Stage::Gate2),
            3 => Some(Stage::Gate3),
            4 => Some(Stage::Gate4),
            _ => None,
        }
    }

    /// Roles allowed to submit while the run is in this stage.
    pub fn accepts(&self) -> &'static [Role] {
        match self {
            Stage::CollectShowrunner => &[Role::Showrunner],
            Stage::CollectDirection => &[Role::Direction],
            Stage::CollectDanceMapping => &[Role::DanceMapping],
            Stage::CollectCinematography => &[Role::Cinematography],
            Stage::CollectAudio => &[Role::Audio],
            Stage::Dryrun => &[Role::DryrunMetrics],
            Stage::FinalRender => &[Role::DryrunMetrics, Role::FinalMetrics],
            _ => &[],
        }
    }

    /// The fail-back stage entered when a gate fails with retries left.
    /// Gate 0 re-runs in place; later gates return to the stage whose
    /// artifacts must be resubmitted.
    pub fn retry_target(&self) -> Option<Stage> {
        match self {
            Stage::Gate0 => Some(Stage::Gate0),
            Stage::Gate1 => Some(Stage::CollectShowrunner),
            Stage::Gate2 => Some(Stage::CollectDirection),
            Stage::Gate3 => Some(Stage::Dryrun),
            Stage::Gate4 => Some(Stage::FinalRender),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "INIT",
            Stage::Gate0 => "GATE0",
            Stage::CollectShowrunner => "COLLECT_SHOWRUNNER",
            Stage::CollectDirection => "COLLECT_DIRECTION",
            Stage::CollectDanceMapping => "COLLECT_DANCE_MAPPING",
            Stage::CollectCinematography => "COLLECT_CINEMATOGRAPHY",
            Stage::CollectAudio => "COLLECT_AUDIO",
            Stage::LockPreprod => "LOCK_PREPROD",
            Stage::Gate1 => "GATE1",
            Stage::Gate2 => "GATE2",
            Stage::Dryrun => "DRYRUN",
            Stage::Gate3 => "GATE3",
            Stage::FinalRender => "FINAL_RENDER",
            Stage::Gate4 => "GATE4",
            Stage::Complete => "COMPLETE",
            Stage::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}
