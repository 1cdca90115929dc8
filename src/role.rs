//! The seven canonical production roles and the fixed artifact registry.
//!
//! Each role submits exactly one artifact type. Cross-artifact reference
//! fields are declared here as a static registry, resolved once, rather
//! than dispatched dynamically per submission: the validator walks
//! `Role::references()` and checks each declared field against the run's
//! current artifact set.

use serde::{Deserialize, Serialize};

/// A production role, in canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Showrunner,
    Direction,
    DanceMapping,
    Cinematography,
    Audio,
    DryrunMetrics,
    FinalMetrics,
}

/// A declared cross-artifact reference: `field` in this role's payload
/// must equal the content hash of the current `target` artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub field: &'static str,
    pub target: Role,
}

impl Role {
    /// All roles, canonical order.
    pub const ALL: [Role; 7] = [
        Role::Showrunner,
        Role::Direction,
        Role::DanceMapping,
        Role::Cinematography,
        Role::Audio,
        Role::DryrunMetrics,
        Role::FinalMetrics,
    ];

    /// The preproduction roles frozen at LOCK_PREPROD, canonical order.
    pub const PREPROD: [Role; 5] = [
        Role::Showrunner,
        Role::Direction,
        Role::DanceMapping,
        Role::Cinematography,
        Role::Audio,
    ];

    /// Declared foreign-key fields for this role's artifact.
    pub fn references(&self) -> &'static [ReferenceField] {
        match self {
            Role::DanceMapping => &[ReferenceField {
                field: "direction_pack_id",
                target: Role::Direction,
            }],
            Role::Cinematography => &[ReferenceField {
                field: "dance_mapping_id",
                target: Role::DanceMapping,
            }],
            Role::Audio => &[ReferenceField {
                field: "cinematography_id",
                target: Role::Cinematography,
            }],
            _ => &[],
        }
    }

    /// Whether this role is one of the metrics roles submitted during
    /// render stages rather than during a dedicated collect stage.
    pub fn is_metrics(&self) -> bool {
        matches!(self, Role::DryrunMetrics | Role::FinalMetrics)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Showrunner => "showrunner",
            Role::Direction => "direction",
            Role::DanceMapping => "dance_mapping",
            Role::Cinematography => "cinematography",
            Role::Audio => "audio",
            Role::DryrunMetrics => "dryrun_metrics",
            Role::FinalMetrics => "final_metrics",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "showrunner" => Ok(Role::Showrunner),
            "direction" => Ok(Role::Direction),
            "dance_mapping" => Ok(Role::DanceMapping),
            "cinematography" => Ok(Role::Cinematography),
            "audio" => Ok(Role::Audio),
            "dryrun_metrics" => Ok(Role::DryrunMetrics),
            "final_metrics" => Ok(Role::FinalMetrics),
            _ => anyhow::bail!(
                "Invalid role '{}'. Valid values: showrunner, direction, dance_mapping, \
                 cinematography, audio, dryrun_metrics, final_metrics",
                s
            ),
        }
    }
}
