//! Typed error hierarchy for the greenlight pipeline.
//!
//! Two top-level enums cover the core:
//! - `ValidationError` — artifact submissions rejected before any state
//!   change (structural, referential, uniqueness, ordering)
//! - `PipelineError` — sequencing and lifecycle failures (out-of-sequence
//!   operations, retry exhaustion, incomplete exports)
//!
//! Gate threshold failures are deliberately *not* errors: a failing
//! `GateResult` is a first-class return value that drives retry routing.

use thiserror::Error;

use crate::role::Role;
use crate::stage::Stage;

/// Discriminant for the four validation failure classes exposed at the
/// submission interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Structural,
    Referential,
    Uniqueness,
    Ordering,
}

/// A rejected artifact submission. The run's artifact store is unchanged
/// whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("structural: field '{field}' {constraint}")]
    Structural { field: String, constraint: String },

    #[error("referential: field '{field}' references unknown {target} artifact '{missing_id}'")]
    Referential {
        field: String,
        target: Role,
        missing_id: String,
    },

    #[error("uniqueness: duplicate {field} {value}")]
    Uniqueness { field: String, value: String },

    #[error("ordering: {field} {detail}")]
    Ordering { field: String, detail: String },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationError::Structural { .. } => ValidationKind::Structural,
            ValidationError::Referential { .. } => ValidationKind::Referential,
            ValidationError::Uniqueness { .. } => ValidationKind::Uniqueness,
            ValidationError::Ordering { .. } => ValidationKind::Ordering,
        }
    }

    /// Structural error from a serde deserialization failure.
    pub fn from_parse(role: Role, err: &serde_json::Error) -> Self {
        ValidationError::Structural {
            field: role.to_string(),
            constraint: err.to_string(),
        }
    }
}

/// Errors from run sequencing and lifecycle operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("role '{role}' cannot submit in stage {stage}")]
    OutOfSequence { role: Role, stage: Stage },

    #[error("operation requires stage {expected}, run is in {actual}")]
    WrongStage { expected: Stage, actual: Stage },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("gate {gate} retries exhausted after {attempts} attempt(s)")]
    RetryExhausted { gate: u8, attempts: u32 },

    #[error("no gate numbered {gate}; gates are 0-4")]
    UnknownGate { gate: u8 },

    #[error("failed to compute spec hash: {0}")]
    SpecHash(#[from] serde_json::Error),

    #[error("preproduction lock blocked: missing '{role}' artifact")]
    LockIncomplete { role: Role },

    #[error("packaging failed: missing artifact(s) for role(s): {}", missing.join(", "))]
    Packaging { missing: Vec<String> },

    #[error("run '{id}' not found")]
    UnknownRun { id: String },

    #[error("run is terminal ({stage}); no further operations allowed")]
    Terminal { stage: Stage },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_kinds_are_distinct() {
        let structural = ValidationError::Structural {
            field: "duration_s".into(),
            constraint: "must be positive".into(),
        };
        let uniqueness = ValidationError::Uniqueness {
            field: "beat_id".into(),
            value: "b1".into(),
        };
        assert_eq!(structural.kind(), ValidationKind::Structural);
        assert_eq!(uniqueness.kind(), ValidationKind::Uniqueness);
        assert_ne!(structural.kind(), uniqueness.kind());
    }

    #[test]
    fn referential_error_names_missing_identifier() {
        let err = ValidationError::Referential {
            field: "direction_pack_id".into(),
            target: Role::Direction,
            missing_id: "deadbeef".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("direction_pack_id"));
        assert!(msg.contains("deadbeef"));
        assert_eq!(err.kind(), ValidationKind::Referential);
    }

    #[test]
    fn out_of_sequence_names_role_and_stage() {
        let err = PipelineError::OutOfSequence {
            role: Role::Audio,
            stage: Stage::CollectShowrunner,
        };
        let msg = err.to_string();
        assert!(msg.contains("audio"));
        assert!(msg.contains("COLLECT_SHOWRUNNER"));
    }

    #[test]
    fn pipeline_error_converts_from_validation_error() {
        let inner = ValidationError::Ordering {
            field: "beats".into(),
            detail: "segments overlap".into(),
        };
        let err: PipelineError = inner.into();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn spec_hash_error_wraps_serialization_failure() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PipelineError = inner.into();
        assert!(matches!(err, PipelineError::SpecHash(_)));
        assert!(err.to_string().contains("spec hash"));
    }

    #[test]
    fn lock_incomplete_names_missing_role() {
        let err = PipelineError::LockIncomplete { role: Role::Audio };
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn packaging_error_lists_missing_roles() {
        let err = PipelineError::Packaging {
            missing: vec!["showrunner".into(), "audio".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("showrunner"));
        assert!(msg.contains("audio"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ValidationError::Uniqueness {
            field: "shot_id".into(),
            value: "s7".into(),
        });
        assert_std_error(&PipelineError::RetryExhausted { gate: 3, attempts: 2 });
    }
}
