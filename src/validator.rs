//! Artifact validation: structural, semantic, and referential checks.
//!
//! `validate` is pure with respect to the run: it reads the current
//! artifact set to resolve declared references but never writes. Callers
//! (the state machine's `submit`) store the returned record only on
//! success, so a rejected submission leaves the run untouched.

use chrono::Utc;

use crate::artifacts::ArtifactPayload;
use crate::errors::ValidationError;
use crate::hash::sha256_canonical;
use crate::role::Role;
use crate::run::{ArtifactRecord, Run, SCHEMA_VERSION};

/// Validate a raw JSON submission for a role against the run's current
/// artifact set. Returns a ready-to-store record on success.
pub fn validate(
    run: &Run,
    role: Role,
    raw: &serde_json::Value,
) -> Result<ArtifactRecord, ValidationError> {
    // Structural: typed parse, then range checks.
    let payload = ArtifactPayload::parse(role, raw)?;
    payload.validate()?;

    // Normalize through the typed payload so optional fields and
    // defaults never affect the content hash.
    let normalized =
        serde_json::to_value(&payload).map_err(|e| ValidationError::from_parse(role, &e))?;

    // Referential: every declared foreign-key field must name the
    // current artifact of its target role.
    for reference in role.references() {
        let declared = normalized
            .get(reference.field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::Structural {
                field: reference.field.to_string(),
                constraint: "must be a string artifact identifier".to_string(),
            })?;
        match run.current_hash(reference.target) {
            Some(hash) if hash == declared => {}
            _ => {
                return Err(ValidationError::Referential {
                    field: reference.field.to_string(),
                    target: reference.target,
                    missing_id: declared.to_string(),
                });
            }
        }
    }

    let content_hash =
        sha256_canonical(&normalized).map_err(|e| ValidationError::from_parse(role, &e))?;

    Ok(ArtifactRecord {
        role,
        schema_version: SCHEMA_VERSION,
        payload: normalized,
        content_hash,
        iteration: run.iteration,
        submitted_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunProfile;
    use crate::errors::ValidationKind;
    use serde_json::json;

    pub(crate) fn script_json() -> serde_json::Value {
        json!({
            "concept_thesis": "order decays into motion",
            "beats": [
                {
                    "beat_id": "b1",
                    "start_s": 0.0,
                    "end_s": 45.0,
                    "science_claim": "entropy increases",
                    "dance_metaphor": "scattering ensemble",
                    "visual_motif": "dispersing particles",
                    "emotion_intention": "wonder"
                },
                {
                    "beat_id": "b2",
                    "start_s": 45.0,
                    "end_s": 95.0,
                    "science_claim": "diffusion evens gradients",
                    "dance_metaphor": "slow interleaving lines",
                    "visual_motif": "ink in water",
                    "emotion_intention": "calm"
                }
            ]
        })
    }

    pub(crate) fn direction_json() -> serde_json::Value {
        json!({
            "iteration_goal": "establish the thesis visually",
            "style_references": ["pina bausch"],
            "must_include": ["dispersing particles"],
            "avoid": ["text overlays"]
        })
    }

    pub(crate) fn dance_mapping_json(direction_pack_id: &str) -> serde_json::Value {
        json!({
            "direction_pack_id": direction_pack_id,
            "mappings": [
                {
                    "beat_id": "b1",
                    "motion_description": "bodies scatter from a cluster",
                    "symbolism": "entropy",
                    "motif_tag": "dispersing particles",
                    "contrast_pattern": "stillness to burst"
                },
                {
                    "beat_id": "b2",
                    "motion_description": "lines interleave and settle",
                    "symbolism": "diffusion",
                    "motif_tag": "ink in water",
                    "contrast_pattern": "chaos to lattice"
                }
            ]
        })
    }

    fn new_run() -> Run {
        Run::new(&RunProfile::default()).unwrap()
    }

    #[test]
    fn test_valid_script_is_accepted() {
        let run = new_run();
        let record = validate(&run, Role::Showrunner, &script_json()).unwrap();
        assert_eq!(record.role, Role::Showrunner);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(record.iteration, 1);
        assert!(!record.content_hash.is_empty());
    }

    #[test]
    fn test_missing_field_is_structural_and_cites_field() {
        let run = new_run();
        let mut raw = script_json();
        raw.as_object_mut().unwrap().remove("concept_thesis");
        let err = validate(&run, Role::Showrunner, &raw).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::Structural);
        assert!(err.to_string().contains("concept_thesis"));
    }

    #[test]
    fn test_dangling_direction_pack_id_is_referential() {
        let run = new_run();
        let err = validate(&run, Role::DanceMapping, &dance_mapping_json("no-such-id"))
            .unwrap_err();
        assert_eq!(err.kind(), ValidationKind::Referential);
        assert!(err.to_string().contains("no-such-id"));
        assert!(err.to_string().contains("direction_pack_id"));
    }

    #[test]
    fn test_matching_reference_is_accepted() {
        let mut run = new_run();
        let direction = validate(&run, Role::Direction, &direction_json()).unwrap();
        let direction_id = direction.content_hash.clone();
        run.store_artifact(direction);

        let record =
            validate(&run, Role::DanceMapping, &dance_mapping_json(&direction_id)).unwrap();
        assert_eq!(record.role, Role::DanceMapping);
    }

    #[test]
    fn test_stale_reference_after_resubmission_is_rejected() {
        let mut run = new_run();
        let direction = validate(&run, Role::Direction, &direction_json()).unwrap();
        let stale_id = direction.content_hash.clone();
        run.store_artifact(direction);

        // Direction pack is replaced; the old id no longer resolves.
        let mut updated = direction_json();
        updated["iteration_goal"] = json!("push the contrast harder");
        let replacement = validate(&run, Role::Direction, &updated).unwrap();
        run.store_artifact(replacement);

        let err = validate(&run, Role::DanceMapping, &dance_mapping_json(&stale_id))
            .unwrap_err();
        assert_eq!(err.kind(), ValidationKind::Referential);
    }

    #[test]
    fn test_duplicate_beat_id_rejected_with_uniqueness() {
        let run = new_run();
        let mut raw = script_json();
        raw["beats"][1]["beat_id"] = json!("b1");
        let err = validate(&run, Role::Showrunner, &raw).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::Uniqueness);
        assert!(err.to_string().contains("b1"));
    }

    #[test]
    fn test_content_hash_ignores_optional_field_spelling() {
        let run = new_run();
        let implicit = validate(&run, Role::Direction, &direction_json()).unwrap();

        let mut explicit_raw = direction_json();
        explicit_raw["notes"] = json!("");
        let explicit = validate(&run, Role::Direction, &explicit_raw).unwrap();

        // Omitted defaults and explicit defaults normalize identically.
        assert_eq!(implicit.content_hash, explicit.content_hash);
    }

    #[test]
    fn test_validation_does_not_mutate_run() {
        let run = new_run();
        let before = run.artifacts.len();
        let _ = validate(&run, Role::DanceMapping, &dance_mapping_json("dangling"));
        assert_eq!(run.artifacts.len(), before);
    }
}
