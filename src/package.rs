//! Iteration packaging: content-addressed export manifests.
//!
//! A manifest lists the content hash of every current artifact plus an
//! aggregate hash over the sorted hash list. Two independent
//! recomputations over identical artifact content yield identical
//! manifests, so exports are comparable across machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::PipelineError;
use crate::hash::sha256_canonical;
use crate::role::Role;
use crate::run::Run;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationManifest {
    pub run_id: String,
    pub iteration: u32,
    pub generated_at: DateTime<Utc>,
    /// Role name to content hash for every current artifact.
    pub artifact_hashes: BTreeMap<String, String>,
    /// Hash of the sorted per-artifact hash list.
    pub manifest_hash: String,
}

/// Package the run's current artifact set into a manifest. Requires the
/// full preproduction bundle; metrics artifacts are included when
/// present.
pub fn package(run: &Run) -> Result<IterationManifest, PipelineError> {
    let missing: Vec<String> = Role::PREPROD
        .iter()
        .filter(|role| run.current_artifact(**role).is_none())
        .map(|role| role.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Packaging { missing });
    }

    let mut artifact_hashes = BTreeMap::new();
    for role in Role::ALL {
        if let Some(hash) = run.current_hash(role) {
            artifact_hashes.insert(role.to_string(), hash.to_string());
        }
    }

    let mut sorted: Vec<&String> = artifact_hashes.values().collect();
    sorted.sort();
    let manifest_hash = sha256_canonical(&sorted).map_err(|_| PipelineError::Packaging {
        missing: vec!["manifest".to_string()],
    })?;

    Ok(IterationManifest {
        run_id: run.id.clone(),
        iteration: run.iteration,
        generated_at: Utc::now(),
        artifact_hashes,
        manifest_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunProfile;
    use crate::hash::sha256_canonical;
    use crate::run::{ArtifactRecord, SCHEMA_VERSION};
    use serde_json::json;

    fn record(role: Role, payload: serde_json::Value) -> ArtifactRecord {
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

    fn full_run() -> Run {
        let mut run = Run::new(&RunProfile::default()).unwrap();
        for (i, role) in Role::PREPROD.iter().enumerate() {
            run.store_artifact(record(*role, json!({ "n": i })));
        }
        run
    }

    #[test]
    fn test_package_lists_every_current_artifact() {
        let mut run = full_run();
        run.store_artifact(record(Role::DryrunMetrics, json!({"m": 1})));
        let manifest = package(&run).unwrap();
        assert_eq!(manifest.artifact_hashes.len(), 6);
        assert_eq!(manifest.run_id, run.id);
        assert_eq!(
            manifest.artifact_hashes["showrunner"],
            run.current_hash(Role::Showrunner).unwrap()
        );
    }

    #[test]
    fn test_package_missing_preprod_role_fails_and_names_it() {
        let mut run = full_run();
        run.artifacts.remove(&Role::Audio);
        let err = package(&run).unwrap_err();
        match err {
            PipelineError::Packaging { missing } => {
                assert_eq!(missing, vec!["audio".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_manifest_hash_is_idempotent() {
        let run = full_run();
        let first = package(&run).unwrap();
        let second = package(&run).unwrap();
        assert_eq!(first.manifest_hash, second.manifest_hash);
        assert_eq!(first.artifact_hashes, second.artifact_hashes);
    }

    #[test]
    fn test_manifest_hash_tracks_content_changes() {
        let mut run = full_run();
        let before = package(&run).unwrap().manifest_hash;
        run.store_artifact(record(Role::Showrunner, json!({"changed": true})));
        let after = package(&run).unwrap().manifest_hash;
        assert_ne!(before, after);
    }

    #[test]
    fn test_identical_content_on_distinct_runs_gives_same_aggregate() {
        // Content addressing: the aggregate depends only on artifact
        // content, not on run identity or timestamps.
        let run_a = full_run();
        let run_b = full_run();
        assert_eq!(
            package(&run_a).unwrap().manifest_hash,
            package(&run_b).unwrap().manifest_hash
        );
    }
}
