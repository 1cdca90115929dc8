//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled              |
//! |------------|-------------------------------|
//! | `run`      | `CreateRun`, `Status`, `List` |
//! | `artifact` | `Submit`, `Lock`              |
//! | `gate`     | `Gate`                        |
//! | `export`   | `Export`, `Report`            |

pub mod artifact;
pub mod export;
pub mod gate;
pub mod run;

pub use artifact::{cmd_lock, cmd_submit};
pub use export::{cmd_export, cmd_report};
pub use gate::cmd_gate;
pub use run::{cmd_create_run, cmd_list, cmd_status};

use anyhow::{Context, Result};
use std::path::Path;

use greenlight::config::RunProfile;
use greenlight::errors::PipelineError;
use greenlight::run::{Run, RunStore};

/// Load a run and the profile it was created with.
pub(crate) fn load_context(data_dir: &Path, run_id: &str) -> Result<(RunStore, Run, RunProfile)> {
    let store = RunStore::new(data_dir);
    if !store.run_dir(run_id).exists() {
        return Err(PipelineError::UnknownRun {
            id: run_id.to_string(),
        }
        .into());
    }
    let run = store.load(run_id)?;
    let profile_path = store.run_dir(run_id).join("profile.yaml");
    let profile = RunProfile::load(&profile_path)?;
    Ok((store, run, profile))
}

/// Persist the profile beside the run state so later invocations see the
/// same thresholds the run was created with.
pub(crate) fn save_profile(store: &RunStore, run_id: &str, profile: &RunProfile) -> Result<()> {
    let yaml = serde_yaml::to_string(profile).context("Failed to serialize run profile")?;
    let path = store.run_dir(run_id).join("profile.yaml");
    std::fs::write(&path, yaml)
        .with_context(|| format!("Failed to write profile: {}", path.display()))?;
    Ok(())
}
