//! Artifact submission and the preproduction lock.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::str::FromStr;

use greenlight::machine::Pipeline;
use greenlight::role::Role;

use super::load_context;

pub fn cmd_submit(data_dir: &Path, run_id: &str, role: &str, file: &Path) -> Result<()> {
    let role = Role::from_str(role)?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read artifact file: {}", file.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Artifact file is not valid JSON: {}", file.display()))?;

    let (store, mut run, profile) = load_context(data_dir, run_id)?;
    let pipeline = Pipeline::new(&profile);
    let hash = pipeline.submit(&mut run, role, &raw)?;
    store.save(&run)?;
    store.append_event(
        run_id,
        "artifact_submitted",
        serde_json::json!({ "role": role.to_string(), "hash": hash }),
    )?;

    println!(
        "{} {} artifact {}",
        style("Accepted").green().bold(),
        role,
        &hash[..16]
    );
    println!("Stage: {}", run.stage);
    Ok(())
}

pub fn cmd_lock(data_dir: &Path, run_id: &str) -> Result<()> {
    let (store, mut run, profile) = load_context(data_dir, run_id)?;
    let pipeline = Pipeline::new(&profile);
    let spec_hash = pipeline.lock_preprod(&mut run)?;
    store.save(&run)?;
    store.append_event(
        run_id,
        "preprod_locked",
        serde_json::json!({ "spec_hash": spec_hash, "iteration": run.iteration }),
    )?;

    println!(
        "{} preproduction bundle (spec hash {})",
        style("Locked").green().bold(),
        &spec_hash[..16]
    );
    println!("Stage: {}", run.stage);
    Ok(())
}
