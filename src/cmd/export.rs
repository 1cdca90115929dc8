//! Iteration export and final report commands.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use greenlight::package;
use greenlight::report::RunReport;

use super::load_context;

pub fn cmd_export(data_dir: &Path, run_id: &str, output: Option<&Path>) -> Result<()> {
    let (store, run, _) = load_context(data_dir, run_id)?;
    let manifest = package::package(&run)?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let exports = store.run_dir(run_id).join("exports");
            std::fs::create_dir_all(&exports)
                .with_context(|| format!("Failed to create export directory: {}", exports.display()))?;
            exports.join(format!("iteration-{}.json", manifest.iteration))
        }
    };
    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    store.append_event(
        run_id,
        "iteration_exported",
        serde_json::json!({
            "iteration": manifest.iteration,
            "manifest_hash": manifest.manifest_hash,
        }),
    )?;

    println!(
        "{} iteration {} ({} artifacts)",
        style("Exported").green().bold(),
        manifest.iteration,
        manifest.artifact_hashes.len()
    );
    println!("Manifest: {}", path.display());
    println!("Hash:     {}", manifest.manifest_hash);
    Ok(())
}

pub fn cmd_report(data_dir: &Path, run_id: &str, json: bool) -> Result<()> {
    let (_, run, _) = load_context(data_dir, run_id)?;
    let report = RunReport::from_run(&run);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        for line in report.summary_lines() {
            println!("{line}");
        }
    }
    Ok(())
}
