//! Run creation, status, and listing commands.

use anyhow::Result;
use console::style;
use std::path::Path;

use greenlight::config::RunProfile;
use greenlight::machine::Pipeline;
use greenlight::role::Role;
use greenlight::run::RunStore;

use super::{load_context, save_profile};

pub fn cmd_create_run(data_dir: &Path, profile_path: Option<&Path>) -> Result<()> {
    let profile = match profile_path {
        Some(path) => RunProfile::load(path)?,
        None => RunProfile::default(),
    };

    let pipeline = Pipeline::new(&profile);
    let run = pipeline.create_run()?;

    let store = RunStore::new(data_dir);
    store.save(&run)?;
    save_profile(&store, &run.id, &profile)?;
    store.append_event(
        &run.id,
        "run_created",
        serde_json::json!({ "run_id": run.id, "project": run.project_name }),
    )?;

    println!(
        "{} run {} ({})",
        style("Created").green().bold(),
        run.id,
        run.project_name
    );
    println!("Stage: {}", run.stage);
    Ok(())
}

pub fn cmd_status(data_dir: &Path, run_id: &str) -> Result<()> {
    let (_, run, _) = load_context(data_dir, run_id)?;

    println!("Run:       {} ({})", run.id, run.project_name);
    println!("Stage:     {}", run.stage);
    println!("Iteration: {}", run.iteration);
    println!("Provider:  {}", run.active_render_provider);
    if let Some(hash) = &run.locked_spec_hash {
        println!("Locked:    {}", &hash[..16.min(hash.len())]);
    }

    println!();
    println!("Artifacts:");
    for role in Role::ALL {
        match run.current_hash(role) {
            Some(hash) => println!(
                "  {:<16} {}",
                role.to_string(),
                style(&hash[..16.min(hash.len())]).dim()
            ),
            None => println!("  {:<16} {}", role.to_string(), style("missing").dim()),
        }
    }

    if !run.gate_history.is_empty() {
        println!();
        println!("Gate history:");
        for result in &run.gate_history {
            let verdict = if result.passed {
                style("pass").green()
            } else {
                style("fail").red()
            };
            println!(
                "  gate{} iteration {} {} (score {:.2})",
                result.gate, result.iteration, verdict, result.overall_score
            );
        }
    }
    Ok(())
}

pub fn cmd_list(data_dir: &Path) -> Result<()> {
    let store = RunStore::new(data_dir);
    let ids = store.list_runs()?;
    if ids.is_empty() {
        println!("No runs found in {}", data_dir.display());
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}
