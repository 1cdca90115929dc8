//! Gate evaluation command: evaluate, govern, route, persist.

use anyhow::Result;
use console::style;
use std::path::Path;

use greenlight::machine::Pipeline;
use greenlight::retry::RetryDecision;

use super::load_context;

pub fn cmd_gate(data_dir: &Path, run_id: &str) -> Result<()> {
    let (store, mut run, profile) = load_context(data_dir, run_id)?;
    let pipeline = Pipeline::new(&profile);
    let (result, decision, stage) = pipeline.run_gate(&mut run)?;
    store.save(&run)?;
    store.append_event(
        run_id,
        "gate_evaluated",
        serde_json::json!({
            "gate": result.gate,
            "passed": result.passed,
            "overall_score": result.overall_score,
            "iteration": result.iteration,
        }),
    )?;
    if let RetryDecision::Fallback { provider } = &decision {
        store.append_event(
            run_id,
            "fallback_requested",
            serde_json::json!({ "gate": result.gate, "provider": provider }),
        )?;
    }

    let verdict = if result.passed {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    println!(
        "Gate {} {} (score {:.2}, iteration {})",
        result.gate, verdict, result.overall_score, result.iteration
    );
    for reason in &result.reasons {
        println!("  - {reason}");
    }
    if !result.fix_instructions.is_empty() {
        println!("Fixes:");
        for fix in &result.fix_instructions {
            println!("  - {fix}");
        }
    }
    match &decision {
        RetryDecision::Proceed => {}
        RetryDecision::Retry => println!("{}", style("Retry scheduled; resubmit and rerun.").yellow()),
        RetryDecision::Fallback { provider } => {
            println!("{}", style(format!("Falling back to provider {provider}.")).yellow())
        }
        RetryDecision::Exhausted => println!("{}", style("Retries exhausted; run failed.").red()),
    }
    println!("Stage: {stage}");
    Ok(())
}
