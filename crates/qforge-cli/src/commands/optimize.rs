//! Optimize command implementation.

use anyhow::{Context, Result};
use console::style;

use qforge::{OptimizationStage, QForge, QForgeConfig};

use super::common::{load_circuit, print_json, save_circuit, styled_fidelity};
use crate::OutputFormat;

/// Execute the optimize command.
pub fn execute(
    config: QForgeConfig,
    input: &str,
    provider: &str,
    stages: &[String],
    output: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let qf = QForge::new(config)?;
    let circuit = load_circuit(&qf, input)?;

    let stages = if stages.is_empty() {
        None
    } else {
        Some(OptimizationStage::parse_list(stages).context("Invalid --stages")?)
    };

    let result = qf.optimize_circuit(&circuit, provider, stages.as_deref())?;

    if let Some(path) = output {
        save_circuit(&qf, &result.optimized_circuit, path)?;
    }

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    println!(
        "{} Optimized {} for provider {} ({})",
        style("✓").green().bold(),
        style(input).green(),
        style(provider).yellow(),
        result.algorithm_name
    );
    println!(
        "  Gates: {} → {}  Depth: {} → {}",
        circuit.num_gates(),
        result.optimized_circuit.num_gates(),
        circuit.depth(),
        result.optimized_circuit.depth()
    );
    println!(
        "  Gate reduction {:>6.1}%   depth reduction {:>6.1}%",
        result.impact.gate_reduction_pct, result.impact.depth_reduction_pct
    );
    println!(
        "  Cost savings   {:>6.1}%   fidelity change {:>+6.2}%",
        result.impact.cost_savings_pct, result.impact.fidelity_improvement_pct
    );
    println!(
        "  Expected fidelity: {}",
        styled_fidelity(result.expected_fidelity)
    );

    println!("\n  {:<22} {:>7} {:>7} {:>9}", "STAGE", "GATES", "DEPTH", "FIDELITY");
    for impact in &result.stage_impacts {
        let name = if impact.ran {
            style(impact.stage.name()).cyan()
        } else {
            style(impact.stage.name()).dim()
        };
        println!(
            "  {:<22} {:>7} {:>7} {:>9.4}",
            name, impact.after.gates, impact.after.depth, impact.after.fidelity
        );
    }

    if let Some(path) = output {
        println!("\n  Output: {}", style(path).green());
    }

    Ok(())
}
