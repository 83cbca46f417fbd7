//! Mitigate command implementation.

use anyhow::Result;
use console::style;

use qforge::{QForge, QForgeConfig};

use super::common::{load_circuit, print_json};
use crate::OutputFormat;

/// Execute the mitigate command.
pub fn execute(
    config: QForgeConfig,
    input: &str,
    provider: &str,
    format: OutputFormat,
) -> Result<()> {
    let qf = QForge::new(config)?;
    let circuit = load_circuit(&qf, input)?;
    let strategies = qf.recommend_mitigations(&circuit, provider)?;

    if format == OutputFormat::Json {
        return print_json(&strategies);
    }

    if strategies.is_empty() {
        println!(
            "{} No mitigation needed for {} on {}",
            style("✓").green().bold(),
            style(input).green(),
            style(provider).yellow()
        );
        return Ok(());
    }

    println!(
        "{} {} mitigation(s) for {} on {}:\n",
        style("→").cyan().bold(),
        strategies.len(),
        style(input).green(),
        style(provider).yellow()
    );
    for strategy in &strategies {
        println!(
            "  {} {}  +{:.4} fidelity, ×{:.2} overhead",
            style("●").cyan(),
            style(strategy.technique).bold(),
            strategy.fidelity_improvement_estimate,
            strategy.overhead_multiplier
        );
        for condition in &strategy.applicability_conditions {
            println!("      {}", style(condition).dim());
        }
    }

    Ok(())
}
