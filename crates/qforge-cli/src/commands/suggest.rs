//! Suggest command implementation.

use anyhow::Result;
use console::style;

use qforge::{QForge, QForgeConfig};

use super::common::{load_circuit, print_json, styled_fidelity};
use crate::OutputFormat;

/// Execute the suggest command.
pub fn execute(config: QForgeConfig, input: &str, format: OutputFormat) -> Result<()> {
    let qf = QForge::new(config)?;
    let circuit = load_circuit(&qf, input)?;
    let ranked = qf.suggest_provider(&circuit)?;

    if format == OutputFormat::Json {
        return print_json(&ranked);
    }

    println!(
        "{} {} candidate provider(s) for {} ({} qubits):\n",
        style("→").cyan().bold(),
        ranked.len(),
        style(input).green(),
        circuit.num_qubits()
    );
    println!(
        "  {:<4} {:<10} {:>9} {:>14} {:>10}",
        style("RANK").bold(),
        style("PROVIDER").bold(),
        style("FIDELITY").bold(),
        style("RUNTIME (µs)").bold(),
        style("PRICE").bold()
    );
    for (rank, candidate) in ranked.iter().enumerate() {
        println!(
            "  {:<4} {:<10} {:>9} {:>14.1} {:>10.3}",
            rank + 1,
            candidate.provider,
            styled_fidelity(candidate.fidelity),
            candidate.runtime_us,
            candidate.cost
        );
    }

    Ok(())
}
