//! Estimate command implementation.

use anyhow::Result;
use console::style;

use qforge::{QForge, QForgeConfig};

use super::common::{load_circuit, print_json, styled_fidelity};
use crate::OutputFormat;

/// Execute the estimate command.
pub fn execute(
    config: QForgeConfig,
    input: &str,
    provider: &str,
    format: OutputFormat,
) -> Result<()> {
    let qf = QForge::new(config)?;
    let circuit = load_circuit(&qf, input)?;
    let estimate = qf.estimate_fidelity(&circuit, provider)?;

    if format == OutputFormat::Json {
        return print_json(&estimate);
    }

    let analysis = qf.analyze(&circuit, provider)?;

    println!(
        "{} {} on provider {}",
        style("→").cyan().bold(),
        style(input).green(),
        style(provider).yellow()
    );
    println!(
        "  {} qubits, {} gates ({} two-qubit), depth {}",
        analysis.num_qubits, analysis.num_gates, analysis.two_qubit_gates, analysis.depth
    );
    println!(
        "  Runtime {:.1} µs (critical path {:.1} µs), price {:.3}",
        analysis.estimated_runtime_us, analysis.critical_path_us, analysis.estimated_cost
    );
    println!(
        "\n  Overall fidelity: {}",
        styled_fidelity(estimate.overall_fidelity)
    );
    println!("  Gate error:        {:.6}", estimate.gate_error);
    println!("  Decoherence error: {:.6}", estimate.decoherence_error);
    println!("  Crosstalk error:   {:.6}", estimate.crosstalk_error);
    println!("  Readout error:     {:.6}", estimate.readout_error);

    if !estimate.per_gate_fidelity.is_empty() {
        println!("\n  {:<12} {:>9}", "GATE", "FIDELITY");
        for (gate, fidelity) in &estimate.per_gate_fidelity {
            println!("  {:<12} {:>9.5}", gate, fidelity);
        }
    }

    Ok(())
}
