//! Providers command implementation.

use anyhow::Result;
use console::style;

use qforge::{QForge, QForgeConfig};

use super::common::print_json;
use crate::OutputFormat;

/// Execute the providers command.
pub fn execute(config: QForgeConfig, format: OutputFormat) -> Result<()> {
    let qf = QForge::new(config)?;
    let providers = qf.providers();

    if format == OutputFormat::Json {
        let caps: Vec<_> = providers.iter().map(|cap| cap.as_ref()).collect();
        return print_json(&caps);
    }

    println!("{} Registered providers:\n", style("qforge").cyan().bold());
    for cap in &providers {
        println!(
            "  {} {} {}",
            style("●").green(),
            style(&cap.name).bold(),
            style(&cap.description).dim()
        );
        println!("    Qubits: {}", cap.num_qubits);
        println!("    Topology: {}", cap.topology.kind);
        println!(
            "    Gates: {}",
            cap.gate_set.iter().collect::<Vec<_>>().join(", ")
        );
        println!("    Error correction: {}", cap.error_correction);
        println!(
            "    T1/T2: {:.0} / {:.0} µs, readout {:.4}",
            cap.noise.t1_us, cap.noise.t2_us, cap.noise.readout_fidelity
        );
        println!("    Price per job: {:.2}", cap.cost.base_per_job);
        println!();
    }

    Ok(())
}
