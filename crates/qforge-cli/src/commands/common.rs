//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::{StyledObject, style};
use serde::Serialize;

use qforge::{JobStatus, QForge};
use qforge_ir::Circuit;

/// Load a circuit from an interchange-format file, named after the file.
pub fn load_circuit(qf: &QForge, path: &str) -> Result<Circuit> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    let mut circuit = qf
        .parse_circuit(&source)
        .with_context(|| format!("Failed to parse {path}"))?;
    circuit.set_name(job_name(path));
    Ok(circuit)
}

/// Write `circuit` in interchange format.
pub fn save_circuit(qf: &QForge, circuit: &Circuit, path: &str) -> Result<()> {
    fs::write(path, qf.emit_circuit(circuit))
        .with_context(|| format!("Failed to write file: {path}"))
}

/// Job name derived from a file path: its stem.
pub fn job_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map_or_else(|| path.to_string(), |s| s.to_string_lossy().into_owned())
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Status name coloured by outcome.
pub fn styled_status(status: JobStatus) -> StyledObject<&'static str> {
    let name = status.name();
    match status {
        JobStatus::Completed => style(name).green(),
        JobStatus::Failed | JobStatus::Cancelled => style(name).red(),
        JobStatus::Pending | JobStatus::Queued => style(name).yellow(),
        _ => style(name).cyan(),
    }
}

/// Fidelity coloured by how usable it is.
pub fn styled_fidelity(fidelity: f64) -> StyledObject<String> {
    let text = format!("{fidelity:.4}");
    if fidelity >= 0.9 {
        style(text).green()
    } else if fidelity >= 0.5 {
        style(text).yellow()
    } else {
        style(text).red()
    }
}
