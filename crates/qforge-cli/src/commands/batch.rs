//! Batch command implementation.
//!
//! Submits one job per input file, drives the batch to completion and
//! prints the status table.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use qforge::{
    BatchSnapshot, Dependency, DependencyKind, Job, JobStatus, Priority, QForge, QForgeConfig,
};

use super::common::{load_circuit, print_json, styled_fidelity, styled_status};
use crate::OutputFormat;

/// Options shared by every job of the batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Provider for every job; best-ranked per circuit when `None`.
    pub provider: Option<String>,
    /// Scheduling strategy; the configured default when `None`.
    pub strategy: Option<String>,
    /// Priority of every job.
    pub priority: Priority,
    /// Owner of every job.
    pub owner: String,
    /// Shots per job.
    pub shots: u32,
    /// Make each job depend on the previous one.
    pub chain: bool,
    /// How long to wait for the batch.
    pub timeout_secs: u64,
    /// Output format.
    pub format: OutputFormat,
}

/// Execute the batch command.
pub async fn execute(config: QForgeConfig, inputs: &[String], options: BatchOptions) -> Result<()> {
    let qf = QForge::new(config)?;
    let jobs = build_jobs(&qf, inputs, &options)?;
    let count = jobs.len();

    let batch_id = qf
        .submit_batch(jobs, options.strategy.as_deref())
        .await
        .context("Batch rejected")?;

    if options.format == OutputFormat::Table {
        println!(
            "{} Submitted batch {} with {} job(s)",
            style("→").cyan().bold(),
            style(&batch_id).dim(),
            count
        );
    }

    let snapshot = qf
        .wait_for_batch(&batch_id, Duration::from_secs(options.timeout_secs))
        .await?;

    if options.format == OutputFormat::Json {
        print_json(&snapshot)?;
    } else {
        print_snapshot(&snapshot);
    }

    if snapshot.batch.status == JobStatus::Failed {
        anyhow::bail!("batch {} finished with failed jobs", snapshot.batch.id);
    }
    Ok(())
}

/// One job per input, in input order.
pub fn build_jobs(qf: &QForge, inputs: &[String], options: &BatchOptions) -> Result<Vec<Job>> {
    let mut jobs: Vec<Job> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let circuit = load_circuit(qf, input)?;
        let provider = match &options.provider {
            Some(provider) => provider.clone(),
            None => qf
                .suggest_provider(&circuit)
                .with_context(|| format!("No provider for {input}"))?
                .into_iter()
                .next()
                .map(|candidate| candidate.provider)
                .with_context(|| format!("No provider for {input}"))?,
        };
        let name = circuit.name().to_string();
        let mut job = Job::new(name, circuit, provider)
            .with_priority(options.priority)
            .with_owner(options.owner.clone())
            .with_shots(options.shots);
        if options.chain {
            if let Some(previous) = jobs.last() {
                job = job.depends_on(Dependency::required(previous.id, DependencyKind::Success));
            }
        }
        jobs.push(job);
    }
    Ok(jobs)
}

fn print_snapshot(snapshot: &BatchSnapshot) {
    let batch = &snapshot.batch;

    println!(
        "\n{} Batch {} ({}): {}",
        style("●").cyan(),
        style(&batch.name).bold(),
        batch.strategy,
        styled_status(batch.status)
    );
    println!(
        "  {} gates, estimated {:.1} µs, price {:.3}",
        batch.metrics.total_gates, batch.metrics.estimated_time_us, batch.metrics.estimated_cost
    );
    println!(
        "  Optimal provider for the merged view: {} ({} merge conflict(s))",
        style(&batch.optimal_provider).yellow(),
        batch.merge_conflicts
    );

    println!(
        "\n  {:<20}  {:<8}  {:<10}  {:>7}  {:>9}",
        style("JOB").bold(),
        style("PROVIDER").bold(),
        style("STATUS").bold(),
        style("RETRIES").bold(),
        style("FIDELITY").bold()
    );
    println!("  {}", "-".repeat(62));

    for job in &snapshot.jobs {
        let fidelity = job
            .fidelity()
            .map_or_else(|| style("-".to_string()).dim(), |f| styled_fidelity(f.overall_fidelity));
        println!(
            "  {:<20}  {:<8}  {:<10}  {:>7}  {:>9}",
            job.name,
            job.provider,
            styled_status(job.status()),
            job.retry_count(),
            fidelity
        );
        if let Some(error) = job.error() {
            println!(
                "      {} [{}] {}",
                style("✗").red(),
                error.kind(),
                style(error.message()).dim()
            );
            for action in error.suggested_actions() {
                println!("        - {action}");
            }
        }
    }

    let counts = snapshot.status_counts();
    let summary: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect();
    println!("\n  {}", summary.join(", "));
}
