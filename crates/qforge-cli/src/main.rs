//! qforge Command-Line Interface
//!
//! The main entry point for the `qforge` tool.

use clap::{Parser, Subcommand, ValueEnum};
use console::style;

mod commands;

use commands::{batch, estimate, mitigate, optimize, providers, suggest};
use qforge::{Priority, QForgeConfig, TracingConfig, init_tracing};

/// qforge - provider-aware circuit optimization and batch scheduling
#[derive(Parser)]
#[command(name = "qforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (YAML)
    #[arg(short, long, global = true, env = "QFORGE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered providers and their capabilities
    Providers {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Optimize a circuit for a provider
    Optimize {
        /// Input circuit file
        #[arg(short, long)]
        input: String,

        /// Target provider
        #[arg(short, long)]
        provider: String,

        /// Comma-separated stage list (defaults to the configured stages)
        #[arg(short, long, value_delimiter = ',')]
        stages: Vec<String>,

        /// Write the optimized circuit here
        #[arg(short, long)]
        output: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Estimate the fidelity of a circuit on a provider
    Estimate {
        /// Input circuit file
        #[arg(short, long)]
        input: String,

        /// Target provider
        #[arg(short, long)]
        provider: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Rank the providers able to run a circuit
    Suggest {
        /// Input circuit file
        #[arg(short, long)]
        input: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Recommend error mitigations for a circuit on a provider
    Mitigate {
        /// Input circuit file
        #[arg(short, long)]
        input: String,

        /// Target provider
        #[arg(short, long)]
        provider: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Submit circuit files as one batch and wait for it
    Batch {
        /// Input circuit files, one job each
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Provider for every job (best-ranked provider per circuit if omitted)
        #[arg(short, long)]
        provider: Option<String>,

        /// Scheduling strategy (defaults to the configured strategy)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Priority of every job
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,

        /// Owner recorded for fair-share scheduling
        #[arg(long, default_value = "default")]
        owner: String,

        /// Shots per job
        #[arg(long, default_value = "1024")]
        shots: u32,

        /// Run the jobs one after another, each depending on the previous one
        #[arg(long)]
        chain: bool,

        /// Timeout in seconds
        #[arg(short, long, default_value = "300")]
        timeout: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Styled table for terminals
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Job priority as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

fn tracing_config(config: &QForgeConfig, verbose: u8) -> TracingConfig {
    let mut tracing = config.tracing.clone();
    tracing.filter = match verbose {
        0 => "warn".to_string(),
        1 => "qforge=info".to_string(),
        2 => "qforge=debug".to_string(),
        _ => "qforge=trace".to_string(),
    };
    tracing
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = QForgeConfig::load(cli.config.as_deref())?;
    init_tracing(&tracing_config(&config, cli.verbose))?;

    let result = match cli.command {
        Commands::Providers { format } => providers::execute(config, format),

        Commands::Optimize {
            input,
            provider,
            stages,
            output,
            format,
        } => optimize::execute(config, &input, &provider, &stages, output.as_deref(), format),

        Commands::Estimate {
            input,
            provider,
            format,
        } => estimate::execute(config, &input, &provider, format),

        Commands::Suggest { input, format } => suggest::execute(config, &input, format),

        Commands::Mitigate {
            input,
            provider,
            format,
        } => mitigate::execute(config, &input, &provider, format),

        Commands::Batch {
            inputs,
            provider,
            strategy,
            priority,
            owner,
            shots,
            chain,
            timeout,
            format,
        } => {
            let options = batch::BatchOptions {
                provider,
                strategy,
                priority: priority.into(),
                owner,
                shots,
                chain,
                timeout_secs: timeout,
                format,
            };
            batch::execute(config, &inputs, options).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
