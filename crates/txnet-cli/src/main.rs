#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use txnet_core::{SimError, Simulation, SimulationConfig, SimulationReport, load_config};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "txnet: stochastic transmission-network simulator",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Generate an outbreak and simulate it",
        after_help = "EXAMPLES:\n    # Run with built-in defaults\n    txnet run\n\n    # Write the full report as JSON\n    txnet run --config sim.toml --json --output report.json"
    )]
    Run {
        /// TOML configuration file. Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the base process seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    #[command(about = "Check a configuration file without running it")]
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    #[command(about = "Print the default configuration as TOML")]
    Defaults,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run {
            config,
            seed,
            output,
        } => {
            let mut config = resolve_config(config.as_deref())?;
            if let Some(seed) = seed {
                config.seed = *seed;
            }
            let report = run(&config)?;
            emit_report(&report, cli.json, output.as_deref())
        }
        Commands::Validate { config } => {
            let config = load_config(config)?;
            config.validate()?;
            if cli.json {
                println!("{}", serde_json::json!({ "valid": true }));
            } else {
                println!("configuration is valid");
            }
            Ok(())
        }
        Commands::Defaults => {
            let text = toml::to_string_pretty(&SimulationConfig::default())
                .context("Failed to render default configuration")?;
            print!("{text}");
            Ok(())
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => SimulationConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(config: &SimulationConfig) -> Result<SimulationReport> {
    let graph = config
        .outbreak()?
        .generate()
        .context("Failed to generate outbreak network")?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "outbreak generated"
    );

    let outcome = Simulation::from_config(config)?
        .run(&graph)
        .context("Simulation failed")?;
    Ok(outcome.report)
}

fn emit_report(report: &SimulationReport, json: bool, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        let body = serde_json::to_string(report).context("Failed to serialize report")?;
        fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if json {
        if output.is_none() {
            println!(
                "{}",
                serde_json::to_string(report).context("Failed to serialize report")?
            );
        }
    } else {
        print_summary(report);
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn print_summary(report: &SimulationReport) {
    let nodes = report.nodes.len();
    let total_coi: usize = report.nodes.iter().map(|n| n.latent_genotype.coi()).sum();
    let mean_coi = if nodes == 0 {
        0.0
    } else {
        total_coi as f64 / nodes as f64
    };

    // How many true transmission edges survive into the candidate lists.
    let recovered = report
        .network
        .iter()
        .filter(|edge| {
            report
                .nodes
                .iter()
                .find(|n| n.id == edge.to)
                .is_some_and(|n| n.allowed_parents.iter().any(|c| c.node == edge.from))
        })
        .count();

    println!("network   {}", report.network_hash);
    println!("nodes     {nodes}");
    println!("edges     {}", report.network.len());
    println!("loci      {}", report.loci.len());
    println!("mean coi  {mean_coi:.2}");
    println!(
        "true parents in allowed lists  {recovered}/{}",
        report.network.len()
    );
}

fn report_error(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    if let Some(sim) = err.chain().find_map(|e| e.downcast_ref::<SimError>()) {
        let code = sim.code();
        eprintln!("  code: {} ({})", code.code(), code.message());
        if let Some(hint) = code.hint() {
            eprintln!("  hint: {hint}");
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TXNET_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "txnet=debug,txnet_core=debug,info"
        } else {
            "txnet=info,txnet_core=info,warn"
        })
    });

    let format = env::var("TXNET_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
