use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rhythm_engine::fixtures::{self, SessionReport, SessionTrace, SyntheticSpec};
use rhythm_engine::EngineConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rhythm_cli",
    about = "Deterministic trace harness for the rhythm engine"
)]
struct Cli {
    /// JSON engine configuration (defaults are used when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory searched for named traces (defaults to ./fixtures)
    #[arg(long, global = true)]
    traces_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a synthetic trace and replay it
    Simulate {
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        #[arg(long, default_value_t = 8)]
        phrases: usize,
        /// Comma-separated active slots (0-31)
        #[arg(long, value_delimiter = ',', default_value = "0,8,16,24")]
        slots: Vec<usize>,
        /// Second pattern for odd phrases
        #[arg(long, value_delimiter = ',')]
        alternate: Option<Vec<usize>>,
        #[arg(long, default_value_t = 0.0)]
        jitter_ms: f64,
        #[arg(long, default_value_t = 100.0)]
        sample_rate: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Also write the generated trace to this path
        #[arg(long)]
        emit_trace: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a trace file (path or name under the traces dir)
    Replay {
        trace: String,
        /// Exit with code 2 when mean accuracy falls below this value
        #[arg(long)]
        min_accuracy: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective engine configuration
    DumpConfig,
}

fn main() -> ExitCode {
    rhythm_engine::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path),
        None => EngineConfig::default(),
    };
    let traces_dir = cli
        .traces_dir
        .unwrap_or_else(|| PathBuf::from(fixtures::DEFAULT_TRACE_ROOT));

    match cli.command {
        Commands::Simulate {
            bpm,
            phrases,
            slots,
            alternate,
            jitter_ms,
            sample_rate,
            seed,
            emit_trace,
            output,
        } => {
            let spec = SyntheticSpec {
                bpm,
                phrases,
                active_slots: slots,
                alternate_slots: alternate,
                sample_rate_hz: sample_rate,
                jitter_ms,
                seed,
                ..SyntheticSpec::default()
            };
            let trace = spec.generate("simulate").context("generating synthetic trace")?;
            if let Some(path) = emit_trace {
                fs::write(&path, trace.to_json()?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            let report = fixtures::replay(&trace, config)?;
            emit_report(&report, output)?;
            Ok(ExitCode::from(0))
        }
        Commands::Replay {
            trace,
            min_accuracy,
            output,
        } => {
            let path = fixtures::resolve_trace_path(&traces_dir, &trace);
            let trace = SessionTrace::load(&path)
                .with_context(|| format!("loading trace {}", path.display()))?;
            let report = fixtures::replay(&trace, config)?;
            emit_report(&report, output)?;

            match min_accuracy {
                Some(threshold) if !report.meets_accuracy(threshold) => {
                    eprintln!(
                        "Mean accuracy {:?} below required {threshold}",
                        report.session.mean_accuracy
                    );
                    Ok(ExitCode::from(2))
                }
                _ => Ok(ExitCode::from(0)),
            }
        }
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn emit_report(report: &SessionReport, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}
