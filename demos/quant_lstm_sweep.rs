//! Run the quantized LSTM reference sweep and export the report as JSON.
//!
//! Usage:
//!   cargo run --example quant_lstm_sweep
//!   cargo run --example quant_lstm_sweep -- --seed 7 --qdq-weights
//!   cargo run --example quant_lstm_sweep -- --config sweep.json --output report.json
//!
//! Without `--config`, settings come from `QUANT_RNN_CONFIG` / `QUANT_RNN_SEED`.

use anyhow::Result;
use clap::Parser;
use quant_rnn::harness::{run_sweep, HarnessConfig, ReferenceWeights, SweepReport};
use quant_rnn::KernelRegistry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quant_lstm_sweep")]
struct Args {
    /// Harness config JSON. Overrides the environment.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for every case.
    #[arg(long)]
    seed: Option<u64>,

    /// Feed QDQ'd weights to the reference instead of full-precision ones.
    #[arg(long)]
    qdq_weights: bool,

    /// Output JSON report path. Default: print to stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::load_from_env(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.qdq_weights {
        config.reference_weights = ReferenceWeights::QuantizeDequantize;
    }

    let report: SweepReport = run_sweep(&KernelRegistry::default_registry(), &config)?;
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(out) = &args.output {
        std::fs::write(out, &json)?;
        println!("Sweep report written to {}", out.display());
    } else {
        println!("{}", json);
    }

    if !report.all_passed() {
        for case in report.cases.iter().filter(|c| !c.passed()) {
            if let Err(e) = case.ensure_passed() {
                eprintln!("{:#}", e);
            }
        }
        eprintln!("{} of {} cases failed.", report.failed, report.cases.len());
        std::process::exit(1);
    }

    println!("All {} cases passed.", report.passed);
    Ok(())
}
