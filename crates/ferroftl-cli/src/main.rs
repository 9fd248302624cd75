//! ferroftl driver binary.
//!
//! Loads a JSON configuration (or runs the defaults), ages the device with
//! a warmup fill, then drives a seeded synthetic request mix through the
//! GC dispatcher. Metrics land in the configured output directory; exit
//! codes are 0 on success, 1 on a fatal invariant breach, 2 on an
//! unreadable or invalid configuration.

mod workload;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ferroftl_core::{Ftl, FtlConfig, GcDispatcher};
use ferroftl_error::{FtlError, Result};
use tracing_subscriber::EnvFilter;

use crate::workload::WorkloadSpec;

#[derive(Debug, Parser)]
#[command(name = "ferroftl", about = "NAND FTL GC-policy simulator core")]
struct Args {
    /// JSON configuration file; defaults apply when omitted.
    config: Option<PathBuf>,

    /// Measured requests after warmup.
    #[arg(long, default_value_t = 20_000)]
    requests: u64,

    /// Fraction of logical space pre-filled before measurement.
    #[arg(long, default_value_t = 0.5)]
    fill_ratio: f64,

    /// Fraction of the pre-filled pages invalidated by warmup rewrites.
    #[arg(long, default_value_t = 0.25)]
    invalid_ratio: f64,

    /// Read share of the measured mix.
    #[arg(long, default_value_t = 0.3)]
    read_ratio: f64,

    /// Trim share of the measured mix.
    #[arg(long, default_value_t = 0.02)]
    trim_ratio: f64,
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => FtlConfig::load(path)?,
        None => FtlConfig::default(),
    };
    if args.fill_ratio < 0.0
        || args.fill_ratio > 1.0
        || args.invalid_ratio < 0.0
        || args.read_ratio + args.trim_ratio > 1.0
    {
        return Err(FtlError::InvalidConfig {
            detail: "workload ratios out of range".to_owned(),
        });
    }

    let geometry = config.geometry();
    let logical_pages = geometry.logical_pages(config.overprovision_ratio);
    tracing::info!(
        policy = ?config.policy,
        total_blocks = geometry.total_blocks,
        pages_per_block = geometry.pages_per_block,
        logical_pages,
        "starting run"
    );

    let mut ftl = Ftl::new(geometry)?;
    let mut dispatcher = GcDispatcher::new(
        config.build_policy(),
        config.build_selector(),
        config.build_sink(),
    );

    let spec = WorkloadSpec {
        requests: args.requests,
        fill_ratio: args.fill_ratio,
        invalid_ratio: args.invalid_ratio,
        read_ratio: args.read_ratio,
        trim_ratio: args.trim_ratio,
        seed: config.seed,
    };

    let mut tick = 0;
    workload::warmup(&mut ftl, &spec, logical_pages, &mut tick)?;
    let report = workload::run_measured(&mut ftl, &mut dispatcher, &spec, logical_pages, &mut tick)?;
    ftl.verify_invariants()?;
    dispatcher.shutdown(tick);

    let stats = dispatcher.policy().stats();
    let window = dispatcher.policy().window();
    println!(
        "{}: {} writes, {} reads, {} trims, {} GC plans",
        dispatcher.policy().name(),
        report.writes,
        report.reads,
        report.trims,
        report.gc_plans
    );
    println!(
        "gc: {} invocations, {} valid copies, {} erases",
        stats.gc_invocations, stats.valid_page_copies, stats.erase_count
    );
    println!(
        "latency: avg {:.1} us, p99 {} us, p99.99 {} us",
        window.mean_ns() / 1_000.0,
        window.percentile_ns(0.99) / 1_000,
        window.percentile_ns(0.9999) / 1_000
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "run failed");
            ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
        }
    }
}
