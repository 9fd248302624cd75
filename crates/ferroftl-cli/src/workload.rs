//! Deterministic synthetic workload: a warmup fill followed by a measured
//! mix of writes, reads, and trims with seeded randomness throughout.

use ferroftl_core::{Ftl, GcDispatcher};
use ferroftl_error::{FtlError, Result};
use ferroftl_types::{Lpn, Tick, MS, US};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// NAND page read latency.
const READ_LATENCY: Tick = 65 * US;
/// NAND page program latency.
const PROGRAM_LATENCY: Tick = 700 * US;
/// NAND block erase latency.
const ERASE_LATENCY: Tick = 3_500 * US;

/// Measured-phase shape.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub requests: u64,
    pub fill_ratio: f64,
    pub invalid_ratio: f64,
    pub read_ratio: f64,
    pub trim_ratio: f64,
    pub seed: u64,
}

/// Counters reported after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunReport {
    pub writes: u64,
    pub reads: u64,
    pub trims: u64,
    pub gc_plans: u64,
    pub final_tick: Tick,
}

fn inter_arrival(rng: &mut StdRng) -> Tick {
    // Bursty arrivals: mostly back-to-back or short gaps, occasional long
    // idle periods that give the RL policies room to learn.
    match rng.gen_range(0_u32..100) {
        0..=29 => 0,
        30..=59 => rng.gen_range(1..20) * US,
        60..=89 => rng.gen_range(20..500) * US,
        _ => rng.gen_range(1..20) * MS,
    }
}

/// Pre-fill a fraction of logical space and invalidate part of it, without
/// engaging the GC policy (mirroring device aging before measurement).
pub fn warmup(
    ftl: &mut Ftl,
    spec: &WorkloadSpec,
    logical_pages: u64,
    tick: &mut Tick,
) -> Result<u64> {
    let geometry = ftl.geometry();
    let fill_pages = (logical_pages as f64 * spec.fill_ratio) as u64;
    let rewrite_pages = (fill_pages as f64 * spec.invalid_ratio) as u64;
    let budget_pages = u64::from(geometry.total_blocks)
        .saturating_sub(u64::from(geometry.write_fronts) + 2)
        * u64::from(geometry.pages_per_block);
    if fill_pages + rewrite_pages > budget_pages {
        return Err(FtlError::InvalidConfig {
            detail: format!(
                "warmup needs {} pages but only {budget_pages} are available; \
                 lower fill_ratio or invalid_ratio",
                fill_pages + rewrite_pages
            ),
        });
    }

    let mask = geometry.full_mask();
    for lpn in 0..fill_pages {
        *tick += 10;
        ftl.write(Lpn::new(lpn), mask, *tick)?;
    }
    let mut rng = StdRng::seed_from_u64(spec.seed ^ 0x5eed_f111);
    for _ in 0..rewrite_pages {
        *tick += 10;
        let lpn = rng.gen_range(0..fill_pages.max(1));
        ftl.write(Lpn::new(lpn), mask, *tick)?;
    }
    tracing::info!(fill_pages, rewrite_pages, free = ftl.free_blocks(), "warmup complete");
    Ok(fill_pages)
}

/// Drive the measured request mix through the dispatcher.
pub fn run_measured(
    ftl: &mut Ftl,
    dispatcher: &mut GcDispatcher,
    spec: &WorkloadSpec,
    logical_pages: u64,
    tick: &mut Tick,
) -> Result<RunReport> {
    let mask = ftl.geometry().full_mask();
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut report = RunReport::default();

    for _ in 0..spec.requests {
        *tick += inter_arrival(&mut rng);
        let lpn = Lpn::new(rng.gen_range(0..logical_pages));
        let roll = rng.gen::<f64>();
        let start = *tick;

        if roll < spec.trim_ratio {
            dispatcher.on_trim(ftl, lpn, start)?;
            report.trims += 1;
            continue;
        }

        let plan = if roll < spec.trim_ratio + spec.read_ratio {
            let end = start + READ_LATENCY;
            let _ = ftl.read(lpn, start);
            *tick = end;
            report.reads += 1;
            dispatcher.on_read(ftl, start, end)?
        } else {
            let end = start + PROGRAM_LATENCY;
            ftl.write(lpn, mask, start)?;
            *tick = end;
            report.writes += 1;
            dispatcher.on_write(ftl, start, end)?
        };

        // The GC step runs on the event-handler thread: its cost delays the
        // next arrival, not the completed request.
        if let Some(plan) = plan {
            report.gc_plans += 1;
            *tick += u64::from(plan.pages_to_copy) * (READ_LATENCY + PROGRAM_LATENCY)
                + ERASE_LATENCY / 2;
        }
    }
    report.final_tick = *tick;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroftl_core::FtlConfig;

    fn spec() -> WorkloadSpec {
        WorkloadSpec {
            requests: 2_000,
            fill_ratio: 0.5,
            invalid_ratio: 0.25,
            read_ratio: 0.3,
            trim_ratio: 0.02,
            seed: 7,
        }
    }

    #[test]
    fn test_warmup_respects_capacity_budget() {
        let config = FtlConfig {
            total_blocks: 32,
            pages_per_block: 16,
            metrics_enabled: false,
            ..FtlConfig::default()
        };
        let mut ftl = Ftl::new(config.geometry()).expect("ftl");
        let logical = config.geometry().logical_pages(config.overprovision_ratio);
        let mut tick = 0;
        warmup(&mut ftl, &spec(), logical, &mut tick).expect("warmup");
        assert!(ftl.free_blocks() > 0);
        ftl.verify_invariants().expect("invariants");
    }

    #[test]
    fn test_warmup_rejects_overfill() {
        let config = FtlConfig {
            total_blocks: 8,
            pages_per_block: 8,
            overprovision_ratio: 0.05,
            metrics_enabled: false,
            ..FtlConfig::default()
        };
        let mut ftl = Ftl::new(config.geometry()).expect("ftl");
        let logical = config.geometry().logical_pages(config.overprovision_ratio);
        let over = WorkloadSpec {
            fill_ratio: 1.0,
            invalid_ratio: 1.0,
            ..spec()
        };
        let mut tick = 0;
        assert!(warmup(&mut ftl, &over, logical, &mut tick).is_err());
    }

    #[test]
    fn test_measured_run_is_reproducible() {
        let config = FtlConfig {
            total_blocks: 32,
            pages_per_block: 16,
            tgc: 8,
            tigc: 3,
            metrics_enabled: false,
            ..FtlConfig::default()
        };
        let logical = config.geometry().logical_pages(config.overprovision_ratio);

        let mut run = || {
            let mut ftl = Ftl::new(config.geometry()).expect("ftl");
            let mut dispatcher = GcDispatcher::new(
                config.build_policy(),
                config.build_selector(),
                config.build_sink(),
            );
            let mut tick = 0;
            warmup(&mut ftl, &spec(), logical, &mut tick).expect("warmup");
            let report =
                run_measured(&mut ftl, &mut dispatcher, &spec(), logical, &mut tick)
                    .expect("run");
            ftl.verify_invariants().expect("invariants");
            (report.writes, report.reads, report.gc_plans, report.final_tick)
        };
        assert_eq!(run(), run());
    }
}
