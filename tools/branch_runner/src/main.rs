// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use log::warn;

use branch_runner::report::ops_per_sec;
use branch_runner::worker::nr_online_cpus;
use branch_runner::PoolConfig;
use branch_runner::RunReport;
use branch_runner::WorkerArgs;
use branch_runner::WorkerPool;
use stress_branch::DispatchTable;
use stress_branch::ProcState;
use stress_branch::StressorInfo;
use stress_branch::NR_NODES;
use stress_branch::STRESS_BRANCH_INFO;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// branch-runner: run the branch misprediction stressor.
///
/// Each worker walks a pseudo-random chain of indirect calls over 1024
/// distinct targets, counting one bogo-op every time the chain returns to
/// the gate target. Workers stop on Ctrl-C, when the timeout expires or
/// when they reach --branch-ops.
#[derive(Debug, Parser)]
#[command(version)]
struct Opts {
    /// Number of workers to start. 0 starts one per online CPU.
    #[clap(long = "branch", default_value = "0", env = "STRESS_BRANCH_WORKERS")]
    branch: usize,

    /// Stop each worker after this many bogo-ops. 0 means no limit.
    #[clap(long = "branch-ops", default_value = "0", env = "STRESS_BRANCH_OPS")]
    branch_ops: u64,

    /// Stop all workers after this many seconds. 0 runs until interrupted.
    #[clap(short = 't', long, default_value = "0", env = "STRESS_BRANCH_TIMEOUT")]
    timeout: u64,

    /// Progress reporting interval in seconds.
    #[clap(short = 'i', long, default_value = "1.0", env = "STRESS_BRANCH_INTERVAL")]
    interval: f64,

    /// Pin each worker to one CPU, cycling through the CPUs this process is
    /// allowed to run on.
    #[clap(long, action = clap::ArgAction::SetTrue, env = "STRESS_BRANCH_PIN")]
    pin: bool,

    /// Write the final report as JSON to this path.
    #[clap(long, env = "STRESS_BRANCH_JSON")]
    json: Option<PathBuf>,

    /// Print the stressor's option table and exit.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    help_stressor: bool,

    /// Enable verbose output. Specify multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> Result<()> {
    let llv = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

/// Progress interval from `--interval`, rejecting values a `Duration` can't hold.
fn parse_interval(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("--interval must be positive, got {}", secs);
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("--interval {} is out of range", secs))
}

/// Check the table once up front and warn if the toolchain merged targets.
fn check_table(info: &StressorInfo, continue_flag: &Arc<AtomicBool>) -> usize {
    let args = WorkerArgs::new(0, continue_flag.clone(), 0);
    match DispatchTable::build(&args) {
        Ok(table) => {
            let distinct = table.distinct_targets();
            if distinct < NR_NODES {
                warn!(
                    "{}: only {} of {} dispatch targets are distinct, mispredictions will be lower",
                    info.name, distinct, NR_NODES
                );
            }
            distinct
        }
        Err(e) => {
            warn!("{}: {}", info.name, e);
            0
        }
    }
}

fn run(
    opts: &Opts,
    info: &StressorInfo,
    interval: Duration,
    continue_flag: Arc<AtomicBool>,
) -> Result<RunReport> {
    let nr_workers = match opts.branch {
        0 => nr_online_cpus(),
        n => n,
    };
    let deadline = match opts.timeout {
        0 => None,
        secs => Some(Instant::now() + Duration::from_secs(secs)),
    };

    let distinct_targets = check_table(info, &continue_flag);

    info!(
        "{}: starting {} worker(s), ops={} timeout={}s pin={}",
        info.name,
        nr_workers,
        if opts.branch_ops == 0 {
            "unlimited".to_string()
        } else {
            opts.branch_ops.to_string()
        },
        opts.timeout,
        opts.pin
    );

    let cfg = PoolConfig {
        nr_workers,
        max_ops: opts.branch_ops,
        pin: opts.pin,
        indirect_dispatch: true,
    };
    let started_at = Instant::now();
    let pool = WorkerPool::spawn(info, &cfg, continue_flag.clone())?;

    let mut prev_at = started_at;
    let mut prev_ops = 0;
    while !pool.all_finished() {
        thread::sleep(POLL_INTERVAL);

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline && continue_flag.load(Ordering::Relaxed) {
                info!("{}: timeout reached, stopping workers", info.name);
                pool.stop();
            }
        }

        let period = prev_at.elapsed();
        if period >= interval {
            let ops = pool.total_ops();
            info!(
                "{}: running={} bogo-ops={} ({:.0}/s)",
                info.name,
                pool.nr_in_state(ProcState::Run),
                ops,
                ops_per_sec(ops.saturating_sub(prev_ops), period)
            );
            prev_at = Instant::now();
            prev_ops = ops;
        }
    }

    let elapsed = started_at.elapsed();
    let results = pool.join()?;
    Ok(RunReport::new(info.name, distinct_targets, &results, elapsed))
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let info = STRESS_BRANCH_INFO;

    if opts.help_stressor {
        print!("{}", info.help_text());
        return Ok(());
    }

    let interval = parse_interval(opts.interval)?;

    init_logging(opts.verbose)?;

    let continue_flag = Arc::new(AtomicBool::new(true));
    let continue_flag_clone = continue_flag.clone();
    ctrlc::set_handler(move || {
        continue_flag_clone.store(false, Ordering::Relaxed);
    })
    .context("Error setting Ctrl-C handler")?;

    let report = run(&opts, &info, interval, continue_flag)?;
    report.log_summary();

    if let Some(path) = opts.json.as_ref() {
        report.save_json(path)?;
        info!("{}: report written to {}", info.name, path.display());
    }

    if report.all_skipped() {
        warn!("{}: not implemented on this system, skipped", info.name);
    }
    if report.nr_failed > 0 {
        bail!("{}: {} worker(s) failed", info.name, report.nr_failed);
    }
    Ok(())
}
