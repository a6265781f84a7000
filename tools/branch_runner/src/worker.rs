// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::warn;
use stress_branch::ProcState;
use stress_branch::StressContext;
use stress_branch::StressExit;
use stress_branch::StressorInfo;

/// Number of online CPUs, falling back to 1 if sysconf can't tell.
pub fn nr_online_cpus() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 {
        1
    } else {
        n as usize
    }
}

/// CPUs the calling thread may run on, in ascending order.
///
/// Online CPU numbers need not be contiguous, so pinning picks from this set
/// rather than from `0..nr_online_cpus()`.
pub fn allowed_cpus() -> Result<Vec<usize>> {
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    if unsafe { libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) }
        != 0
    {
        return Err(std::io::Error::last_os_error()).context("Failed to read CPU affinity");
    }

    let cpus: Vec<usize> = (0..libc::CPU_SETSIZE as usize)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect();
    if cpus.is_empty() {
        bail!("CPU affinity mask is empty");
    }
    Ok(cpus)
}

/// Pin the calling thread to `cpu`.
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    if cpu >= libc::CPU_SETSIZE as usize {
        bail!("CPU {} is out of range (max {})", cpu, libc::CPU_SETSIZE - 1);
    }
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(cpu, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("Failed to pin to CPU {}", cpu));
        }
    }
    Ok(())
}

/// Per-worker view of the host resources, handed to the stressor.
///
/// `counter` has exactly one writer (the worker) so increments are a plain
/// load/store pair; the monitor only ever reads it.
pub struct WorkerArgs {
    pub instance: usize,
    counter: Arc<AtomicU64>,
    proc_state: Arc<AtomicU8>,
    continue_flag: Arc<AtomicBool>,
    max_ops: u64,
    indirect_dispatch: bool,
}

impl WorkerArgs {
    pub fn new(instance: usize, continue_flag: Arc<AtomicBool>, max_ops: u64) -> Self {
        Self {
            instance,
            counter: Arc::new(AtomicU64::new(0)),
            proc_state: Arc::new(AtomicU8::new(ProcState::Init as u8)),
            continue_flag,
            max_ops,
            indirect_dispatch: true,
        }
    }

    pub fn with_indirect_dispatch(mut self, enabled: bool) -> Self {
        self.indirect_dispatch = enabled;
        self
    }

    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn proc_state(&self) -> ProcState {
        ProcState::from_u8(self.proc_state.load(Ordering::Relaxed)).unwrap_or(ProcState::Init)
    }
}

impl StressContext for WorkerArgs {
    fn inc_counter(&mut self) {
        let v = self.counter.load(Ordering::Relaxed);
        self.counter.store(v + 1, Ordering::Relaxed);
    }

    fn keep_stressing(&self) -> bool {
        self.continue_flag.load(Ordering::Relaxed)
            && (self.max_ops == 0 || self.counter.load(Ordering::Relaxed) < self.max_ops)
    }

    fn set_proc_state(&mut self, state: ProcState) {
        self.proc_state.store(state as u8, Ordering::Relaxed);
    }

    fn has_indirect_dispatch(&self) -> bool {
        self.indirect_dispatch
    }
}

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub nr_workers: usize,
    pub max_ops: u64,
    pub pin: bool,
    pub indirect_dispatch: bool,
}

/// Outcome of one worker.
#[derive(Clone, Debug)]
pub struct WorkerResult {
    pub instance: usize,
    pub cpu: Option<usize>,
    pub exit: StressExit,
    pub bogo_ops: u64,
    pub elapsed: Duration,
}

struct Worker {
    instance: usize,
    cpu: Option<usize>,
    counter: Arc<AtomicU64>,
    proc_state: Arc<AtomicU8>,
    handle: JoinHandle<(StressExit, Duration)>,
}

/// A set of worker threads all running the same stressor.
pub struct WorkerPool {
    workers: Vec<Worker>,
    continue_flag: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn spawn(
        info: &StressorInfo,
        cfg: &PoolConfig,
        continue_flag: Arc<AtomicBool>,
    ) -> Result<Self> {
        let cpus = match cfg.pin {
            true => allowed_cpus()?,
            false => Vec::new(),
        };
        let mut workers = Vec::with_capacity(cfg.nr_workers);

        for instance in 0..cfg.nr_workers {
            let mut args = WorkerArgs::new(instance, continue_flag.clone(), cfg.max_ops)
                .with_indirect_dispatch(cfg.indirect_dispatch);
            let counter = args.counter.clone();
            let proc_state = args.proc_state.clone();
            let cpu = cfg.pin.then(|| cpus[instance % cpus.len()]);
            let info = *info;

            let handle = thread::Builder::new()
                .name(format!("{}-{}", info.name, instance))
                .spawn(move || {
                    if let Some(cpu) = cpu {
                        if let Err(e) = pin_current_thread(cpu) {
                            warn!("{}-{}: {:#}", info.name, instance, e);
                        }
                    }
                    let started_at = Instant::now();
                    let exit = info.run(&mut args);
                    args.set_proc_state(ProcState::Exit);
                    (exit, started_at.elapsed())
                })
                .with_context(|| format!("Failed to spawn {} worker {}", info.name, instance))?;

            debug!("{}-{}: started (cpu={:?})", info.name, instance, cpu);
            workers.push(Worker {
                instance,
                cpu,
                counter,
                proc_state,
                handle,
            });
        }

        Ok(Self {
            workers,
            continue_flag,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn total_ops(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.counter.load(Ordering::Relaxed))
            .sum()
    }

    pub fn nr_in_state(&self, state: ProcState) -> usize {
        self.workers
            .iter()
            .filter(|w| w.proc_state.load(Ordering::Relaxed) == state as u8)
            .count()
    }

    pub fn all_finished(&self) -> bool {
        self.workers.iter().all(|w| w.handle.is_finished())
    }

    /// Ask every worker to stop at its next gate visit.
    pub fn stop(&self) {
        self.continue_flag.store(false, Ordering::Relaxed);
    }

    pub fn join(self) -> Result<Vec<WorkerResult>> {
        let mut results = Vec::with_capacity(self.workers.len());
        for w in self.workers {
            let (exit, elapsed) = w
                .handle
                .join()
                .map_err(|_| anyhow!("worker {} panicked", w.instance))?;
            results.push(WorkerResult {
                instance: w.instance,
                cpu: w.cpu,
                exit,
                bogo_ops: w.counter.load(Ordering::Relaxed),
                elapsed,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_stressing_honours_max_ops() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut args = WorkerArgs::new(0, flag.clone(), 2);
        assert!(args.keep_stressing());
        args.inc_counter();
        assert!(args.keep_stressing());
        args.inc_counter();
        assert!(!args.keep_stressing());
        assert_eq!(args.counter(), 2);
    }

    #[test]
    fn test_keep_stressing_honours_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let args = WorkerArgs::new(0, flag.clone(), 0);
        assert!(args.keep_stressing());
        flag.store(false, Ordering::Relaxed);
        assert!(!args.keep_stressing());
    }

    #[test]
    fn test_proc_state_published() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut args = WorkerArgs::new(3, flag, 0);
        assert_eq!(args.proc_state(), ProcState::Init);
        args.set_proc_state(ProcState::Deinit);
        assert_eq!(args.proc_state(), ProcState::Deinit);
    }

    #[test]
    fn test_nr_online_cpus() {
        assert!(nr_online_cpus() >= 1);
    }

    #[test]
    fn test_allowed_cpus() {
        let cpus = allowed_cpus().unwrap();
        assert!(!cpus.is_empty());
        assert!(cpus.windows(2).all(|w| w[0] < w[1]));
        assert!(cpus.iter().all(|&cpu| cpu < libc::CPU_SETSIZE as usize));
    }

    #[test]
    fn test_pin_out_of_range() {
        assert!(pin_current_thread(libc::CPU_SETSIZE as usize).is_err());
        assert!(pin_current_thread(usize::MAX).is_err());
    }

    #[test]
    fn test_pin_to_allowed_cpu() {
        let cpu = allowed_cpus().unwrap()[0];
        // Pin a scratch thread so the test harness thread keeps its mask.
        let pinned = thread::spawn(move || pin_current_thread(cpu).is_ok())
            .join()
            .unwrap();
        assert!(pinned);
    }
}
