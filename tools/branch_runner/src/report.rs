// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use log::info;
use serde::Serialize;
use stress_branch::StressExit;

use crate::worker::WorkerResult;

pub fn ops_per_sec(ops: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        ops as f64 / secs
    } else {
        0.0
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkerReport {
    pub instance: usize,
    pub cpu: Option<usize>,
    pub exit: String,
    pub bogo_ops: u64,
    pub elapsed_secs: f64,
    pub bogo_ops_per_sec: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub stressor: String,
    pub distinct_targets: usize,
    pub nr_workers: usize,
    pub nr_skipped: usize,
    pub nr_failed: usize,
    pub total_bogo_ops: u64,
    pub elapsed_secs: f64,
    pub bogo_ops_per_sec: f64,
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    pub fn new(
        stressor: &str,
        distinct_targets: usize,
        results: &[WorkerResult],
        elapsed: Duration,
    ) -> Self {
        let workers: Vec<WorkerReport> = results
            .iter()
            .map(|r| WorkerReport {
                instance: r.instance,
                cpu: r.cpu,
                exit: r.exit.to_string(),
                bogo_ops: r.bogo_ops,
                elapsed_secs: r.elapsed.as_secs_f64(),
                bogo_ops_per_sec: ops_per_sec(r.bogo_ops, r.elapsed),
            })
            .collect();
        let total_bogo_ops = results.iter().map(|r| r.bogo_ops).sum();

        Self {
            stressor: stressor.to_string(),
            distinct_targets,
            nr_workers: results.len(),
            nr_skipped: results.iter().filter(|r| r.exit.is_skip()).count(),
            nr_failed: results
                .iter()
                .filter(|r| r.exit == StressExit::Failure)
                .count(),
            total_bogo_ops,
            elapsed_secs: elapsed.as_secs_f64(),
            bogo_ops_per_sec: ops_per_sec(total_bogo_ops, elapsed),
            workers,
        }
    }

    /// Every worker was skipped, i.e. the stressor can't run here at all.
    pub fn all_skipped(&self) -> bool {
        self.nr_workers > 0 && self.nr_skipped == self.nr_workers
    }

    pub fn log_summary(&self) {
        info!(
            "{:<10} {:>4} {:>14} {:>10} {:>16}",
            "stressor", "inst", "bogo ops", "real (s)", "bogo ops/s"
        );
        for w in self.workers.iter() {
            info!(
                "{:<10} {:>4} {:>14} {:>10.2} {:>16.2} {}",
                self.stressor,
                w.instance,
                w.bogo_ops,
                w.elapsed_secs,
                w.bogo_ops_per_sec,
                if w.exit == StressExit::Success.as_str() {
                    ""
                } else {
                    w.exit.as_str()
                }
            );
        }
        info!(
            "{:<10} {:>4} {:>14} {:>10.2} {:>16.2}",
            self.stressor, "all", self.total_bogo_ops, self.elapsed_secs, self.bogo_ops_per_sec
        );
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(instance: usize, exit: StressExit, bogo_ops: u64, secs: u64) -> WorkerResult {
        WorkerResult {
            instance,
            cpu: None,
            exit,
            bogo_ops,
            elapsed: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_totals() {
        let results = vec![
            result(0, StressExit::Success, 100, 2),
            result(1, StressExit::Success, 300, 2),
        ];
        let report = RunReport::new("branch", 1024, &results, Duration::from_secs(2));
        assert_eq!(report.total_bogo_ops, 400);
        assert_eq!(report.bogo_ops_per_sec, 200.0);
        assert_eq!(report.workers[1].bogo_ops_per_sec, 150.0);
        assert_eq!(report.nr_failed, 0);
        assert!(!report.all_skipped());
    }

    #[test]
    fn test_skips_and_failures() {
        let results = vec![
            result(0, StressExit::NotImplemented, 0, 0),
            result(1, StressExit::Failure, 0, 0),
        ];
        let report = RunReport::new("branch", 1024, &results, Duration::ZERO);
        assert_eq!(report.nr_skipped, 1);
        assert_eq!(report.nr_failed, 1);
        assert_eq!(report.bogo_ops_per_sec, 0.0);
        assert!(!report.all_skipped());
    }

    #[test]
    fn test_json_shape() {
        let results = vec![result(0, StressExit::Success, 7, 1)];
        let report = RunReport::new("branch", 1024, &results, Duration::from_secs(1));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stressor"], "branch");
        assert_eq!(value["total_bogo_ops"], 7);
        assert_eq!(value["workers"][0]["exit"], "success");
        assert!(value["workers"][0]["cpu"].is_null());
    }
}
