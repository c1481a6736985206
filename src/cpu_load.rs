//! Per-CPU utilization from two `/proc/stat` snapshots.

use crate::error::SensorError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuId {
    Aggregate,
    Core(u32),
}

impl CpuId {
    fn parse(label: &str) -> Option<Self> {
        let suffix = label.strip_prefix("cpu")?;
        if suffix.is_empty() {
            Some(CpuId::Aggregate)
        } else {
            suffix.parse().ok().map(CpuId::Core)
        }
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuId::Aggregate => write!(f, "CPU"),
            CpuId::Core(n) => write!(f, "CPU{n}"),
        }
    }
}

/// Cumulative jiffy counters of one CPU at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl Snapshot {
    fn idle_time(&self) -> u64 {
        self.idle + self.iowait
    }

    fn active_time(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq
    }

    fn total_time(&self) -> u64 {
        self.idle_time() + self.active_time()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.user, self.nice, self.system, self.idle, self.iowait, self.irq, self.softirq
        )
    }
}

/// Busy share of the window between `prev` and `curr`, in percent.
pub fn calculate_load(prev: &Snapshot, curr: &Snapshot) -> Result<f64, SensorError> {
    let total_delta = curr
        .total_time()
        .checked_sub(prev.total_time())
        .ok_or(SensorError::CounterReset)?;
    let idle_delta = curr
        .idle_time()
        .checked_sub(prev.idle_time())
        .ok_or(SensorError::CounterReset)?;

    if total_delta == 0 {
        return Err(SensorError::DivisionUndefined);
    }

    let busy = total_delta.saturating_sub(idle_delta) as f64;
    Ok((busy / total_delta as f64 * 100.0).clamp(0.0, 100.0))
}

/// Every `cpu`/`cpuN` line of a `/proc/stat` dump, in file order.
pub fn parse_proc_stat(content: &str) -> Vec<(CpuId, Snapshot)> {
    content.lines().filter_map(parse_cpu_line).collect()
}

fn parse_cpu_line(line: &str) -> Option<(CpuId, Snapshot)> {
    let mut fields = line.split_whitespace();
    let cpu = CpuId::parse(fields.next()?)?;
    let values: Vec<u64> = fields.take(7).map(|f| f.parse().ok()).collect::<Option<_>>()?;
    let [user, nice, system, idle, iowait, irq, softirq] = values.as_slice() else {
        return None;
    };
    Some((
        cpu,
        Snapshot {
            user: *user,
            nice: *nice,
            system: *system,
            idle: *idle,
            iowait: *iowait,
            irq: *irq,
            softirq: *softirq,
        },
    ))
}

pub fn read_proc_stat(proc_root: &Path) -> Result<Vec<(CpuId, Snapshot)>, SensorError> {
    let path = proc_root.join("stat");
    let content = fs::read_to_string(&path).map_err(|e| SensorError::io(&path, e))?;
    let snapshots = parse_proc_stat(&content);
    if snapshots.is_empty() {
        return Err(SensorError::malformed(path, "no cpu lines"));
    }
    Ok(snapshots)
}

#[derive(Debug, Serialize)]
pub struct CpuLoad {
    pub cpu: CpuId,
    pub t0: Snapshot,
    pub t1: Snapshot,
    #[serde(serialize_with = "crate::report::serialize_outcome")]
    pub utilization: Result<f64, SensorError>,
}

/// Pairs two passes over `/proc/stat` by CPU id. CPUs present in only one
/// pass (hotplug) are dropped.
pub fn pair_snapshots(t0: &[(CpuId, Snapshot)], t1: &[(CpuId, Snapshot)]) -> Vec<CpuLoad> {
    t1.iter()
        .filter_map(|(cpu, curr)| {
            let (_, prev) = t0.iter().find(|(id, _)| id == cpu)?;
            Some(CpuLoad {
                cpu: *cpu,
                t0: *prev,
                t1: *curr,
                utilization: calculate_load(prev, curr),
            })
        })
        .collect()
}

/// One pass for every CPU, one sleep, one more pass.
///
/// Returns `Ok(None)` when `cancel` resolves before the window closes.
pub async fn sample_all<F>(
    proc_root: &Path,
    interval: Duration,
    cancel: F,
) -> Result<Option<Vec<CpuLoad>>, SensorError>
where
    F: std::future::Future<Output = ()>,
{
    let t0 = read_proc_stat(proc_root)?;
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = cancel => return Ok(None),
    }
    let t1 = read_proc_stat(proc_root)?;
    Ok(Some(pair_snapshots(&t0, &t1)))
}
