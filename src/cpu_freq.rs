use crate::error::SensorError;
use crate::hwmon_devices::read_trimmed;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const CPUFREQ_BASE_PATH: &str = "/sys/devices/system/cpu";

#[derive(Debug, Serialize)]
pub struct CpuFrequency {
    pub cpu: u32,
    #[serde(serialize_with = "crate::report::serialize_outcome")]
    pub mhz: Result<f64, SensorError>,
}

/// `cpu MHz` per `processor` block of `/proc/cpuinfo`. Blocks without the
/// field (most ARM kernels) map to `None`.
pub fn parse_cpuinfo(content: &str) -> Vec<(u32, Option<f64>)> {
    let mut cpus = Vec::new();
    let mut current: Option<(u32, Option<f64>)> = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => {
                cpus.extend(current.take());
                current = value.trim().parse().ok().map(|id| (id, None));
            }
            "cpu MHz" => {
                if let Some((_, mhz)) = current.as_mut() {
                    *mhz = value.trim().parse().ok();
                }
            }
            _ => {}
        }
    }
    cpus.extend(current);
    cpus
}

/// `scaling_cur_freq` is in kHz.
fn read_scaling_freq(cpufreq_root: &Path, cpu: u32) -> Result<f64, SensorError> {
    let path = cpufreq_root
        .join(format!("cpu{cpu}"))
        .join("cpufreq/scaling_cur_freq");
    let raw = read_trimmed(&path).ok_or_else(|| {
        SensorError::io(&path, std::io::Error::from(std::io::ErrorKind::NotFound))
    })?;
    let khz: u64 = raw
        .parse()
        .map_err(|_| SensorError::malformed(&path, raw.clone()))?;
    Ok(khz as f64 / 1000.0)
}

pub fn collect_frequencies(
    proc_root: &Path,
    cpufreq_root: &Path,
) -> Result<Vec<CpuFrequency>, SensorError> {
    let path = proc_root.join("cpuinfo");
    let content = fs::read_to_string(&path).map_err(|e| SensorError::io(&path, e))?;

    Ok(parse_cpuinfo(&content)
        .into_iter()
        .map(|(cpu, mhz)| {
            let mhz = match mhz {
                Some(mhz) => Ok(mhz),
                None => {
                    debug!("No cpu MHz for cpu{}, trying cpufreq", cpu);
                    read_scaling_freq(cpufreq_root, cpu)
                }
            };
            CpuFrequency { cpu, mhz }
        })
        .collect())
}
