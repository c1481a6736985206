use crate::config::StatsConfig;
use crate::cpu_freq::{collect_frequencies, CpuFrequency};
use crate::cpu_load::{sample_all, CpuLoad};
use crate::error::SensorError;
use crate::hwmon_devices::HwmonRoot;
use crate::memory::{CmaUsage, MemInfo, RamUsage, SwapUsage};
use crate::registry::{select_platform, PlatformProfile, SensorDescriptor};
use crate::report::{serialize_optional_outcome, serialize_outcome};
use crate::sensor_reader::read_value_with_timeout;
use crate::sensor_resolver::{ResolutionCache, SensorResolver};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which report blocks to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub cpu_util: bool,
    pub cpu_freq: bool,
    pub memory: bool,
    pub power: bool,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            cpu_util: true,
            cpu_freq: true,
            memory: true,
            power: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemoryReport {
    #[serde(serialize_with = "serialize_outcome")]
    pub ram: Result<RamUsage, SensorError>,
    #[serde(serialize_with = "serialize_outcome")]
    pub swap: Result<SwapUsage, SensorError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cma: Option<CmaUsage>,
}

#[derive(Debug, Serialize)]
pub struct RailReading {
    pub sensor: String,
    pub alias: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<i64>,
    #[serde(serialize_with = "serialize_outcome")]
    pub value: Result<i64, SensorError>,
}

#[derive(Debug, Serialize)]
pub struct PowerReport {
    /// `None` when no platform profile matches this host.
    pub platform: Option<String>,
    pub rails: Vec<RailReading>,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub hostname: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_outcome"
    )]
    pub cpu_utilization: Option<Result<Vec<CpuLoad>, SensorError>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_outcome"
    )]
    pub cpu_frequency: Option<Result<Vec<CpuFrequency>, SensorError>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_outcome"
    )]
    pub memory: Option<Result<MemoryReport, SensorError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerReport>,
}

impl Report {
    /// The first failure of a mandatory collector: CPU utilization, or the
    /// RAM and swap figures of the memory block. CMA is optional.
    pub fn mandatory_failure(&self) -> Option<&SensorError> {
        let cpu = match &self.cpu_utilization {
            Some(Err(e)) => Some(e),
            _ => None,
        };
        let memory = match &self.memory {
            Some(Err(e)) => Some(e),
            Some(Ok(memory)) => memory.ram.as_ref().err().or(memory.swap.as_ref().err()),
            None => None,
        };
        cpu.or(memory)
    }
}

/// Runs the selected collectors against one host. Holds the resolution cache
/// for the lifetime of the run.
pub struct StatsCollector {
    config: StatsConfig,
    resolver: SensorResolver,
    cache: ResolutionCache,
    hostname: Option<String>,
    platform_override: Option<String>,
}

impl StatsCollector {
    pub fn new(
        config: StatsConfig,
        hostname: Option<String>,
        platform_override: Option<String>,
    ) -> Self {
        let resolver = SensorResolver::new(HwmonRoot::new(&config.paths.hwmon_root));
        Self {
            config,
            resolver,
            cache: ResolutionCache::new(),
            hostname,
            platform_override,
        }
    }

    pub fn platform(&self) -> Option<&PlatformProfile> {
        select_platform(
            &self.config.platforms,
            self.hostname.as_deref(),
            self.platform_override.as_deref(),
        )
    }

    /// One report. `None` when `cancel` fires during the utilization window.
    pub async fn collect<F>(
        &mut self,
        selection: Selection,
        interval: Duration,
        cancel: F,
    ) -> Option<Report>
    where
        F: Future<Output = ()>,
    {
        let mut report = Report {
            hostname: self.hostname.clone(),
            ..Report::default()
        };
        let paths = &self.config.paths;

        if selection.cpu_util {
            report.cpu_utilization = match sample_all(&paths.proc_root, interval, cancel).await {
                Ok(Some(loads)) => Some(Ok(loads)),
                Ok(None) => return None,
                Err(e) => {
                    warn!("CPU utilization unavailable: {}", e);
                    Some(Err(e))
                }
            };
        }

        if selection.cpu_freq {
            let freqs = collect_frequencies(&paths.proc_root, &paths.cpufreq_root);
            if let Err(e) = &freqs {
                warn!("CPU frequency unavailable: {}", e);
            }
            report.cpu_frequency = Some(freqs);
        }

        if selection.memory {
            report.memory = Some(match MemInfo::read(&paths.proc_root) {
                Ok(info) => Ok(MemoryReport {
                    ram: info.ram(),
                    swap: info.swap(),
                    cma: info.cma(),
                }),
                Err(e) => {
                    warn!("Memory utilization unavailable: {}", e);
                    Err(e)
                }
            });
        }

        if selection.power {
            report.power = Some(self.collect_power().await);
        }

        Some(report)
    }

    async fn collect_power(&mut self) -> PowerReport {
        let timeout = self.config.read_timeout();
        let Some(platform) = select_platform(
            &self.config.platforms,
            self.hostname.as_deref(),
            self.platform_override.as_deref(),
        ) else {
            info!(
                "No platform profile matches host {}",
                self.hostname.as_deref().unwrap_or("<unknown>")
            );
            return PowerReport {
                platform: None,
                rails: Vec::new(),
            };
        };
        debug!("Platform: {}", platform.name);

        let mut rails = Vec::with_capacity(platform.sensors.len());
        for (i, descriptor) in platform.sensors.iter().enumerate() {
            debug!(
                "[{}] {},{},{:?},{:?},{}",
                i,
                descriptor.device,
                descriptor.address,
                descriptor.label,
                descriptor.channel,
                descriptor.unit
            );
            rails.push(read_rail(&self.resolver, &mut self.cache, descriptor, timeout).await);
        }
        debug!("{} label lookups cached", self.cache.len());

        PowerReport {
            platform: Some(platform.name.clone()),
            rails,
        }
    }
}

async fn read_rail(
    resolver: &SensorResolver,
    cache: &mut ResolutionCache,
    descriptor: &SensorDescriptor,
    timeout: Duration,
) -> RailReading {
    let sensor = descriptor.identity();

    let (path, raw, value) = match resolver.resolve(descriptor, cache) {
        Err(e) => {
            info!("{}: {}", sensor, e);
            (None, None, Err(e))
        }
        Ok(resolved) => {
            debug!(
                "{}: {} enumerated as hwmon{}, channels under hwmon{}",
                sensor,
                resolved.device.driver_name,
                resolved.device.handle_id,
                resolved.hwmon_index
            );
            match read_value_with_timeout(resolved.path.clone(), timeout).await {
                Ok(raw) => (Some(resolved.path), Some(raw), Ok(descriptor.scaled(raw))),
                Err(e) => {
                    warn!("{}: {}", sensor, e);
                    (Some(resolved.path), None, Err(e))
                }
            }
        }
    };

    RailReading {
        sensor,
        alias: descriptor.alias.clone(),
        unit: descriptor.unit.clone(),
        path,
        raw,
        value,
    }
}
