//! Report rendering: the human-readable text blocks and the JSON form.

use crate::error::SensorError;
use crate::hwmon_devices::HwmonDevice;
use crate::sensors::{MemoryReport, PowerReport, Report};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::io::{self, Write};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A value, or `{"error": <placeholder>, "detail": <message>}`.
pub fn serialize_outcome<T, S>(
    value: &Result<T, SensorError>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Ok(v) => v.serialize(serializer),
        Err(e) => {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("error", e.placeholder())?;
            map.serialize_entry("detail", &e.to_string())?;
            map.end()
        }
    }
}

pub fn serialize_optional_outcome<T, S>(
    value: &Option<Result<T, SensorError>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(outcome) => serialize_outcome(outcome, serializer),
        None => serializer.serialize_none(),
    }
}

pub fn render<W: Write>(
    report: &Report,
    format: OutputFormat,
    verbose: bool,
    interval: Duration,
    out: &mut W,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(report, verbose, interval, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
    }
}

fn render_text<W: Write>(
    report: &Report,
    verbose: bool,
    interval: Duration,
    out: &mut W,
) -> io::Result<()> {
    if let Some(loads) = &report.cpu_utilization {
        writeln!(out, "\nCPU Utilization")?;
        match loads {
            Ok(loads) => {
                for load in loads {
                    if verbose {
                        writeln!(out, "cpu_id={}", load.cpu)?;
                        writeln!(out, "Stats at t0\n{}: {}", load.cpu, load.t0)?;
                        writeln!(
                            out,
                            "Stats at t1 after {:?}\n{}: {}",
                            interval, load.cpu, load.t1
                        )?;
                    }
                    match &load.utilization {
                        Ok(pct) => writeln!(out, "{}\t:     {:.6}%", load.cpu, pct)?,
                        Err(e) => writeln!(out, "{}\t:     {}", load.cpu, e.placeholder())?,
                    }
                }
            }
            Err(e) => writeln!(out, "{e}")?,
        }
    }

    if let Some(freqs) = &report.cpu_frequency {
        writeln!(out, "\nCPU Frequency")?;
        match freqs {
            Ok(freqs) => {
                for freq in freqs {
                    match &freq.mhz {
                        Ok(mhz) => writeln!(out, "CPU{}\t:    {:.6} MHz", freq.cpu, mhz)?,
                        Err(e) => writeln!(out, "CPU{}\t:    {}", freq.cpu, e.placeholder())?,
                    }
                }
            }
            Err(e) => writeln!(out, "{e}")?,
        }
    }

    if let Some(memory) = &report.memory {
        match memory {
            Ok(memory) => render_memory(memory, out)?,
            Err(e) => writeln!(out, "\nRAM Utilization\n{e}")?,
        }
    }

    if let Some(power) = &report.power {
        render_power(power, verbose, out)?;
    }

    Ok(())
}

fn render_memory<W: Write>(memory: &MemoryReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "\nRAM Utilization")?;
    match &memory.ram {
        Ok(ram) => {
            writeln!(out, "MemTotal      :     {} kB", ram.total_kb)?;
            writeln!(out, "MemFree       :     {} kB", ram.free_kb)?;
            writeln!(out, "MemAvailable  :     {} kB", ram.available_kb)?;
        }
        Err(e) => writeln!(out, "{e}")?,
    }

    writeln!(out, "\nSwap Mem Utilization")?;
    match &memory.swap {
        Ok(swap) => {
            writeln!(out, "SwapTotal     :     {} kB", swap.total_kb)?;
            writeln!(out, "SwapFree      :     {} kB", swap.free_kb)?;
        }
        Err(e) => writeln!(out, "{e}")?,
    }

    if let Some(cma) = &memory.cma {
        writeln!(out, "\nCMA Mem Utilization")?;
        writeln!(out, "CmaTotal      :     {} kB", cma.total_kb)?;
        writeln!(out, "CmaFree       :     {} kB", cma.free_kb)?;
    }
    Ok(())
}

fn render_power<W: Write>(power: &PowerReport, verbose: bool, out: &mut W) -> io::Result<()> {
    writeln!(out, "\nPower Utilization:")?;
    let Some(platform) = &power.platform else {
        return writeln!(out, "\tno supported platform found for this host");
    };
    if verbose {
        writeln!(out, "{platform}")?;
    }

    let width = power.rails.iter().map(|r| r.alias.len()).max().unwrap_or(0);
    for rail in &power.rails {
        if verbose {
            if let Some(path) = &rail.path {
                writeln!(out, "\t{} => {}", rail.sensor, path.display())?;
            }
        }
        match &rail.value {
            Ok(value) => writeln!(
                out,
                "\t{} ({:>width$}) = {} {}",
                rail.sensor, rail.alias, value, rail.unit
            )?,
            Err(e) => writeln!(
                out,
                "\t{} ({:>width$}) = {}",
                rail.sensor,
                rail.alias,
                e.placeholder()
            )?,
        }
    }
    Ok(())
}

pub fn render_devices<W: Write>(devices: &[HwmonDevice], out: &mut W) -> io::Result<()> {
    for device in devices {
        writeln!(
            out,
            "hwmon{}\t{}",
            device.handle_id,
            device.name.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_load::{CpuId, CpuLoad, Snapshot};
    use crate::memory::{RamUsage, SwapUsage};
    use crate::sensors::RailReading;
    use std::path::PathBuf;

    fn sample_report() -> Report {
        let t0 = Snapshot {
            user: 100,
            system: 50,
            idle: 800,
            iowait: 10,
            irq: 5,
            softirq: 5,
            ..Snapshot::default()
        };
        let t1 = Snapshot {
            user: 120,
            system: 60,
            idle: 810,
            ..t0
        };
        Report {
            hostname: Some("u96v2-sbc".to_string()),
            cpu_utilization: Some(Ok(vec![CpuLoad {
                cpu: CpuId::Core(0),
                t0,
                t1,
                utilization: Ok(25.0 / 35.0 * 100.0),
            }])),
            cpu_frequency: None,
            memory: Some(Ok(MemoryReport {
                ram: Ok(RamUsage {
                    total_kb: 1000,
                    free_kb: 400,
                    available_kb: 600,
                }),
                swap: Ok(SwapUsage {
                    total_kb: 0,
                    free_kb: 0,
                }),
                cma: None,
            })),
            power: Some(PowerReport {
                platform: Some("Ultra96-V2".to_string()),
                rails: vec![
                    RailReading {
                        sensor: "irps5401@6-0043-pout1".to_string(),
                        alias: "VCCAUX".to_string(),
                        unit: "mW".to_string(),
                        path: Some(PathBuf::from("/sys/class/hwmon/hwmon4/power2_input")),
                        raw: Some(1_250_000),
                        value: Ok(1250),
                    },
                    RailReading {
                        sensor: "irps5401@6-0044-pout1".to_string(),
                        alias: "VCCPSAUX".to_string(),
                        unit: "mW".to_string(),
                        path: None,
                        raw: None,
                        value: Err(SensorError::NotFound {
                            device: "irps5401".to_string(),
                            address: "6-0044".to_string(),
                            wanted: "pout1".to_string(),
                        }),
                    },
                ],
            }),
        }
    }

    fn text(report: &Report, verbose: bool) -> String {
        let mut out = Vec::new();
        render(report, OutputFormat::Text, verbose, Duration::from_secs(1), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_blocks() {
        let out = text(&sample_report(), false);
        assert!(out.contains("CPU0\t:     71.428571%"));
        assert!(out.contains("MemAvailable  :     600 kB"));
        assert!(out.contains("irps5401@6-0043-pout1 (  VCCAUX) = 1250 mW"));
        assert!(out.contains("irps5401@6-0044-pout1 (VCCPSAUX) = not found"));
        assert!(!out.contains("CMA"));
        assert!(!out.contains("Stats at t0"));
    }

    #[test]
    fn test_verbose_text_has_samples_and_paths() {
        let out = text(&sample_report(), true);
        assert!(out.contains("Stats at t0\nCPU0: 100 0 50 800 10 5 5"));
        assert!(out.contains("CPU0: 120 0 60 810 10 5 5"));
        assert!(out.contains("=> /sys/class/hwmon/hwmon4/power2_input"));
    }

    #[test]
    fn test_no_platform_notice() {
        let mut report = sample_report();
        report.power = Some(PowerReport {
            platform: None,
            rails: Vec::new(),
        });
        assert!(text(&report, false).contains("no supported platform found"));
    }

    #[test]
    fn test_json_marks_failed_sensors() {
        let mut out = Vec::new();
        render(
            &sample_report(),
            OutputFormat::Json,
            false,
            Duration::from_secs(1),
            &mut out,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let rails = &json["power"]["rails"];
        assert_eq!(rails[0]["value"], 1250);
        assert_eq!(rails[1]["value"]["error"], "not found");
        assert!(rails[1].get("path").is_none());
        assert_eq!(json["cpu_utilization"][0]["cpu"]["core"], 0);
        assert_eq!(json["memory"]["ram"]["total_kb"], 1000);
        assert!(json.get("cpu_frequency").is_none());
    }

    #[test]
    fn test_render_devices() {
        let devices = vec![
            HwmonDevice {
                handle_id: 0,
                name: Some("ams".to_string()),
            },
            HwmonDevice {
                handle_id: 3,
                name: None,
            },
        ];
        let mut out = Vec::new();
        render_devices(&devices, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hwmon0\tams\nhwmon3\t-\n");
    }
}
