mod config;
mod cpu_freq;
mod cpu_load;
mod error;
mod hwmon_devices;
mod memory;
mod registry;
mod report;
mod sensor_reader;
mod sensor_resolver;
mod sensors;

use crate::hwmon_devices::HwmonRoot;
use crate::report::{render, render_devices, OutputFormat};
use crate::sensors::{Selection, StatsCollector};
use anyhow::{bail, Context, Result};
use clap::Parser;
use config::StatsConfig;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use sysinfo::System;
use tokio::signal::unix::{signal, SignalKind};
use tokio::{signal, time};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "platformstats")]
#[command(about = "Print CPU, memory and power rail statistics for this platform")]
#[command(version)]
struct Cli {
    /// Print raw samples and sensor resolution traces
    #[arg(short, long)]
    verbose: bool,

    /// Print all supported stats (default when no stat is chosen)
    #[arg(short, long)]
    all: bool,

    /// Print CPU utilization
    #[arg(short, long)]
    cpu_util: bool,

    /// Print power utilization
    #[arg(short, long)]
    power_util: bool,

    /// Print RAM, swap and CMA utilization
    #[arg(short, long)]
    mem_util: bool,

    /// Print CPU frequency
    #[arg(short = 'f', long)]
    cpu_freq: bool,

    /// CPU utilization sample window in seconds
    #[arg(short, long, value_parser = parse_seconds)]
    interval: Option<Duration>,

    /// Append the report to this file instead of stdout
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Repeat the report every N seconds until interrupted
    #[arg(long, value_parser = parse_seconds)]
    repeat: Option<Duration>,

    /// Use this platform profile instead of matching the host name
    #[arg(long)]
    platform: Option<String>,

    /// Configuration file (defaults to the standard locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List enumerated hwmon devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the default configuration to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

impl Cli {
    fn selection(&self) -> Selection {
        let any = self.cpu_util || self.power_util || self.mem_util || self.cpu_freq;
        if self.all || !any {
            return Selection::all();
        }
        Selection {
            cpu_util: self.cpu_util,
            cpu_freq: self.cpu_freq,
            memory: self.mem_util,
            power: self.power_util,
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("invalid number of seconds: {e}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("must be a positive number of seconds".to_string());
    }
    Ok(Duration::from_secs_f64(secs))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(path) = &cli.dump_config {
        StatsConfig::save_example(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = match &cli.config {
        Some(path) => StatsConfig::load_from_file(path).context("Failed to load configuration")?,
        None => StatsConfig::load_with_fallback(),
    };

    let mut out = open_output(cli.logfile.as_ref())?;

    if cli.list_devices {
        let devices = HwmonRoot::new(&config.paths.hwmon_root).discover_devices()?;
        render_devices(&devices, &mut out)?;
        return Ok(ExitCode::SUCCESS);
    }

    let interval = cli.interval.unwrap_or_else(|| config.interval());
    let selection = cli.selection();
    let hostname = System::host_name();
    info!("hostname={}", hostname.as_deref().unwrap_or("<unknown>"));

    let mut collector = StatsCollector::new(config, hostname, cli.platform.clone());
    if selection.power && cli.platform.is_some() && collector.platform().is_none() {
        bail!("Unknown platform profile: {}", cli.platform.as_deref().unwrap_or_default());
    }
    if let Some(platform) = collector.platform() {
        info!("Platform profile: {}", platform.name);
    }

    loop {
        let Some(report) = collector.collect(selection, interval, shutdown_signal()).await else {
            info!("Interrupted while sampling, shutting down...");
            return Ok(ExitCode::SUCCESS);
        };

        render(&report, cli.format, cli.verbose, interval, &mut out)?;
        out.flush()?;

        if let Some(failure) = report.mandatory_failure() {
            let code = failure.os_code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1);
            return Ok(ExitCode::from(code));
        }

        let Some(repeat) = cli.repeat else {
            return Ok(ExitCode::SUCCESS);
        };
        tokio::select! {
            _ = time::sleep(repeat) => {},
            _ = shutdown_signal() => {
                info!("Received shutdown signal, stopping");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

fn open_output(logfile: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    match logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

async fn shutdown_signal() {
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to bind SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = sigterm => {},
    }
}
