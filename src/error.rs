use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Per-sensor and per-metric failures. None of these aborts a report.
#[derive(Debug, Error)]
pub enum SensorError {
    /// A pseudo-file could not be opened or read.
    #[error("unable to open {}: {source}", .path.display())]
    IoUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The hwmon enumeration root itself is unreadable.
    #[error("no hwmon devices: unable to open {}: {source}", .path.display())]
    NoDevices {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no hwmon channel found for {device}@{address} ({wanted})")]
    NotFound {
        device: String,
        address: String,
        wanted: String,
    },

    #[error("malformed data in {}: {reason}", .path.display())]
    MalformedData { path: PathBuf, reason: String },

    #[error("utilization undefined over a zero-width sample window")]
    DivisionUndefined,

    #[error("cpu counters went backwards between samples")]
    CounterReset,

    #[error("reading {} timed out after {:?}", .path.display(), .after)]
    Timeout { path: PathBuf, after: Duration },
}

impl SensorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SensorError::IoUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SensorError::MalformedData {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// OS error code of the underlying I/O failure, if there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            SensorError::IoUnavailable { source, .. } | SensorError::NoDevices { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Short text shown in place of a value in the report.
    pub fn placeholder(&self) -> &'static str {
        match self {
            SensorError::IoUnavailable { .. } => "unavailable",
            SensorError::NoDevices { .. } => "no hwmon devices",
            SensorError::NotFound { .. } => "not found",
            SensorError::MalformedData { .. } => "malformed",
            SensorError::DivisionUndefined | SensorError::CounterReset => "undefined",
            SensorError::Timeout { .. } => "timeout",
        }
    }
}
