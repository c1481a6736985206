use crate::error::SensorError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{task, time};

/// Raw integer reading of a channel file (milli-units for most hwmon channels).
pub fn read_value(path: &Path) -> Result<i64, SensorError> {
    let raw = fs::read_to_string(path).map_err(|e| SensorError::io(path, e))?;
    parse_value(path, &raw)
}

fn parse_value(path: &Path, raw: &str) -> Result<i64, SensorError> {
    let token = raw
        .split_whitespace()
        .next()
        .ok_or_else(|| SensorError::malformed(path, "empty file"))?;
    token
        .parse::<i64>()
        .map_err(|e| SensorError::malformed(path, format!("{token:?}: {e}")))
}

/// `read_value` on the blocking pool, abandoned after `timeout`.
///
/// A read stuck on a removed device keeps its blocking thread; the caller
/// just stops waiting for it.
pub async fn read_value_with_timeout(
    path: PathBuf,
    timeout: Duration,
) -> Result<i64, SensorError> {
    let reader_path = path.clone();
    match time::timeout(timeout, task::spawn_blocking(move || read_value(&reader_path))).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SensorError::io(path, std::io::Error::other(join_error))),
        Err(_) => Err(SensorError::Timeout {
            path,
            after: timeout,
        }),
    }
}
