use crate::error::SensorError;
use std::fs;
use std::path::{Path, PathBuf};

pub const HWMON_BASE_PATH: &str = "/sys/class/hwmon";
const HWMON_PREFIX: &str = "hwmon";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwmonDevice {
    pub handle_id: u32,
    pub name: Option<String>,
}

/// The hwmon enumeration root, `/sys/class/hwmon` on a real host.
#[derive(Debug, Clone)]
pub struct HwmonRoot {
    base: PathBuf,
}

impl Default for HwmonRoot {
    fn default() -> Self {
        Self::new(HWMON_BASE_PATH)
    }
}

impl HwmonRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// `<root>/hwmon<id>`
    pub fn device_dir(&self, handle_id: u32) -> PathBuf {
        self.base.join(format!("{HWMON_PREFIX}{handle_id}"))
    }

    /// Handle ids of every `hwmon<N>` entry, ascending.
    ///
    /// An unreadable root is `NoDevices`, never an empty list.
    pub fn list_devices(&self) -> Result<Vec<u32>, SensorError> {
        let entries = fs::read_dir(&self.base).map_err(|source| SensorError::NoDevices {
            path: self.base.clone(),
            source,
        })?;

        let mut ids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| parse_hwmon_index(&entry.file_name().to_string_lossy()))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn read_device_name(&self, handle_id: u32) -> Option<String> {
        read_trimmed(&self.device_dir(handle_id).join("name"))
    }

    pub fn discover_devices(&self) -> Result<Vec<HwmonDevice>, SensorError> {
        Ok(self
            .list_devices()?
            .into_iter()
            .map(|handle_id| HwmonDevice {
                handle_id,
                name: self.read_device_name(handle_id),
            })
            .collect())
    }
}

/// `hwmon12` -> `Some(12)`; anything else, including `hwmon` alone, is `None`.
pub fn parse_hwmon_index(entry_name: &str) -> Option<u32> {
    let digits = entry_name.strip_prefix(HWMON_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub(crate) fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|content| content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hwmon_index() {
        assert_eq!(parse_hwmon_index("hwmon0"), Some(0));
        assert_eq!(parse_hwmon_index("hwmon17"), Some(17));
        assert_eq!(parse_hwmon_index("hwmon"), None);
        assert_eq!(parse_hwmon_index("hwmon1a"), None);
        assert_eq!(parse_hwmon_index("thermal_zone0"), None);
    }

    #[test]
    fn test_list_devices_skips_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["hwmon3", "hwmon0", "hwmon12", "power", "hwmonX"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let root = HwmonRoot::new(dir.path());
        assert_eq!(root.list_devices().unwrap(), vec![0, 3, 12]);
    }

    #[test]
    fn test_empty_root_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = HwmonRoot::new(dir.path());
        assert!(root.list_devices().unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        let root = HwmonRoot::new(dir.path().join("absent"));
        assert!(matches!(
            root.list_devices(),
            Err(SensorError::NoDevices { .. })
        ));
    }

    #[test]
    fn test_discover_devices_reads_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("hwmon0")).unwrap();
        fs::write(dir.path().join("hwmon0/name"), "irps5401\n").unwrap();
        fs::create_dir(dir.path().join("hwmon1")).unwrap();

        let devices = HwmonRoot::new(dir.path()).discover_devices().unwrap();
        assert_eq!(
            devices,
            vec![
                HwmonDevice {
                    handle_id: 0,
                    name: Some("irps5401".to_string())
                },
                HwmonDevice {
                    handle_id: 1,
                    name: None
                },
            ]
        );
    }
}
