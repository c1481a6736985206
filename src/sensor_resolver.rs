//! Resolution of logical sensor descriptors to hwmon channel files.
//!
//! Devices show up twice under sysfs: once as `hwmon<N>` with an index that
//! moves between boots, and once under their driver directory keyed by bus
//! address. A descriptor names the driver and address; the resolver walks the
//! enumerated devices, matches the address-qualified driver name, then
//! re-derives the hwmon index the channel files actually live under.

use crate::error::SensorError;
use crate::hwmon_devices::{parse_hwmon_index, read_trimmed, HwmonRoot};
use crate::registry::{Lookup, SensorDescriptor};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const LABEL_SUFFIX: &str = "_label";
const INPUT_SUFFIX: &str = "_input";

/// An enumerated device whose address-qualified name file could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub handle_id: u32,
    pub driver_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub path: PathBuf,
    pub device: DeviceHandle,
    /// Index of the `hwmon<K>` directory holding the channel files.
    pub hwmon_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    device: String,
    address: String,
    label: String,
}

/// Channel names discovered by label search, kept for one run.
///
/// Only the file name is cached; the hwmon index is re-derived on every
/// lookup since it can move when a driver is rebound.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    channels: HashMap<CacheKey, String>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    fn key(descriptor: &SensorDescriptor, label: &str) -> CacheKey {
        CacheKey {
            device: descriptor.device.clone(),
            address: descriptor.address.clone(),
            label: label.to_string(),
        }
    }

    fn get(&self, descriptor: &SensorDescriptor, label: &str) -> Option<&str> {
        self.channels
            .get(&Self::key(descriptor, label))
            .map(String::as_str)
    }

    fn insert(&mut self, descriptor: &SensorDescriptor, label: &str, channel: String) {
        self.channels.insert(Self::key(descriptor, label), channel);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SensorResolver {
    root: HwmonRoot,
}

impl SensorResolver {
    pub fn new(root: HwmonRoot) -> Self {
        Self { root }
    }

    /// `<root>/hwmon<N>/device/driver/<address>`
    fn driver_device_dir(&self, handle_id: u32, address: &str) -> PathBuf {
        self.root
            .device_dir(handle_id)
            .join("device")
            .join("driver")
            .join(address)
    }

    /// Step one: the driver name of the device at `address`, reached through
    /// enumerated device `handle_id`.
    pub fn device_handle(&self, handle_id: u32, address: &str) -> Option<DeviceHandle> {
        let name_path = self.driver_device_dir(handle_id, address).join("name");
        let driver_name = read_trimmed(&name_path)?;
        debug!("\t{} => {}", name_path.display(), driver_name);
        Some(DeviceHandle {
            handle_id,
            driver_name,
        })
    }

    /// Step two: the hwmon index listed under the addressed device itself.
    pub fn hwmon_index(&self, handle: &DeviceHandle, address: &str) -> Option<u32> {
        let hwmon_dir = self
            .driver_device_dir(handle.handle_id, address)
            .join("hwmon");
        let entries = match fs::read_dir(&hwmon_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Unable to open {}: {}", hwmon_dir.display(), e);
                return None;
            }
        };
        let index = entries
            .flatten()
            .filter_map(|entry| parse_hwmon_index(&entry.file_name().to_string_lossy()))
            .min();
        match index {
            Some(index) => debug!("\t{} => hwmon{}", hwmon_dir.display(), index),
            None => debug!("No hwmon entry under {}", hwmon_dir.display()),
        }
        index
    }

    pub fn resolve(
        &self,
        descriptor: &SensorDescriptor,
        cache: &mut ResolutionCache,
    ) -> Result<ResolvedChannel, SensorError> {
        let not_found = |wanted: &str| SensorError::NotFound {
            device: descriptor.device.clone(),
            address: descriptor.address.clone(),
            wanted: wanted.to_string(),
        };
        let Some(lookup) = descriptor.lookup() else {
            return Err(not_found("no channel or label"));
        };

        for handle_id in self.root.list_devices()? {
            let Some(handle) = self.device_handle(handle_id, &descriptor.address) else {
                continue;
            };
            if handle.driver_name != descriptor.device {
                continue;
            }
            let Some(hwmon_index) = self.hwmon_index(&handle, &descriptor.address) else {
                continue;
            };

            let channel = match lookup {
                Lookup::Channel(channel) => Some(channel.to_string()),
                Lookup::Label(label) => match cache.get(descriptor, label) {
                    Some(cached) => Some(cached.to_string()),
                    None => {
                        let found = self.find_labelled_channel(hwmon_index, label);
                        if let Some(channel) = &found {
                            cache.insert(descriptor, label, channel.clone());
                        }
                        found
                    }
                },
            };

            if let Some(channel) = channel {
                let path = self.root.device_dir(hwmon_index).join(channel);
                debug!("\t{} => {}", descriptor.identity(), path.display());
                return Ok(ResolvedChannel {
                    path,
                    device: handle,
                    hwmon_index,
                });
            }
        }

        Err(match lookup {
            Lookup::Channel(channel) => not_found(channel),
            Lookup::Label(label) => not_found(label),
        })
    }

    /// Input file paired with the first `*_label` file (by name) whose
    /// content is exactly `label`.
    fn find_labelled_channel(&self, hwmon_index: u32, label: &str) -> Option<String> {
        let dir = self.root.device_dir(hwmon_index);
        debug!("\tSearching {} for label {}", dir.display(), label);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Unable to open {}: {}", dir.display(), e);
                return None;
            }
        };

        let mut label_files: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(LABEL_SUFFIX))
            .collect();
        label_files.sort();

        label_files.into_iter().find_map(|file_name| {
            let content = read_trimmed(&dir.join(&file_name))?;
            if content != label {
                return None;
            }
            input_for_label(&file_name)
        })
    }
}

/// `power3_label` -> `power3_input`
pub fn input_for_label(label_file: &str) -> Option<String> {
    let base = label_file.strip_suffix(LABEL_SUFFIX)?;
    Some(format!("{base}{INPUT_SUFFIX}"))
}


#[cfg(test)]
mod tests {
    use super::fixture::*;
    use super::*;

    fn resolver(root: &std::path::Path) -> SensorResolver {
        SensorResolver::new(HwmonRoot::new(root))
    }

    #[test]
    fn test_input_for_label() {
        assert_eq!(input_for_label("power3_label"), Some("power3_input".to_string()));
        assert_eq!(input_for_label("in12_label"), Some("in12_input".to_string()));
        assert_eq!(input_for_label("power3_input"), None);
    }

    #[test]
    fn test_fixed_channel_uses_cross_referenced_index() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), 0, 7, "ir38060", "6-0045");

        let d = SensorDescriptor::by_channel(
            "ir38060",
            "6-0045",
            "temp1_input",
            "temp1",
            "Temperature",
            "C",
            1000,
        );
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();

        assert_eq!(resolved.path, dir.path().join("hwmon7").join("temp1_input"));
        assert_eq!(resolved.hwmon_index, 7);
        assert_eq!(
            resolved.device,
            DeviceHandle {
                handle_id: 0,
                driver_name: "ir38060".to_string()
            }
        );
    }

    #[test]
    fn test_fixed_channel_is_not_checked_for_existence() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), 0, 0, "ir38060", "6-0045");
        let d = SensorDescriptor::by_channel("ir38060", "6-0045", "curr9_input", "", "I", "mA", 1);
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();
        assert!(!resolved.path.exists());
    }

    #[test]
    fn test_label_matches_exactly_not_by_substring() {
        let dir = tempfile::tempdir().unwrap();
        irps5401(dir.path());

        let d = SensorDescriptor::by_label("irps5401", "6-0043", "pout3", "VCCO 1.1V", "mW", 1000);
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();
        assert_eq!(resolved.path, dir.path().join("hwmon4").join("power4_input"));
    }

    #[test]
    fn test_label_resolution_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        irps5401(dir.path());
        let resolver = resolver(dir.path());
        let mut cache = ResolutionCache::new();

        let d = SensorDescriptor::by_label("irps5401", "6-0043", "pout5", "3.3V DP", "mW", 1000);
        let first = resolver.resolve(&d, &mut cache).unwrap();
        assert_eq!(cache.len(), 1);

        // The cached name is used even once the label file disappears.
        fs::remove_file(dir.path().join("hwmon4/power6_label")).unwrap();
        let second = resolver.resolve(&d, &mut cache).unwrap();
        assert_eq!(first.path, second.path);
        assert!(resolver.resolve(&d, &mut ResolutionCache::new()).is_err());
    }

    #[test]
    fn test_duplicate_labels_resolve_to_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), 0, 2, "ir38063", "6-004c");
        add_channel(dir.path(), 2, "power2", Some("pout1"), "1");
        add_channel(dir.path(), 2, "power1", Some("pout1"), "2");

        let d = SensorDescriptor::by_label("ir38063", "6-004c", "pout1", "Carrier 3V3", "mW", 1000);
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();
        assert_eq!(resolved.path, dir.path().join("hwmon2").join("power1_input"));
    }

    #[test]
    fn test_address_disambiguates_same_driver() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), 0, 5, "irps5401", "6-0043");
        add_device(dir.path(), 1, 3, "irps5401", "6-0044");
        add_channel(dir.path(), 5, "power1", Some("pout1"), "100");
        add_channel(dir.path(), 3, "power1", Some("pout1"), "200");

        let d = SensorDescriptor::by_label("irps5401", "6-0044", "pout1", "VCCPSAUX", "mW", 1000);
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();
        assert_eq!(resolved.hwmon_index, 3);
        assert_eq!(resolved.device.handle_id, 1);
    }

    #[test]
    fn test_driver_name_mismatch_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        irps5401(dir.path());

        let d = SensorDescriptor::by_label("ir38060", "6-0043", "pout1", "5V", "mW", 1000);
        let err = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap_err();
        assert!(matches!(err, SensorError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_label_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        irps5401(dir.path());

        let d = SensorDescriptor::by_label("irps5401", "6-0043", "pout", "x", "mW", 1000);
        let mut cache = ResolutionCache::new();
        let err = resolver(dir.path()).resolve(&d, &mut cache).unwrap_err();
        assert!(matches!(err, SensorError::NotFound { ref wanted, .. } if wanted == "pout"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_missing_root_propagates_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        let d = SensorDescriptor::by_label("irps5401", "6-0043", "pout1", "x", "mW", 1000);
        let err = resolver(&dir.path().join("absent"))
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap_err();
        assert!(matches!(err, SensorError::NoDevices { .. }));
    }

    #[test]
    fn test_device_without_hwmon_link_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let addressed = dir.path().join("hwmon0/device/driver/6-0043");
        fs::create_dir_all(&addressed).unwrap();
        fs::write(addressed.join("name"), "irps5401\n").unwrap();
        add_device(dir.path(), 1, 9, "irps5401", "6-0043");

        let d = SensorDescriptor::by_channel(
            "irps5401",
            "6-0043",
            "temp1_input",
            "temp1",
            "T",
            "C",
            1000,
        );
        let resolved = resolver(dir.path())
            .resolve(&d, &mut ResolutionCache::new())
            .unwrap();
        assert_eq!(resolved.hwmon_index, 9);
    }
}
