use crate::error::SensorError;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// `/proc/meminfo` keyed by field name, values in kB.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    fields: HashMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RamUsage {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapUsage {
    pub total_kb: u64,
    pub free_kb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CmaUsage {
    pub total_kb: u64,
    pub free_kb: u64,
}

impl MemInfo {
    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .filter_map(|line| {
                let (key, rest) = line.split_once(':')?;
                let value = rest.split_whitespace().next()?.parse().ok()?;
                Some((key.trim().to_string(), value))
            })
            .collect();
        Self { fields }
    }

    pub fn read(proc_root: &Path) -> Result<Self, SensorError> {
        let path = proc_root.join("meminfo");
        let content = fs::read_to_string(&path).map_err(|e| SensorError::io(&path, e))?;
        let info = Self::parse(&content);
        if info.fields.is_empty() {
            return Err(SensorError::malformed(path, "no fields"));
        }
        Ok(info)
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.fields.get(key).copied()
    }

    fn require(&self, key: &str) -> Result<u64, SensorError> {
        self.get(key)
            .ok_or_else(|| SensorError::malformed("meminfo", format!("missing {key}")))
    }

    pub fn ram(&self) -> Result<RamUsage, SensorError> {
        Ok(RamUsage {
            total_kb: self.require("MemTotal")?,
            free_kb: self.require("MemFree")?,
            available_kb: self.require("MemAvailable")?,
        })
    }

    pub fn swap(&self) -> Result<SwapUsage, SensorError> {
        Ok(SwapUsage {
            total_kb: self.require("SwapTotal")?,
            free_kb: self.require("SwapFree")?,
        })
    }

    /// Only kernels built with CMA report it.
    pub fn cma(&self) -> Option<CmaUsage> {
        Some(CmaUsage {
            total_kb: self.get("CmaTotal")?,
            free_kb: self.get("CmaFree")?,
        })
    }
}
