use serde::{Deserialize, Serialize};

/// A logical request for one hwmon channel: "the channel with this label on
/// this driver at this bus address".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SensorDescriptor {
    pub device: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub alias: String,
    pub unit: String,
    #[serde(default = "default_scale")]
    pub scale: i64,
}

fn default_scale() -> i64 {
    1
}

/// What drives resolution for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Channel(&'a str),
    Label(&'a str),
}

impl SensorDescriptor {
    pub fn by_label(
        device: &str,
        address: &str,
        label: &str,
        alias: &str,
        unit: &str,
        scale: i64,
    ) -> Self {
        Self {
            device: device.to_string(),
            address: address.to_string(),
            channel: None,
            label: Some(label.to_string()),
            alias: alias.to_string(),
            unit: unit.to_string(),
            scale,
        }
    }

    pub fn by_channel(
        device: &str,
        address: &str,
        channel: &str,
        label: &str,
        alias: &str,
        unit: &str,
        scale: i64,
    ) -> Self {
        Self {
            channel: Some(channel.to_string()),
            ..Self::by_label(device, address, label, alias, unit, scale)
        }
    }

    /// A non-empty fixed channel wins over the label.
    pub fn lookup(&self) -> Option<Lookup<'_>> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.trim().is_empty())
        }
        match (non_empty(&self.channel), non_empty(&self.label)) {
            (Some(channel), _) => Some(Lookup::Channel(channel)),
            (None, Some(label)) => Some(Lookup::Label(label)),
            (None, None) => None,
        }
    }

    /// `device@address-label`, the name used in traces and the report.
    pub fn identity(&self) -> String {
        let wanted = match self.lookup() {
            Some(Lookup::Label(label)) => label,
            Some(Lookup::Channel(channel)) => self.label.as_deref().unwrap_or(channel),
            None => "?",
        };
        format!("{}@{}-{}", self.device, self.address, wanted)
    }

    /// Raw reading converted for display, truncating like integer division.
    pub fn scaled(&self, raw: i64) -> i64 {
        raw / self.scale
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlatformProfile {
    pub name: String,
    /// Selected when the host name contains this substring.
    pub hostname_match: String,
    #[serde(default)]
    pub sensors: Vec<SensorDescriptor>,
}

/// Profile chosen by `forced` (name or hostname match, case-insensitive) when
/// given, otherwise the first whose `hostname_match` occurs in `hostname`.
pub fn select_platform<'a>(
    platforms: &'a [PlatformProfile],
    hostname: Option<&str>,
    forced: Option<&str>,
) -> Option<&'a PlatformProfile> {
    if let Some(forced) = forced {
        return platforms.iter().find(|p| {
            p.name.eq_ignore_ascii_case(forced) || p.hostname_match.eq_ignore_ascii_case(forced)
        });
    }
    let hostname = hostname?;
    platforms
        .iter()
        .find(|p| !p.hostname_match.is_empty() && hostname.contains(&p.hostname_match))
}

fn irps5401_rails(address: &str, aliases: [&str; 5]) -> Vec<SensorDescriptor> {
    let mut rails: Vec<SensorDescriptor> = aliases
        .iter()
        .enumerate()
        .filter(|(_, alias)| !alias.is_empty())
        .map(|(i, alias)| {
            let label = format!("pout{}", i + 1);
            SensorDescriptor::by_label("irps5401", address, &label, alias, "mW", 1000)
        })
        .collect();
    rails.push(board_temperature("irps5401", address));
    rails
}

fn board_temperature(device: &str, address: &str) -> SensorDescriptor {
    SensorDescriptor::by_channel(device, address, "temp1_input", "temp1", "Temperature", "C", 1000)
}

fn ir38060_ultra96v2() -> Vec<SensorDescriptor> {
    vec![
        SensorDescriptor::by_label("ir38060", "6-0045", "pout1", "5V", "mW", 1000),
        SensorDescriptor::by_label("ir38060", "6-0045", "iout1", "5V", "mA", 1),
        SensorDescriptor::by_label("ir38060", "6-0045", "vout1", "5V", "mV", 1),
        board_temperature("ir38060", "6-0045"),
    ]
}

/// Built-in tables for the boards the tool ships with.
pub fn builtin_platforms() -> Vec<PlatformProfile> {
    let mut ultra96 = ir38060_ultra96v2();
    ultra96.extend(irps5401_rails(
        "6-0043",
        ["VCCAUX", "VCCO 1.2V", "VCCO 1.1V", "VCCINT", "3.3V DP"],
    ));
    ultra96.extend(irps5401_rails(
        "6-0044",
        ["VCCPSAUX", "PSINT_LP", "VCCO 3.3V", "PSINT_FP", "PSPLL 1.2V"],
    ));

    let mut uz7ev = vec![
        SensorDescriptor::by_label("ir38063", "6-004c", "pout1", "Carrier 3V3", "mW", 1000),
        SensorDescriptor::by_label("ir38063", "6-004b", "pout1", "Carrier 1V8", "mW", 1000),
    ];
    // pout4 on 6-004a is unused on the carrier; it also has no temperature entry.
    uz7ev.extend(
        irps5401_rails(
            "6-004a",
            [
                "Carrier 0V9 MGTAVCC",
                "Carrier 1V2 MGTAVTT",
                "Carrier 1V1 HDMI",
                "",
                "Carrier 1V8 MGTVCCAUX LDO",
            ],
        )
        .into_iter()
        .filter(|d| d.channel.is_none()),
    );
    uz7ev.extend(irps5401_rails(
        "6-0049",
        [
            "Carrier 0V85 MGTRAVCC",
            "Carrier 1V8 VCCO",
            "Carrier 3V3 VCCO",
            "Carrier 5V MAIN",
            "Carrier 1V8 MGTRAVTT LDO",
        ],
    ));
    uz7ev.push(SensorDescriptor::by_label(
        "ir38063",
        "6-0048",
        "pout1",
        "SOM 0V85 VCCINT",
        "mW",
        1000,
    ));
    uz7ev.extend(irps5401_rails(
        "6-0047",
        [
            "SOM 1V8 VCCAUX",
            "SOM 3V3",
            "SOM 0V9 VCUINT",
            "SOM 1V2 VCCO_HP_66",
            "SOM 1V8 PSDDR_PLL LDO",
        ],
    ));
    uz7ev.extend(irps5401_rails(
        "6-0046",
        [
            "SOM 1V2 VCCO_PSIO",
            "SOM 0V85 VCC_PSINTLP",
            "SOM 1V2 VCCO_PSDDR4_504",
            "SOM 0V85 VCC_PSINTFP",
            "SOM 1V2 VCC_PSPLL LDO",
        ],
    ));

    let mut uz3eg = irps5401_rails("6-0043", ["PSIO", "VCCAUX", "PSINTLP", "PSINTFP", "PSPLL"]);
    uz3eg.extend(irps5401_rails("6-0044", ["PSDDR4", "INT_IO", "3.3V", "INT", "PSDDRPLL"]));
    uz3eg.extend(irps5401_rails("6-0045", ["MGTAVCC", "5V", "3.3V", "VCCO 1.8V", "MGTAVTT"]));

    vec![
        PlatformProfile {
            name: "Ultra96-V2".to_string(),
            hostname_match: "u96v2".to_string(),
            sensors: ultra96,
        },
        PlatformProfile {
            name: "UltraZed-7EV-EVCC".to_string(),
            hostname_match: "uz7ev".to_string(),
            sensors: uz7ev,
        },
        PlatformProfile {
            name: "UltraZed-3EG".to_string(),
            hostname_match: "uz3eg".to_string(),
            sensors: uz3eg,
        },
    ]
}
