//! Device directory — the read-only view of the fleet that tools query.
//!
//! The console backs this with its device REST API; [`InMemoryDirectory`]
//! serves tests and the CLI demo.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetpilot_core::error::ToolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connection state reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Updating,
    Fault,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 4] = [
        DeviceStatus::Online,
        DeviceStatus::Offline,
        DeviceStatus::Updating,
        DeviceStatus::Fault,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Updating => "updating",
            DeviceStatus::Fault => "fault",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown device status '{s}'"))
    }
}

/// A managed device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub model: String,
    pub firmware: String,
    pub status: DeviceStatus,
    pub group: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Case-insensitive keyword match over id, name, model, and group.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.id.as_str()),
            Some(self.name.as_str()),
            Some(self.model.as_str()),
            self.group.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Search parameters for [`DeviceDirectory::search`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceQuery {
    pub keyword: String,
    pub status: Option<DeviceStatus>,
    pub limit: Option<usize>,
}

/// Read-only access to the device fleet.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Devices matching `query`, in directory order, truncated to `query.limit`.
    async fn search(&self, query: &DeviceQuery) -> Result<Vec<Device>, ToolError>;

    /// Every device in the fleet.
    async fn all(&self) -> Result<Vec<Device>, ToolError>;
}

/// A fixed device list held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    devices: Vec<Device>,
}

impl InMemoryDirectory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// A small mixed fleet used by the CLI and tests.
    pub fn demo() -> Self {
        let base = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let device = |id: &str, name: &str, model: &str, fw: &str, status, group: Option<&str>, mins: i64| Device {
            id: id.into(),
            name: name.into(),
            model: model.into(),
            firmware: fw.into(),
            status,
            group: group.map(Into::into),
            last_seen: base - Duration::minutes(mins),
        };

        Self::new(vec![
            device("dev-0001", "Living Room Light", "LX-200", "2.4.1", DeviceStatus::Online, Some("Home"), 1),
            device("dev-0002", "Kitchen Light", "LX-200", "2.3.0", DeviceStatus::Online, Some("Home"), 2),
            device("dev-0003", "Front Door Lock", "DL-10", "1.8.2", DeviceStatus::Offline, Some("Home"), 240),
            device("dev-0004", "Garage Sensor", "TS-5", "3.0.0", DeviceStatus::Updating, Some("Garage"), 5),
            device("dev-0005", "Warehouse Thermostat", "TH-900", "5.1.0", DeviceStatus::Fault, Some("Warehouse"), 30),
            device("dev-0006", "Warehouse Camera", "CM-4K", "1.2.7", DeviceStatus::Online, Some("Warehouse"), 1),
            device("dev-0007", "Spare Gateway", "GW-1", "0.9.9", DeviceStatus::Offline, None, 10_080),
        ])
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDirectory {
    async fn search(&self, query: &DeviceQuery) -> Result<Vec<Device>, ToolError> {
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(self
            .devices
            .iter()
            .filter(|d| query.status.is_none_or(|s| d.status == s))
            .filter(|d| d.matches_keyword(&query.keyword))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Device>, ToolError> {
        Ok(self.devices.clone())
    }
}
