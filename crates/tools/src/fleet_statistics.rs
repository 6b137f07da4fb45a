//! Fleet statistics tool — counts devices grouped by one attribute.

use async_trait::async_trait;
use fleetpilot_core::error::ToolError;
use fleetpilot_core::tool::{Tool, ToolOutcome};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::devices::{Device, DeviceDirectory};

pub struct FleetStatisticsTool {
    directory: Arc<dyn DeviceDirectory>,
}

impl FleetStatisticsTool {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { directory }
    }
}

/// Keys `fleet_statistics` can group by.
pub const GROUP_KEYS: &[&str] = &["status", "firmware", "model"];

fn group_key(device: &Device, group_by: &str) -> Option<String> {
    match group_by {
        "status" => Some(device.status.to_string()),
        "firmware" => Some(device.firmware.clone()),
        "model" => Some(device.model.clone()),
        _ => None,
    }
}

/// Count devices per key; keys come back sorted. `None` for an unknown
/// grouping, even over an empty fleet.
pub fn aggregate(devices: &[Device], group_by: &str) -> Option<BTreeMap<String, usize>> {
    if !GROUP_KEYS.contains(&group_by) {
        return None;
    }
    let mut counts = BTreeMap::new();
    for device in devices {
        *counts.entry(group_key(device, group_by)?).or_insert(0) += 1;
    }
    Some(counts)
}

#[async_trait]
impl Tool for FleetStatisticsTool {
    fn name(&self) -> &str {
        "fleet_statistics"
    }

    fn description(&self) -> &str {
        "Count fleet devices grouped by status, firmware version, or model."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "group_by": {
                    "type": "string",
                    "enum": GROUP_KEYS
                }
            },
            "required": ["group_by"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let group_by = args["group_by"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'group_by' argument".into()))?;

        let devices = self.directory.all().await?;
        let groups = aggregate(&devices, group_by).ok_or_else(|| {
            ToolError::InvalidArguments(format!("Cannot group by '{group_by}'"))
        })?;

        Ok(ToolOutcome::ok(json!({
            "groupBy": group_by,
            "total": devices.len(),
            "groups": groups,
        })))
    }
}
