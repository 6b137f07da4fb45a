//! Device search tool — read-only query over the device directory.

use async_trait::async_trait;
use fleetpilot_core::error::ToolError;
use fleetpilot_core::tool::{Tool, ToolOutcome};
use serde_json::json;
use std::sync::Arc;

use crate::devices::{DeviceDirectory, DeviceQuery, DeviceStatus};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

pub struct SearchDevicesTool {
    directory: Arc<dyn DeviceDirectory>,
}

impl SearchDevicesTool {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for SearchDevicesTool {
    fn name(&self) -> &str {
        "search_devices"
    }

    fn description(&self) -> &str {
        "Search the device fleet by keyword (matches id, name, model, group), optionally filtered by status."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "Text to look for; empty matches every device"
                },
                "status": {
                    "type": "string",
                    "enum": ["online", "offline", "updating", "fault"]
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default 10, max 50)"
                }
            },
            "required": ["keyword"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let keyword = args["keyword"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'keyword' argument".into()))?;

        let status = args["status"]
            .as_str()
            .map(str::parse::<DeviceStatus>)
            .transpose()
            .map_err(ToolError::InvalidArguments)?;

        let limit = args["limit"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);

        let query = DeviceQuery {
            keyword: keyword.to_string(),
            status,
            limit: Some(limit),
        };
        let devices = self.directory.search(&query).await?;

        let count = devices.len();
        let message = match count {
            0 => format!("No devices match '{keyword}'"),
            1 => "Found 1 device".to_string(),
            n => format!("Found {n} devices"),
        };

        Ok(ToolOutcome::ok_with_message(
            json!({ "count": count, "devices": devices }),
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::InMemoryDirectory;

    fn tool() -> SearchDevicesTool {
        SearchDevicesTool::new(Arc::new(InMemoryDirectory::demo()))
    }

    #[tokio::test]
    async fn finds_devices_by_keyword() {
        let outcome = tool().execute(json!({"keyword": "living room"})).await.unwrap();

        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["devices"][0]["id"], "dev-0001");
    }

    #[tokio::test]
    async fn filters_by_status() {
        let outcome = tool()
            .execute(json!({"keyword": "", "status": "fault"}))
            .await
            .unwrap();

        let data = outcome.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["devices"][0]["status"], "fault");
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let outcome = tool()
            .execute(json!({"keyword": "", "limit": 0}))
            .await
            .unwrap();
        assert_eq!(outcome.data.unwrap()["count"], 1);
    }

    #[tokio::test]
    async fn no_matches_is_still_success() {
        let outcome = tool().execute(json!({"keyword": "submarine"})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["count"], 0);
        assert!(outcome.message.unwrap().contains("No devices"));
    }

    #[tokio::test]
    async fn bad_status_is_invalid_arguments() {
        let err = tool()
            .execute(json!({"keyword": "x", "status": "asleep"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
