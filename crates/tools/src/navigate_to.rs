//! Navigation tool — moves the console router to another page.

use async_trait::async_trait;
use fleetpilot_core::context::RouteState;
use fleetpilot_core::error::ToolError;
use fleetpilot_core::tool::{Tool, ToolOutcome};
use serde_json::json;
use tracing::info;

use crate::routes::RouteCatalogue;

/// `navigate_to {path}`: switch the console to a known page.
pub struct NavigateToTool {
    routes: RouteState,
    catalogue: RouteCatalogue,
    description: String,
}

impl NavigateToTool {
    pub fn new(routes: RouteState) -> Self {
        let catalogue = RouteCatalogue;
        let description = format!(
            "Navigate the console to a page. Known pages: {}. Detail pages take an id, e.g. /devices/dev-0001.",
            catalogue.summary()
        );
        Self {
            routes,
            catalogue,
            description,
        }
    }
}

#[async_trait]
impl Tool for NavigateToTool {
    fn name(&self) -> &str {
        "navigate_to"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Console path to open, e.g. '/devices'"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = args["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let Some(route) = self.catalogue.resolve(path) else {
            return Ok(ToolOutcome::failure(format!(
                "Unknown page '{path}'. Known pages: {}",
                self.catalogue.summary()
            )));
        };

        let from = self.routes.current().path;
        info!(from = %from, to = %route.path, "Copilot navigation");

        let data = json!({ "path": route.path, "name": route.name });
        let message = format!("Navigated to {}", route.name);
        self.routes.navigate(route);

        Ok(ToolOutcome::ok_with_message(data, message))
    }
}
