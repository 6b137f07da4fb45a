//! Console wiring shared by the CLI commands: shell, demo fleet, tools,
//! context provider, and the chat session.

use fleetpilot_agent::{AgentLoop, Assistant, ConsoleSession, TurnDriver};
use fleetpilot_config::AppConfig;
use fleetpilot_core::context::{
    ConsoleShell, ContextProvider, PageContextGuard, PageContextSource, PageRoute, page_source,
};
use fleetpilot_core::error::ContextError;
use fleetpilot_core::event::EventBus;
use fleetpilot_core::provider::Provider;
use fleetpilot_core::tool::ToolRegistry;
use fleetpilot_tools::{DeviceDirectory, DeviceStatus, InMemoryDirectory};
use futures::FutureExt;
use serde_json::json;
use std::sync::Arc;

/// A console with the demo fleet and a dashboard page registered.
pub struct ConsoleRuntime {
    pub shell: ConsoleShell,
    pub tools: Arc<ToolRegistry>,
    pub context: Arc<ContextProvider>,
    _page: PageContextGuard,
}

impl ConsoleRuntime {
    pub fn demo(config: &AppConfig) -> Self {
        let shell = ConsoleShell::new(PageRoute::default());
        let directory: Arc<dyn DeviceDirectory> = Arc::new(InMemoryDirectory::demo());

        let tools = fleetpilot_tools::default_registry(&shell, directory.clone())
            .with_timeout(config.agent.tool_timeout());
        let context = ContextProvider::new(
            config.operator_identity(),
            &config.environment.name,
            shell.clone(),
        )
        .with_getter_timeout(config.agent.page_context_timeout());
        let page = shell.set_page_context(fleet_overview_page(&shell, directory));

        Self {
            shell,
            tools: Arc::new(tools),
            context: Arc::new(context),
            _page: page,
        }
    }

    /// Build a chat session over this console.
    pub fn session(&self, config: &AppConfig, provider: Arc<dyn Provider>, recursive: bool) -> ConsoleSession {
        let agent = AgentLoop::from_config(
            config,
            provider,
            self.tools.clone(),
            self.context.clone(),
            Arc::new(EventBus::default()),
        );
        let driver = if recursive {
            TurnDriver::Recursive(Assistant::from_config(config, agent))
        } else {
            TurnDriver::Iterative(agent)
        };
        ConsoleSession::new(driver, &config.agent.greeting)
    }
}

/// Page snapshot: current route plus a fleet headcount.
pub fn fleet_overview_page(
    shell: &ConsoleShell,
    directory: Arc<dyn DeviceDirectory>,
) -> Arc<dyn PageContextSource> {
    let routes = shell.routes.clone();
    page_source(move || {
        let routes = routes.clone();
        let directory = directory.clone();
        async move {
            let devices = directory
                .all()
                .await
                .map_err(|e| ContextError::GetterFailed(e.to_string()))?;
            let count = |status: DeviceStatus| devices.iter().filter(|d| d.status == status).count();
            Ok::<_, ContextError>(json!({
                "page": routes.current().path,
                "totalDevices": devices.len(),
                "onlineDevices": count(DeviceStatus::Online),
                "offlineDevices": count(DeviceStatus::Offline),
                "faultyDevices": count(DeviceStatus::Fault),
            }))
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_console_reports_fleet_overview() {
        let runtime = ConsoleRuntime::demo(&AppConfig::default());
        let ctx = runtime.context.global_context().await;

        assert_eq!(ctx.active_view["totalDevices"], 7);
        assert_eq!(ctx.active_view["onlineDevices"], 3);
        assert_eq!(ctx.system.current_page.path, "/dashboard");
        assert_eq!(runtime.tools.len(), 3);
    }

    #[tokio::test]
    async fn dropping_runtime_releases_page() {
        let runtime = ConsoleRuntime::demo(&AppConfig::default());
        let shell = runtime.shell.clone();
        assert!(shell.pages.is_registered());
        drop(runtime);
        assert!(!shell.pages.is_registered());
    }
}
