//! Fleet console tools for FleetPilot.
//!
//! Tools give the copilot a way to act on the console:
//! open pages, search the device fleet, and summarise it.

pub mod devices;
pub mod fleet_statistics;
pub mod navigate_to;
pub mod routes;
pub mod search_devices;

use fleetpilot_core::context::ConsoleShell;
use fleetpilot_core::tool::ToolRegistry;
use std::sync::Arc;

pub use devices::{Device, DeviceDirectory, DeviceQuery, DeviceStatus, InMemoryDirectory};
pub use fleet_statistics::FleetStatisticsTool;
pub use navigate_to::NavigateToTool;
pub use routes::{ConsoleRoute, RouteCatalogue};
pub use search_devices::SearchDevicesTool;

/// Create a registry with every console tool.
///
/// `navigate_to` writes to the shell's route state; the device tools read
/// from `directory`.
pub fn default_registry(shell: &ConsoleShell, directory: Arc<dyn DeviceDirectory>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(NavigateToTool::new(shell.routes.clone())));
    registry.register(Box::new(SearchDevicesTool::new(directory.clone())));
    registry.register(Box::new(FleetStatisticsTool::new(directory)));
    registry
}
