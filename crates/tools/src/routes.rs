//! The console route catalogue.
//!
//! `navigate_to` only accepts paths that resolve here. Detail routes use a
//! single `:id` segment, e.g. `/devices/:id`.

use fleetpilot_core::context::PageRoute;
use serde_json::json;

/// One navigable console page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleRoute {
    pub pattern: &'static str,
    pub name: &'static str,
}

const ROUTES: &[ConsoleRoute] = &[
    ConsoleRoute { pattern: "/dashboard", name: "Dashboard" },
    ConsoleRoute { pattern: "/devices", name: "Devices" },
    ConsoleRoute { pattern: "/devices/:id", name: "Device Detail" },
    ConsoleRoute { pattern: "/device-groups", name: "Device Groups" },
    ConsoleRoute { pattern: "/firmware", name: "Firmware" },
    ConsoleRoute { pattern: "/firmware/:id", name: "Firmware Detail" },
    ConsoleRoute { pattern: "/ota/campaigns", name: "OTA Campaigns" },
    ConsoleRoute { pattern: "/ota/campaigns/:id", name: "OTA Campaign Detail" },
    ConsoleRoute { pattern: "/scenes", name: "Scenes" },
    ConsoleRoute { pattern: "/automations", name: "Automations" },
    ConsoleRoute { pattern: "/alerts", name: "Alerts" },
    ConsoleRoute { pattern: "/settings", name: "Settings" },
];

/// Lookup over the fixed set of console routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteCatalogue;

impl RouteCatalogue {
    pub fn routes(&self) -> &'static [ConsoleRoute] {
        ROUTES
    }

    /// Resolve a requested path to a concrete [`PageRoute`].
    ///
    /// Leading/trailing slashes and surrounding whitespace are normalised;
    /// a matched `:id` segment is reported in `meta.params.id`.
    pub fn resolve(&self, path: &str) -> Option<PageRoute> {
        let normalised = normalise(path)?;
        let segments: Vec<&str> = normalised.split('/').skip(1).collect();

        ROUTES.iter().find_map(|route| {
            let pattern: Vec<&str> = route.pattern.split('/').skip(1).collect();
            if pattern.len() != segments.len() {
                return None;
            }

            let mut id = None;
            for (want, got) in pattern.iter().zip(&segments) {
                if *want == ":id" {
                    id = Some(*got);
                } else if want != got {
                    return None;
                }
            }

            let page = PageRoute::new(normalised.clone(), route.name);
            Some(match id {
                Some(id) => page.with_meta(json!({ "params": { "id": id } })),
                None => page,
            })
        })
    }

    /// Comma-separated list of top-level paths, for error messages and tool docs.
    pub fn summary(&self) -> String {
        ROUTES
            .iter()
            .filter(|r| !r.pattern.contains(':'))
            .map(|r| r.pattern)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn normalise(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
        return None;
    }
    Some(format!("/{trimmed}"))
}
