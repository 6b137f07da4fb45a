//! `fleetpilot tools` — Print the tool catalogue the model sees.

use fleetpilot_config::AppConfig;

use super::runtime::ConsoleRuntime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let console = ConsoleRuntime::demo(&config);

    println!();
    println!("  Registered tools ({}):", console.tools.len());
    println!();
    for line in console.tools.describe_all().lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
