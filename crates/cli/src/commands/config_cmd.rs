//! `fleetpilot config` — Create, show, or validate the config file.

use fleetpilot_config::AppConfig;
use std::path::Path;

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    write_default(&path, force)?;
    println!("  Config written to {}", path.display());
    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    let config = AppConfig::load()?;

    if path.exists() {
        println!("  ✓ {} is valid", path.display());
    } else {
        println!("  ✓ No config file at {}, defaults are valid", path.display());
    }
    if !config.has_api_key() {
        println!("  ! No API key set (only keyless providers such as ollama or console will work)");
    }
    println!("  Provider: {} ({})", config.default_provider, config.default_model);
    Ok(())
}

/// Write the default config to `path`, refusing to clobber an existing file
/// unless `force` is set.
fn write_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_default_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let written = AppConfig::load_from(&path).unwrap();
        assert_eq!(written.agent.max_loops, AppConfig::default().agent.max_loops);

        assert!(write_default(&path, false).is_err());
        assert!(write_default(&path, true).is_ok());
    }
}
