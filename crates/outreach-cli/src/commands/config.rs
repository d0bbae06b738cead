//! Config commands

use outreach_audience::AudienceConfig;

use crate::config::{self, config_path, mask};
use crate::output::{self, OutputFormat};
use crate::ConfigCommands;

pub fn handle(action: ConfigCommands, profile: Option<&str>, format: OutputFormat) -> Result<(), String> {
    match action {
        ConfigCommands::Init { force } => {
            let path = config_path(profile)?;
            if path.exists() && !force {
                return Err(format!("{} already exists; pass --force to overwrite", path.display()));
            }
            AudienceConfig::default().save(&path).map_err(|e| e.to_string())?;
            output::success(format!("Configuration initialized at {}", path.display()));
        }
        ConfigCommands::Show => {
            let mut config = config::load(profile)?;
            config.api.api_key = mask(&config.api.api_key);
            if !format.emit(&config) {
                print!("{}", config.to_toml().map_err(|e| e.to_string())?);
            }
        }
    }
    Ok(())
}

