//! CLI Configuration

use std::path::PathBuf;

use outreach_audience::AudienceConfig;

pub fn load(profile: Option<&str>) -> Result<AudienceConfig, String> {
    let path = config_path(profile)?;
    AudienceConfig::load(&path).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Command-line flags win over the file and the environment
pub fn apply_flags(
    config: &mut AudienceConfig,
    api_url: Option<String>,
    api_key: Option<String>,
    company: Option<String>,
) -> Result<(), String> {
    if let Some(url) = api_url {
        config.api.base_url = url;
    }
    if let Some(key) = api_key {
        config.api.api_key = key;
    }
    if let Some(company) = company {
        config.company_id = company;
    }
    config.validate().map_err(|e| e.to_string())
}

pub fn config_path(profile: Option<&str>) -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Cannot find home directory")?;
    let filename = match profile {
        Some(p) => format!("config.{}.toml", p),
        None => "config.toml".to_string(),
    };
    Ok(home.join(".outreach").join(filename))
}

pub fn mask(key: &str) -> String {
    if key.is_empty() {
        "(not set)".into()
    } else {
        format!("{}****", &key[..key.char_indices().nth(4).map(|(i, _)| i).unwrap_or(key.len())])
    }
}
