mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use soundforged_core::TargetFormat;
use soundforged_naming::Template;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config).with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./soundforged.toml",
        "~/.config/soundforged/config.toml",
        "/etc/soundforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    Template::parse(&config.naming.effective_pattern())?;

    if config.naming.unknown_token.trim().is_empty() {
        anyhow::bail!("naming.unknown_token cannot be empty");
    }

    if let Some(dir) = &config.naming.output_dir {
        if dir.exists() && !dir.is_dir() {
            anyhow::bail!("naming.output_dir is not a directory: {:?}", dir);
        }
    }

    for format in TargetFormat::ALL {
        config
            .conversion
            .encoding_params(format)
            .validate()
            .with_context(|| format!("Invalid {} settings", format))?;
    }

    if config.scheduler.publish_interval_ms == 0 {
        anyhow::bail!("scheduler.publish_interval_ms must be greater than 0");
    }

    Ok(())
}
