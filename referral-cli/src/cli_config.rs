//! CLI configuration loader and runtime settings.
//!
//! ```toml
//! data_dir = "/var/lib/referral"
//! log_level = "info"
//!
//! [referral.commission]
//! pool_rate_bps = 1000
//! level_rates_bps = [5000, 2500, 1250, 625, 625]
//!
//! [referral.retry]
//! max_attempts = 5
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use lib_referral::ReferralConfig;

use crate::error::{CliError, CliResult};
use crate::logic::validate_log_level;

/// Default CLI config filename under ~/.referral/
pub const DEFAULT_CONFIG_FILENAME: &str = "referral.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// sled tree holding every referral key
pub const REFERRAL_TREE: &str = "referral";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    #[serde(default)]
    pub referral: ReferralConfig,
}

/// Settings after merging flags over the config file
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub referral: ReferralConfig,
}

fn referral_home() -> CliResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".referral"))
        .ok_or(CliError::HomeDirectoryNotFound)
}

pub fn default_config_path() -> PathBuf {
    referral_home()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILENAME))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}

pub fn default_data_dir() -> CliResult<PathBuf> {
    Ok(referral_home()?.join("data"))
}

/// Load the config file; a missing default file yields defaults
pub fn load_config(path: Option<&str>) -> CliResult<CliConfig> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(default_config_path);

    if !config_path.exists() {
        if path.is_some() {
            return Err(CliError::ConfigError(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }
        return Ok(CliConfig::default());
    }

    load_config_strict(&config_path)
}

pub fn load_config_strict(path: &Path) -> CliResult<CliConfig> {
    let raw = fs::read_to_string(path).map_err(|e| CliError::ConfigLoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> CliResult<CliConfig> {
    let config: CliConfig =
        toml::from_str(raw).map_err(|e| CliError::ConfigError(format!("Invalid CLI config: {}", e)))?;
    config.referral.validate()?;
    if let Some(level) = &config.log_level {
        validate_log_level(level)?;
    }
    Ok(config)
}

/// Command-line flags win over the file, the file over built-in defaults
pub fn resolve_settings(
    config: CliConfig,
    data_dir_flag: Option<&str>,
    log_level_flag: Option<&str>,
) -> CliResult<RuntimeSettings> {
    let data_dir = match data_dir_flag.map(PathBuf::from).or(config.data_dir) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let log_level = log_level_flag
        .map(str::to_string)
        .or(config.log_level)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    validate_log_level(&log_level)?;

    Ok(RuntimeSettings {
        data_dir,
        log_level: log_level.to_lowercase(),
        referral: config.referral,
    })
}
