use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Name of the crash-output file under [`DaemonConfig::root`].
pub const FAULT_LOG_NAME: &str = "panic.log";

/// Daemon configuration, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Working directory; also holds the fault log.
    pub root: PathBuf,
    /// Seconds between heartbeat log lines.
    pub heartbeat_secs: u64,
    /// Display name used when registering the service.
    pub display_name: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let root = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("svcbridge");
        Self {
            root,
            heartbeat_secs: 30,
            display_name: "svcbridge daemon".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn fault_log_path(&self) -> PathBuf {
        self.root.join(FAULT_LOG_NAME)
    }

    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config not found at {}, creating default configuration", path.display());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let default_toml = toml::to_string_pretty(&Self::default())
                .context("Failed to serialize default config")?;
            fs::write(path, default_toml).context("Failed to write config file")?;
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let cfg_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&cfg_str).context("Failed to parse config")
    }
}

/// `--config` if given, else `<config dir>/svcbridge/svcbridge.toml`.
pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("svcbridge");
    Ok(config_dir.join("svcbridge.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("svcbridge.toml");

        let cfg = DaemonConfig::load_or_create(&path).unwrap();

        assert!(path.exists());
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svcbridge.toml");
        fs::write(&path, "heartbeat_secs = 5\nroot = \"/srv/daemon\"\n").unwrap();

        let cfg = DaemonConfig::load(&path).unwrap();

        assert_eq!(cfg.heartbeat_secs, 5);
        assert_eq!(cfg.fault_log_path(), Path::new("/srv/daemon").join("panic.log"));
        assert_eq!(cfg.display_name, DaemonConfig::default().display_name);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svcbridge.toml");
        fs::write(&path, "heartbeat_secs = \"soon\"").unwrap();

        assert!(DaemonConfig::load(&path).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let path = resolve_path(Some("/etc/svcbridge.toml")).unwrap();
        assert_eq!(path, PathBuf::from("/etc/svcbridge.toml"));
    }
}
