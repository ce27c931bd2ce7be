use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{OperatorError, Result};

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9134";
pub const DEFAULT_EXPORTER_VERSION: &str = "2.3.4";

/// Keys accepted by `config get` / `config set`.
pub const CONFIG_KEYS: &[&str] = &["listen-address", "zfs-exporter-version", "arch"];

/// Typed operator configuration store, persisted as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OperatorConfig {
    /// Address the exporter listens on, e.g. "0.0.0.0:9134"
    pub listen_address: String,
    /// Release version installed on install/upgrade
    pub zfs_exporter_version: String,
    /// Release architecture tag; detected from the host when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            zfs_exporter_version: DEFAULT_EXPORTER_VERSION.to_string(),
            arch: None,
        }
    }
}

impl OperatorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading operator config");

        if !path.exists() {
            tracing::trace!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        tracing::trace!(
            listen_address = %config.listen_address,
            version = %config.zfs_exporter_version,
            "Operator config loaded"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        tracing::trace!(path = %path.display(), "Saving operator config");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        RuntimeConfig::new(&self.listen_address)?;
        if self.zfs_exporter_version.trim().is_empty() {
            return Err(OperatorError::Config(
                "zfs-exporter-version must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match key {
            "listen-address" => Ok(Some(self.listen_address.clone())),
            "zfs-exporter-version" => Ok(Some(self.zfs_exporter_version.clone())),
            "arch" => Ok(self.arch.clone()),
            other => Err(unknown_key(other)),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "listen-address" => {
                RuntimeConfig::new(value)?;
                self.listen_address = value.to_string();
            }
            "zfs-exporter-version" => {
                self.zfs_exporter_version = value.trim_start_matches('v').to_string();
            }
            "arch" => {
                self.arch = (!value.is_empty()).then(|| value.to_string());
            }
            other => return Err(unknown_key(other)),
        }
        self.validate()
    }

    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        RuntimeConfig::new(&self.listen_address)
    }
}

fn unknown_key(key: &str) -> OperatorError {
    OperatorError::Config(format!(
        "unknown key '{}', expected one of: {}",
        key,
        CONFIG_KEYS.join(", ")
    ))
}

/// Runtime parameters rendered into the exporter's sysconfig file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub listen_address: String,
}

impl RuntimeConfig {
    pub fn new(listen_address: &str) -> Result<Self> {
        let config = Self {
            listen_address: listen_address.trim().to_string(),
        };
        config.port()?;
        Ok(config)
    }

    /// Port part of `host:port`, the value a scraping peer consumes.
    pub fn port(&self) -> Result<u16> {
        let (_, port) = self.listen_address.rsplit_once(':').ok_or_else(|| {
            OperatorError::Config(format!(
                "listen-address '{}' must be host:port",
                self.listen_address
            ))
        })?;
        port.parse().map_err(|_| {
            OperatorError::Config(format!(
                "listen-address '{}' has invalid port '{}'",
                self.listen_address, port
            ))
        })
    }

    /// Template context for the sysconfig renderer.
    pub fn context(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("listen_address".to_string(), self.listen_address.clone())])
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
        }
    }
}
