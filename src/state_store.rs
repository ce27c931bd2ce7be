use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::lifecycle::LifecycleState;
use crate::operator_config::RuntimeConfig;
use crate::status::Status;

const STATE_FILE: &str = "state.toml";

/// What the controller remembers between lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerRecord {
    pub state: LifecycleState,
    /// Version reported by the installed binary
    pub installed_version: Option<String>,
    /// Last configuration rendered to the sysconfig file
    pub runtime_config: Option<RuntimeConfig>,
    pub last_status: Option<Status>,
    /// Whether the unit is enabled at boot. Only install and start turn it
    /// on, only stop and uninstall turn it off.
    pub unit_enabled: bool,
}

/// TOML-backed persistence for [`ControllerRecord`].
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ControllerRecord> {
        if !self.path.exists() {
            tracing::trace!(path = %self.path.display(), "No controller record, starting fresh");
            return Ok(ControllerRecord::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Writes through a temp file + rename so a crash never leaves a torn record.
    pub fn save(&self, record: &ControllerRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, toml::to_string_pretty(record)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::trace!(state = %record.state, "Controller record saved");
        Ok(())
    }
}
