use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::error::{OperatorError, Result};

/// Static unit definition; installed verbatim, never templated.
pub const UNIT_TEMPLATE: &str = include_str!("../templates/zfs_exporter.service");

/// Thin wrapper over `systemctl` for one unit.
pub struct Supervisor {
    runner: Arc<dyn CommandRunner>,
    unit: String,
}

impl Supervisor {
    pub fn new(runner: Arc<dyn CommandRunner>, unit: &str) -> Self {
        Self {
            runner,
            unit: unit.to_string(),
        }
    }

    pub async fn daemon_reload(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"]).await
    }

    pub async fn enable(&self) -> Result<()> {
        self.systemctl(&["enable", self.unit.as_str()]).await
    }

    pub async fn disable(&self) -> Result<()> {
        self.systemctl(&["disable", self.unit.as_str()]).await
    }

    pub async fn start(&self) -> Result<()> {
        self.systemctl(&["start", self.unit.as_str()]).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.systemctl(&["stop", self.unit.as_str()]).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.systemctl(&["restart", self.unit.as_str()]).await
    }

    /// Restarts only if already running; a stopped unit stays stopped.
    pub async fn try_restart(&self) -> Result<()> {
        self.systemctl(&["try-restart", self.unit.as_str()]).await
    }

    async fn systemctl(&self, args: &[&str]) -> Result<()> {
        debug!(?args, "systemctl");
        let output = self
            .runner
            .run("systemctl", args)
            .await
            .map_err(|e| OperatorError::Unit(format!("failed to run systemctl: {}", e)))?;

        if !output.success() {
            return Err(OperatorError::Unit(format!(
                "systemctl {} failed ({}): {}",
                args.join(" "),
                output.describe(),
                output.stderr_lossy()
            )));
        }
        Ok(())
    }
}

/// Deploys the unit definition and registers it with the supervisor.
pub struct UnitManager {
    unit_file: PathBuf,
    supervisor: Arc<Supervisor>,
}

impl UnitManager {
    pub fn new(unit_file: impl Into<PathBuf>, supervisor: Arc<Supervisor>) -> Self {
        Self {
            unit_file: unit_file.into(),
            supervisor,
        }
    }

    /// Writes the unit file and reloads the supervisor, enabling the unit
    /// at boot when `enable` is set. A reload/enable failure is returned but
    /// the written file stays in place.
    pub async fn deploy(&self, enable: bool) -> Result<()> {
        info!(path = %self.unit_file.display(), "Installing systemd unit");

        if let Some(parent) = self.unit_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.unit_file, UNIT_TEMPLATE).await?;

        self.supervisor.daemon_reload().await?;
        if enable {
            self.supervisor.enable().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingRunner;
    use std::path::Path;

    fn setup(runner: &Arc<RecordingRunner>, dir: &Path) -> UnitManager {
        let supervisor = Arc::new(Supervisor::new(runner.clone(), "zfs_exporter.service"));
        UnitManager::new(dir.join("etc/systemd/system/zfs_exporter.service"), supervisor)
    }

    #[tokio::test]
    async fn test_deploy_writes_unit_and_enables() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let units = setup(&runner, tmp.path());

        units.deploy(true).await.unwrap();

        let written = std::fs::read_to_string(&units.unit_file).unwrap();
        assert_eq!(written, UNIT_TEMPLATE);
        assert_eq!(
            runner.calls(),
            vec![
                "systemctl daemon-reload".to_string(),
                "systemctl enable zfs_exporter.service".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_unit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        runner.fail_on("systemctl daemon-reload");
        let units = setup(&runner, tmp.path());

        let err = units.deploy(true).await.unwrap_err();

        assert!(matches!(err, OperatorError::Unit(_)), "{err}");
        assert!(units.unit_file.exists());
        assert_eq!(runner.count("systemctl enable zfs_exporter.service"), 0);
    }

    #[tokio::test]
    async fn test_deploy_without_enable_only_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let units = setup(&runner, tmp.path());

        units.deploy(false).await.unwrap();

        assert!(units.unit_file.exists());
        assert_eq!(runner.calls(), vec!["systemctl daemon-reload".to_string()]);
    }

    #[test]
    fn test_unit_template_runs_as_service_account() {
        assert!(UNIT_TEMPLATE.contains("User=zfs_exporter"));
        assert!(UNIT_TEMPLATE.contains("EnvironmentFile=/etc/sysconfig/zfs_exporter"));
        assert!(UNIT_TEMPLATE.contains("ExecStart=/usr/bin/zfs_exporter"));
    }
}
