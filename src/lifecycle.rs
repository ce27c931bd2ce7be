//! Lifecycle state machine for the exporter.
//!
//! Every hook delivered by the orchestration runtime maps to one
//! [`Event`]. The controller checks the event against the persisted
//! [`LifecycleState`], runs the provisioning steps in order, and records
//! the new state. Steps are idempotent, so recovering from a failure means
//! delivering the same event again.
//!
//! ```text
//! NotInstalled ─install─▶ Installing ─▶ Installed ─configure─▶ Configured
//!                                                                  │ start
//!            Uninstalled ◀─uninstall─ Stopped ◀──────stop──────── Running
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::{ServiceAccount, ServiceAccountManager};
use crate::command::CommandRunner;
use crate::error::{OperatorError, Result};
use crate::installer::Installer;
use crate::layout::{Layout, ACCOUNT_NAME, UNIT_NAME};
use crate::operator_config::RuntimeConfig;
use crate::release_installer::ReleaseFetcher;
use crate::state_store::{ControllerRecord, StateStore};
use crate::status::{Status, StatusSink};
use crate::sysconfig::ConfigRenderer;
use crate::unit::{Supervisor, UnitManager};
use crate::version_probe::VersionProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    #[default]
    NotInstalled,
    Installing,
    Installed,
    Configured,
    Running,
    Stopped,
    Uninstalled,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInstalled => "not installed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Uninstalled => "uninstalled",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Install,
    Upgrade,
    Configure,
    Start,
    Stop,
    Uninstall,
}

impl Event {
    /// States this event may be applied in. Each list includes the event's
    /// own target state so redelivered events are accepted.
    pub fn allowed_from(self) -> &'static [LifecycleState] {
        use LifecycleState::*;
        match self {
            Self::Install => &[NotInstalled, Installing, Installed, Uninstalled],
            Self::Upgrade => &[Installed, Configured, Running, Stopped],
            Self::Configure => &[Installed, Configured, Running, Stopped],
            Self::Start => &[Configured, Running, Stopped],
            Self::Stop => &[Installed, Configured, Running, Stopped],
            Self::Uninstall => &[NotInstalled, Installing, Stopped, Uninstalled],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Configure => "configure",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct LifecycleController {
    layout: Layout,
    store: StateStore,
    record: ControllerRecord,
    status: Arc<dyn StatusSink>,
    fetcher: ReleaseFetcher,
    installer: Installer,
    accounts: ServiceAccountManager,
    supervisor: Arc<Supervisor>,
    units: UnitManager,
    renderer: ConfigRenderer,
    probe: VersionProbe,
}

impl LifecycleController {
    /// Wires the provisioning components for `layout` and loads the
    /// persisted record from `store`.
    pub fn new(
        layout: Layout,
        store: StateStore,
        fetcher: ReleaseFetcher,
        runner: Arc<dyn CommandRunner>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self> {
        let record = store.load()?;
        let account = ServiceAccount::new(ACCOUNT_NAME);
        let supervisor = Arc::new(Supervisor::new(runner.clone(), UNIT_NAME));

        Ok(Self {
            installer: Installer::new(&layout.binary),
            accounts: ServiceAccountManager::new(runner.clone(), account.clone()),
            units: UnitManager::new(&layout.unit_file, supervisor.clone()),
            renderer: ConfigRenderer::new(runner.clone(), account, &layout),
            probe: VersionProbe::new(runner, &layout.binary),
            supervisor,
            fetcher,
            status,
            record,
            store,
            layout,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.record.state
    }

    pub fn record(&self) -> &ControllerRecord {
        &self.record
    }

    /// Fresh install of `version`, rendering `config` as the initial
    /// runtime configuration. Returns the version the binary reports.
    pub async fn install(&mut self, version: &str, config: &RuntimeConfig) -> Result<String> {
        self.check(Event::Install)?;
        info!(version, "Installing zfs-exporter");

        self.record.state = LifecycleState::Installing;
        self.report(Status::Maintenance("Installing zfs-exporter".to_string()))?;

        let installed = self.provision(version, config).await?;

        self.record.state = LifecycleState::Installed;
        self.report(Status::Active("zfs-exporter installed".to_string()))?;
        Ok(installed)
    }

    /// Re-runs the install steps over an existing installation. The binary
    /// is swapped while the exporter keeps running, then the unit is
    /// restarted if it is active so the new binary takes over. Boot
    /// enablement is left as it was.
    pub async fn upgrade(&mut self, version: &str, config: &RuntimeConfig) -> Result<String> {
        self.check(Event::Upgrade)?;
        let previous = self.record.state;
        info!(version, state = %previous, "Upgrading zfs-exporter");

        self.report(Status::Maintenance("Upgrading zfs-exporter".to_string()))?;
        let installed = self.provision(version, config).await?;

        self.report(Status::Maintenance("Restarting zfs-exporter".to_string()))?;
        if previous == LifecycleState::Running {
            self.supervisor.restart().await?;
        } else {
            // configure may have left the daemon running under another state
            self.supervisor.try_restart().await?;
        }

        self.report(Status::Active("zfs-exporter upgraded".to_string()))?;
        Ok(installed)
    }

    /// Renders `config` and asks the supervisor to restart the exporter so
    /// it picks the change up. A stopped exporter stays stopped.
    pub async fn configure(&mut self, config: &RuntimeConfig) -> Result<()> {
        self.check(Event::Configure)?;
        info!(listen_address = %config.listen_address, "Configuring zfs-exporter");

        self.report(Status::Maintenance("Configuring zfs-exporter".to_string()))?;
        self.render(config).await?;

        if self.record.state == LifecycleState::Running {
            self.supervisor.restart().await?;
        } else {
            self.supervisor.try_restart().await?;
        }

        self.record.state = LifecycleState::Configured;
        self.report(Status::Active("zfs-exporter configured".to_string()))?;
        Ok(())
    }

    pub async fn start(&mut self) -> Result<()> {
        self.check(Event::Start)?;
        self.ensure_provisioned().await?;
        info!("Starting zfs-exporter");

        if !self.record.unit_enabled {
            self.supervisor.enable().await?;
            self.record.unit_enabled = true;
        }
        self.supervisor.start().await?;

        self.record.state = LifecycleState::Running;
        self.report(Status::Active("zfs-exporter started".to_string()))?;
        Ok(())
    }

    /// Stops the exporter and removes it from boot; the unit stays installed.
    pub async fn stop(&mut self) -> Result<()> {
        self.check(Event::Stop)?;
        info!("Stopping zfs-exporter");

        self.supervisor.stop().await?;
        self.supervisor.disable().await?;
        self.record.unit_enabled = false;

        self.record.state = LifecycleState::Stopped;
        self.report(Status::Blocked("zfs-exporter stopped".to_string()))?;
        Ok(())
    }

    /// Removes the binary, unit, sysconfig, data directory and service
    /// account. Every removal is attempted; already-absent items count as
    /// removed. The first failure is returned after all attempts.
    pub async fn uninstall(&mut self) -> Result<()> {
        self.check(Event::Uninstall)?;
        info!("Uninstalling zfs-exporter");
        self.report(Status::Maintenance("Removing zfs-exporter".to_string()))?;

        let mut failures = Vec::new();

        collect(&mut failures, remove_file(&self.layout.binary));
        match remove_file(&self.layout.unit_file) {
            Ok(true) => {
                if let Err(e) = self.supervisor.daemon_reload().await {
                    warn!(error = %e, "daemon-reload after unit removal failed");
                }
            }
            other => collect(&mut failures, other),
        }
        collect(&mut failures, remove_file(&self.layout.sysconfig_file));
        collect(&mut failures, remove_dir_all(&self.layout.data_dir));
        collect(&mut failures, remove_file(&self.layout.staging_archive));
        if let Err(e) = self.accounts.ensure_removed().await {
            failures.push(e);
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!(kind = failure.kind(), error = %failure, "Teardown step failed");
            }
            return Err(failures.remove(0));
        }

        self.record.state = LifecycleState::Uninstalled;
        self.record.installed_version = None;
        self.record.unit_enabled = false;
        self.report(Status::Blocked("zfs-exporter removed".to_string()))?;
        Ok(())
    }

    fn check(&self, event: Event) -> Result<()> {
        let state = self.record.state;
        if event.allowed_from().contains(&state) {
            debug!(%event, %state, "Transition accepted");
            Ok(())
        } else {
            Err(OperatorError::InvalidTransition { event, state })
        }
    }

    /// Install steps shared by install and upgrade.
    async fn provision(&mut self, version: &str, config: &RuntimeConfig) -> Result<String> {
        self.report(Status::Maintenance(format!("Downloading zfs-exporter {}", version)))?;
        let staged = self.fetcher.fetch(version).await?;

        self.report(Status::Maintenance("Installing zfs-exporter binary".to_string()))?;
        self.installer.install(&staged.binary)?;
        drop(staged);

        self.report(Status::Maintenance("Creating zfs_exporter service account".to_string()))?;
        self.accounts.ensure_created().await?;

        // a fresh install enables the unit; upgrades keep what stop/start chose
        let enable = self.record.state == LifecycleState::Installing || self.record.unit_enabled;
        self.report(Status::Maintenance("Installing zfs_exporter systemd unit".to_string()))?;
        self.units.deploy(enable).await?;
        self.record.unit_enabled = enable;

        self.report(Status::Maintenance("Rendering zfs-exporter configuration".to_string()))?;
        self.render(config).await?;

        self.report(Status::Maintenance("Checking zfs-exporter version".to_string()))?;
        let reported = self.probe.probe().await?;
        if reported != version {
            warn!(requested = version, reported = %reported, "Installed binary reports a different version");
        }
        self.status.set_workload_version(&reported);
        self.record.installed_version = Some(reported.clone());
        self.store.save(&self.record)?;

        Ok(reported)
    }

    async fn render(&mut self, config: &RuntimeConfig) -> Result<()> {
        self.renderer.render(&config.context()).await?;
        self.record.runtime_config = Some(config.clone());
        self.store.save(&self.record)
    }

    async fn ensure_provisioned(&self) -> Result<()> {
        if !self.layout.binary.is_file() {
            return Err(OperatorError::NotProvisioned(format!(
                "executable {}",
                self.layout.binary.display()
            )));
        }
        if !self.layout.sysconfig_file.is_file() {
            return Err(OperatorError::NotProvisioned(format!(
                "runtime configuration {}",
                self.layout.sysconfig_file.display()
            )));
        }
        if !self.accounts.user_exists().await? || !self.accounts.group_exists().await? {
            return Err(OperatorError::NotProvisioned(format!(
                "service account {}",
                self.accounts.account().owner_spec()
            )));
        }
        Ok(())
    }

    /// Publishes `status` and persists it with the current record.
    fn report(&mut self, status: Status) -> Result<()> {
        self.status.set_status(status.clone());
        self.record.last_status = Some(status);
        self.store.save(&self.record)
    }
}

fn collect(failures: &mut Vec<OperatorError>, result: Result<bool>) {
    if let Err(e) = result {
        failures.push(e);
    }
}

/// `Ok(true)` if removed, `Ok(false)` if it was already gone.
fn remove_file(path: &Path) -> Result<bool> {
    removal(path, std::fs::remove_file(path))
}

fn remove_dir_all(path: &Path) -> Result<bool> {
    removal(path, std::fs::remove_dir_all(path))
}

fn removal(path: &Path, result: std::io::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => {
            debug!(path = %path.display(), "Removed");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Already absent");
            Ok(false)
        }
        Err(e) => Err(OperatorError::Install {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}
