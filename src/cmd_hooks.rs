use anyhow::Context;
use std::sync::Arc;

use zfs_exporter_operator::clienv;
use zfs_exporter_operator::command::SystemCommandRunner;
use zfs_exporter_operator::layout::Layout;
use zfs_exporter_operator::release_installer::ReleaseFetcher;
use zfs_exporter_operator::state_store::StateStore;
use zfs_exporter_operator::status::{ConsoleStatus, Status, StatusSink};
use zfs_exporter_operator::{LifecycleController, OperatorConfig, OperatorError};

/// Which hook to run, with its per-hook arguments.
pub(crate) enum Hook {
    Install { version: Option<String> },
    Upgrade { version: Option<String> },
    ConfigChanged { listen_address: Option<String> },
    Start,
    Stop,
    Uninstall,
}

/// Release architecture: env override, then config store, then host.
fn resolve_arch(config: &OperatorConfig) -> String {
    clienv::arch_override()
        .or_else(|| config.arch.clone())
        .unwrap_or_else(|| clienv::detect_arch().to_string())
}

pub(crate) fn build_controller(
    config: &OperatorConfig,
    status: Arc<dyn StatusSink>,
) -> anyhow::Result<LifecycleController> {
    let layout = Layout::under(clienv::root_dir());
    let arch = resolve_arch(config);
    tracing::debug!(arch = %arch, root = %clienv::root_dir().display(), "Building controller");

    let fetcher = ReleaseFetcher::new(&clienv::release_base_url(), &arch, &layout.staging_archive)
        .with_timeout(clienv::fetch_timeout());

    let store = StateStore::new(clienv::state_dir());
    let store_path = store.path().to_path_buf();
    LifecycleController::new(layout, store, fetcher, Arc::new(SystemCommandRunner::new()), status)
        .with_context(|| format!("failed to load controller record {}", store_path.display()))
}

pub(crate) async fn cmd_hook(hook: Hook) -> anyhow::Result<()> {
    let config_path = clienv::config_path();
    let mut config = OperatorConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    if let Hook::ConfigChanged {
        listen_address: Some(address),
    } = &hook
    {
        config.set("listen-address", address)?;
        config
            .save(&config_path)
            .with_context(|| format!("failed to save {}", config_path.display()))?;
    }

    let status = Arc::new(ConsoleStatus::new());
    let mut controller = build_controller(&config, status.clone())?;

    let result = match hook {
        Hook::Install { version } => {
            let version = version.unwrap_or_else(|| config.zfs_exporter_version.clone());
            controller
                .install(version.trim_start_matches('v'), &config.runtime_config()?)
                .await
                .map(drop)
        }
        Hook::Upgrade { version } => {
            let version = version.unwrap_or_else(|| config.zfs_exporter_version.clone());
            controller
                .upgrade(version.trim_start_matches('v'), &config.runtime_config()?)
                .await
                .map(drop)
        }
        Hook::ConfigChanged { .. } => controller.configure(&config.runtime_config()?).await,
        Hook::Start => controller.start().await,
        Hook::Stop => controller.stop().await,
        Hook::Uninstall => controller.uninstall().await,
    };

    if let Err(e) = result {
        report_failure(status.as_ref(), &e);
        return Err(e.into());
    }
    Ok(())
}

/// Invalid transitions leave the workload untouched, so they only warn.
fn report_failure(status: &dyn StatusSink, error: &OperatorError) {
    tracing::error!(kind = error.kind(), error = %error, "Hook failed");
    if !matches!(error, OperatorError::InvalidTransition { .. }) {
        status.set_status(Status::Error(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use zfs_exporter_operator::{Event, LifecycleState};

    #[derive(Default)]
    struct Captured(Mutex<Vec<Status>>);

    impl StatusSink for Captured {
        fn set_status(&self, status: Status) {
            self.0.lock().unwrap().push(status);
        }

        fn set_workload_version(&self, _version: &str) {}
    }

    #[test]
    fn test_failed_step_settles_with_error_status() {
        let sink = Captured::default();
        let err = OperatorError::Unit("systemctl start zfs_exporter.service failed (exit 1): ".into());

        report_failure(&sink, &err);

        let statuses = sink.0.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].kind(), "error");
        assert!(statuses[0].message().contains("systemctl start"));
    }

    #[test]
    fn test_invalid_transition_publishes_nothing() {
        let sink = Captured::default();
        let err = OperatorError::InvalidTransition {
            event: Event::Start,
            state: LifecycleState::NotInstalled,
        };

        report_failure(&sink, &err);

        assert!(sink.0.lock().unwrap().is_empty());
    }
}
