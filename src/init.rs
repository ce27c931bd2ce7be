use tracing_subscriber::EnvFilter;
use zfs_exporter_operator::clienv;

/// Logs go to stderr so stdout stays clean for `status --json` and completions.
pub(crate) fn initialize_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(clienv::ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Host changes need root; warn early instead of failing halfway through.
pub(crate) fn warn_if_unprivileged() {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };
        if euid != 0 {
            tracing::warn!(euid, "Not running as root; host changes will likely fail");
        }
    }
}
