use std::path::PathBuf;
use std::time::Duration;

const ENV_CONFIG: &str = "ZFS_EXPORTER_OPERATOR_CONFIG";
const ENV_ROOT: &str = "ZFS_EXPORTER_OPERATOR_ROOT";
const ENV_STATE_DIR: &str = "ZFS_EXPORTER_OPERATOR_STATE_DIR";
const ENV_RELEASE_BASE_URL: &str = "ZFS_EXPORTER_RELEASE_BASE_URL";
const ENV_FETCH_TIMEOUT: &str = "ZFS_EXPORTER_FETCH_TIMEOUT_SECS";
const ENV_ARCH: &str = "ZFS_EXPORTER_ARCH";
pub const ENV_LOG: &str = "ZFS_EXPORTER_OPERATOR_LOG";

const DEFAULT_CONFIG_PATH: &str = "/etc/zfs-exporter-operator/config.toml";
const DEFAULT_STATE_SUBDIR: &str = "var/lib/zfs-exporter-operator";
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/pdf";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
const FALLBACK_ARCH: &str = "amd64";

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Operator config store ($ZFS_EXPORTER_OPERATOR_CONFIG or /etc/zfs-exporter-operator/config.toml)
pub fn config_path() -> PathBuf {
    let path = env_opt(ENV_CONFIG)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    tracing::trace!(path = %path.display(), "Resolved config path");
    path
}

/// Filesystem root all managed paths live under ($ZFS_EXPORTER_OPERATOR_ROOT or /)
pub fn root_dir() -> PathBuf {
    let dir = PathBuf::from(env_or(ENV_ROOT, "/"));
    tracing::trace!(dir = %dir.display(), "Resolved root directory");
    dir
}

/// Controller state directory ($ZFS_EXPORTER_OPERATOR_STATE_DIR or <root>/var/lib/zfs-exporter-operator)
pub fn state_dir() -> PathBuf {
    let dir = env_opt(ENV_STATE_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| root_dir().join(DEFAULT_STATE_SUBDIR));
    tracing::trace!(dir = %dir.display(), "Resolved state directory");
    dir
}

/// Release distribution host ($ZFS_EXPORTER_RELEASE_BASE_URL or GitHub)
pub fn release_base_url() -> String {
    let url = env_or(ENV_RELEASE_BASE_URL, DEFAULT_RELEASE_BASE_URL);
    tracing::trace!(url = %url, "Release base URL");
    url
}

/// Download timeout ($ZFS_EXPORTER_FETCH_TIMEOUT_SECS or 300)
pub fn fetch_timeout() -> Duration {
    let secs = env_opt(ENV_FETCH_TIMEOUT)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Architecture override ($ZFS_EXPORTER_ARCH)
pub fn arch_override() -> Option<String> {
    let val = env_opt(ENV_ARCH);
    tracing::trace!(value = ?val, "ZFS_EXPORTER_ARCH env var");
    val
}

/// Release architecture tag for the architecture this binary was built for.
pub fn detect_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "amd64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else if cfg!(target_arch = "arm") {
        "armv7"
    } else {
        FALLBACK_ARCH
    }
}
