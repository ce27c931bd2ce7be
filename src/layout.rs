use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "zfs_exporter";
pub const UNIT_NAME: &str = "zfs_exporter.service";
pub const ACCOUNT_NAME: &str = "zfs_exporter";

/// Fixed host paths managed by the operator.
///
/// Production uses [`Layout::system`]; every path can be re-rooted with
/// [`Layout::under`] so the whole tree can live in a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub binary: PathBuf,
    pub unit_file: PathBuf,
    pub sysconfig_dir: PathBuf,
    pub sysconfig_file: PathBuf,
    pub data_dir: PathBuf,
    pub textfile_dir: PathBuf,
    pub staging_archive: PathBuf,
}

impl Layout {
    pub fn system() -> Self {
        Self::under("/")
    }

    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let data_dir = root.join("var/lib/zfs_exporter");
        let sysconfig_dir = root.join("etc/sysconfig");
        Self {
            binary: root.join("usr/bin/zfs_exporter"),
            unit_file: root.join("etc/systemd/system").join(UNIT_NAME),
            sysconfig_file: sysconfig_dir.join(SERVICE_NAME),
            sysconfig_dir,
            textfile_dir: data_dir.join("textfile_collector"),
            data_dir,
            staging_archive: root.join("tmp/zfs-exporter.tar.gz"),
        }
    }

    /// Paths whose absence means nothing is left behind after teardown.
    pub fn managed_paths(&self) -> [&Path; 4] {
        [
            self.binary.as_path(),
            self.unit_file.as_path(),
            self.sysconfig_file.as_path(),
            self.data_dir.as_path(),
        ]
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}
