use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OperatorError, Result};

/// Places staged executables at their final system path.
pub struct Installer {
    target: PathBuf,
}

impl Installer {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Copies `source` next to the target and renames it into place, so a
    /// running exporter keeps its old inode and never sees a partial file.
    pub fn install(&self, source: &Path) -> Result<()> {
        let install_err = |reason: String| OperatorError::Install {
            path: self.target.display().to_string(),
            reason,
        };

        let parent = self
            .target
            .parent()
            .ok_or_else(|| install_err("target has no parent directory".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| install_err(e.to_string()))?;

        let file_name = self
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = parent.join(format!(".{}.partial-{}", file_name, std::process::id()));

        let result = copy_preserving(source, &partial)
            .and_then(|()| fs::rename(&partial, &self.target));

        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            return Err(install_err(e.to_string()));
        }

        debug!(source = %source.display(), target = %self.target.display(), "Executable installed");
        Ok(())
    }
}

/// Copy with permission bits and modification time carried over.
fn copy_preserving(source: &Path, dest: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(source)?;
    fs::copy(source, dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(dest, perms)?;
    }

    if let Ok(modified) = metadata.modified() {
        File::options().write(true).open(dest)?.set_modified(modified)?;
    }
    Ok(())
}
