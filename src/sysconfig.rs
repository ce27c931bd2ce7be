use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::account::ServiceAccount;
use crate::command::CommandRunner;
use crate::error::{OperatorError, Result};
use crate::layout::Layout;

/// Sysconfig template for the exporter; `{{ name }}` placeholders only.
pub const SYSCONFIG_TEMPLATE: &str = include_str!("../templates/zfs_exporter.tmpl");

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
            .expect("placeholder pattern is valid")
    })
}

/// Substitutes every `{{ key }}` in `template` from `context`.
/// A placeholder with no matching key is an error.
pub fn render_template(template: &str, context: &BTreeMap<String, String>) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = placeholder().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match context.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(OperatorError::ConfigRender(format!(
            "template variables without a value: {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// Writes the exporter's runtime configuration and prepares its data
/// directories.
pub struct ConfigRenderer {
    runner: Arc<dyn CommandRunner>,
    account: ServiceAccount,
    sysconfig_dir: PathBuf,
    target: PathBuf,
    data_dir: PathBuf,
    textfile_dir: PathBuf,
}

impl ConfigRenderer {
    pub fn new(runner: Arc<dyn CommandRunner>, account: ServiceAccount, layout: &Layout) -> Self {
        Self {
            runner,
            account,
            sysconfig_dir: layout.sysconfig_dir.clone(),
            target: layout.sysconfig_file.clone(),
            data_dir: layout.data_dir.clone(),
            textfile_dir: layout.textfile_dir.clone(),
        }
    }

    /// Renders `context` to the sysconfig path, replacing any previous file.
    pub async fn render(&self, context: &BTreeMap<String, String>) -> Result<()> {
        info!(path = %self.target.display(), "Writing sysconfig file");
        debug!(?context, "Configuration options");

        if !self.sysconfig_dir.exists() {
            tokio::fs::create_dir_all(&self.sysconfig_dir)
                .await
                .map_err(|e| render_io(&self.sysconfig_dir, e))?;
        }

        self.prepare_data_dirs().await?;

        let content = render_template(SYSCONFIG_TEMPLATE, context)?;

        match tokio::fs::remove_file(&self.target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(render_io(&self.target, e)),
        }
        tokio::fs::write(&self.target, content)
            .await
            .map_err(|e| render_io(&self.target, e))?;
        Ok(())
    }

    async fn prepare_data_dirs(&self) -> Result<()> {
        if !self.textfile_dir.exists() {
            debug!(path = %self.textfile_dir.display(), "Creating data directories");
            tokio::fs::create_dir_all(&self.textfile_dir)
                .await
                .map_err(|e| render_io(&self.textfile_dir, e))?;
        }

        let owner = self.account.owner_spec();
        for dir in [&self.data_dir, &self.textfile_dir] {
            self.chown(&owner, dir).await?;
        }
        Ok(())
    }

    async fn chown(&self, owner: &str, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        let output = self
            .runner
            .run("chown", &[owner, &*path_str])
            .await
            .map_err(|e| OperatorError::ConfigRender(format!("failed to run chown: {}", e)))?;

        if !output.success() {
            return Err(OperatorError::ConfigRender(format!(
                "chown {} {} failed ({}): {}",
                owner,
                path_str,
                output.describe(),
                output.stderr_lossy()
            )));
        }
        Ok(())
    }
}

fn render_io(path: &Path, e: std::io::Error) -> OperatorError {
    OperatorError::ConfigRender(format!("{}: {}", path.display(), e))
}
