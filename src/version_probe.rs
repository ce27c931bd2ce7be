use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::command::CommandRunner;
use crate::error::{OperatorError, Result};

fn version_pattern() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"\d+\.\d+\.\d+").expect("version pattern is valid"))
}

/// First `N.N.N` triple in `output`.
pub fn parse_version(output: &str) -> Option<&str> {
    version_pattern().find(output).map(|m| m.as_str())
}

/// Asks the installed exporter for its version.
pub struct VersionProbe {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
}

impl VersionProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    /// Runs `<binary> --version` and parses its stderr; the exporter's
    /// flag library prints version information there, not on stdout.
    pub async fn probe(&self) -> Result<String> {
        let binary = self.binary.to_string_lossy();
        let output = self.runner.run(&binary, &["--version"]).await?;
        let diagnostics = String::from_utf8_lossy(&output.stderr);
        debug!(binary = %binary, code = ?output.code, "Version probe finished");

        parse_version(&diagnostics)
            .map(str::to_string)
            .ok_or_else(|| OperatorError::VersionParse {
                binary: binary.into_owned(),
                output: diagnostics.trim().to_string(),
            })
    }
}
