use thiserror::Error;

use crate::lifecycle::{Event, LifecycleState};

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unexpected release archive layout: {0}")]
    Archive(String),

    #[error("failed to install {path}: {reason}")]
    Install { path: String, reason: String },

    #[error("service account operation failed: {0}")]
    Account(String),

    #[error("service supervisor operation failed: {0}")]
    Unit(String),

    #[error("failed to render configuration: {0}")]
    ConfigRender(String),

    #[error("no version string found in output of {binary}")]
    VersionParse { binary: String, output: String },

    #[error("cannot {event} while {state}")]
    InvalidTransition {
        event: Event,
        state: LifecycleState,
    },

    #[error("cannot start the exporter, missing {0}")]
    NotProvisioned(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl OperatorError {
    /// Stable slug for logs and machine-readable status.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch-error",
            Self::Archive(_) => "archive-error",
            Self::Install { .. } => "install-error",
            Self::Account(_) => "account-error",
            Self::Unit(_) => "unit-error",
            Self::ConfigRender(_) => "config-render-error",
            Self::VersionParse { .. } => "version-parse-error",
            Self::InvalidTransition { .. } => "invalid-transition",
            Self::NotProvisioned(_) => "not-provisioned",
            Self::Config(_) => "config-error",
            Self::Io(_) => "io-error",
            Self::TomlDe(_) | Self::TomlSer(_) => "toml-error",
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = OperatorError::InvalidTransition {
            event: Event::Uninstall,
            state: LifecycleState::Running,
        };
        assert_eq!(err.to_string(), "cannot uninstall while running");
        assert_eq!(err.kind(), "invalid-transition");
    }

    #[test]
    fn test_io_conversion() {
        let err: OperatorError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), "io-error");
    }
}
