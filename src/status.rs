use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Workload status as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Status {
    Maintenance(String),
    Active(String),
    Blocked(String),
    Error(String),
}

impl Status {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Maintenance(_) => "maintenance",
            Self::Active(_) => "active",
            Self::Blocked(_) => "blocked",
            Self::Error(_) => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Maintenance(m) | Self::Active(m) | Self::Blocked(m) | Self::Error(m) => m,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

/// Where lifecycle progress is reported.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: Status);

    fn set_workload_version(&self, version: &str);
}

/// Reports to the terminal: a spinner while in maintenance, one line per
/// settled status. Every status is also logged.
pub struct ConsoleStatus {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl Default for ConsoleStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for ConsoleStatus {
    fn set_status(&self, status: Status) {
        match &status {
            Status::Error(_) | Status::Blocked(_) => tracing::warn!(%status, "Status changed"),
            _ => tracing::info!(%status, "Status changed"),
        }

        let mut spinner = self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match status {
            Status::Maintenance(message) => match spinner.as_ref() {
                Some(pb) => pb.set_message(message),
                None => *spinner = Some(Self::spinner(&message)),
            },
            settled => {
                if let Some(pb) = spinner.take() {
                    pb.finish_and_clear();
                }
                println!("{}", settled);
            }
        }
    }

    fn set_workload_version(&self, version: &str) {
        tracing::info!(version, "Workload version");
        println!("workload-version: {}", version);
    }
}
