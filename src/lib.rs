pub mod account;
pub mod clienv;
pub mod command;
pub mod completions;
pub mod error;
pub mod installer;
pub mod layout;
pub mod lifecycle;
pub mod operator_config;
pub mod release_installer;
pub mod state_store;
pub mod status;
pub mod sysconfig;
pub mod unit;
pub mod version_probe;

#[cfg(test)]
mod test_support;

pub use error::{OperatorError, Result};
pub use lifecycle::{Event, LifecycleController, LifecycleState};
pub use operator_config::{OperatorConfig, RuntimeConfig};
