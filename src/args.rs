use clap::{Parser, Subcommand};
use zfs_exporter_operator::completions::CompletionShell;

#[derive(Parser)]
#[command(name = "zfs-exporter-operator")]
#[command(version)]
#[command(about = "Installs and runs the Prometheus ZFS exporter as a systemd service", long_about = None)]
pub(crate) struct Cli {
    /// Verbose logging (overridden by ZFS_EXPORTER_OPERATOR_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Download, install and register the exporter
    Install {
        /// Release version (defaults to zfs-exporter-version from config)
        #[arg(long)]
        version: Option<String>,
    },

    /// Replace the installed exporter with another release
    Upgrade {
        /// Release version (defaults to zfs-exporter-version from config)
        #[arg(long)]
        version: Option<String>,
    },

    /// Re-render the runtime configuration and restart if running
    ConfigChanged {
        /// Listen address to apply, saved to the config store
        #[arg(long)]
        listen_address: Option<String>,
    },

    /// Start the exporter service
    Start,

    /// Stop the exporter service and disable it at boot
    Stop,

    /// Remove the exporter and everything it owns
    #[command(visible_alias = "remove")]
    Uninstall,

    /// Show lifecycle state and last reported status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change operator configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Show all configuration values
    Show,

    /// Print one configuration value
    Get {
        /// listen-address, zfs-exporter-version or arch
        key: String,
    },

    /// Set one configuration value
    Set {
        key: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_alias() {
        let cli = Cli::try_parse_from(["zfs-exporter-operator", "remove"]).unwrap();
        assert!(matches!(cli.command, Commands::Uninstall));
    }

    #[test]
    fn test_install_version_flag() {
        let cli =
            Cli::try_parse_from(["zfs-exporter-operator", "-v", "install", "--version", "0.9.1"])
                .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Install { version } => assert_eq!(version.as_deref(), Some("0.9.1")),
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_config_changed_listen_address() {
        let cli = Cli::try_parse_from([
            "zfs-exporter-operator",
            "config-changed",
            "--listen-address",
            "127.0.0.1:9134",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::ConfigChanged { listen_address: Some(ref a) } if a == "127.0.0.1:9134"
        ));
    }
}
