use zfs_exporter_operator::clienv;
use zfs_exporter_operator::operator_config::CONFIG_KEYS;
use zfs_exporter_operator::OperatorConfig;

use crate::args::ConfigCommands;

pub(crate) fn cmd_config(command: Option<ConfigCommands>) -> anyhow::Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => cmd_config_show(),
        Some(ConfigCommands::Get { key }) => cmd_config_get(&key),
        Some(ConfigCommands::Set { key, value }) => cmd_config_set(&key, &value),
    }
}

fn cmd_config_show() -> anyhow::Result<()> {
    let path = clienv::config_path();
    let config = OperatorConfig::load(&path)?;

    for key in CONFIG_KEYS {
        let value = config
            .get(key)?
            .unwrap_or_else(|| format!("{} (detected)", clienv::detect_arch()));
        println!("{:<22}{}", key, value);
    }
    println!("{:<22}{}", "config-file", path.display());
    Ok(())
}

fn cmd_config_get(key: &str) -> anyhow::Result<()> {
    let config = OperatorConfig::load(&clienv::config_path())?;
    match config.get(key)? {
        Some(value) => println!("{}", value),
        None => anyhow::bail!("'{}' is not set", key),
    }
    Ok(())
}

fn cmd_config_set(key: &str, value: &str) -> anyhow::Result<()> {
    let path = clienv::config_path();
    let mut config = OperatorConfig::load(&path)?;
    config.set(key, value)?;
    config.save(&path)?;
    tracing::info!(key, path = %path.display(), "Configuration updated");
    println!("{} = {}", key, config.get(key)?.unwrap_or_default());
    Ok(())
}
