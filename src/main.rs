mod args;
mod cmd_completions;
mod cmd_config;
mod cmd_hooks;
mod cmd_status;
mod init;

use args::{Cli, Commands};
use clap::Parser;
use cmd_hooks::Hook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init::initialize_tracing(cli.verbose);

    let hook = match cli.command {
        Commands::Install { version } => Hook::Install { version },
        Commands::Upgrade { version } => Hook::Upgrade { version },
        Commands::ConfigChanged { listen_address } => Hook::ConfigChanged { listen_address },
        Commands::Start => Hook::Start,
        Commands::Stop => Hook::Stop,
        Commands::Uninstall => Hook::Uninstall,
        Commands::Status { json } => return cmd_status::cmd_status(json),
        Commands::Config { command } => return cmd_config::cmd_config(command),
        Commands::Completions { shell } => {
            cmd_completions::cmd_completions(shell);
            return Ok(());
        }
    };

    init::warn_if_unprivileged();
    cmd_hooks::cmd_hook(hook).await?;

    Ok(())
}
