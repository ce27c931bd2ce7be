use std::sync::Arc;
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::error::{OperatorError, Result};

const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

// shadow-utils exit codes
const EXIT_NAME_IN_USE: i32 = 9;
const EXIT_NO_SUCH_ENTRY: i32 = 6;

/// Dedicated system user and group the exporter runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub username: String,
    pub groupname: String,
}

impl ServiceAccount {
    pub fn new(name: &str) -> Self {
        Self {
            username: name.to_string(),
            groupname: name.to_string(),
        }
    }

    /// `user:group` form for chown.
    pub fn owner_spec(&self) -> String {
        format!("{}:{}", self.username, self.groupname)
    }
}

pub struct ServiceAccountManager {
    runner: Arc<dyn CommandRunner>,
    account: ServiceAccount,
}

impl ServiceAccountManager {
    pub fn new(runner: Arc<dyn CommandRunner>, account: ServiceAccount) -> Self {
        Self { runner, account }
    }

    pub fn account(&self) -> &ServiceAccount {
        &self.account
    }

    pub async fn user_exists(&self) -> Result<bool> {
        self.entry_exists("passwd", &self.account.username).await
    }

    pub async fn group_exists(&self) -> Result<bool> {
        self.entry_exists("group", &self.account.groupname).await
    }

    /// Creates the group, then a system user bound to it with no home
    /// directory and a non-interactive shell. Existing entries are kept.
    pub async fn ensure_created(&self) -> Result<()> {
        let username = self.account.username.as_str();
        let groupname = self.account.groupname.as_str();

        if self.group_exists().await? {
            debug!(group = %groupname, "Group already exists");
        } else {
            info!(group = %groupname, "Creating system group");
            self.run_tolerating("groupadd", &["--system", groupname], EXIT_NAME_IN_USE)
                .await?;
        }

        if self.user_exists().await? {
            debug!(user = %username, "User already exists");
        } else {
            info!(user = %username, "Creating system user");
            self.run_tolerating(
                "useradd",
                &[
                    "--system",
                    "--no-create-home",
                    "--gid",
                    groupname,
                    "--shell",
                    NOLOGIN_SHELL,
                    username,
                ],
                EXIT_NAME_IN_USE,
            )
            .await?;
        }
        Ok(())
    }

    /// Deletes the user, then the group. Missing entries are not an error.
    pub async fn ensure_removed(&self) -> Result<()> {
        let username = self.account.username.as_str();
        let groupname = self.account.groupname.as_str();

        if self.user_exists().await? {
            info!(user = %username, "Removing system user");
            self.run_tolerating("userdel", &[username], EXIT_NO_SUCH_ENTRY)
                .await?;
        }

        if self.group_exists().await? {
            info!(group = %groupname, "Removing system group");
            self.run_tolerating("groupdel", &[groupname], EXIT_NO_SUCH_ENTRY)
                .await?;
        }
        Ok(())
    }

    async fn entry_exists(&self, database: &str, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run("getent", &[database, name])
            .await
            .map_err(|e| OperatorError::Account(format!("failed to run getent: {}", e)))?;

        match output.code {
            Some(0) => Ok(true),
            // 2: key not found in database
            Some(2) => Ok(false),
            _ => Err(OperatorError::Account(format!(
                "getent {} {} failed ({}): {}",
                database,
                name,
                output.describe(),
                output.stderr_lossy()
            ))),
        }
    }

    /// Runs an account tool, accepting `benign_code` as already satisfied.
    async fn run_tolerating(&self, program: &str, args: &[&str], benign_code: i32) -> Result<()> {
        let output = self
            .runner
            .run(program, args)
            .await
            .map_err(|e| OperatorError::Account(format!("failed to run {}: {}", program, e)))?;

        if output.success() {
            return Ok(());
        }
        if output.code == Some(benign_code) {
            debug!(program, code = benign_code, "Account already in requested state");
            return Ok(());
        }
        Err(OperatorError::Account(format!(
            "{} {} failed ({}): {}",
            program,
            args.join(" "),
            output.describe(),
            output.stderr_lossy()
        )))
    }
}
