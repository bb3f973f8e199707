//! Server configuration
//!
//! All knobs are clap flags with environment fallbacks. The external
//! tool binaries are configurable so tests can substitute stubs.

use clap::Parser;
use std::path::PathBuf;

/// RACS container build orchestrator
#[derive(Parser, Debug, Clone)]
#[command(name = "racs-server", about = "RACS container build orchestrator", long_about = None)]
pub struct Config {
    /// Listen address
    #[arg(long, env = "RACS_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// SQLite database path (or a full sqlite: URL)
    #[arg(long, env = "RACS_DATABASE", default_value = "main.db")]
    pub database: String,

    /// Data directory holding projects/, tasks/ and uploads/
    #[arg(long, env = "RACS_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Allow all actions without authentication
    #[arg(long, env = "RACS_NO_LOGIN")]
    pub no_login: bool,

    /// Bearer token accepted on admin endpoints and protected webhooks
    #[arg(long, env = "RACS_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Container tool binary
    #[arg(long, env = "RACS_CONTAINER_TOOL", default_value = "podman")]
    pub container_tool: String,

    /// Version control tool binary
    #[arg(long, env = "RACS_GIT_TOOL", default_value = "git")]
    pub git_tool: String,

    /// Filesystem removal tool binary
    #[arg(long, env = "RACS_RM_TOOL", default_value = "rm")]
    pub rm_tool: String,

    /// Image pruning interval in seconds (0 disables the pruner)
    #[arg(long, env = "RACS_PRUNE_INTERVAL", default_value_t = 60)]
    pub prune_interval: u64,
}

impl Config {
    /// Connection URL for the sqlx sqlite driver
    pub fn database_url(&self) -> String {
        if self.database.starts_with("sqlite:") {
            self.database.clone()
        } else {
            format!("sqlite://{}?mode=rwc", self.database)
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }
        if self.database.is_empty() {
            anyhow::bail!("database cannot be empty");
        }
        if !self.no_login && self.admin_token.is_none() {
            anyhow::bail!("either an admin token must be configured or --no-login set");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database: "main.db".to_string(),
            data_dir: PathBuf::from("."),
            no_login: false,
            admin_token: None,
            container_tool: "podman".to_string(),
            git_tool: "git".to_string(),
            rm_tool: "rm".to_string(),
            prune_interval: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url() {
        let mut config = Config::default();
        assert_eq!(config.database_url(), "sqlite://main.db?mode=rwc");
        config.database = "sqlite::memory:".to_string();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_validation_requires_auth_choice() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        config.no_login = true;
        assert!(config.validate().is_ok());
        config.no_login = false;
        config.admin_token = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }
}
