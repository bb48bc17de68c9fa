//! Configuration and CLI argument handling

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;

use crate::{
    engine::{TimerSpec, TimerTable},
    state::ServerInfo,
};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "discipline-timer")]
#[command(about = "Break timers that drain a shared daily break pool on overflow")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// JSON file holding the persisted day
    #[arg(short, long, default_value = "discipline-timer.json")]
    pub state_file: PathBuf,

    /// JSON timer table (`[{"id": "food", "limit": 900, "maxRestarts": 3}]`)
    #[arg(long)]
    pub timers: Option<PathBuf>,

    /// Daily break pool in minutes
    #[arg(long, default_value = "210")]
    pub pool_minutes: u64,

    /// Token required in X-Admin-Token for admin operations
    #[arg(long)]
    pub admin_token: Option<String>,

    /// Local hour (0-23) at which the day resets automatically
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub reset_hour: Option<u32>,

    /// Mirror the state file read-only instead of driving the clock
    #[arg(long)]
    pub follow: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Daily pool allowance in seconds
    pub fn daily_allowance(&self) -> u64 {
        self.pool_minutes.saturating_mul(60)
    }

    /// Load the timer table from `--timers`, or the built-in one
    pub fn timer_table(&self) -> anyhow::Result<TimerTable> {
        let Some(path) = &self.timers else {
            return Ok(TimerTable::builtin());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read timer table {}", path.display()))?;
        let specs: Vec<TimerSpec> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse timer table {}", path.display()))?;
        let table = TimerTable::new(specs)
            .with_context(|| format!("Invalid timer table {}", path.display()))?;
        Ok(table)
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            port: self.port,
            host: self.host.clone(),
            reset_hour: self.reset_hour.unwrap_or(0),
            follower: self.follow,
            admin_token: self.admin_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RestartQuota;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["discipline-timer"]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.daily_allowance(), 210 * 60);
        assert_eq!(config.log_level(), "info");
        assert!(!config.follow);
        assert_eq!(config.timer_table().unwrap(), TimerTable::builtin());
    }

    #[test]
    fn reset_hour_is_bounded() {
        assert!(Config::try_parse_from(["discipline-timer", "--reset-hour", "24"]).is_err());
        let config = Config::try_parse_from(["discipline-timer", "--reset-hour", "4"]).unwrap();
        assert_eq!(config.server_info().reset_hour, 4);
    }

    #[test]
    fn loads_timer_table_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timers.json");
        fs::write(&path, r#"[{"id": "nap", "limit": 1200, "maxRestarts": 1}]"#).unwrap();

        let config = Config::try_parse_from([
            "discipline-timer",
            "--timers",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let table = config.timer_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("nap").unwrap().max_restarts, RestartQuota::Limited(1));
    }

    #[test]
    fn invalid_timer_table_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timers.json");
        fs::write(&path, r#"[{"id": "nap", "limit": 0}]"#).unwrap();

        let config = Config::try_parse_from([
            "discipline-timer",
            "--timers",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let err = config.timer_table().unwrap_err();
        assert!(format!("{:#}", err).contains("limit above zero"));
    }
}
