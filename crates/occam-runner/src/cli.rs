//! CLI argument parsing for occam-runner

use anyhow::Result;
use clap::Parser;
use occam_scheduler::{Incarnation, SchedulerConfig};
use std::path::PathBuf;

/// Run a synthetic transfer workload through the optimistic scheduler
#[derive(Parser, Debug, Clone)]
#[command(name = "occam")]
#[command(about = "Optimistic concurrent transaction scheduler workload runner")]
#[command(version)]
pub struct Cli {
    /// Scheduler config file (JSON); command-line flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker count (0 or negative: one worker per pending transaction)
    #[arg(long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Maximum incarnations per transaction before the batch fails
    #[arg(long)]
    pub max_incarnations: Option<Incarnation>,

    /// Disable the incarnation ceiling
    #[arg(long, conflicts_with = "max_incarnations")]
    pub no_retry_limit: bool,

    /// Number of transfers in the batch
    #[arg(long, default_value = "500")]
    pub transactions: usize,

    /// Number of accounts transfers are drawn from
    #[arg(long, default_value = "128")]
    pub accounts: u32,

    /// Initial balance of every account
    #[arg(long, default_value = "1000")]
    pub initial_balance: u64,

    /// Largest transfer amount
    #[arg(long, default_value = "500")]
    pub max_amount: u64,

    /// Workload seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve the scheduler configuration from the config file and flags
    pub fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let mut config = match &self.config {
            Some(path) => SchedulerConfig::from_file(path)?,
            None => SchedulerConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(limit) = self.max_incarnations {
            config.max_incarnations = Some(limit);
        }
        if self.no_retry_limit {
            config.max_incarnations = None;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use occam_scheduler::DEFAULT_MAX_INCARNATIONS;
    use std::io::Write;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["occam"]);
        assert_eq!(cli.transactions, 500);
        assert_eq!(cli.accounts, 128);
        assert_eq!(cli.seed, 42);
        assert_eq!(cli.log_level, "info");

        let config = cli.scheduler_config().unwrap();
        assert_eq!(config.workers, 0);
        assert_eq!(config.max_incarnations, Some(DEFAULT_MAX_INCARNATIONS));
    }

    #[test]
    fn test_cli_negative_workers() {
        let cli = Cli::parse_from(["occam", "--workers", "-1"]);
        assert_eq!(cli.scheduler_config().unwrap().workers, -1);
    }

    #[test]
    fn test_cli_no_retry_limit() {
        let cli = Cli::parse_from(["occam", "--no-retry-limit"]);
        assert_eq!(cli.scheduler_config().unwrap().max_incarnations, None);
    }

    #[test]
    fn test_cli_retry_limit_flags_conflict() {
        let result = Cli::try_parse_from(["occam", "--no-retry-limit", "--max-incarnations", "5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_zero_ceiling_rejected() {
        let cli = Cli::parse_from(["occam", "--max-incarnations", "0"]);
        assert!(cli.scheduler_config().is_err());
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 8, "max_incarnations": 12}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from(["occam", "--config", path, "--workers", "2"]);
        let config = cli.scheduler_config().unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.max_incarnations, Some(12));
    }

    #[test]
    fn test_cli_missing_config_file() {
        let cli = Cli::parse_from(["occam", "--config", "/nonexistent/occam.json"]);
        assert!(cli.scheduler_config().is_err());
    }
}
