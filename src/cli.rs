//! Command-line interface definition.

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use core_runtime::config::BackupConfig;
use std::path::PathBuf;

const MEGABYTE: u64 = 1024 * 1024;

/// Incremental backup of every member of a Dropbox Business team.
#[derive(Debug, Parser)]
#[command(name = "teambackup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Dropbox Business team token.
    #[arg(env = "DROPBOX_TEAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Only mirror files modified on or after this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_since)]
    pub since: Option<DateTime<Utc>>,

    /// Skip files larger than this many megabytes.
    #[arg(long, value_name = "MB", default_value_t = 100)]
    pub maxsize: u64,

    /// Mirror destination directory.
    ///
    /// Defaults to "<today> backup", with " since <date>" appended when
    /// --since is given.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Number of members synced concurrently.
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub workers: usize,

    /// Console log level or tracing filter string.
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub log_level: String,

    /// Directory for the rolling detail log; disabled when omitted.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date in YYYY-MM-DD form", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("'{}' has no midnight", value))?;
    Ok(midnight.and_utc())
}

impl Cli {
    /// Destination directory, defaulting to a dated name.
    pub fn out_root(&self) -> PathBuf {
        if let Some(out) = &self.out {
            return out.clone();
        }

        let mut name = format!("{} backup", Utc::now().format("%Y-%m-%d"));
        if let Some(since) = self.since {
            name.push_str(&format!(" since {}", since.format("%Y-%m-%d")));
        }
        PathBuf::from(name)
    }

    /// Assemble the validated run configuration.
    pub fn build_config(&self, token: &str) -> core_runtime::Result<BackupConfig> {
        let mut builder = BackupConfig::builder()
            .token(token)
            .out_root(self.out_root())
            .max_file_size_bytes(self.maxsize * MEGABYTE)
            .workers(self.workers);

        if let Some(since) = self.since {
            builder = builder.since(since);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_since_accepts_dates() {
        let parsed = parse_since("2026-08-01").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-08-01 00:00");

        assert!(parse_since("01-08-2026").is_err());
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn test_default_out_is_dated() {
        let cli = parse(&["teambackup", "tok"]);
        let out = cli.out_root().display().to_string();
        assert!(out.ends_with(" backup"));

        let cli = parse(&["teambackup", "tok", "--since", "2026-01-15"]);
        let out = cli.out_root().display().to_string();
        assert!(out.ends_with(" backup since 2026-01-15"));
    }

    #[test]
    fn test_explicit_out_wins() {
        let cli = parse(&["teambackup", "tok", "--out", "/mnt/backups/acme"]);
        assert_eq!(cli.out_root(), PathBuf::from("/mnt/backups/acme"));
    }

    #[test]
    fn test_build_config_converts_maxsize() {
        let cli = parse(&["teambackup", "tok", "--maxsize", "5", "--workers", "2"]);
        let config = cli.build_config("tok").unwrap();
        assert_eq!(config.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_missing_token_is_parseable() {
        // Token absence is handled by main with a dedicated exit code, not
        // by clap.
        std::env::remove_var("DROPBOX_TEAM_TOKEN");
        let cli = parse(&["teambackup"]);
        assert!(cli.token.is_none());
    }
}
