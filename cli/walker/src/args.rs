//! CLI argument definitions for prefixwalk.

use clap::{Parser, ValueEnum};
use pw_cli_common::LogLevel;
use std::path::PathBuf;

/// Walk S3-compatible buckets as directory trees and list every object key.
///
/// Every prefix is listed with a `/` delimiter and walked concurrently. A
/// traversal cache remembers finished prefixes so a re-run only emits keys
/// under prefixes it has not completed before.
///
/// ## Examples
///
/// Walk one bucket, skipping media files:
///   prefixwalk -b my-bucket -X -o keys.txt
///
/// Walk every visible bucket against LocalStack:
///   prefixwalk --endpoint http://localhost:4566 --tree tree.txt --json tree.json
///
/// Force a full re-scan:
///   prefixwalk -b my-bucket --clear-cache
#[derive(Parser, Debug)]
#[command(name = "prefixwalk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Store Configuration ===
    /// Bucket to walk (every discovered bucket when omitted)
    #[arg(short, long, env = "PW_BUCKET")]
    pub bucket: Option<String>,

    /// Prefix to start walking from
    #[arg(short, long, env = "PW_PREFIX", default_value = "")]
    pub prefix: String,

    /// Custom S3 endpoint URL (LocalStack, MinIO)
    #[arg(long, env = "PW_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Region for buckets whose location is unknown
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// AWS access key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// AWS session token
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    // === Exclusions ===
    /// File extensions to skip, comma-separated (`none` = no extension)
    #[arg(long = "exclude-ext", value_delimiter = ',')]
    pub exclude_exts: Vec<String>,

    /// Also skip common media and asset extensions
    #[arg(short = 'X', long)]
    pub default_exclude_exts: bool,

    /// Directory names to skip entirely, comma-separated
    #[arg(long = "exclude-key", value_delimiter = ',')]
    pub exclude_keys: Vec<String>,

    /// Also skip `chunks`, `temp` and `cache` directories
    #[arg(short = 'K', long)]
    pub default_exclude_keys: bool,

    // === Parallelism ===
    /// Maximum prefixes listed at once, across all buckets (0 is treated as 1)
    #[arg(short, long, default_value = "10")]
    pub workers: usize,

    /// Maximum retries for a failed listing call
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    // === Output ===
    /// File receiving one key per line (`-` for stdout)
    #[arg(short, long, default_value = "prefixwalk.txt")]
    pub output: String,

    /// Line format of the output file
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Also write the directory tree as JSON to this file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Also write the directory tree as indented text to this file
    #[arg(long)]
    pub tree: Option<PathBuf>,

    // === Cache ===
    /// Traversal cache file (default: prefixwalk.<fingerprint>.cache)
    #[arg(long, env = "PW_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Walk without reading or writing a traversal cache
    #[arg(long, conflicts_with_all = ["cache_file", "clear_cache"])]
    pub no_cache: bool,

    /// Clear the traversal cache before walking
    #[arg(long)]
    pub clear_cache: bool,

    // === Progress & Logging ===
    /// Print progress to stderr while walking
    #[arg(long)]
    pub progress: bool,

    /// Seconds between progress lines
    #[arg(long, default_value = "5", value_parser = parse_positive_u64)]
    pub progress_interval: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Output format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    /// One key per line
    Text,
    /// One `{"bucket":..,"key":..}` object per line
    Jsonl,
}

impl From<OutputFormatArg> for pw_walker::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => pw_walker::OutputFormat::Text,
            OutputFormatArg::Jsonl => pw_walker::OutputFormat::Jsonl,
        }
    }
}

/// Parse a positive u64 (>= 1).
fn parse_positive_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exclusion_lists_split_on_commas() {
        let cli = Cli::try_parse_from([
            "prefixwalk",
            "--exclude-ext",
            "mp4,PNG",
            "--exclude-ext",
            "none",
            "--exclude-key",
            "temp,build",
            "-X",
        ])
        .unwrap();

        assert_eq!(cli.exclude_exts, vec!["mp4", "PNG", "none"]);
        assert_eq!(cli.exclude_keys, vec!["temp", "build"]);
        assert!(cli.default_exclude_exts);
        assert!(!cli.default_exclude_keys);
    }

    #[test]
    fn test_output_defaults() {
        let cli = Cli::try_parse_from(["prefixwalk", "-w", "0"]).unwrap();

        assert_eq!(cli.workers, 0);
        assert_eq!(cli.output, "prefixwalk.txt");
        assert_eq!(cli.format, OutputFormatArg::Text);
        assert_eq!(cli.progress_interval, 5);
        assert!(cli.json.is_none());
        assert!(cli.tree.is_none());
    }

    #[test]
    fn test_no_cache_conflicts() {
        assert!(Cli::try_parse_from(["prefixwalk", "--no-cache", "--clear-cache"]).is_err());
        assert!(
            Cli::try_parse_from(["prefixwalk", "--no-cache", "--cache-file", "x.cache"]).is_err()
        );
    }

    #[test]
    fn test_progress_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["prefixwalk", "--progress-interval", "0"]).is_err());
    }

    #[test]
    fn test_format_conversion() {
        assert_eq!(
            pw_walker::OutputFormat::from(OutputFormatArg::Jsonl),
            pw_walker::OutputFormat::Jsonl
        );
    }
}
