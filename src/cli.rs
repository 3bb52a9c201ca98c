use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Prometheus endpoint to scrape
    ///
    /// URL of a prometheus metrics endpoint. Repeat the flag or separate with commas to scrape several endpoints.
    #[arg(short, long = "url", env = "HRMM_URL", value_hint = ValueHint::Url, value_delimiter = ',', required = true)]
    pub urls: Vec<String>,

    /// Select this metric name
    ///
    /// Only metric families with one of the given names are printed. All families when omitted.
    #[arg(short, long = "metric", env = "HRMM_METRIC", value_hint = ValueHint::Other, value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Select samples by label
    ///
    /// Either a bare label name (`method`) or a pair (`method=post`). A sample is printed when any token matches.
    #[arg(short, long = "label", env = "HRMM_LABEL", value_hint = ValueHint::Other, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Network timeout in seconds
    #[arg(short, long, env = "HRMM_TIMEOUT", value_hint = ValueHint::Other, default_value = "10")]
    pub timeout: u64,

    /// Set the logging level
    ///
    /// Log records at or above this level are written to stderr, and to the log file if one is given.
    #[arg(long, env = "LOG_LEVEL", value_hint = ValueHint::Other, default_value = "WARN")]
    pub loglevel: log::LevelFilter,

    /// Also write log records to this file
    #[arg(long, env = "HRMM_LOG_FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and print the metric values of every endpoint
    Print {
        /// Print a JSON document instead of exposition text
        #[arg(short, long)]
        json: bool,
    },
}
