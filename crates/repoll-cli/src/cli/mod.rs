//! CLI for the repoll polling engine.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use repoll_core::config;
use repoll_core::HttpMethod;

use commands::{parse_header, parse_until, run_config, run_poll, UntilCondition};

/// Top-level CLI for repoll.
#[derive(Debug, Parser)]
#[command(name = "repoll")]
#[command(about = "repoll: poll an HTTP endpoint with retry and backoff", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Poll a URL and print each response body as JSON.
    Poll(PollArgs),

    /// Show the config file path and the effective configuration.
    Config,
}

/// Options for `repoll poll`. Unset options fall back to config.toml.
#[derive(Debug, Args)]
pub struct PollArgs {
    /// HTTP/HTTPS URL to poll.
    pub url: String,

    /// Base interval in milliseconds (also the delay before the first request).
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Interval multiplier after each successful response (1.0 keeps it constant).
    #[arg(long, value_name = "F")]
    pub backoff: Option<f64>,

    /// Upper bound for the grown interval, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub max_interval: Option<u64>,

    /// Retries after a failed request before giving up.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Request method.
    #[arg(long, value_name = "GET|POST")]
    pub method: Option<HttpMethod>,

    /// Extra request header; repeatable.
    #[arg(long = "header", short = 'H', value_name = "K: V", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body (POST only).
    #[arg(long)]
    pub body: Option<String>,

    /// Stop once the JSON pointer in the response equals VALUE.
    #[arg(long, value_name = "POINTER=VALUE", value_parser = parse_until)]
    pub until: Option<UntilCondition>,

    /// Stop after N successful responses.
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u64>,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Poll(args) => run_poll(&cfg, args).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
