//! Ferry CLI
//!
//! Command-line interface for deploying cluster stacks, task definitions and
//! execution graphs.

mod commands;
mod config;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Deploy containerized flows as execution graphs", long_about = None)]
struct Cli {
    /// Control-plane gateway URL
    #[arg(
        long,
        global = true,
        env = "FERRY_CONTROL_PLANE_URL",
        default_value = "http://localhost:4566"
    )]
    control_plane_url: String,

    /// Seconds to wait for a stack operation to converge
    #[arg(long, global = true, env = "FERRY_CONVERGENCE_TIMEOUT", default_value_t = 1800)]
    convergence_timeout: u64,

    /// Seconds between stack status polls
    #[arg(long, global = true, env = "FERRY_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Subnets used when a deployment names none (comma-separated)
    #[arg(long, global = true, env = "FERRY_DEFAULT_SUBNETS", value_delimiter = ',')]
    default_subnets: Vec<String>,

    /// Security groups used when a deployment names none (comma-separated)
    #[arg(long, global = true, env = "FERRY_DEFAULT_SECURITY_GROUPS", value_delimiter = ',')]
    default_security_groups: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout only carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_cli=info,ferry_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        control_plane_url: cli.control_plane_url,
        convergence_timeout: Duration::from_secs(cli.convergence_timeout),
        poll_interval: Duration::from_secs(cli.poll_interval),
        default_subnets: cli.default_subnets,
        default_security_groups: cli.default_security_groups,
    };

    match handle_command(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            exit_code_for(&e)
        }
    }
}

/// Caller input problems exit with 2, everything else with 1
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let caller_error = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ferry_core::Error>())
        .any(ferry_core::Error::is_caller_error);
    if caller_error {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}
