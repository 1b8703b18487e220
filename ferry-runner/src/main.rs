//! Ferry Runner
//!
//! Container entrypoint for compiled execution graphs. Decodes the
//! invocation from either override encoding, binds the target and calls it.
//!
//! Command style: `ferry-runner --target T --args JSON --kwargs JSON`
//! Environment style: `FERRY_TARGET`, `FERRY_ARGS`, `FERRY_KWARGS`
//!
//! Exit codes: 0 success, 2 invalid invocation, 3 target could not be bound,
//! 4 target failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ferry_runner::{LuaBinder, run};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferry-runner")]
#[command(about = "Run a flow target inside its container", long_about = None)]
struct Cli {
    /// Target to call, e.g. pkg.module:callable
    #[arg(long, env = "FERRY_TARGET")]
    target: String,

    /// Positional arguments as a JSON array
    #[arg(long, env = "FERRY_ARGS", default_value = "[]", allow_hyphen_values = true)]
    args: String,

    /// Keyword arguments as a JSON object
    #[arg(long, env = "FERRY_KWARGS", default_value = "{}", allow_hyphen_values = true)]
    kwargs: String,

    /// Directory flow modules are loaded from
    #[arg(long, env = "FERRY_FLOW_ROOT", default_value = ".")]
    root: PathBuf,
}

fn main() -> ExitCode {
    // stdout is reserved for the result document
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let binder = LuaBinder::new(&cli.root);

    match run(&cli.target, &cli.args, &cli.kwargs, &binder) {
        Ok(Some(output)) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
