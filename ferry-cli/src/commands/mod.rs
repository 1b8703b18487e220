//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod stack;
mod stepfn;

pub use deploy::DeployArgs;
pub use stack::StackArgs;
pub use stepfn::{CompileArgs, PublishArgs};

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use ferry_client::ControlPlaneClient;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy or delete the ECS cluster stack
    EcsCluster(StackArgs),
    /// Deploy or delete an ECS task definition stack
    EcsTaskDef(StackArgs),
    /// Compile an execution graph definition to a file
    StepfnCompile(CompileArgs),
    /// Create or update a state machine from a definition file
    StepfnDeploy(PublishArgs),
    /// Deploy a workload end to end (task definition + execution graph)
    Deploy(DeployArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::EcsCluster(args) => stack::handle_cluster_command(args, config).await,
        Commands::EcsTaskDef(args) => stack::handle_task_def_command(args, config).await,
        Commands::StepfnCompile(args) => stepfn::handle_compile_command(args, config),
        Commands::StepfnDeploy(args) => stepfn::handle_publish_command(args, config).await,
        Commands::Deploy(args) => deploy::handle_deploy_command(args, config).await,
    }
}

/// Build a region-scoped control-plane client
fn client(config: &Config, region: &str) -> Arc<ControlPlaneClient> {
    Arc::new(ControlPlaneClient::new(&config.control_plane_url, region))
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
