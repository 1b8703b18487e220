//! Execution-graph command handlers
//!
//! `stepfn-compile` writes a definition document to disk without touching the
//! control plane; `stepfn-deploy` publishes a document under a stable name.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use ferry_core::compiler::{LaunchType, OverrideEncoding, Placement};
use ferry_core::domain::target::TaskTarget;
use ferry_engine::GraphDeployer;
use serde_json::{Map, Value as JsonValue};
use tracing::info;

use super::{client, parse_key_val};
use crate::config::Config;

/// Arguments for `stepfn-compile`
#[derive(Args)]
pub struct CompileArgs {
    /// File the definition is written to
    #[arg(long)]
    pub output: PathBuf,

    /// State machine name; also the container the overrides apply to
    #[arg(long)]
    pub state_machine_name: String,

    /// Cluster the task runs on
    #[arg(long)]
    pub cluster: String,

    /// Task definition ARN or family
    #[arg(long)]
    pub task_definition: String,

    /// Subnets for the task's network configuration
    #[arg(long, required = true, num_args = 1..)]
    pub subnets: Vec<String>,

    /// Security groups for the task's network configuration
    #[arg(long, required = true, num_args = 1..)]
    pub security_groups: Vec<String>,

    /// Task target, e.g. pkg.module:callable
    #[arg(long)]
    pub flow_path: String,

    /// Positional arguments, passed as strings
    #[arg(long, num_args = 0..)]
    pub args: Vec<String>,

    /// Keyword arguments, passed as strings
    #[arg(long, num_args = 0.., value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub kwargs: Vec<(String, String)>,

    /// Launch type
    #[arg(long, default_value_t = LaunchType::Fargate)]
    pub launch_type: LaunchType,

    /// Override encoding (command or environment)
    #[arg(long, env = "FERRY_OVERRIDE_ENCODING", default_value = "command")]
    pub encoding: OverrideEncoding,

    /// Region the engine configuration is built for
    #[arg(long, env = "FERRY_REGION", default_value = "us-east-1")]
    pub region: String,
}

impl CompileArgs {
    fn positional(&self) -> Vec<JsonValue> {
        self.args.iter().cloned().map(JsonValue::String).collect()
    }

    fn keyword(&self) -> Map<String, JsonValue> {
        self.kwargs
            .iter()
            .map(|(key, value)| (key.clone(), JsonValue::String(value.clone())))
            .collect()
    }
}

/// Arguments for `stepfn-deploy`
#[derive(Args)]
pub struct PublishArgs {
    /// Stable state machine name
    #[arg(long)]
    pub state_machine_name: String,

    /// Definition document produced by `stepfn-compile`
    #[arg(long)]
    pub definition: PathBuf,

    /// Role the state machine runs as
    #[arg(long)]
    pub role_arn: String,

    /// Region
    #[arg(long, env = "FERRY_REGION", default_value = "us-east-1")]
    pub region: String,
}

/// Handle `stepfn-compile`
pub fn handle_compile_command(args: CompileArgs, config: &Config) -> Result<()> {
    let target = TaskTarget::parse(&args.flow_path)?;
    let engine = config.engine(&args.region, args.encoding.clone())?;

    let placement = Placement {
        cluster: args.cluster.clone(),
        task_definition: args.task_definition.clone(),
        container_name: args.state_machine_name.clone(),
        launch_type: args.launch_type,
        subnets: args.subnets.clone(),
        security_groups: args.security_groups.clone(),
        assign_public_ip: engine.assign_public_ip,
    };
    let definition = engine
        .compiler()
        .compile(&target, &args.positional(), &args.keyword(), &placement)?;

    let text = serde_json::to_string_pretty(&definition)?;
    info!("Writing definition for {} to {}", args.state_machine_name, args.output.display());
    std::fs::write(&args.output, text)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "{}",
        format!(
            "✓ Compiled state machine {} to {}",
            args.state_machine_name,
            args.output.display()
        )
        .green()
        .bold()
    );
    println!("  Target: {}", target.canonical().cyan());

    Ok(())
}

/// Handle `stepfn-deploy`
pub async fn handle_publish_command(args: PublishArgs, config: &Config) -> Result<()> {
    let definition = std::fs::read_to_string(&args.definition)
        .with_context(|| format!("Failed to read {}", args.definition.display()))?;

    let deployer = GraphDeployer::new(client(config, &args.region));
    let handle = deployer
        .deploy(&args.state_machine_name, &definition, &args.role_arn)
        .await
        .with_context(|| format!("Failed to deploy state machine {}", args.state_machine_name))?;

    println!(
        "{}",
        format!("✓ Deployed state machine {}", handle.name)
            .green()
            .bold()
    );
    println!("  ARN: {}", handle.arn.cyan());

    Ok(())
}
