//! Workload deployment command handler
//!
//! `deploy` reconciles the workload's task definition stack, compiles its
//! execution graph and publishes it in one step.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use ferry_core::compiler::OverrideEncoding;
use ferry_core::domain::target::TaskTarget;
use ferry_engine::{FlowDeployer, WorkloadOverrides, WorkloadRequest};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::client;
use crate::config::Config;

/// Arguments for `deploy`
#[derive(Args)]
pub struct DeployArgs {
    /// Workload name; names the state machine, task family and container
    #[arg(long)]
    pub name: String,

    /// Task target, e.g. pkg.module:callable
    #[arg(long)]
    pub target: String,

    /// Cluster (and cluster stack) the task runs on
    #[arg(long)]
    pub cluster: String,

    /// Container image
    #[arg(long, default_value = "")]
    pub image: String,

    /// Role the state machine runs as
    #[arg(long)]
    pub role_arn: String,

    /// Task execution role (defaults to the cluster stack's)
    #[arg(long)]
    pub execution_role_arn: Option<String>,

    /// Task role (defaults to the cluster stack's)
    #[arg(long)]
    pub task_role_arn: Option<String>,

    /// Log group (defaults to the cluster stack's, then /ecs/<cluster>)
    #[arg(long)]
    pub log_group_name: Option<String>,

    /// Task CPU units
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Task memory (MiB)
    #[arg(long)]
    pub memory: Option<u32>,

    /// Subnets (defaults to the configured default subnets)
    #[arg(long, num_args = 1..)]
    pub subnets: Vec<String>,

    /// Security groups (defaults to the configured default security groups)
    #[arg(long, num_args = 1..)]
    pub security_groups: Vec<String>,

    /// Positional arguments as a JSON array
    #[arg(long, default_value = "[]")]
    pub args: String,

    /// Keyword arguments as a JSON object
    #[arg(long, default_value = "{}")]
    pub kwargs: String,

    /// Directory the compiled definition is written to
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Region
    #[arg(long, env = "FERRY_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Override encoding (command or environment)
    #[arg(long, env = "FERRY_OVERRIDE_ENCODING", default_value = "command")]
    pub encoding: OverrideEncoding,
}

impl DeployArgs {
    fn request(&self) -> Result<WorkloadRequest> {
        let target = TaskTarget::parse(&self.target)?;
        Ok(WorkloadRequest {
            name: self.name.clone(),
            target,
            cluster: self.cluster.clone(),
            image: self.image.clone(),
            args: parse_args(&self.args)?,
            kwargs: parse_kwargs(&self.kwargs)?,
        })
    }

    fn overrides(&self) -> WorkloadOverrides {
        WorkloadOverrides {
            execution_role_arn: self.execution_role_arn.clone(),
            task_role_arn: self.task_role_arn.clone(),
            log_group_name: self.log_group_name.clone(),
            cpu: self.cpu,
            memory: self.memory,
            subnets: self.subnets.clone(),
            security_groups: self.security_groups.clone(),
            state_machine_role_arn: Some(self.role_arn.clone()),
            artifact_dir: self.artifact_dir.clone(),
        }
    }
}

fn parse_args(text: &str) -> Result<Vec<JsonValue>> {
    match serde_json::from_str(text).context("--args is not valid JSON")? {
        JsonValue::Array(items) => Ok(items),
        other => bail!("--args must be a JSON array, got {}", other),
    }
}

fn parse_kwargs(text: &str) -> Result<Map<String, JsonValue>> {
    match serde_json::from_str(text).context("--kwargs is not valid JSON")? {
        JsonValue::Object(map) => Ok(map),
        other => bail!("--kwargs must be a JSON object, got {}", other),
    }
}

/// Handle `deploy`
pub async fn handle_deploy_command(args: DeployArgs, config: &Config) -> Result<()> {
    let request = args.request()?;
    debug!(
        "Workload {}: {} positional, {} keyword argument(s)",
        request.name,
        request.args.len(),
        request.kwargs.len()
    );
    let engine = config.engine(&args.region, args.encoding.clone())?;
    let control_plane = client(config, &args.region);
    let deployer = FlowDeployer::new(engine, control_plane.clone(), control_plane);

    let report = deployer
        .deploy_workload(&request, &args.overrides())
        .await
        .with_context(|| format!("Failed to deploy workload {}", args.name))?;

    println!(
        "{}",
        format!("✓ Deployed workload {}", args.name).green().bold()
    );
    if report.task_definition_resolved {
        println!("  Task definition: {}", report.task_definition.cyan());
    } else {
        println!(
            "  Task definition: {} {}",
            report.task_definition.cyan(),
            "(no ARN published, using family name)".yellow()
        );
    }
    println!("  State machine:   {}", report.graph.arn.cyan());
    if let Some(path) = &report.definition_path {
        println!("  Definition:      {}", path.display());
    }

    Ok(())
}
