//! Stack command handlers
//!
//! Handles `ecs-cluster` and `ecs-task-def`: deploy (create or update) a
//! fixed-template stack, or delete it with `--delete`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use ferry_core::compiler::OverrideEncoding;
use ferry_core::domain::parameters::ParameterSet;
use ferry_core::domain::stack::Capability;
use ferry_engine::resolver::{ParameterResolver, VpcDiscovery};
use ferry_engine::stacks::{ClusterStack, TaskDefinitionStack};
use ferry_engine::{ProcessEnv, StackReconciler};
use tracing::info;

use super::{client, parse_key_val};
use crate::config::Config;

/// Arguments shared by the stack commands
#[derive(Args)]
pub struct StackArgs {
    /// Stack name
    #[arg(long)]
    pub stack_name: String,

    /// Region
    #[arg(long, env = "FERRY_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Delete the stack instead of deploying it
    #[arg(long)]
    pub delete: bool,

    /// Template parameters (e.g. ClusterName=foo SubnetIds=subnet-a,subnet-b)
    #[arg(long, num_args = 0.., value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub parameters: Vec<(String, String)>,

    /// Capabilities to acknowledge
    #[arg(long, num_args = 1.., default_values_t = [Capability::NamedIam])]
    pub capabilities: Vec<Capability>,
}

impl StackArgs {
    fn parameter_set(&self) -> ParameterSet {
        self.parameters.iter().cloned().collect()
    }
}

fn reconciler(args: &StackArgs, config: &Config) -> Result<Arc<StackReconciler>> {
    let engine = config.engine(&args.region, OverrideEncoding::default())?;
    Ok(Arc::new(StackReconciler::from_config(
        client(config, &args.region),
        &engine,
    )))
}

/// Handle `ecs-cluster`
pub async fn handle_cluster_command(args: StackArgs, config: &Config) -> Result<()> {
    let control_plane = client(config, &args.region);
    let resolver = Arc::new(ParameterResolver::new(
        Arc::new(ProcessEnv),
        Some(Arc::new(VpcDiscovery::new(control_plane))),
    ));
    let cluster = ClusterStack::new(reconciler(&args, config)?, resolver, &args.region);
    info!("Cluster stack {} in {}", args.stack_name, args.region);

    if args.delete {
        cluster
            .delete(&args.stack_name)
            .await
            .with_context(|| format!("Failed to delete stack {}", args.stack_name))?;
        println!(
            "{}",
            format!("✓ Deleted stack {}", args.stack_name).green().bold()
        );
        return Ok(());
    }

    let outputs = cluster
        .deploy(&args.stack_name, &args.parameter_set(), args.capabilities.clone())
        .await
        .with_context(|| format!("Failed to deploy stack {}", args.stack_name))?;

    println!(
        "{}",
        format!("✓ Deployed/updated stack {}", args.stack_name)
            .green()
            .bold()
    );
    let rows = [
        ("Cluster:       ", &outputs.cluster_name),
        ("Execution role:", &outputs.execution_role_arn),
        ("Task role:     ", &outputs.task_role_arn),
        ("Log group:     ", &outputs.log_group_name),
        ("Security group:", &outputs.security_group_id),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("  {} {}", label, value.cyan());
        }
    }

    Ok(())
}

/// Handle `ecs-task-def`
pub async fn handle_task_def_command(args: StackArgs, config: &Config) -> Result<()> {
    let stack = TaskDefinitionStack::new(reconciler(&args, config)?, &args.region);
    info!("Task definition stack {} in {}", args.stack_name, args.region);

    if args.delete {
        stack
            .delete(&args.stack_name)
            .await
            .with_context(|| format!("Failed to delete stack {}", args.stack_name))?;
        println!(
            "{}",
            format!("✓ Deleted task definition stack {}", args.stack_name)
                .green()
                .bold()
        );
        return Ok(());
    }

    let arn = stack
        .deploy(&args.stack_name, args.parameter_set(), args.capabilities.clone())
        .await
        .with_context(|| format!("Failed to deploy stack {}", args.stack_name))?;

    println!(
        "{}",
        format!("✓ Deployed/updated task definition stack {}", args.stack_name)
            .green()
            .bold()
    );
    match arn {
        Some(arn) => println!("  Task definition: {}", arn.cyan()),
        None => println!("  {}", "No task definition ARN published".yellow()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ferry_core::domain::parameters::ParamValue;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: StackArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["ecs-cluster", "--stack-name", "analytics"]).unwrap();
        assert!(!cli.args.delete);
        assert_eq!(cli.args.capabilities, vec![Capability::NamedIam]);
        assert!(cli.args.parameter_set().is_empty());
    }

    #[test]
    fn test_parameters_and_capabilities() {
        let cli = TestCli::try_parse_from([
            "ecs-cluster",
            "--stack-name",
            "analytics",
            "--region",
            "eu-west-1",
            "--parameters",
            "ClusterName=analytics",
            "SubnetIds=subnet-a,subnet-b",
            "--capabilities",
            "CAPABILITY_IAM",
            "CAPABILITY_AUTO_EXPAND",
        ])
        .unwrap();

        let params = cli.args.parameter_set();
        assert_eq!(params.get("ClusterName"), Some(&ParamValue::from("analytics")));
        assert_eq!(
            params.get("SubnetIds").map(ParamValue::render),
            Some("subnet-a,subnet-b".to_string())
        );
        assert_eq!(
            cli.args.capabilities,
            vec![Capability::Iam, Capability::AutoExpand]
        );
        assert_eq!(cli.args.region, "eu-west-1");
    }

    #[test]
    fn test_rejects_unknown_capability() {
        assert!(
            TestCli::try_parse_from([
                "ecs-cluster",
                "--stack-name",
                "analytics",
                "--capabilities",
                "CAPABILITY_EVERYTHING",
            ])
            .is_err()
        );
    }
}
