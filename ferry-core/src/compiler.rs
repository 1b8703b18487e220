//! Execution-graph compiler
//!
//! Turns a task target, its arguments and placement parameters into a
//! single-task execution graph. Compilation is a pure function of its inputs.
//!
//! The override block carries the invocation contract to the container
//! entrypoint. Two encodings exist and the entrypoint decodes both:
//! - command style: `<program...> --target T --args JSON --kwargs JSON`
//! - environment style: `FERRY_TARGET`, `FERRY_ARGS`, `FERRY_KWARGS`

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::graph::{
    AwsVpcConfiguration, ContainerOverride, EnvironmentVariable, ExecutionGraphDefinition,
    NetworkConfiguration, Overrides, State, StateType, TaskParameters,
};
use crate::domain::target::TaskTarget;
use crate::error::{Error, Result};

/// Remote resource that runs a container task and waits for it to stop
pub const RUN_TASK_SYNC_RESOURCE: &str = "arn:aws:states:::ecs:runTask.sync";

/// Id of the single task state
pub const START_STATE_ID: &str = "RunFlow";

/// Default entrypoint program for command-style overrides
pub const DEFAULT_RUNNER_PROGRAM: &str = "ferry-runner";

/// Environment variable carrying the target reference
pub const TARGET_ENV: &str = "FERRY_TARGET";
/// Environment variable carrying the JSON array of positional args
pub const ARGS_ENV: &str = "FERRY_ARGS";
/// Environment variable carrying the JSON object of keyword args
pub const KWARGS_ENV: &str = "FERRY_KWARGS";

pub const TARGET_FLAG: &str = "--target";
pub const ARGS_FLAG: &str = "--args";
pub const KWARGS_FLAG: &str = "--kwargs";

/// How the invocation contract is encoded in the container override
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideEncoding {
    /// Pass target and JSON documents as discrete command tokens after `program`
    Command { program: Vec<String> },
    /// Pass target and JSON documents as environment variables
    Environment,
}

impl OverrideEncoding {
    /// Command-style encoding invoking the default runner program
    pub fn command() -> Self {
        OverrideEncoding::Command {
            program: vec![DEFAULT_RUNNER_PROGRAM.to_string()],
        }
    }
}

impl Default for OverrideEncoding {
    fn default() -> Self {
        Self::command()
    }
}

impl FromStr for OverrideEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" => Ok(Self::command()),
            "environment" | "env" => Ok(OverrideEncoding::Environment),
            other => Err(Error::configuration(format!(
                "Unknown override encoding '{}' (expected 'command' or 'environment')",
                other
            ))),
        }
    }
}

/// Task launch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchType {
    #[default]
    Fargate,
    Ec2,
    External,
}

impl LaunchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchType::Fargate => "FARGATE",
            LaunchType::Ec2 => "EC2",
            LaunchType::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for LaunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LaunchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FARGATE" => Ok(LaunchType::Fargate),
            "EC2" => Ok(LaunchType::Ec2),
            "EXTERNAL" => Ok(LaunchType::External),
            other => Err(Error::configuration(format!(
                "Unknown launch type '{}'",
                other
            ))),
        }
    }
}

/// Where and how the task runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Cluster name or identifier
    pub cluster: String,
    /// Task definition identifier (or family name)
    pub task_definition: String,
    /// Container the override block applies to
    pub container_name: String,
    pub launch_type: LaunchType,
    /// Empty means "use the compiler's configured defaults"
    pub subnets: Vec<String>,
    /// Empty means "use the compiler's configured defaults"
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

/// Fallback network lists used when a placement leaves them empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDefaults {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

/// Compiles single-task execution graphs
#[derive(Debug, Clone, Default)]
pub struct GraphCompiler {
    encoding: OverrideEncoding,
    defaults: NetworkDefaults,
}

impl GraphCompiler {
    pub fn new(encoding: OverrideEncoding, defaults: NetworkDefaults) -> Self {
        Self { encoding, defaults }
    }

    pub fn encoding(&self) -> &OverrideEncoding {
        &self.encoding
    }

    /// Compile a graph that runs `target(*args, **kwargs)` on the cluster
    ///
    /// # Arguments
    /// * `target` - The task target to invoke
    /// * `args` - Positional arguments
    /// * `kwargs` - Keyword arguments
    /// * `placement` - Cluster, task definition and network placement
    ///
    /// # Returns
    /// A graph with one terminal task state that is also the start state
    pub fn compile(
        &self,
        target: &TaskTarget,
        args: &[JsonValue],
        kwargs: &Map<String, JsonValue>,
        placement: &Placement,
    ) -> Result<ExecutionGraphDefinition> {
        let args_json = serde_json::to_string(args)
            .map_err(|e| Error::definition_format(format!("args are not serializable: {}", e)))?;
        let kwargs_json = serde_json::to_string(kwargs).map_err(|e| {
            Error::definition_format(format!("kwargs are not serializable: {}", e))
        })?;

        let container_override = self.container_override(
            &placement.container_name,
            &target.canonical(),
            args_json,
            kwargs_json,
        );

        let (subnets, security_groups) =
            self.network(&placement.subnets, &placement.security_groups)?;

        let state = State {
            state_type: StateType::Task,
            resource: RUN_TASK_SYNC_RESOURCE.to_string(),
            parameters: TaskParameters {
                launch_type: placement.launch_type.to_string(),
                cluster: placement.cluster.clone(),
                task_definition: placement.task_definition.clone(),
                network_configuration: NetworkConfiguration {
                    awsvpc_configuration: AwsVpcConfiguration {
                        subnets,
                        security_groups,
                        assign_public_ip: placement.assign_public_ip.into(),
                    },
                },
                overrides: Overrides {
                    container_overrides: vec![container_override],
                },
            },
            next: None,
            end: true,
        };

        let mut states = BTreeMap::new();
        states.insert(START_STATE_ID.to_string(), state);

        Ok(ExecutionGraphDefinition {
            comment: format!("Run flow {} in ECS", target),
            start_at: START_STATE_ID.to_string(),
            states,
        })
    }

    /// Network lists a placement ends up with
    ///
    /// Empty lists fall back to the configured defaults.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when a list is empty and has no default
    pub fn network(
        &self,
        subnets: &[String],
        security_groups: &[String],
    ) -> Result<(Vec<String>, Vec<String>)> {
        let subnets = pick_or_default("subnets", subnets, &self.defaults.subnets)?;
        let security_groups =
            pick_or_default("security groups", security_groups, &self.defaults.security_groups)?;
        Ok((subnets, security_groups))
    }

    fn container_override(
        &self,
        container_name: &str,
        target: &str,
        args_json: String,
        kwargs_json: String,
    ) -> ContainerOverride {
        match &self.encoding {
            OverrideEncoding::Command { program } => {
                let mut command = program.clone();
                command.extend([
                    TARGET_FLAG.to_string(),
                    target.to_string(),
                    ARGS_FLAG.to_string(),
                    args_json,
                    KWARGS_FLAG.to_string(),
                    kwargs_json,
                ]);
                ContainerOverride {
                    name: container_name.to_string(),
                    command: Some(command),
                    environment: None,
                }
            }
            OverrideEncoding::Environment => ContainerOverride {
                name: container_name.to_string(),
                command: None,
                environment: Some(vec![
                    EnvironmentVariable {
                        name: TARGET_ENV.to_string(),
                        value: target.to_string(),
                    },
                    EnvironmentVariable {
                        name: ARGS_ENV.to_string(),
                        value: args_json,
                    },
                    EnvironmentVariable {
                        name: KWARGS_ENV.to_string(),
                        value: kwargs_json,
                    },
                ]),
            },
        }
    }
}

fn pick_or_default(label: &str, given: &[String], defaults: &[String]) -> Result<Vec<String>> {
    let chosen = if given.is_empty() { defaults } else { given };
    if chosen.is_empty() {
        return Err(Error::configuration(format!(
            "No {} given and no default {} configured",
            label, label
        )));
    }
    Ok(chosen.to_vec())
}
