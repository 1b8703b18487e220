//! Cluster and task-definition stacks
//!
//! The two fixed templates ferry deploys. The cluster stack needs network
//! placement and resolves `VpcId`/`SubnetIds` when the caller leaves them
//! out; the task-definition stack publishes the task definition ARN.

use std::sync::Arc;

use ferry_core::Result;
use ferry_core::domain::parameters::ParameterSet;
use ferry_core::domain::stack::{Capability, StackDescriptor, StackOutputs, Template};
use tracing::info;

use crate::reconciler::StackReconciler;
use crate::resolver::{ParameterResolver, network_keys};

const CLUSTER_TEMPLATE: &str = include_str!("../templates/ecs_cluster.yaml");
const TASK_DEFINITION_TEMPLATE: &str = include_str!("../templates/task_definition.yaml");

pub const CLUSTER_NAME_KEY: &str = "ClusterName";
pub const TASK_DEFINITION_ARN_SUFFIX: &str = "TaskDefinitionArn";

pub fn cluster_template() -> Template {
    Template::new("ecs-cluster", CLUSTER_TEMPLATE)
}

pub fn task_definition_template() -> Template {
    Template::new("task-definition", TASK_DEFINITION_TEMPLATE)
}

/// Values published by a cluster stack
///
/// Each field is `None` when the stack does not publish it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOutputs {
    pub cluster_name: Option<String>,
    pub execution_role_arn: Option<String>,
    pub task_role_arn: Option<String>,
    pub log_group_name: Option<String>,
    pub security_group_id: Option<String>,
}

impl From<&StackOutputs> for ClusterOutputs {
    fn from(outputs: &StackOutputs) -> Self {
        let get = |key: &str| {
            outputs
                .get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            cluster_name: get("ClusterName"),
            execution_role_arn: get("ExecutionRoleArn"),
            task_role_arn: get("TaskRoleArn"),
            log_group_name: get("LogGroupName"),
            security_group_id: get("SecurityGroupId"),
        }
    }
}

/// Deploys the cluster stack
pub struct ClusterStack {
    reconciler: Arc<StackReconciler>,
    resolver: Arc<ParameterResolver>,
    region: String,
}

impl ClusterStack {
    pub fn new(
        reconciler: Arc<StackReconciler>,
        resolver: Arc<ParameterResolver>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            reconciler,
            resolver,
            region: region.into(),
        }
    }

    /// Create or update the cluster stack
    ///
    /// `ClusterName` defaults to the stack name; missing network parameters
    /// are resolved from the environment or discovered.
    pub async fn deploy(
        &self,
        stack_name: &str,
        parameters: &ParameterSet,
        capabilities: Vec<Capability>,
    ) -> Result<ClusterOutputs> {
        let mut resolved = self.resolver.resolve(&network_keys(), parameters).await?;
        if resolved.get_non_empty(CLUSTER_NAME_KEY).is_none() {
            resolved.insert(CLUSTER_NAME_KEY, stack_name);
        }

        let descriptor = StackDescriptor::new(stack_name, &self.region, cluster_template())
            .with_parameters(resolved)
            .with_capabilities(capabilities);
        let outputs = self.reconciler.reconcile(&descriptor).await?;

        info!("Cluster stack {} published {} output(s)", stack_name, outputs.len());
        Ok(ClusterOutputs::from(&outputs))
    }

    /// Read the outputs of an existing cluster stack
    pub async fn outputs(&self, stack_name: &str) -> Result<Option<ClusterOutputs>> {
        Ok(self
            .reconciler
            .outputs(stack_name)
            .await?
            .as_ref()
            .map(ClusterOutputs::from))
    }

    /// Delete the cluster stack
    pub async fn delete(&self, stack_name: &str) -> Result<()> {
        let descriptor = StackDescriptor::new(stack_name, &self.region, cluster_template());
        self.reconciler.destroy(&descriptor).await
    }
}

/// Parameters of one task definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionParams {
    pub cluster_name: String,
    /// Task family, also used as the container name
    pub task_definition_name: String,
    pub container_image: String,
    pub execution_role_arn: String,
    pub task_role_arn: String,
    pub cpu: u32,
    pub memory: u32,
    pub log_group_name: String,
}

impl TaskDefinitionParams {
    pub fn to_parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with("ClusterName", self.cluster_name.as_str())
            .with("TaskDefinitionName", self.task_definition_name.as_str())
            .with("ContainerImage", self.container_image.as_str())
            .with("ExecutionRoleArn", self.execution_role_arn.as_str())
            .with("TaskRoleArn", self.task_role_arn.as_str())
            .with("Cpu", self.cpu)
            .with("Memory", self.memory)
            .with("LogGroupName", self.log_group_name.as_str())
    }
}

/// Deploys task-definition stacks
pub struct TaskDefinitionStack {
    reconciler: Arc<StackReconciler>,
    region: String,
}

impl TaskDefinitionStack {
    pub fn new(reconciler: Arc<StackReconciler>, region: impl Into<String>) -> Self {
        Self {
            reconciler,
            region: region.into(),
        }
    }

    /// Create or update a task-definition stack
    ///
    /// # Returns
    /// The task definition ARN, when the stack publishes an output whose key
    /// ends with `TaskDefinitionArn` (case-insensitive)
    pub async fn deploy(
        &self,
        stack_name: &str,
        parameters: ParameterSet,
        capabilities: Vec<Capability>,
    ) -> Result<Option<String>> {
        let descriptor = StackDescriptor::new(stack_name, &self.region, task_definition_template())
            .with_parameters(parameters)
            .with_capabilities(capabilities);
        let outputs = self.reconciler.reconcile(&descriptor).await?;

        let arn = outputs
            .find_by_suffix(TASK_DEFINITION_ARN_SUFFIX)
            .map(str::to_string);
        match &arn {
            Some(arn) => info!("Task definition stack {} published {}", stack_name, arn),
            None => info!("Task definition stack {} published no task definition ARN", stack_name),
        }
        Ok(arn)
    }

    /// Delete a task-definition stack
    pub async fn delete(&self, stack_name: &str) -> Result<()> {
        let descriptor = StackDescriptor::new(stack_name, &self.region, task_definition_template());
        self.reconciler.destroy(&descriptor).await
    }
}

/// Name of the task-definition stack for a workload
pub fn task_definition_stack_name(workload: &str) -> String {
    format!("{}-taskdef", workload)
}
