//! Workload deployment facade
//!
//! One call that takes a workload from "this target, these arguments" to a
//! deployed execution graph:
//! 1. Fill role and log-group defaults from the cluster stack's outputs (best effort)
//! 2. Reconcile the workload's `<name>-taskdef` stack
//! 3. Compile the single-task graph against the resulting task definition
//! 4. Deploy the graph under the workload name
//!
//! The graph's execution role is never defaulted; it must be passed in.

use std::path::PathBuf;
use std::sync::Arc;

use ferry_client::{StackApi, StateMachineApi};
use ferry_core::compiler::{GraphCompiler, Placement};
use ferry_core::domain::graph::ExecutionGraphHandle;
use ferry_core::domain::stack::Capability;
use ferry_core::domain::target::TaskTarget;
use ferry_core::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::graph_deployer::GraphDeployer;
use crate::reconciler::StackReconciler;
use crate::stacks::{
    ClusterOutputs, TaskDefinitionParams, TaskDefinitionStack, task_definition_stack_name,
};

/// What to deploy
#[derive(Debug, Clone)]
pub struct WorkloadRequest {
    /// Workload name; names the graph, the task family and the container
    pub name: String,
    pub target: TaskTarget,
    /// Cluster the task runs on; also the name of the cluster stack
    pub cluster: String,
    /// Container image (may be empty)
    pub image: String,
    pub args: Vec<JsonValue>,
    pub kwargs: Map<String, JsonValue>,
}

/// Optional settings; unset values fall back to cluster outputs or config
#[derive(Debug, Clone, Default)]
pub struct WorkloadOverrides {
    pub execution_role_arn: Option<String>,
    pub task_role_arn: Option<String>,
    pub log_group_name: Option<String>,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    /// Role the graph runs as; required
    pub state_machine_role_arn: Option<String>,
    /// Where to write `<name>_stepfn.json`, if anywhere
    pub artifact_dir: Option<PathBuf>,
}

/// Outcome of a workload deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Task definition the graph references
    pub task_definition: String,
    /// False when the stack published no ARN and the bare name was used
    pub task_definition_resolved: bool,
    pub graph: ExecutionGraphHandle,
    pub definition_path: Option<PathBuf>,
}

/// Deploys workloads end to end
pub struct FlowDeployer {
    config: EngineConfig,
    reconciler: Arc<StackReconciler>,
    task_definitions: TaskDefinitionStack,
    graphs: GraphDeployer,
    compiler: GraphCompiler,
}

impl FlowDeployer {
    pub fn new(
        config: EngineConfig,
        stacks: Arc<dyn StackApi>,
        machines: Arc<dyn StateMachineApi>,
    ) -> Self {
        let reconciler = Arc::new(StackReconciler::from_config(stacks, &config));
        Self {
            task_definitions: TaskDefinitionStack::new(reconciler.clone(), &config.region),
            graphs: GraphDeployer::new(machines),
            compiler: config.compiler(),
            reconciler,
            config,
        }
    }

    /// Deploy a workload
    ///
    /// # Arguments
    /// * `request` - Target, arguments and placement of the workload
    /// * `overrides` - Roles, sizing, networking and artifact settings
    ///
    /// # Returns
    /// The task definition used and the deployed graph's handle
    pub async fn deploy_workload(
        &self,
        request: &WorkloadRequest,
        overrides: &WorkloadOverrides,
    ) -> Result<DeploymentReport> {
        let name = request.name.as_str();
        let role_arn = overrides
            .state_machine_role_arn
            .as_deref()
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "A state machine role ARN must be provided explicitly to deploy {}",
                    name
                ))
            })?;

        self.compiler
            .network(&overrides.subnets, &overrides.security_groups)?;

        info!("Deploying workload {} ({}) on {}", name, request.target, request.cluster);

        let defaults = self.cluster_defaults(&request.cluster, overrides).await;
        let params = TaskDefinitionParams {
            cluster_name: request.cluster.clone(),
            task_definition_name: name.to_string(),
            container_image: request.image.clone(),
            execution_role_arn: overrides
                .execution_role_arn
                .clone()
                .or(defaults.execution_role_arn)
                .unwrap_or_default(),
            task_role_arn: overrides
                .task_role_arn
                .clone()
                .or(defaults.task_role_arn)
                .unwrap_or_default(),
            cpu: overrides.cpu.unwrap_or(self.config.default_cpu),
            memory: overrides.memory.unwrap_or(self.config.default_memory),
            log_group_name: overrides
                .log_group_name
                .clone()
                .or(defaults.log_group_name)
                .unwrap_or_else(|| default_log_group(&request.cluster)),
        };

        let arn = self
            .task_definitions
            .deploy(
                &task_definition_stack_name(name),
                params.to_parameters(),
                vec![Capability::NamedIam],
            )
            .await?;
        let task_definition_resolved = arn.is_some();
        let task_definition = arn.unwrap_or_else(|| {
            warn!("No task definition ARN published for {}, using the family name", name);
            name.to_string()
        });

        let placement = Placement {
            cluster: request.cluster.clone(),
            task_definition: task_definition.clone(),
            container_name: name.to_string(),
            launch_type: self.config.launch_type,
            subnets: overrides.subnets.clone(),
            security_groups: overrides.security_groups.clone(),
            assign_public_ip: self.config.assign_public_ip,
        };
        let definition =
            self.compiler
                .compile(&request.target, &request.args, &request.kwargs, &placement)?;

        let definition_path = match &overrides.artifact_dir {
            Some(dir) => {
                let path = dir.join(format!("{}_stepfn.json", name));
                tokio::fs::write(&path, definition.to_json()?).await?;
                info!("Wrote execution graph definition to {}", path.display());
                Some(path)
            }
            None => None,
        };

        let graph = self
            .graphs
            .deploy_definition(name, &definition, role_arn)
            .await?;
        info!("Deployed workload {} as {}", name, graph.arn);

        Ok(DeploymentReport {
            task_definition,
            task_definition_resolved,
            graph,
            definition_path,
        })
    }

    /// Best-effort read of role and log-group defaults from the cluster stack
    ///
    /// Any failure yields empty defaults; the caller substitutes its own.
    async fn cluster_defaults(&self, cluster: &str, overrides: &WorkloadOverrides) -> ClusterOutputs {
        if overrides.execution_role_arn.is_some()
            && overrides.task_role_arn.is_some()
            && overrides.log_group_name.is_some()
        {
            return ClusterOutputs::default();
        }

        match self.reconciler.outputs(cluster).await {
            Ok(Some(outputs)) => ClusterOutputs::from(&outputs),
            Ok(None) => {
                warn!("Cluster stack {} not found, using default roles and log group", cluster);
                ClusterOutputs::default()
            }
            Err(e) => {
                warn!("Could not read cluster stack {}: {}", cluster, e);
                ClusterOutputs::default()
            }
        }
    }
}

/// Log group used when neither the caller nor the cluster stack names one
pub fn default_log_group(cluster: &str) -> String {
    format!("/ecs/{}", cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_client::InMemoryControlPlane;
    use ferry_client::memory::CallCounts;
    use ferry_core::domain::graph::ExecutionGraphDefinition;
    use ferry_core::domain::stack::StackStatus;
    use serde_json::json;
    use std::time::Duration;

    fn deployer(plane: &Arc<InMemoryControlPlane>) -> FlowDeployer {
        let config = EngineConfig::default()
            .with_polling(Duration::from_secs(5), Duration::from_millis(1));
        FlowDeployer::new(config, plane.clone(), plane.clone())
    }

    fn request() -> WorkloadRequest {
        let mut kwargs = Map::new();
        kwargs.insert("day".to_string(), json!("2024-01-01"));
        WorkloadRequest {
            name: "nightly-etl".to_string(),
            target: TaskTarget::parse("flows.etl:run").unwrap(),
            cluster: "analytics".to_string(),
            image: "repo/etl:7".to_string(),
            args: vec![json!(3)],
            kwargs,
        }
    }

    fn overrides() -> WorkloadOverrides {
        WorkloadOverrides {
            state_machine_role_arn: Some("arn:aws:iam::1:role/sfn".to_string()),
            subnets: vec!["subnet-a".to_string()],
            security_groups: vec!["sg-a".to_string()],
            ..Default::default()
        }
    }

    fn param(plane: &InMemoryControlPlane, stack: &str, key: &str) -> Option<String> {
        plane
            .stack_request(stack)
            .unwrap()?
            .parameters
            .into_iter()
            .find(|p| p.parameter_key == key)
            .map(|p| p.parameter_value)
    }

    #[tokio::test]
    async fn test_deploys_with_cluster_outputs() {
        let plane = Arc::new(InMemoryControlPlane::default());
        plane.put_stack("analytics", StackStatus::CreateComplete).unwrap();
        plane
            .set_outputs(
                "analytics",
                &[
                    ("ExecutionRoleArn", "arn:aws:iam::1:role/exec"),
                    ("TaskRoleArn", "arn:aws:iam::1:role/task"),
                    ("LogGroupName", "/ecs/analytics-logs"),
                ],
            )
            .unwrap();
        plane
            .set_outputs("nightly-etl-taskdef", &[("TaskDefinitionArn", "arn:td/nightly-etl:1")])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut overrides = overrides();
        overrides.artifact_dir = Some(dir.path().to_path_buf());
        let report = deployer(&plane)
            .deploy_workload(&request(), &overrides)
            .await
            .unwrap();

        assert_eq!(report.task_definition, "arn:td/nightly-etl:1");
        assert!(report.task_definition_resolved);
        assert_eq!(
            param(&plane, "nightly-etl-taskdef", "ExecutionRoleArn").as_deref(),
            Some("arn:aws:iam::1:role/exec")
        );
        assert_eq!(
            param(&plane, "nightly-etl-taskdef", "LogGroupName").as_deref(),
            Some("/ecs/analytics-logs")
        );
        assert_eq!(param(&plane, "nightly-etl-taskdef", "Cpu").as_deref(), Some("1024"));

        let path = report.definition_path.unwrap();
        assert_eq!(path, dir.path().join("nightly-etl_stepfn.json"));
        let written = std::fs::read_to_string(&path).unwrap();
        let definition = ExecutionGraphDefinition::from_json(&written).unwrap();
        let state = definition.start_state().unwrap();
        assert_eq!(state.parameters.task_definition, "arn:td/nightly-etl:1");
        assert_eq!(state.parameters.cluster, "analytics");
        assert_eq!(
            state.parameters.overrides.container_overrides[0].name,
            "nightly-etl"
        );

        let stored = plane.state_machine("nightly-etl").unwrap().unwrap();
        assert_eq!(stored.arn, report.graph.arn);
        assert_eq!(stored.role_arn, "arn:aws:iam::1:role/sfn");
    }

    #[tokio::test]
    async fn test_missing_cluster_stack_degrades_to_defaults() {
        let plane = Arc::new(InMemoryControlPlane::default());
        let report = deployer(&plane)
            .deploy_workload(&request(), &overrides())
            .await
            .unwrap();

        assert_eq!(report.task_definition, "nightly-etl");
        assert!(!report.task_definition_resolved);
        assert!(report.definition_path.is_none());
        assert_eq!(
            param(&plane, "nightly-etl-taskdef", "LogGroupName").as_deref(),
            Some("/ecs/analytics")
        );
        assert_eq!(
            param(&plane, "nightly-etl-taskdef", "ExecutionRoleArn").as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_explicit_overrides_skip_cluster_lookup() {
        let plane = Arc::new(InMemoryControlPlane::default());
        let mut overrides = overrides();
        overrides.execution_role_arn = Some("arn:exec".to_string());
        overrides.task_role_arn = Some("arn:task".to_string());
        overrides.log_group_name = Some("/custom".to_string());
        overrides.memory = Some(4096);

        deployer(&plane)
            .deploy_workload(&request(), &overrides)
            .await
            .unwrap();

        assert_eq!(param(&plane, "nightly-etl-taskdef", "TaskRoleArn").as_deref(), Some("arn:task"));
        assert_eq!(param(&plane, "nightly-etl-taskdef", "Memory").as_deref(), Some("4096"));
        // one describe for the task-definition lookup, one for its create-wait
        assert_eq!(plane.counts().unwrap().stack_describes, 2);
    }

    #[tokio::test]
    async fn test_missing_state_machine_role_fails_before_remote_calls() {
        let plane = Arc::new(InMemoryControlPlane::default());
        let mut overrides = overrides();
        overrides.state_machine_role_arn = Some("  ".to_string());

        let err = deployer(&plane)
            .deploy_workload(&request(), &overrides)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(plane.counts().unwrap(), CallCounts::default());
    }

    #[tokio::test]
    async fn test_missing_network_fails_before_remote_calls() {
        let plane = Arc::new(InMemoryControlPlane::default());
        let mut overrides = overrides();
        overrides.subnets.clear();

        let err = deployer(&plane)
            .deploy_workload(&request(), &overrides)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(plane.counts().unwrap(), CallCounts::default());
    }

    #[tokio::test]
    async fn test_redeploy_updates_graph_in_place() {
        let plane = Arc::new(InMemoryControlPlane::default());
        let deployer = deployer(&plane);

        let first = deployer.deploy_workload(&request(), &overrides()).await.unwrap();
        let mut changed = request();
        changed.image = "repo/etl:8".to_string();
        let second = deployer.deploy_workload(&changed, &overrides()).await.unwrap();

        assert_eq!(first.graph, second.graph);
        let counts = plane.counts().unwrap();
        assert_eq!(counts.machine_creates, 1);
        assert_eq!(counts.machine_updates, 1);
        assert_eq!(counts.stack_creates, 1);
        assert_eq!(counts.stack_updates, 1);
    }
}
