//! Infrastructure stack domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::parameters::ParameterSet;
use crate::dto::stack::{StackOutput, StackRequest};
use crate::error::Error;

/// Acknowledgement flags the stack engine requires for IAM-touching templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CAPABILITY_IAM" => Ok(Capability::Iam),
            "CAPABILITY_NAMED_IAM" => Ok(Capability::NamedIam),
            "CAPABILITY_AUTO_EXPAND" => Ok(Capability::AutoExpand),
            other => Err(Error::configuration(format!(
                "Unknown capability '{}'",
                other
            ))),
        }
    }
}

/// A fixed, parameterized template document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Short name used in logs (e.g. "ecs-cluster")
    pub name: String,
    /// Template body as submitted to the stack engine
    pub body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// Identity and desired state of one infrastructure stack
#[derive(Debug, Clone)]
pub struct StackDescriptor {
    pub name: String,
    pub region: String,
    pub template: Template,
    pub parameters: ParameterSet,
    pub capabilities: Vec<Capability>,
}

impl StackDescriptor {
    /// Creates a descriptor with no parameters and the default capability set
    pub fn new(name: impl Into<String>, region: impl Into<String>, template: Template) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            template,
            parameters: ParameterSet::new(),
            capabilities: vec![Capability::NamedIam],
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Builds the create/update request for this descriptor
    pub fn to_request(&self) -> StackRequest {
        StackRequest {
            stack_name: self.name.clone(),
            template_body: self.template.body.clone(),
            parameters: self.parameters.to_stack_parameters(),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Stack status as reported by the stack engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    ReviewInProgress,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::UpdateFailed => "UPDATE_FAILED",
            StackStatus::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::ReviewInProgress => "REVIEW_IN_PROGRESS",
        }
    }

    /// Returns true while an operation is still running
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Returns true for states the stack cannot be updated out of
    ///
    /// Such stacks need operator intervention (usually a delete); they are
    /// never auto-recovered.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            StackStatus::CreateFailed
                | StackStatus::RollbackFailed
                | StackStatus::RollbackComplete
                | StackStatus::DeleteFailed
                | StackStatus::UpdateRollbackFailed
        )
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutating stack operation we may wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Create,
    Update,
    Delete,
}

/// How a status relates to the operation being waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    Pending,
    Succeeded,
    Failed,
}

impl StackOperation {
    /// Classifies a status for this operation
    ///
    /// Only the matching `*_COMPLETE` status counts as success; any other
    /// terminal status is a failure for this operation.
    pub fn assess(self, status: StackStatus) -> Convergence {
        match (self, status) {
            (StackOperation::Create, StackStatus::CreateComplete)
            | (StackOperation::Update, StackStatus::UpdateComplete)
            | (StackOperation::Delete, StackStatus::DeleteComplete) => Convergence::Succeeded,
            (_, status) if status.is_in_progress() => Convergence::Pending,
            _ => Convergence::Failed,
        }
    }
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackOperation::Create => write!(f, "create"),
            StackOperation::Update => write!(f, "update"),
            StackOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Values published by a converged stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackOutputs(BTreeMap<String, String>);

impl StackOutputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Finds the first output whose key ends with `suffix`, ignoring case
    pub fn find_by_suffix(&self, suffix: &str) -> Option<&str> {
        let suffix = suffix.to_lowercase();
        self.0
            .iter()
            .find(|(key, _)| key.to_lowercase().ends_with(&suffix))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl From<Vec<StackOutput>> for StackOutputs {
    fn from(outputs: Vec<StackOutput>) -> Self {
        Self(
            outputs
                .into_iter()
                .map(|output| (output.output_key, output.output_value))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for StackOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_matches_operation() {
        assert_eq!(
            StackOperation::Create.assess(StackStatus::CreateComplete),
            Convergence::Succeeded
        );
        assert_eq!(
            StackOperation::Create.assess(StackStatus::CreateInProgress),
            Convergence::Pending
        );
        assert_eq!(
            StackOperation::Create.assess(StackStatus::RollbackComplete),
            Convergence::Failed
        );
        // A create waiter does not accept an update result
        assert_eq!(
            StackOperation::Create.assess(StackStatus::UpdateComplete),
            Convergence::Failed
        );
        assert_eq!(
            StackOperation::Update.assess(StackStatus::UpdateCompleteCleanupInProgress),
            Convergence::Pending
        );
        assert_eq!(
            StackOperation::Update.assess(StackStatus::UpdateRollbackComplete),
            Convergence::Failed
        );
        assert_eq!(
            StackOperation::Delete.assess(StackStatus::DeleteComplete),
            Convergence::Succeeded
        );
    }

    #[test]
    fn test_status_serde_names() {
        let status: StackStatus = serde_json::from_str("\"UPDATE_ROLLBACK_COMPLETE\"").unwrap();
        assert_eq!(status, StackStatus::UpdateRollbackComplete);
        assert_eq!(
            serde_json::to_string(&StackStatus::CreateInProgress).unwrap(),
            "\"CREATE_IN_PROGRESS\""
        );
        assert_eq!(status.to_string(), "UPDATE_ROLLBACK_COMPLETE");
    }

    #[test]
    fn test_unrecoverable_states() {
        assert!(StackStatus::RollbackComplete.is_unrecoverable());
        assert!(StackStatus::CreateFailed.is_unrecoverable());
        assert!(!StackStatus::UpdateRollbackComplete.is_unrecoverable());
        assert!(!StackStatus::CreateComplete.is_unrecoverable());
    }

    #[test]
    fn test_capability_parsing() {
        assert_eq!(
            "CAPABILITY_NAMED_IAM".parse::<Capability>().unwrap(),
            Capability::NamedIam
        );
        assert!("CAPABILITY_EVERYTHING".parse::<Capability>().is_err());
    }

    #[test]
    fn test_outputs_suffix_lookup() {
        let outputs: StackOutputs = vec![
            ("LogGroupName".to_string(), "/ecs/demo".to_string()),
            (
                "DemoTaskDefinitionArn".to_string(),
                "arn:aws:ecs:us-east-1:123:task-definition/demo:3".to_string(),
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            outputs.find_by_suffix("taskdefinitionarn"),
            Some("arn:aws:ecs:us-east-1:123:task-definition/demo:3")
        );
        assert_eq!(outputs.find_by_suffix("ExecutionRoleArn"), None);
    }

    #[test]
    fn test_descriptor_request() {
        let descriptor = StackDescriptor::new(
            "demo",
            "us-east-1",
            Template::new("ecs-cluster", "Resources: {}"),
        )
        .with_parameters(ParameterSet::new().with("SubnetIds", vec!["a", "b"]));

        let request = descriptor.to_request();
        assert_eq!(request.stack_name, "demo");
        assert_eq!(request.capabilities, vec![Capability::NamedIam]);
        assert_eq!(request.parameters[0].parameter_value, "a,b");
    }
}
