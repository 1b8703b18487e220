//! Stack DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::stack::{Capability, StackStatus};

/// A rendered template parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackParameter {
    pub parameter_key: String,
    pub parameter_value: String,
}

/// Request to create or update a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<Capability>,
}

/// Response to a create or update request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackId {
    pub stack_id: String,
}

/// A single published output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Current state of a stack as reported by the stack engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub stack_status: StackStatus,
    #[serde(default)]
    pub stack_status_reason: Option<String>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub last_updated_time: Option<DateTime<Utc>>,
}
