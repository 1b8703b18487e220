//! Execution graph definitions
//!
//! Serde model of the declarative workflow document submitted to the
//! orchestration service. Field names follow the service's PascalCase
//! document shape exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Declarative workflow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionGraphDefinition {
    pub comment: String,
    pub start_at: String,
    pub states: BTreeMap<String, State>,
}

/// A single state in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct State {
    #[serde(rename = "Type")]
    pub state_type: StateType,
    pub resource: String,
    pub parameters: TaskParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Task,
}

/// Placement and invocation parameters of a run-task state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskParameters {
    pub launch_type: String,
    pub cluster: String,
    pub task_definition: String,
    pub network_configuration: NetworkConfiguration,
    pub overrides: Overrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsVpcConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsVpcConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: AssignPublicIp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignPublicIp {
    Enabled,
    Disabled,
}

impl From<bool> for AssignPublicIp {
    fn from(enabled: bool) -> Self {
        if enabled {
            AssignPublicIp::Enabled
        } else {
            AssignPublicIp::Disabled
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Overrides {
    pub container_overrides: Vec<ContainerOverride>,
}

/// Per-container override block
///
/// Exactly one of `command` or `environment` is set, depending on the
/// override encoding the document was compiled with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerOverride {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<EnvironmentVariable>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl ExecutionGraphDefinition {
    /// Returns the start state, if it exists
    pub fn start_state(&self) -> Option<&State> {
        self.states.get(&self.start_at)
    }

    /// Checks the structural invariants of the graph
    ///
    /// The start state must exist, every `Next` must reference an existing
    /// state, and the graph must be a single terminal task state.
    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::definition_format("graph has no states"));
        }
        if !self.states.contains_key(&self.start_at) {
            return Err(Error::definition_format(format!(
                "start state '{}' is not defined",
                self.start_at
            )));
        }
        for (id, state) in &self.states {
            match (&state.next, state.end) {
                (Some(_), true) => {
                    return Err(Error::definition_format(format!(
                        "state '{}' has both Next and End",
                        id
                    )));
                }
                (Some(next), false) if !self.states.contains_key(next) => {
                    return Err(Error::definition_format(format!(
                        "state '{}' references undefined state '{}'",
                        id, next
                    )));
                }
                (None, false) => {
                    return Err(Error::definition_format(format!(
                        "state '{}' has neither Next nor End",
                        id
                    )));
                }
                _ => {}
            }
        }
        if self.states.len() != 1 {
            return Err(Error::definition_format(format!(
                "expected exactly one state, found {}",
                self.states.len()
            )));
        }
        if self.start_state().is_some_and(|state| !state.end) {
            return Err(Error::definition_format(format!(
                "start state '{}' must end the graph",
                self.start_at
            )));
        }
        Ok(())
    }

    /// Serializes the definition as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::definition_format(format!("failed to serialize: {}", e)))
    }

    /// Parses and validates a definition produced by the compiler
    pub fn from_json(text: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(text)
            .map_err(|e| Error::definition_format(format!("malformed document: {}", e)))?;
        definition.validate()?;
        Ok(definition)
    }
}

/// Validates an arbitrary workflow document before submission
///
/// Accepts any well-formed JSON object with a `StartAt` string naming an
/// entry of its `States` object. Unlike [`ExecutionGraphDefinition::from_json`]
/// this also accepts hand-written multi-state documents.
pub fn validate_document(text: &str) -> Result<JsonValue> {
    let document: JsonValue = serde_json::from_str(text)
        .map_err(|e| Error::definition_format(format!("malformed JSON: {}", e)))?;

    let start_at = document
        .get("StartAt")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::definition_format("missing string field 'StartAt'"))?;

    let states = document
        .get("States")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| Error::definition_format("missing object field 'States'"))?;

    if !states.contains_key(start_at) {
        return Err(Error::definition_format(format!(
            "start state '{}' is not defined",
            start_at
        )));
    }

    Ok(document)
}

/// Identity of a deployed graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionGraphHandle {
    /// Stable, caller-chosen name
    pub name: String,
    /// Identifier assigned by the remote system on first creation
    pub arn: String,
}
