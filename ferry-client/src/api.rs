//! Remote service contracts
//!
//! The engine only talks to the outside world through these traits. Each
//! method maps to one remote call; none of them retry.

use async_trait::async_trait;
use ferry_core::dto::network::{Subnet, Vpc};
use ferry_core::dto::stack::{StackDescription, StackId, StackRequest};
use ferry_core::dto::state_machine::{
    CreateStateMachine, StateMachineCreated, StateMachinePage, UpdateStateMachine,
};

use crate::error::Result;

/// Stack deployment engine
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Describe a stack by name
    ///
    /// A missing stack is reported as an error for which
    /// [`ClientError::is_not_found`](crate::ClientError::is_not_found) holds.
    async fn describe_stack(&self, name: &str) -> Result<StackDescription>;

    /// Start creating a stack
    async fn create_stack(&self, request: &StackRequest) -> Result<StackId>;

    /// Start updating a stack
    ///
    /// An update with nothing to change is rejected with an error for which
    /// [`ClientError::is_no_changes`](crate::ClientError::is_no_changes) holds.
    async fn update_stack(&self, request: &StackRequest) -> Result<StackId>;

    /// Start deleting a stack; deleting an absent stack succeeds
    async fn delete_stack(&self, name: &str) -> Result<()>;
}

/// Network inventory
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// List the account's default VPCs in the region
    async fn describe_default_vpcs(&self) -> Result<Vec<Vpc>>;

    /// List the subnets of one VPC
    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<Subnet>>;
}

/// Workflow service
#[async_trait]
pub trait StateMachineApi: Send + Sync {
    /// Fetch one page of state machines; `None` starts from the first page
    async fn list_state_machines(&self, next_token: Option<&str>) -> Result<StateMachinePage>;

    /// Create a state machine
    async fn create_state_machine(&self, request: &CreateStateMachine)
    -> Result<StateMachineCreated>;

    /// Replace the definition and role of an existing state machine
    async fn update_state_machine(&self, request: &UpdateStateMachine) -> Result<()>;

    /// Delete a state machine by ARN
    async fn delete_state_machine(&self, arn: &str) -> Result<()>;
}
