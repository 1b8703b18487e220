//! In-memory control plane for testing.
//!
//! [`InMemoryControlPlane`] implements [`StackApi`], [`NetworkApi`] and
//! [`StateMachineApi`] against process-local state, so the engine can be
//! exercised end to end without a remote system.
//!
//! ## Behaviour
//!
//! - Mutating stack calls leave the stack `*_IN_PROGRESS` for a configurable
//!   number of describe calls before it settles
//! - A terminal failure status can be scripted for the next mutation of a stack
//! - Updating a stack with an identical request is rejected as "no updates"
//! - A deleted stack disappears once its deletion settles
//! - State machine listings are paged with a configurable page size
//! - Every remote call is counted, see [`CallCounts`]

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ferry_core::domain::stack::StackStatus;
use ferry_core::dto::network::{Subnet, Vpc};
use ferry_core::dto::stack::{StackDescription, StackId, StackOutput, StackRequest};
use ferry_core::dto::state_machine::{
    CreateStateMachine, StateMachineCreated, StateMachinePage, StateMachineSummary,
    StateMachineType, UpdateStateMachine,
};
use uuid::Uuid;

use crate::api::{NetworkApi, StackApi, StateMachineApi};
use crate::error::{ClientError, Result};

const ACCOUNT_ID: &str = "000000000000";
const DEFAULT_PAGE_SIZE: usize = 100;

/// Number of calls made against the control plane, per operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub stack_describes: usize,
    pub stack_creates: usize,
    pub stack_updates: usize,
    pub stack_deletes: usize,
    pub network_lookups: usize,
    pub machine_lists: usize,
    pub machine_creates: usize,
    pub machine_updates: usize,
    pub machine_deletes: usize,
}

/// A state machine held by the in-memory control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStateMachine {
    pub arn: String,
    pub name: String,
    pub definition: String,
    pub role_arn: String,
    pub machine_type: StateMachineType,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StackRecord {
    stack_id: String,
    request: Option<StackRequest>,
    status: StackStatus,
    reason: Option<String>,
    /// Describe calls left before `settle_to` is reported
    polls_left: u32,
    settle_to: Option<StackStatus>,
    creation_time: DateTime<Utc>,
    last_updated_time: Option<DateTime<Utc>>,
}

impl StackRecord {
    fn advance(&mut self) {
        if let Some(target) = self.settle_to {
            if self.polls_left == 0 {
                self.status = target;
                self.settle_to = None;
            } else {
                self.polls_left -= 1;
            }
        }
    }

    fn start(&mut self, in_progress: StackStatus, settle_to: StackStatus, reason: Option<String>, polls: u32) {
        self.status = in_progress;
        self.settle_to = Some(settle_to);
        self.reason = reason;
        self.polls_left = polls;
    }
}

/// Internal state protected by a single lock.
#[derive(Debug, Default)]
struct ControlPlaneState {
    stacks: HashMap<String, StackRecord>,
    outputs: HashMap<String, Vec<StackOutput>>,
    failures: HashMap<String, (StackStatus, String)>,
    vpcs: Vec<Vpc>,
    subnets: Vec<Subnet>,
    /// Kept in creation order so paging is stable
    machines: Vec<StoredStateMachine>,
    counts: CallCounts,
}

/// In-memory control plane for testing.
///
/// ## Example
///
/// ```rust
/// use ferry_client::InMemoryControlPlane;
///
/// let plane = InMemoryControlPlane::new("us-east-1").with_page_size(2);
/// plane.add_vpc("vpc-1", true).unwrap();
/// plane.add_subnet("subnet-a", "vpc-1", true).unwrap();
/// ```
#[derive(Debug)]
pub struct InMemoryControlPlane {
    region: String,
    page_size: usize,
    pending_polls: u32,
    state: RwLock<ControlPlaneState>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

/// Converts a lock poison error to a client error.
fn poison_err<T>(_: PoisonError<T>) -> ClientError {
    ClientError::InternalError("control plane lock poisoned".to_string())
}

fn stack_missing(name: &str) -> ClientError {
    ClientError::NotFound(format!("Stack with id {} does not exist", name))
}

impl InMemoryControlPlane {
    /// Creates an empty control plane for a region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            page_size: DEFAULT_PAGE_SIZE,
            pending_polls: 0,
            state: RwLock::new(ControlPlaneState::default()),
        }
    }

    /// Sets how many state machines a listing page holds (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets how many describe calls report `*_IN_PROGRESS` after a mutation.
    #[must_use]
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ControlPlaneState>> {
        self.state.read().map_err(poison_err)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ControlPlaneState>> {
        self.state.write().map_err(poison_err)
    }

    fn state_machine_arn(&self, name: &str) -> String {
        format!("arn:aws:states:{}:{}:stateMachine:{}", self.region, ACCOUNT_ID, name)
    }

    // =============================================================================
    // Seeding
    // =============================================================================

    /// Places a stack directly in the given status, as if deployed earlier.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_stack(&self, name: &str, status: StackStatus) -> Result<()> {
        let mut state = self.write()?;
        let stack_id = format!(
            "arn:aws:cloudformation:{}:{}:stack/{}/{}",
            self.region,
            ACCOUNT_ID,
            name,
            Uuid::new_v4()
        );
        state.stacks.insert(
            name.to_string(),
            StackRecord {
                stack_id,
                request: None,
                status,
                reason: None,
                polls_left: 0,
                settle_to: None,
                creation_time: Utc::now(),
                last_updated_time: None,
            },
        );
        Ok(())
    }

    /// Sets the outputs a stack publishes once converged.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_outputs(&self, name: &str, outputs: &[(&str, &str)]) -> Result<()> {
        let outputs = outputs
            .iter()
            .map(|(key, value)| StackOutput {
                output_key: key.to_string(),
                output_value: value.to_string(),
                description: None,
            })
            .collect();
        self.write()?.outputs.insert(name.to_string(), outputs);
        Ok(())
    }

    /// Makes the next create, update or delete of a stack settle at `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_next(&self, name: &str, status: StackStatus, reason: &str) -> Result<()> {
        self.write()?
            .failures
            .insert(name.to_string(), (status, reason.to_string()));
        Ok(())
    }

    /// Registers a VPC.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn add_vpc(&self, vpc_id: &str, is_default: bool) -> Result<()> {
        self.write()?.vpcs.push(Vpc {
            vpc_id: vpc_id.to_string(),
            is_default,
            cidr_block: None,
        });
        Ok(())
    }

    /// Registers a subnet of a VPC.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn add_subnet(&self, subnet_id: &str, vpc_id: &str, public: bool) -> Result<()> {
        self.write()?.subnets.push(Subnet {
            subnet_id: subnet_id.to_string(),
            vpc_id: vpc_id.to_string(),
            availability_zone: None,
            map_public_ip_on_launch: public,
        });
        Ok(())
    }

    /// Places a state machine directly, returning its ARN.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_state_machine(&self, name: &str, definition: &str, role_arn: &str) -> Result<String> {
        let arn = self.state_machine_arn(name);
        self.write()?.machines.push(StoredStateMachine {
            arn: arn.clone(),
            name: name.to_string(),
            definition: definition.to_string(),
            role_arn: role_arn.to_string(),
            machine_type: StateMachineType::Standard,
            creation_date: Utc::now(),
        });
        Ok(arn)
    }

    // =============================================================================
    // Inspection
    // =============================================================================

    /// Returns the call counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn counts(&self) -> Result<CallCounts> {
        Ok(self.read()?.counts.clone())
    }

    /// Returns the current status of a stack without advancing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn stack_status(&self, name: &str) -> Result<Option<StackStatus>> {
        Ok(self.read()?.stacks.get(name).map(|record| record.status))
    }

    /// Returns the last create/update request accepted for a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn stack_request(&self, name: &str) -> Result<Option<StackRequest>> {
        Ok(self
            .read()?
            .stacks
            .get(name)
            .and_then(|record| record.request.clone()))
    }

    /// Looks up a state machine by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn state_machine(&self, name: &str) -> Result<Option<StoredStateMachine>> {
        Ok(self
            .read()?
            .machines
            .iter()
            .find(|machine| machine.name == name)
            .cloned())
    }

    /// Returns how many state machines exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn state_machine_count(&self) -> Result<usize> {
        Ok(self.read()?.machines.len())
    }
}

#[async_trait]
impl StackApi for InMemoryControlPlane {
    async fn describe_stack(&self, name: &str) -> Result<StackDescription> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        state.counts.stack_describes += 1;

        let record = state.stacks.get_mut(name).ok_or_else(|| stack_missing(name))?;
        record.advance();

        if record.status == StackStatus::DeleteComplete {
            state.stacks.remove(name);
            return Err(stack_missing(name));
        }

        let outputs = match record.status {
            StackStatus::CreateComplete | StackStatus::UpdateComplete => {
                state.outputs.get(name).cloned().unwrap_or_default()
            }
            _ => Vec::new(),
        };

        Ok(StackDescription {
            stack_id: record.stack_id.clone(),
            stack_name: name.to_string(),
            stack_status: record.status,
            stack_status_reason: record.reason.clone(),
            outputs,
            creation_time: record.creation_time,
            last_updated_time: record.last_updated_time,
        })
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<StackId> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        state.counts.stack_creates += 1;

        let name = &request.stack_name;
        if state.stacks.contains_key(name) {
            return Err(ClientError::AlreadyExists(format!(
                "Stack [{}] already exists",
                name
            )));
        }

        let (settle_to, reason) = match state.failures.remove(name) {
            Some((status, reason)) => (status, Some(reason)),
            None => (StackStatus::CreateComplete, None),
        };
        let stack_id = format!(
            "arn:aws:cloudformation:{}:{}:stack/{}/{}",
            self.region,
            ACCOUNT_ID,
            name,
            Uuid::new_v4()
        );
        let mut record = StackRecord {
            stack_id: stack_id.clone(),
            request: Some(request.clone()),
            status: StackStatus::CreateInProgress,
            reason: None,
            polls_left: 0,
            settle_to: None,
            creation_time: Utc::now(),
            last_updated_time: None,
        };
        record.start(StackStatus::CreateInProgress, settle_to, reason, self.pending_polls);
        state.stacks.insert(name.clone(), record);

        Ok(StackId { stack_id })
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<StackId> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        state.counts.stack_updates += 1;

        let name = &request.stack_name;
        let record = state.stacks.get_mut(name).ok_or_else(|| stack_missing(name))?;

        if record.status.is_in_progress() || record.status.is_unrecoverable() {
            return Err(ClientError::InvalidRequest(format!(
                "Stack:{} is in {} state and can not be updated.",
                record.stack_id, record.status
            )));
        }

        let scripted = state.failures.remove(name);
        if scripted.is_none() && record.request.as_ref() == Some(request) {
            return Err(ClientError::InvalidRequest(
                "No updates are to be performed.".to_string(),
            ));
        }

        let (settle_to, reason) = match scripted {
            Some((status, reason)) => (status, Some(reason)),
            None => (StackStatus::UpdateComplete, None),
        };
        record.request = Some(request.clone());
        record.last_updated_time = Some(Utc::now());
        record.start(StackStatus::UpdateInProgress, settle_to, reason, self.pending_polls);

        Ok(StackId {
            stack_id: record.stack_id.clone(),
        })
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        state.counts.stack_deletes += 1;

        let Some(record) = state.stacks.get_mut(name) else {
            return Ok(());
        };
        let (settle_to, reason) = match state.failures.remove(name) {
            Some((status, reason)) => (status, Some(reason)),
            None => (StackStatus::DeleteComplete, None),
        };
        record.start(StackStatus::DeleteInProgress, settle_to, reason, self.pending_polls);
        Ok(())
    }
}

#[async_trait]
impl NetworkApi for InMemoryControlPlane {
    async fn describe_default_vpcs(&self) -> Result<Vec<Vpc>> {
        let mut state = self.write()?;
        state.counts.network_lookups += 1;
        Ok(state.vpcs.iter().filter(|vpc| vpc.is_default).cloned().collect())
    }

    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<Subnet>> {
        let mut state = self.write()?;
        state.counts.network_lookups += 1;
        Ok(state
            .subnets
            .iter()
            .filter(|subnet| subnet.vpc_id == vpc_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StateMachineApi for InMemoryControlPlane {
    async fn list_state_machines(&self, next_token: Option<&str>) -> Result<StateMachinePage> {
        let mut state = self.write()?;
        state.counts.machine_lists += 1;

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ClientError::InvalidRequest(format!("Invalid token: {}", token)))?,
            None => 0,
        };
        let total = state.machines.len();
        let end = (start + self.page_size).min(total);
        let state_machines = state
            .machines
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|machine| StateMachineSummary {
                state_machine_arn: machine.arn.clone(),
                name: machine.name.clone(),
                machine_type: machine.machine_type,
                creation_date: machine.creation_date,
            })
            .collect();

        Ok(StateMachinePage {
            state_machines,
            next_token: (end < total).then(|| end.to_string()),
        })
    }

    async fn create_state_machine(
        &self,
        request: &CreateStateMachine,
    ) -> Result<StateMachineCreated> {
        let arn = self.state_machine_arn(&request.name);
        let mut state = self.write()?;
        state.counts.machine_creates += 1;

        if state.machines.iter().any(|machine| machine.name == request.name) {
            return Err(ClientError::AlreadyExists(format!(
                "State Machine Already Exists: '{}'",
                arn
            )));
        }

        let creation_date = Utc::now();
        state.machines.push(StoredStateMachine {
            arn: arn.clone(),
            name: request.name.clone(),
            definition: request.definition.clone(),
            role_arn: request.role_arn.clone(),
            machine_type: request.machine_type,
            creation_date,
        });

        Ok(StateMachineCreated {
            state_machine_arn: arn,
            creation_date,
        })
    }

    async fn update_state_machine(&self, request: &UpdateStateMachine) -> Result<()> {
        let mut state = self.write()?;
        state.counts.machine_updates += 1;

        let machine = state
            .machines
            .iter_mut()
            .find(|machine| machine.arn == request.state_machine_arn)
            .ok_or_else(|| {
                ClientError::NotFound(format!(
                    "State Machine Does Not Exist: '{}'",
                    request.state_machine_arn
                ))
            })?;
        machine.definition = request.definition.clone();
        machine.role_arn = request.role_arn.clone();
        Ok(())
    }

    async fn delete_state_machine(&self, arn: &str) -> Result<()> {
        let mut state = self.write()?;
        state.counts.machine_deletes += 1;
        state.machines.retain(|machine| machine.arn != arn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::domain::stack::Capability;

    fn request(name: &str, body: &str) -> StackRequest {
        StackRequest {
            stack_name: name.to_string(),
            template_body: body.to_string(),
            parameters: Vec::new(),
            capabilities: vec![Capability::NamedIam],
        }
    }

    #[tokio::test]
    async fn test_describe_missing_stack_is_not_found() {
        let plane = InMemoryControlPlane::default();
        let err = plane.describe_stack("absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_settles_after_pending_polls() {
        let plane = InMemoryControlPlane::default().with_pending_polls(2);
        plane.set_outputs("demo", &[("ClusterName", "demo")]).unwrap();
        plane.create_stack(&request("demo", "{}")).await.unwrap();

        let first = plane.describe_stack("demo").await.unwrap();
        assert_eq!(first.stack_status, StackStatus::CreateInProgress);
        assert!(first.outputs.is_empty());
        plane.describe_stack("demo").await.unwrap();
        let settled = plane.describe_stack("demo").await.unwrap();
        assert_eq!(settled.stack_status, StackStatus::CreateComplete);
        assert_eq!(settled.outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_update_reports_no_changes() {
        let plane = InMemoryControlPlane::default();
        plane.create_stack(&request("demo", "{}")).await.unwrap();
        plane.describe_stack("demo").await.unwrap();

        let err = plane.update_stack(&request("demo", "{}")).await.unwrap_err();
        assert!(err.is_no_changes());

        plane.update_stack(&request("demo", "{\"v\": 2}")).await.unwrap();
        let described = plane.describe_stack("demo").await.unwrap();
        assert_eq!(described.stack_status, StackStatus::UpdateComplete);
        assert_eq!(plane.counts().unwrap().stack_updates, 2);
    }

    #[tokio::test]
    async fn test_create_existing_stack_conflicts() {
        let plane = InMemoryControlPlane::default();
        plane.put_stack("demo", StackStatus::CreateComplete).unwrap();
        let err = plane.create_stack(&request("demo", "{}")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let plane = InMemoryControlPlane::default();
        plane
            .fail_next("demo", StackStatus::RollbackComplete, "Resource limit exceeded")
            .unwrap();
        plane.create_stack(&request("demo", "{}")).await.unwrap();
        let described = plane.describe_stack("demo").await.unwrap();
        assert_eq!(described.stack_status, StackStatus::RollbackComplete);
        assert_eq!(
            described.stack_status_reason.as_deref(),
            Some("Resource limit exceeded")
        );
    }

    #[tokio::test]
    async fn test_deleted_stack_disappears() {
        let plane = InMemoryControlPlane::default();
        plane.put_stack("demo", StackStatus::CreateComplete).unwrap();
        plane.delete_stack("demo").await.unwrap();
        assert!(plane.describe_stack("demo").await.unwrap_err().is_not_found());
        assert_eq!(plane.stack_status("demo").unwrap(), None);

        // Deleting again is harmless
        plane.delete_stack("demo").await.unwrap();
    }

    #[tokio::test]
    async fn test_state_machine_paging() {
        let plane = InMemoryControlPlane::default().with_page_size(2);
        for i in 0..5 {
            plane
                .put_state_machine(&format!("sm-{}", i), "{}", "arn:role")
                .unwrap();
        }

        let first = plane.list_state_machines(None).await.unwrap();
        assert_eq!(first.state_machines.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let last = plane.list_state_machines(Some("4")).await.unwrap();
        assert_eq!(last.state_machines.len(), 1);
        assert_eq!(last.state_machines[0].name, "sm-4");
        assert!(last.next_token.is_none());
    }

    #[tokio::test]
    async fn test_state_machine_name_conflict() {
        let plane = InMemoryControlPlane::default();
        let create = CreateStateMachine {
            name: "flow".to_string(),
            definition: "{}".to_string(),
            role_arn: "arn:role".to_string(),
            machine_type: StateMachineType::Standard,
        };
        plane.create_state_machine(&create).await.unwrap();
        let err = plane.create_state_machine(&create).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_default_vpc_filter() {
        let plane = InMemoryControlPlane::default();
        plane.add_vpc("vpc-default", true).unwrap();
        plane.add_vpc("vpc-other", false).unwrap();
        plane.add_subnet("subnet-a", "vpc-default", true).unwrap();
        plane.add_subnet("subnet-b", "vpc-other", true).unwrap();

        let vpcs = plane.describe_default_vpcs().await.unwrap();
        assert_eq!(vpcs.len(), 1);
        let subnets = plane.describe_subnets("vpc-default").await.unwrap();
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].subnet_id, "subnet-a");
        assert_eq!(plane.counts().unwrap().network_lookups, 2);
    }
}
