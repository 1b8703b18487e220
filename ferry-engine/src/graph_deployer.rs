//! Execution-graph deployment
//!
//! Publishes a graph definition under a stable name. The name is looked up
//! across every listing page; a match is updated in place and keeps its
//! identifier, otherwise a new graph is created.

use std::sync::Arc;

use ferry_client::StateMachineApi;
use ferry_core::domain::graph::{ExecutionGraphDefinition, ExecutionGraphHandle, validate_document};
use ferry_core::dto::state_machine::{CreateStateMachine, StateMachineType, UpdateStateMachine};
use ferry_core::{Error, Result};
use tracing::{debug, info};

/// Deploys execution graphs to the workflow service
pub struct GraphDeployer {
    machines: Arc<dyn StateMachineApi>,
}

impl GraphDeployer {
    pub fn new(machines: Arc<dyn StateMachineApi>) -> Self {
        Self { machines }
    }

    /// Create or update the graph called `name`
    ///
    /// # Arguments
    /// * `name` - Stable graph name
    /// * `definition` - Definition document as JSON text
    /// * `role_arn` - Role the workflow service runs the graph as
    ///
    /// # Returns
    /// The graph's handle; its identifier is unchanged when the graph existed
    pub async fn deploy(
        &self,
        name: &str,
        definition: &str,
        role_arn: &str,
    ) -> Result<ExecutionGraphHandle> {
        validate_document(definition)?;
        if role_arn.trim().is_empty() {
            return Err(Error::configuration(format!(
                "An execution role is required to deploy graph {}",
                name
            )));
        }

        match self.find(name).await? {
            Some(existing) => {
                info!("Updating state machine {} ({})", name, existing.arn);
                self.machines
                    .update_state_machine(&UpdateStateMachine {
                        state_machine_arn: existing.arn.clone(),
                        definition: definition.to_string(),
                        role_arn: role_arn.to_string(),
                    })
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            Error::identity_mismatch(name, "disappeared between lookup and update")
                        } else {
                            Error::remote("UpdateStateMachine", e)
                        }
                    })?;
                Ok(existing)
            }
            None => {
                info!("Creating state machine {}", name);
                let created = self
                    .machines
                    .create_state_machine(&CreateStateMachine {
                        name: name.to_string(),
                        definition: definition.to_string(),
                        role_arn: role_arn.to_string(),
                        machine_type: StateMachineType::Standard,
                    })
                    .await
                    .map_err(|e| {
                        if e.is_already_exists() {
                            Error::identity_mismatch(
                                name,
                                "was created by someone else between lookup and create",
                            )
                        } else {
                            Error::remote("CreateStateMachine", e)
                        }
                    })?;
                Ok(ExecutionGraphHandle {
                    name: name.to_string(),
                    arn: created.state_machine_arn,
                })
            }
        }
    }

    /// Validate a typed definition and deploy it
    pub async fn deploy_definition(
        &self,
        name: &str,
        definition: &ExecutionGraphDefinition,
        role_arn: &str,
    ) -> Result<ExecutionGraphHandle> {
        definition.validate()?;
        self.deploy(name, &definition.to_json()?, role_arn).await
    }

    /// Look a graph up by exact name, paging through the whole listing
    pub async fn find(&self, name: &str) -> Result<Option<ExecutionGraphHandle>> {
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .machines
                .list_state_machines(next_token.as_deref())
                .await
                .map_err(|e| Error::remote("ListStateMachines", e))?;
            pages += 1;

            if let Some(found) = page
                .state_machines
                .into_iter()
                .find(|machine| machine.name == name)
            {
                debug!("Found state machine {} on page {}", name, pages);
                return Ok(Some(ExecutionGraphHandle {
                    name: found.name,
                    arn: found.state_machine_arn,
                }));
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => {
                    debug!("State machine {} not found in {} page(s)", name, pages);
                    return Ok(None);
                }
            }
        }
    }

    /// Delete the graph called `name`
    ///
    /// # Returns
    /// `false` when no such graph existed
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let Some(existing) = self.find(name).await? else {
            info!("State machine {} does not exist, nothing to delete", name);
            return Ok(false);
        };

        info!("Deleting state machine {} ({})", name, existing.arn);
        self.machines
            .delete_state_machine(&existing.arn)
            .await
            .map_err(|e| Error::remote("DeleteStateMachine", e))?;
        Ok(true)
    }
}
