//! Stack reconciliation
//!
//! Brings a named stack to the state its descriptor describes:
//!
//! ```text
//! Absent          -> create -> wait(create) -> Converged
//! Present(stale)  -> update -> wait(update) -> Converged
//! Present(failed) -> RemoteState error, left for the operator
//! ```
//!
//! A failed create-wait gets one update-wait before the error is surfaced,
//! which covers a stack that another caller moved on concurrently. There is
//! no locking across callers; two reconciles of one name may interleave.

use std::sync::Arc;
use std::time::Duration;

use ferry_client::StackApi;
use ferry_core::domain::stack::{
    Convergence, StackDescriptor, StackOperation, StackOutputs,
};
use ferry_core::dto::stack::{StackDescription, StackRequest};
use ferry_core::{Error, Result};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

/// Reconciles stacks against the stack engine
pub struct StackReconciler {
    stacks: Arc<dyn StackApi>,
    timeout: Duration,
    poll_interval: Duration,
}

impl StackReconciler {
    pub fn new(stacks: Arc<dyn StackApi>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            stacks,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(stacks: Arc<dyn StackApi>, config: &EngineConfig) -> Self {
        Self::new(stacks, config.convergence_timeout, config.poll_interval)
    }

    /// Create or update a stack and wait for it to converge
    ///
    /// # Arguments
    /// * `descriptor` - Name, template, parameters and capabilities of the stack
    ///
    /// # Returns
    /// The outputs the converged stack publishes
    pub async fn reconcile(&self, descriptor: &StackDescriptor) -> Result<StackOutputs> {
        let name = descriptor.name.as_str();
        let request = descriptor.to_request();
        debug!(
            "Stack {} parameter overrides: {}",
            name,
            descriptor.parameters.to_override_tokens().join(" ")
        );

        let description = match self.stacks.describe_stack(name).await {
            Ok(existing) if existing.stack_status.is_unrecoverable() => {
                return Err(Error::RemoteState {
                    name: name.to_string(),
                    status: existing.stack_status.to_string(),
                    reason: existing.stack_status_reason.unwrap_or_else(|| {
                        "stack must be deleted before it can be deployed again".to_string()
                    }),
                });
            }
            Ok(existing) => {
                info!(
                    "Stack {} exists in {} ({}), updating",
                    name, descriptor.region, existing.stack_status
                );
                self.update(&request).await?
            }
            Err(e) if e.is_not_found() => {
                info!(
                    "Stack {} does not exist in {}, creating from {}",
                    name, descriptor.region, descriptor.template.name
                );
                self.create(&request).await?
            }
            Err(e) => return Err(Error::remote("DescribeStacks", e)),
        };

        info!(
            "Stack {} converged at {}",
            name, description.stack_status
        );
        Ok(StackOutputs::from(description.outputs))
    }

    /// Delete a stack and wait until it is gone
    ///
    /// Destroying a stack that does not exist succeeds.
    pub async fn destroy(&self, descriptor: &StackDescriptor) -> Result<()> {
        let name = descriptor.name.as_str();

        match self.stacks.describe_stack(name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("Stack {} does not exist, nothing to delete", name);
                return Ok(());
            }
            Err(e) => return Err(Error::remote("DescribeStacks", e)),
        }

        info!("Deleting stack {}", name);
        self.stacks
            .delete_stack(name)
            .await
            .map_err(|e| Error::remote("DeleteStack", e))?;

        self.wait(name, StackOperation::Delete).await?;
        info!("Stack {} deleted", name);
        Ok(())
    }

    /// Read the outputs of an existing stack
    ///
    /// # Returns
    /// `None` when the stack does not exist
    pub async fn outputs(&self, name: &str) -> Result<Option<StackOutputs>> {
        match self.stacks.describe_stack(name).await {
            Ok(description) => Ok(Some(StackOutputs::from(description.outputs))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(Error::remote("DescribeStacks", e)),
        }
    }

    async fn create(&self, request: &StackRequest) -> Result<StackDescription> {
        let name = request.stack_name.as_str();

        match self.stacks.create_stack(request).await {
            Ok(created) => debug!("Create of {} issued ({})", name, created.stack_id),
            Err(e) if e.is_already_exists() => {
                return Err(Error::identity_mismatch(
                    name,
                    "was created by someone else between lookup and create",
                ));
            }
            Err(e) => return Err(Error::remote("CreateStack", e)),
        }

        match self.wait_present(name, StackOperation::Create).await {
            Err(err @ Error::RemoteState { .. }) => {
                warn!("Create of {} did not converge ({}), waiting for update", name, err);
                self.wait_present(name, StackOperation::Update).await
            }
            other => other,
        }
    }

    async fn update(&self, request: &StackRequest) -> Result<StackDescription> {
        let name = request.stack_name.as_str();

        match self.stacks.update_stack(request).await {
            Ok(updated) => debug!("Update of {} issued ({})", name, updated.stack_id),
            Err(e) if e.is_no_changes() => {
                info!("No updates are to be performed on stack {}", name);
                return self
                    .stacks
                    .describe_stack(name)
                    .await
                    .map_err(|e| Error::remote("DescribeStacks", e));
            }
            Err(e) if e.is_not_found() => {
                return Err(Error::identity_mismatch(
                    name,
                    "disappeared between lookup and update",
                ));
            }
            Err(e) => return Err(Error::remote("UpdateStack", e)),
        }

        self.wait_present(name, StackOperation::Update).await
    }

    /// Wait for a create or update; the stack vanishing is an error
    async fn wait_present(&self, name: &str, operation: StackOperation) -> Result<StackDescription> {
        self.wait(name, operation).await?.ok_or_else(|| {
            Error::identity_mismatch(name, format!("disappeared while waiting for {}", operation))
        })
    }

    /// Poll until `operation` reaches a terminal status
    ///
    /// # Returns
    /// The final description, or `None` if the stack no longer exists
    async fn wait(
        &self,
        name: &str,
        operation: StackOperation,
    ) -> Result<Option<StackDescription>> {
        let started = Instant::now();

        loop {
            let description = match self.stacks.describe_stack(name).await {
                Ok(description) => description,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(Error::remote("DescribeStacks", e)),
            };
            let status = description.stack_status;

            match operation.assess(status) {
                Convergence::Succeeded => return Ok(Some(description)),
                Convergence::Failed => {
                    return Err(Error::RemoteState {
                        name: name.to_string(),
                        status: status.to_string(),
                        reason: description
                            .stack_status_reason
                            .unwrap_or_else(|| format!("{} did not complete", operation)),
                    });
                }
                Convergence::Pending => {
                    let waited = started.elapsed();
                    if waited >= self.timeout {
                        return Err(Error::ConvergenceTimeout {
                            name: name.to_string(),
                            waited,
                            last_status: status.to_string(),
                        });
                    }
                    debug!("Stack {} is {}, waiting for {}", name, status, operation);
                    tokio::time::sleep(self.poll_interval.min(self.timeout - waited)).await;
                }
            }
        }
    }
}
