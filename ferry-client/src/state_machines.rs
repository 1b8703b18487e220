//! Workflow service endpoints
//!
//! State machine ARNs contain `:` and `/`, so update and delete carry the
//! ARN in the request body rather than the path.

use async_trait::async_trait;
use ferry_core::dto::state_machine::{
    CreateStateMachine, StateMachineCreated, StateMachinePage, UpdateStateMachine,
};
use serde::Serialize;
use tracing::debug;

use crate::ControlPlaneClient;
use crate::api::StateMachineApi;
use crate::error::Result;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteStateMachine<'a> {
    state_machine_arn: &'a str,
}

#[async_trait]
impl StateMachineApi for ControlPlaneClient {
    async fn list_state_machines(&self, next_token: Option<&str>) -> Result<StateMachinePage> {
        let url = self.url("state-machines");
        let mut request = self.client.get(&url);
        if let Some(token) = next_token {
            request = request.query(&[("nextToken", token)]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    async fn create_state_machine(
        &self,
        request: &CreateStateMachine,
    ) -> Result<StateMachineCreated> {
        debug!("POST state machine {}", request.name);
        let url = self.url("state-machines");
        let response = self.client.post(&url).json(request).send().await?;

        self.handle_response(response).await
    }

    async fn update_state_machine(&self, request: &UpdateStateMachine) -> Result<()> {
        debug!("POST state machine update {}", request.state_machine_arn);
        let url = self.url("state-machines/update");
        let response = self.client.post(&url).json(request).send().await?;

        self.handle_empty_response(response).await
    }

    async fn delete_state_machine(&self, arn: &str) -> Result<()> {
        debug!("POST state machine delete {}", arn);
        let url = self.url("state-machines/delete");
        let response = self
            .client
            .post(&url)
            .json(&DeleteStateMachine {
                state_machine_arn: arn,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
