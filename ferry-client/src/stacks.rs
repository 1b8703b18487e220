//! Stack engine endpoints

use async_trait::async_trait;
use ferry_core::dto::stack::{StackDescription, StackId, StackRequest};
use tracing::debug;

use crate::ControlPlaneClient;
use crate::api::StackApi;
use crate::error::Result;

#[async_trait]
impl StackApi for ControlPlaneClient {
    async fn describe_stack(&self, name: &str) -> Result<StackDescription> {
        let url = self.url(&format!("stacks/{}", name));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<StackId> {
        debug!("POST stack {}", request.stack_name);
        let url = self.url("stacks");
        let response = self.client.post(&url).json(request).send().await?;

        self.handle_response(response).await
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<StackId> {
        debug!("PUT stack {}", request.stack_name);
        let url = self.url(&format!("stacks/{}", request.stack_name));
        let response = self.client.put(&url).json(request).send().await?;

        self.handle_response(response).await
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        debug!("DELETE stack {}", name);
        let url = self.url(&format!("stacks/{}", name));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
