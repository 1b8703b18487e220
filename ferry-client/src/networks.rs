//! Network inventory endpoints

use async_trait::async_trait;
use ferry_core::dto::network::{Subnet, Vpc};

use crate::ControlPlaneClient;
use crate::api::NetworkApi;
use crate::error::Result;

#[async_trait]
impl NetworkApi for ControlPlaneClient {
    async fn describe_default_vpcs(&self) -> Result<Vec<Vpc>> {
        let url = self.url("vpcs");
        let response = self
            .client
            .get(&url)
            .query(&[("isDefault", "true")])
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<Subnet>> {
        let url = self.url(&format!("vpcs/{}/subnets", vpc_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
