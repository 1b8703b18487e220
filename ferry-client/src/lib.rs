//! Ferry control-plane client
//!
//! Contracts for the remote services the engine depends on (stack engine,
//! network inventory, workflow service) and two implementations of them:
//! an HTTP client for a JSON control-plane gateway and an in-memory control
//! plane for tests and local runs.
//!
//! # Example
//!
//! ```no_run
//! use ferry_client::{ControlPlaneClient, StackApi};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ControlPlaneClient::new("http://localhost:4566", "us-east-1");
//!
//!     let stack = client.describe_stack("analytics-cluster").await?;
//!     println!("{} is {}", stack.stack_name, stack.stack_status);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod memory;
mod networks;
mod stacks;
mod state_machines;

// Re-export commonly used types
pub use api::{NetworkApi, StackApi, StateMachineApi};
pub use error::{ClientError, Result};
pub use memory::InMemoryControlPlane;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for a control-plane gateway
///
/// All routes are scoped to a single region:
/// - Stacks under `/api/regions/{region}/stacks`
/// - Network inventory under `/api/regions/{region}/vpcs`
/// - State machines under `/api/regions/{region}/state-machines`
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    /// Base URL of the gateway (e.g., "http://localhost:4566")
    base_url: String,
    /// Region every request is scoped to
    region: String,
    /// HTTP client instance
    client: Client,
}

impl ControlPlaneClient {
    /// Create a new control-plane client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the gateway (e.g., "http://localhost:4566")
    /// * `region` - The region requests are scoped to
    ///
    /// # Example
    /// ```
    /// use ferry_client::ControlPlaneClient;
    ///
    /// let client = ControlPlaneClient::new("http://localhost:4566", "us-east-1");
    /// ```
    pub fn new(base_url: impl Into<String>, region: impl Into<String>) -> Self {
        Self::with_client(base_url, region, Client::new())
    }

    /// Create a new control-plane client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, region: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            region: region.into(),
            client,
        }
    }

    /// Get the base URL of the gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the region requests are scoped to
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Build a region-scoped URL
    fn url(&self, path: &str) -> String {
        format!("{}/api/regions/{}/{}", self.base_url, self.region, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ControlPlaneClient::new("http://localhost:4566", "us-east-1");
        assert_eq!(client.base_url(), "http://localhost:4566");
        assert_eq!(client.region(), "us-east-1");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ControlPlaneClient::new("http://localhost:4566/", "eu-west-1");
        assert_eq!(client.base_url(), "http://localhost:4566");
    }

    #[test]
    fn test_region_scoped_urls() {
        let client = ControlPlaneClient::new("http://localhost:4566", "eu-west-1");
        assert_eq!(
            client.url("stacks/demo"),
            "http://localhost:4566/api/regions/eu-west-1/stacks/demo"
        );
    }

    #[test]
    fn test_client_with_custom_client() {
        let client =
            ControlPlaneClient::with_client("http://localhost:4566", "us-east-1", Client::new());
        assert_eq!(client.base_url(), "http://localhost:4566");
    }
}
