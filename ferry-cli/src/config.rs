//! Configuration module
//!
//! Handles CLI configuration and turns it into an engine configuration for
//! the region a command targets.

use std::time::Duration;

use anyhow::Result;
use ferry_core::compiler::{NetworkDefaults, OverrideEncoding};
use ferry_engine::EngineConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the control-plane gateway
    pub control_plane_url: String,
    pub convergence_timeout: Duration,
    pub poll_interval: Duration,
    pub default_subnets: Vec<String>,
    pub default_security_groups: Vec<String>,
}

impl Config {
    /// Builds and validates the engine configuration for one region
    pub fn engine(&self, region: &str, encoding: OverrideEncoding) -> Result<EngineConfig> {
        let mut engine = EngineConfig::new(region, &self.control_plane_url)
            .with_polling(self.convergence_timeout, self.poll_interval)
            .with_encoding(encoding);
        engine.network_defaults = NetworkDefaults {
            subnets: self.default_subnets.clone(),
            security_groups: self.default_security_groups.clone(),
        };
        engine.validate()?;
        Ok(engine)
    }
}
