//! Engine configuration
//!
//! Defines every tunable the engine reads: target region and control plane,
//! convergence polling budget, and compiler defaults. A config is built once
//! per invocation and passed down; nothing below reads the environment.

use std::time::Duration;

use ferry_core::compiler::{GraphCompiler, LaunchType, NetworkDefaults, OverrideEncoding};
use ferry_core::{Error, Result};

use crate::env::{EnvLookup, ProcessEnv, split_list};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CONTROL_PLANE_URL: &str = "http://localhost:4566";
pub const DEFAULT_CPU: u32 = 1024;
pub const DEFAULT_MEMORY: u32 = 2048;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Region every remote call is scoped to
    pub region: String,

    /// Control-plane gateway base URL (e.g., "http://localhost:4566")
    pub control_plane_url: String,

    /// Maximum time to wait for a stack operation to converge
    pub convergence_timeout: Duration,

    /// How often to poll a stack while waiting
    pub poll_interval: Duration,

    /// Launch mode written into compiled graphs
    pub launch_type: LaunchType,

    /// Whether compiled tasks get a public IP
    pub assign_public_ip: bool,

    /// How the invocation contract is encoded into the container override
    pub encoding: OverrideEncoding,

    /// Subnets and security groups used when a placement leaves them empty
    pub network_defaults: NetworkDefaults,

    /// Task CPU units when the caller gives none
    pub default_cpu: u32,

    /// Task memory (MiB) when the caller gives none
    pub default_memory: u32,
}

impl EngineConfig {
    /// Creates a new configuration with defaults
    pub fn new(region: impl Into<String>, control_plane_url: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            control_plane_url: control_plane_url.into(),
            convergence_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(5),
            launch_type: LaunchType::Fargate,
            assign_public_ip: true,
            encoding: OverrideEncoding::default(),
            network_defaults: NetworkDefaults::default(),
            default_cpu: DEFAULT_CPU,
            default_memory: DEFAULT_MEMORY,
        }
    }

    /// Creates configuration from the process environment
    ///
    /// Expected environment variables:
    /// - FERRY_REGION, AWS_REGION or AWS_DEFAULT_REGION (required)
    /// - FERRY_CONTROL_PLANE_URL (required)
    /// - FERRY_CONVERGENCE_TIMEOUT (optional, seconds, default: 1800)
    /// - FERRY_POLL_INTERVAL (optional, seconds, default: 5)
    /// - FERRY_OVERRIDE_ENCODING (optional, `command` or `environment`)
    /// - FERRY_DEFAULT_SUBNETS (optional, comma-separated)
    /// - FERRY_DEFAULT_SECURITY_GROUPS (optional, comma-separated)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Creates configuration from an arbitrary environment
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let region = env
            .first_of(&["FERRY_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"])
            .ok_or_else(|| Error::configuration("FERRY_REGION environment variable not set"))?;

        let control_plane_url = env.get_non_empty("FERRY_CONTROL_PLANE_URL").ok_or_else(|| {
            Error::configuration("FERRY_CONTROL_PLANE_URL environment variable not set")
        })?;

        let mut config = Self::new(region, control_plane_url);

        if let Some(timeout) = seconds(env, "FERRY_CONVERGENCE_TIMEOUT")? {
            config.convergence_timeout = timeout;
        }

        if let Some(interval) = seconds(env, "FERRY_POLL_INTERVAL")? {
            config.poll_interval = interval;
        }

        if let Some(encoding) = env.get_non_empty("FERRY_OVERRIDE_ENCODING") {
            config.encoding = encoding.parse()?;
        }

        if let Some(subnets) = env.get_non_empty("FERRY_DEFAULT_SUBNETS") {
            config.network_defaults.subnets = split_list(&subnets);
        }

        if let Some(groups) = env.get_non_empty("FERRY_DEFAULT_SECURITY_GROUPS") {
            config.network_defaults.security_groups = split_list(&groups);
        }

        Ok(config)
    }

    /// Overrides the convergence polling budget
    pub fn with_polling(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.convergence_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the override encoding
    pub fn with_encoding(mut self, encoding: OverrideEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Builds the graph compiler these settings describe
    pub fn compiler(&self) -> GraphCompiler {
        GraphCompiler::new(self.encoding.clone(), self.network_defaults.clone())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::configuration("region cannot be empty"));
        }

        if !self.control_plane_url.starts_with("http://")
            && !self.control_plane_url.starts_with("https://")
        {
            return Err(Error::configuration(
                "control_plane_url must start with http:// or https://",
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::configuration("poll_interval must be greater than 0"));
        }

        if self.convergence_timeout < self.poll_interval {
            return Err(Error::configuration(
                "convergence_timeout must be at least poll_interval",
            ));
        }

        if let OverrideEncoding::Command { program } = &self.encoding {
            if program.is_empty() {
                return Err(Error::configuration("runner program cannot be empty"));
            }
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGION, DEFAULT_CONTROL_PLANE_URL)
    }
}

/// Reads a whole number of seconds; a value that does not parse is an error
fn seconds(env: &dyn EnvLookup, name: &str) -> Result<Option<Duration>> {
    let Some(raw) = env.get_non_empty(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| {
            Error::configuration(format!(
                "{} must be a whole number of seconds, got '{}'",
                name, raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.convergence_timeout, Duration::from_secs(1800));
        assert_eq!(config.launch_type, LaunchType::Fargate);
        assert_eq!(config.encoding, OverrideEncoding::command());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.region = String::new();
        assert!(config.validate().is_err());
        config.region = "eu-west-1".to_string();

        config.control_plane_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.control_plane_url = "https://gateway.internal".to_string();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_secs(10);
        config.convergence_timeout = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let env = MapEnv::new()
            .with("AWS_REGION", "eu-central-1")
            .with("FERRY_CONTROL_PLANE_URL", "http://gateway:4566")
            .with("FERRY_POLL_INTERVAL", "2")
            .with("FERRY_OVERRIDE_ENCODING", "environment")
            .with("FERRY_DEFAULT_SUBNETS", "subnet-a, subnet-b");

        let config = EngineConfig::from_lookup(&env).unwrap();
        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.encoding, OverrideEncoding::Environment);
        assert_eq!(config.network_defaults.subnets, vec!["subnet-a", "subnet-b"]);
        assert!(config.network_defaults.security_groups.is_empty());
    }

    #[test]
    fn test_region_precedence() {
        let env = MapEnv::new()
            .with("FERRY_REGION", "us-west-2")
            .with("AWS_REGION", "eu-central-1")
            .with("FERRY_CONTROL_PLANE_URL", "http://gateway:4566");
        assert_eq!(EngineConfig::from_lookup(&env).unwrap().region, "us-west-2");
    }

    #[test]
    fn test_missing_region_is_configuration_error() {
        let env = MapEnv::new().with("FERRY_CONTROL_PLANE_URL", "http://gateway:4566");
        let err = EngineConfig::from_lookup(&env).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let env = MapEnv::new()
            .with("FERRY_REGION", "us-east-1")
            .with("FERRY_CONTROL_PLANE_URL", "http://gateway:4566")
            .with("FERRY_OVERRIDE_ENCODING", "yaml");
        assert!(EngineConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn test_unparsable_durations_are_rejected() {
        for (name, value) in [("FERRY_CONVERGENCE_TIMEOUT", "30m"), ("FERRY_POLL_INTERVAL", "-1")] {
            let env = MapEnv::new()
                .with("FERRY_REGION", "us-east-1")
                .with("FERRY_CONTROL_PLANE_URL", "http://gateway:4566")
                .with(name, value);
            let err = EngineConfig::from_lookup(&env).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
            assert!(err.to_string().contains(name), "{}", err);
        }
    }
}
