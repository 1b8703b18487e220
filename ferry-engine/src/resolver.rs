//! Parameter resolution
//!
//! Fills required parameters from three tiers, in strict precedence:
//! explicit input, then environment (two alias names per key), then remote
//! discovery. Discovery is one remote call returning a bundle of related
//! values, so a VPC and its subnets always come from the same lookup. The
//! bundle is fetched at most once per [`ParameterResolver::resolve`] call.
//! When some keys come from the bundle, every other required key the bundle
//! also carries must agree with it, otherwise resolution fails.

use std::sync::Arc;

use async_trait::async_trait;
use ferry_client::NetworkApi;
use ferry_core::domain::parameters::{ParamValue, ParameterSet};
use ferry_core::dto::network::Subnet;
use ferry_core::{Error, Result};
use tracing::{debug, info};

use crate::env::{EnvLookup, split_list};

pub const VPC_ID_KEY: &str = "VpcId";
pub const SUBNET_IDS_KEY: &str = "SubnetIds";

/// Shape of a parameter value read from the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    /// Comma-separated in the environment
    List,
}

/// A parameter that must be present after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredKey {
    pub name: String,
    /// Environment variables consulted in order, primary name first
    pub env_aliases: Vec<String>,
    pub kind: ValueKind,
}

impl RequiredKey {
    pub fn scalar(name: impl Into<String>, env_aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            env_aliases: env_aliases.iter().map(|alias| alias.to_string()).collect(),
            kind: ValueKind::Scalar,
        }
    }

    pub fn list(name: impl Into<String>, env_aliases: &[&str]) -> Self {
        Self {
            kind: ValueKind::List,
            ..Self::scalar(name, env_aliases)
        }
    }

    fn from_env(&self, env: &dyn EnvLookup) -> Option<ParamValue> {
        let aliases: Vec<&str> = self.env_aliases.iter().map(String::as_str).collect();
        let raw = env.first_of(&aliases)?;
        match self.kind {
            ValueKind::Scalar => Some(ParamValue::Scalar(raw)),
            ValueKind::List => {
                let items = split_list(&raw);
                (!items.is_empty()).then_some(ParamValue::List(items))
            }
        }
    }
}

/// The network keys a cluster stack needs
pub fn network_keys() -> Vec<RequiredKey> {
    vec![
        RequiredKey::scalar(VPC_ID_KEY, &["FERRY_VPC_ID", "VPC_ID"]),
        RequiredKey::list(SUBNET_IDS_KEY, &["FERRY_SUBNET_IDS", "SUBNET_IDS"]),
    ]
}

/// Remote lookup for values the caller did not supply
#[async_trait]
pub trait Discover: Send + Sync {
    /// Returns a consistent bundle of related values keyed by parameter name
    async fn discover(&self) -> Result<ParameterSet>;
}

/// Discovers the account's default VPC and its subnets
pub struct VpcDiscovery {
    network: Arc<dyn NetworkApi>,
}

impl VpcDiscovery {
    pub fn new(network: Arc<dyn NetworkApi>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl Discover for VpcDiscovery {
    async fn discover(&self) -> Result<ParameterSet> {
        let vpcs = self
            .network
            .describe_default_vpcs()
            .await
            .map_err(|e| Error::remote("DescribeVpcs", e))?;
        let vpc = vpcs
            .into_iter()
            .next()
            .ok_or_else(|| Error::discovery("No default VPC found for ECS cluster configuration"))?;

        let subnets = self
            .network
            .describe_subnets(&vpc.vpc_id)
            .await
            .map_err(|e| Error::remote("DescribeSubnets", e))?;
        let subnet_ids = select_subnets(&subnets)?;

        info!(
            "Discovered VPC {} with {} subnet(s)",
            vpc.vpc_id,
            subnet_ids.len()
        );

        Ok(ParameterSet::new()
            .with(VPC_ID_KEY, vpc.vpc_id)
            .with(SUBNET_IDS_KEY, subnet_ids))
    }
}

/// Picks the subnets to run in
///
/// Subnets that map a public IP on launch are preferred when any exist;
/// otherwise every candidate is used.
pub fn select_subnets(candidates: &[Subnet]) -> Result<Vec<String>> {
    if candidates.is_empty() {
        return Err(Error::discovery("No subnets found in the discovered VPC"));
    }

    let public: Vec<String> = candidates
        .iter()
        .filter(|subnet| subnet.map_public_ip_on_launch)
        .map(|subnet| subnet.subnet_id.clone())
        .collect();

    if public.is_empty() {
        Ok(candidates
            .iter()
            .map(|subnet| subnet.subnet_id.clone())
            .collect())
    } else {
        Ok(public)
    }
}

/// Resolves required parameters through explicit input, environment and discovery
pub struct ParameterResolver {
    env: Arc<dyn EnvLookup>,
    discover: Option<Arc<dyn Discover>>,
}

impl ParameterResolver {
    pub fn new(env: Arc<dyn EnvLookup>, discover: Option<Arc<dyn Discover>>) -> Self {
        Self { env, discover }
    }

    /// Resolve every required key
    ///
    /// # Arguments
    /// * `required` - Keys that must be present in the result
    /// * `explicit` - Caller-supplied values; these always win and are all kept
    ///
    /// # Returns
    /// The explicit values plus every required key resolved from one tier
    pub async fn resolve(
        &self,
        required: &[RequiredKey],
        explicit: &ParameterSet,
    ) -> Result<ParameterSet> {
        let mut resolved: ParameterSet = explicit
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let mut discovered: Option<ParameterSet> = None;
        let mut supplied: Vec<&RequiredKey> = Vec::new();

        for key in required {
            if resolved.get_non_empty(&key.name).is_some() {
                debug!("Parameter {} supplied explicitly", key.name);
                supplied.push(key);
                continue;
            }

            if let Some(value) = key.from_env(self.env.as_ref()) {
                debug!("Parameter {} resolved from environment", key.name);
                resolved.insert(key.name.clone(), value);
                supplied.push(key);
                continue;
            }

            let Some(discover) = &self.discover else {
                return Err(missing(key));
            };

            if discovered.is_none() {
                debug!("Parameter {} missing, running discovery", key.name);
                discovered = Some(discover.discover().await?);
            }

            let value = discovered
                .as_ref()
                .and_then(|bundle| bundle.get_non_empty(&key.name))
                .cloned()
                .ok_or_else(|| missing(key))?;
            debug!("Parameter {} resolved by discovery", key.name);
            resolved.insert(key.name.clone(), value);
        }

        if let Some(bundle) = &discovered {
            check_consistent(&supplied, &resolved, bundle)?;
        }

        Ok(resolved)
    }
}

/// Supplied values must match the bundle the remaining keys came from
fn check_consistent(
    supplied: &[&RequiredKey],
    resolved: &ParameterSet,
    bundle: &ParameterSet,
) -> Result<()> {
    for key in supplied {
        let (Some(ours), Some(theirs)) = (
            resolved.get_non_empty(&key.name),
            bundle.get_non_empty(&key.name),
        ) else {
            continue;
        };
        if ours.render() != theirs.render() {
            return Err(Error::discovery(format!(
                "{} is {} but discovery found {}; supply every related parameter explicitly",
                key.name, ours, theirs
            )));
        }
    }
    Ok(())
}

fn missing(key: &RequiredKey) -> Error {
    Error::configuration(format!(
        "Missing required parameter {} (pass it explicitly or set {})",
        key.name,
        key.env_aliases.join(" or ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use ferry_client::InMemoryControlPlane;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDiscovery {
        bundle: ParameterSet,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Discover for FixedDiscovery {
        async fn discover(&self) -> Result<ParameterSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bundle.clone())
        }
    }

    fn fixed() -> Arc<FixedDiscovery> {
        Arc::new(FixedDiscovery {
            bundle: ParameterSet::new()
                .with(VPC_ID_KEY, "vpc-discovered")
                .with(SUBNET_IDS_KEY, vec!["subnet-d1", "subnet-d2"]),
            calls: AtomicUsize::new(0),
        })
    }

    fn subnet(id: &str, public: bool) -> Subnet {
        Subnet {
            subnet_id: id.to_string(),
            vpc_id: "vpc-1".to_string(),
            availability_zone: None,
            map_public_ip_on_launch: public,
        }
    }

    #[tokio::test]
    async fn test_explicit_beats_environment_beats_discovery() {
        let discovery = fixed();
        let env = MapEnv::new()
            .with("FERRY_VPC_ID", "vpc-env")
            .with("SUBNET_IDS", "subnet-e1, subnet-e2");
        let resolver = ParameterResolver::new(Arc::new(env), Some(discovery.clone()));

        let explicit = ParameterSet::new().with(VPC_ID_KEY, "vpc-explicit");
        let resolved = resolver.resolve(&network_keys(), &explicit).await.unwrap();
        assert_eq!(resolved.get(VPC_ID_KEY), Some(&ParamValue::from("vpc-explicit")));
        assert_eq!(
            resolved.get(SUBNET_IDS_KEY),
            Some(&ParamValue::from(vec!["subnet-e1", "subnet-e2"]))
        );
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 0);

        let resolved = resolver
            .resolve(&network_keys(), &ParameterSet::new())
            .await
            .unwrap();
        assert_eq!(resolved.get(VPC_ID_KEY), Some(&ParamValue::from("vpc-env")));
    }

    #[tokio::test]
    async fn test_discovery_runs_once_for_several_keys() {
        let discovery = fixed();
        let resolver = ParameterResolver::new(Arc::new(MapEnv::new()), Some(discovery.clone()));

        let resolved = resolver
            .resolve(&network_keys(), &ParameterSet::new())
            .await
            .unwrap();
        assert_eq!(resolved.get(VPC_ID_KEY), Some(&ParamValue::from("vpc-discovered")));
        assert_eq!(
            resolved.get(SUBNET_IDS_KEY).map(ParamValue::render),
            Some("subnet-d1,subnet-d2".to_string())
        );
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_explicit_value_falls_through() {
        let env = MapEnv::new().with("VPC_ID", "vpc-env").with("SUBNET_IDS", "subnet-1");
        let resolver = ParameterResolver::new(Arc::new(env), None);

        let explicit = ParameterSet::new()
            .with(VPC_ID_KEY, "")
            .with("ClusterName", "analytics");
        let resolved = resolver.resolve(&network_keys(), &explicit).await.unwrap();
        assert_eq!(resolved.get(VPC_ID_KEY), Some(&ParamValue::from("vpc-env")));
        assert_eq!(resolved.get("ClusterName"), Some(&ParamValue::from("analytics")));
    }

    #[tokio::test]
    async fn test_supplied_vpc_with_discovered_subnets_of_another_vpc() {
        let plane = Arc::new(InMemoryControlPlane::default());
        plane.add_vpc("vpc-default", true).unwrap();
        plane.add_subnet("subnet-default", "vpc-default", true).unwrap();
        plane.add_vpc("vpc-custom", false).unwrap();
        plane.add_subnet("subnet-custom", "vpc-custom", true).unwrap();

        let env = MapEnv::new().with("FERRY_VPC_ID", "vpc-custom");
        let resolver = ParameterResolver::new(
            Arc::new(env),
            Some(Arc::new(VpcDiscovery::new(plane.clone()))),
        );

        let err = resolver
            .resolve(&network_keys(), &ParameterSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
        assert!(err.to_string().contains("vpc-custom"));
    }

    #[tokio::test]
    async fn test_supplied_vpc_matching_discovery_is_kept() {
        let discovery = fixed();
        let resolver = ParameterResolver::new(Arc::new(MapEnv::new()), Some(discovery.clone()));

        let explicit = ParameterSet::new().with(VPC_ID_KEY, "vpc-discovered");
        let resolved = resolver.resolve(&network_keys(), &explicit).await.unwrap();
        assert_eq!(
            resolved.get(SUBNET_IDS_KEY).map(ParamValue::render),
            Some("subnet-d1,subnet-d2".to_string())
        );
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_without_discovery_is_configuration_error() {
        let resolver = ParameterResolver::new(Arc::new(MapEnv::new()), None);
        let err = resolver
            .resolve(&network_keys(), &ParameterSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("FERRY_VPC_ID or VPC_ID"));
    }

    #[tokio::test]
    async fn test_vpc_discovery_against_control_plane() {
        let plane = Arc::new(InMemoryControlPlane::default());
        plane.add_vpc("vpc-default", true).unwrap();
        plane.add_subnet("subnet-private", "vpc-default", false).unwrap();
        plane.add_subnet("subnet-public", "vpc-default", true).unwrap();

        let bundle = VpcDiscovery::new(plane.clone()).discover().await.unwrap();
        assert_eq!(bundle.get(VPC_ID_KEY), Some(&ParamValue::from("vpc-default")));
        assert_eq!(
            bundle.get(SUBNET_IDS_KEY),
            Some(&ParamValue::from(vec!["subnet-public"]))
        );
    }

    #[tokio::test]
    async fn test_vpc_discovery_without_default_vpc() {
        let plane = Arc::new(InMemoryControlPlane::default());
        plane.add_vpc("vpc-custom", false).unwrap();
        let err = VpcDiscovery::new(plane).discover().await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[tokio::test]
    async fn test_vpc_discovery_without_subnets() {
        let plane = Arc::new(InMemoryControlPlane::default());
        plane.add_vpc("vpc-default", true).unwrap();
        let err = VpcDiscovery::new(plane).discover().await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[test]
    fn test_select_subnets_prefers_public() {
        let chosen = select_subnets(&[subnet("a", false), subnet("b", true), subnet("c", true)]).unwrap();
        assert_eq!(chosen, vec!["b", "c"]);
    }

    #[test]
    fn test_select_subnets_falls_back_to_all() {
        let chosen = select_subnets(&[subnet("a", false), subnet("b", false)]).unwrap();
        assert_eq!(chosen, vec!["a", "b"]);
    }

    #[test]
    fn test_select_subnets_empty() {
        assert!(matches!(select_subnets(&[]), Err(Error::Discovery(_))));
    }
}
