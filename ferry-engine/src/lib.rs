//! Ferry engine
//!
//! Brings named infrastructure stacks and execution graphs to their desired
//! state against a control plane.
//!
//! Architecture:
//! - Configuration: one immutable [`EngineConfig`] per invocation
//! - Resolver: fills missing parameters from explicit input, environment, then discovery
//! - Reconciler: idempotent create-or-update of stacks with convergence polling
//! - Graph deployer: idempotent create-or-update of execution graphs by name
//! - Facade: composes the above into a single "deploy this workload" call
//!
//! Remote services are only reached through the `ferry_client` traits, so any
//! component can run against [`ferry_client::InMemoryControlPlane`].

pub mod config;
pub mod env;
pub mod facade;
pub mod graph_deployer;
pub mod reconciler;
pub mod resolver;
pub mod stacks;

pub use config::EngineConfig;
pub use env::{EnvLookup, MapEnv, ProcessEnv};
pub use facade::{DeploymentReport, FlowDeployer, WorkloadOverrides, WorkloadRequest};
pub use graph_deployer::GraphDeployer;
pub use reconciler::StackReconciler;
pub use resolver::{Discover, ParameterResolver, RequiredKey, ValueKind, VpcDiscovery};
