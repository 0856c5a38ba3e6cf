//! # cirrus_aws
//!
//! AWS-shaped constructs over the `cirrus_core` synthesis model.
//!
//! Each construct is a declarative spec (builder-style) that declares one
//! or more resources into an [`cirrus_core::App`] and hands back typed
//! attribute references for wiring. [`deploy::DeploymentSpec`] composes the
//! full payment-platform deployment; [`sim::SimProvisioner`] is a
//! deterministic collaborator for running passes without a cloud.

pub mod build;
pub mod cache;
pub mod cluster;
pub mod deploy;
pub mod error;
pub mod iam;
pub mod network;
pub mod registry;
pub mod sim;
pub mod storage;

pub use build::{BuildProject, BuildProjectSpec};
pub use cache::{ReplicationGroup, ReplicationGroupSpec, SubnetGroup, SubnetGroupSpec};
pub use cluster::{Cluster, ClusterSpec};
pub use deploy::{Deployment, DeploymentFeatures, DeploymentSpec};
pub use error::{AwsError, AwsResult};
pub use network::{
    IngressRule, Ipv4Cidr, Network, NetworkSpec, Protocol, SecurityRules, SecurityRulesSpec,
};
pub use registry::{Registry, RegistrySpec};
pub use sim::SimProvisioner;
pub use storage::{Bucket, BucketSpec};
