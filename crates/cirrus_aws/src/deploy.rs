//! The composed payment-platform deployment.
//!
//! One parameterized deployment replaces the three near-identical stack
//! variants of the original setup: optional components are toggled through
//! [`DeploymentFeatures`] presets instead of duplicated definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cirrus_core::{App, UnitId, Value};

use crate::build::{BuildProject, BuildProjectSpec};
use crate::cache::{ReplicationGroup, ReplicationGroupSpec, SubnetGroupSpec};
use crate::cluster::{Cluster, ClusterSpec};
use crate::error::AwsResult;
use crate::iam::{RoleSpec, TrustPrincipal};
use crate::network::{Network, NetworkSpec, Protocol, SecurityRulesSpec};
use crate::registry::{Registry, RegistrySpec};
use crate::storage::{Bucket, BucketSpec};

/// Optional components of a deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentFeatures {
    pub cache: bool,
    pub cluster: bool,
    pub build_pipeline: bool,
    pub artifact_bucket: bool,
}

impl Default for DeploymentFeatures {
    fn default() -> Self {
        Self::standard()
    }
}

impl DeploymentFeatures {
    /// Network and registry only.
    pub fn minimal() -> Self {
        Self {
            cache: false,
            cluster: false,
            build_pipeline: false,
            artifact_bucket: false,
        }
    }

    /// Cache and cluster, no pipeline.
    pub fn standard() -> Self {
        Self {
            cache: true,
            cluster: true,
            build_pipeline: false,
            artifact_bucket: false,
        }
    }

    /// Everything, including the build pipeline and artifact bucket.
    pub fn with_pipeline() -> Self {
        Self {
            cache: true,
            cluster: true,
            build_pipeline: true,
            artifact_bucket: true,
        }
    }
}

/// Parameters of the full deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSpec {
    pub name: String,
    /// Image repository name pushed to by the pipeline.
    pub image_prefix: String,
    /// Source repository the build hook watches.
    pub source_repository: String,
    pub cidr: String,
    pub nat_gateways: u32,
    pub availability_zones: Vec<String>,
    /// Peer allowed to reach the cache on 6379.
    pub peer_cidr: String,
    pub account: String,
    /// Existing role ARNs to bind as cluster administrators (immutable).
    pub admin_role_arns: Vec<String>,
    /// Existing IAM user names to bind as cluster administrators.
    pub admin_user_names: Vec<String>,
    pub features: DeploymentFeatures,
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self {
            name: "payment-platform".to_string(),
            image_prefix: "payment-web".to_string(),
            source_repository: "PaymentImageSource".to_string(),
            cidr: "10.1.0.0/16".to_string(),
            nat_gateways: 1,
            availability_zones: vec!["us-east-1a".to_string(), "us-east-1b".to_string()],
            peer_cidr: "10.0.25.94/32".to_string(),
            account: "111111111111".to_string(),
            admin_role_arns: Vec::new(),
            admin_user_names: Vec::new(),
            features: DeploymentFeatures::standard(),
        }
    }
}

impl DeploymentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_features(mut self, features: DeploymentFeatures) -> Self {
        self.features = features;
        self
    }

    /// Declare the whole deployment into `app` and register its outputs.
    pub fn instantiate(&self, app: &mut App) -> AwsResult<Deployment> {
        let root = app.root();
        debug!("composing deployment '{}'", self.name);

        let network = NetworkSpec::new("vpc")
            .with_cidr(self.cidr.as_str())
            .with_nat_gateways(self.nat_gateways)
            .with_availability_zones(self.availability_zones.clone())
            .instantiate(app, root)?;

        let registry = RegistrySpec::new(self.image_prefix.as_str()).instantiate(app, root)?;

        let mut deployment = Deployment {
            network,
            registry,
            replication_group: None,
            cluster: None,
            build_project: None,
            artifact_bucket: None,
            cache_unit: None,
            cluster_unit: None,
        };

        if self.features.build_pipeline {
            self.compose_pipeline(app, root, &mut deployment)?;
        }
        if self.features.cache {
            self.compose_cache_unit(app, root, &mut deployment)?;
        }
        if self.features.cluster {
            self.compose_cluster_unit(app, root, &mut deployment)?;
        }

        self.register_outputs(app, root, &deployment)?;
        Ok(deployment)
    }

    fn compose_pipeline(
        &self,
        app: &mut App,
        root: UnitId,
        deployment: &mut Deployment,
    ) -> AwsResult<()> {
        let build_role = RoleSpec::new(
            "build-role",
            TrustPrincipal::Service("codebuild.amazonaws.com".into()),
        )
        .with_managed_policy("AWSLambda_FullAccess")
        .with_managed_policy("AmazonAPIGatewayAdministrator")
        .allow(&["cloudformation:*"], vec![Value::literal("*")])
        .allow(&["iam:*"], vec![Value::literal("*")])
        .allow(&["ecr:GetAuthorizationToken"], vec![Value::literal("*")])
        .allow(
            &["ecr:*"],
            vec![Value::Template {
                template: "{registry_arn}*".to_string(),
                refs: BTreeMap::from([(
                    "registry_arn".to_string(),
                    deployment.registry.arn_ref(),
                )]),
            }],
        )
        .instantiate(app, root)?;

        deployment.build_project = Some(
            BuildProjectSpec::new("image-build", self.source_repository.as_str()).instantiate(
                app,
                root,
                &deployment.registry,
                &build_role,
            )?,
        );

        if self.features.artifact_bucket {
            deployment.artifact_bucket = Some(
                BucketSpec::new(format!("{}-artifacts", self.name))
                    .with_versioning(true)
                    .instantiate(app, root)?,
            );
        }
        Ok(())
    }

    fn compose_cache_unit(
        &self,
        app: &mut App,
        root: UnitId,
        deployment: &mut Deployment,
    ) -> AwsResult<()> {
        let unit = app.child_unit(root, "cache");

        let mut rules = SecurityRulesSpec::new("cache-sg")
            .with_description("security rules for the cache replication group");
        rules.allow_ingress(
            self.peer_cidr.as_str(),
            6379,
            Protocol::Tcp,
            "redis ingress 6379",
        );
        let security = rules.instantiate(app, unit, &deployment.network)?;

        // The network is handed in by reference; the subnet collection it
        // derives carries the ordering edge into the group.
        let subnet_group = SubnetGroupSpec::new("cache-subnets")
            .with_description("private subnets for cache placement")
            .instantiate(
                app,
                unit,
                Value::Ref(deployment.network.private_subnet_ids_ref()),
            )?;

        let replication = ReplicationGroupSpec::new("redis")
            .with_description("redis replication group")
            .instantiate(app, unit, &subnet_group, &security)?;

        app.export(
            unit,
            "redis_url",
            replication.primary_endpoint_address_ref(),
        )?;
        app.export(unit, "redis_port", replication.primary_endpoint_port_ref())?;

        deployment.replication_group = Some(replication);
        deployment.cache_unit = Some(unit);
        Ok(())
    }

    fn compose_cluster_unit(
        &self,
        app: &mut App,
        root: UnitId,
        deployment: &mut Deployment,
    ) -> AwsResult<()> {
        let unit = app.child_unit(root, "cluster");

        let admin_role = RoleSpec::new(
            "cluster-admin",
            TrustPrincipal::Account(self.account.clone()),
        )
        .instantiate(app, unit)?;

        let cluster = ClusterSpec::new("workloads").instantiate(
            app,
            unit,
            Value::Ref(deployment.network.vpc_id_ref()),
            &admin_role,
        )?;

        // Deploy role created alongside the cluster, bound late as masters.
        let deploy_role =
            RoleSpec::new("deploy-role", TrustPrincipal::AccountRoot).instantiate(app, unit)?;
        cluster.grant_master_role(app, &deploy_role);

        for arn in &self.admin_role_arns {
            cluster.grant_administrator_role(app, arn.clone());
        }
        for user in &self.admin_user_names {
            cluster.grant_administrator_user(app, user.clone());
        }

        app.export(unit, "cluster_name", cluster.name_ref())?;
        app.export(unit, "deploy_role_arn", deploy_role.arn_ref())?;

        deployment.cluster = Some(cluster);
        deployment.cluster_unit = Some(unit);
        Ok(())
    }

    fn register_outputs(
        &self,
        app: &mut App,
        root: UnitId,
        deployment: &Deployment,
    ) -> AwsResult<()> {
        app.export(
            root,
            "stack_id",
            Value::literal(format!("deployment/{}", self.name)),
        )?;
        app.export(root, "stack_name", Value::literal(self.name.as_str()))?;
        app.export(root, "vpc_cidr", deployment.network.cidr_ref())?;
        app.export(root, "registry_name", deployment.registry.name_ref())?;
        app.export(root, "registry_arn", deployment.registry.arn_ref())?;

        let hint = Value::Template {
            template: format!(
                "Create an \"imagedefinitions.json\" file and push it to repository \
                 \"{}\" pointing at {{registry_uri}}:latest",
                self.source_repository
            ),
            refs: BTreeMap::from([("registry_uri".to_string(), deployment.registry.uri_ref())]),
        };
        app.export(root, "hint", hint)?;

        if let Some(project) = &deployment.build_project {
            app.export(root, "build_project_id", project.project_id_ref())?;
        }
        if let Some(bucket) = &deployment.artifact_bucket {
            app.export(root, "artifact_bucket", bucket.name_ref())?;
        }
        if let Some(unit) = deployment.cache_unit {
            let url = app.import(root, unit, "redis_url")?;
            app.export(root, "redis_url", url)?;
            let port = app.import(root, unit, "redis_port")?;
            app.export(root, "redis_port", port)?;
        }
        if let Some(unit) = deployment.cluster_unit {
            app.export(root, "cluster_unit", Value::literal(app.unit_path(unit)))?;
            let name = app.import(root, unit, "cluster_name")?;
            app.export(root, "cluster_name", name)?;
        }
        Ok(())
    }
}

/// Handles to the declared components of a deployment.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub network: Network,
    pub registry: Registry,
    pub replication_group: Option<ReplicationGroup>,
    pub cluster: Option<Cluster>,
    pub build_project: Option<BuildProject>,
    pub artifact_bucket: Option<Bucket>,
    pub cache_unit: Option<UnitId>,
    pub cluster_unit: Option<UnitId>,
}
