//! Integration tests for the composed deployment.

use cirrus_aws::{DeploymentFeatures, DeploymentSpec, SimProvisioner};
use cirrus_core::{
    synthesize, App, Attributes, ProvisionFailure, Provisioner, ResolvedBinding,
    ResourceDescriptor, SynthesisResult,
};

mockall::mock! {
    Prov {}

    #[async_trait::async_trait]
    impl Provisioner for Prov {
        async fn provision(
            &self,
            descriptor: &ResourceDescriptor,
        ) -> Result<Attributes, ProvisionFailure>;
        async fn apply_binding(&self, binding: &ResolvedBinding) -> Result<(), ProvisionFailure>;
        async fn attach_policy(&self, identity: &str, policy: &str)
            -> Result<(), ProvisionFailure>;
    }
}

async fn run(spec: &DeploymentSpec) -> (App, SynthesisResult) {
    let mut app = App::new(spec.name.clone());
    spec.instantiate(&mut app).unwrap();
    let sim = SimProvisioner::default();
    let result = synthesize(&mut app, &sim).await.unwrap();
    (app, result)
}

#[tokio::test]
async fn test_standard_deployment_outputs() {
    let (_, result) = run(&DeploymentSpec::default()).await;
    let outputs = result.outputs();

    assert_eq!(
        outputs.get("payment-platform/stack_id"),
        Some(&"deployment/payment-platform".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/stack_name"),
        Some(&"payment-platform".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/vpc_cidr"),
        Some(&"10.1.0.0/16".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/registry_name"),
        Some(&"payment-web".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/redis_url"),
        Some(&"redis.0001.us-east-1.cache.amazonaws.com".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/redis_port"),
        Some(&"6379".to_string())
    );
    assert_eq!(
        outputs.get("payment-platform/cluster_name"),
        Some(&"workloads".to_string())
    );

    // The hint is an ordinary string output templated with the computed
    // registry address.
    let hint = outputs.get("payment-platform/hint").unwrap();
    assert!(hint.contains("111111111111.dkr.ecr.us-east-1.amazonaws.com/payment-web:latest"));
    assert!(hint.contains("PaymentImageSource"));
}

#[tokio::test]
async fn test_child_unit_outputs_keep_their_own_keys() {
    let (_, result) = run(&DeploymentSpec::default()).await;
    let outputs = result.outputs();

    // Same output name at two unit paths, two distinct keys.
    assert!(outputs.contains_key("payment-platform/redis_url"));
    assert!(outputs.contains_key("payment-platform/cache/redis_url"));
    assert_eq!(
        outputs.get("payment-platform/redis_url"),
        outputs.get("payment-platform/cache/redis_url")
    );
}

#[tokio::test]
async fn test_network_precedes_subnet_group_precedes_replication() {
    let (_, result) = run(&DeploymentSpec::default()).await;

    let position = |path: &str| {
        result
            .creation_order
            .iter()
            .position(|p| p == path)
            .unwrap_or_else(|| panic!("{path} missing from creation order"))
    };
    assert!(position("payment-platform/vpc") < position("payment-platform/cache/cache-subnets"));
    assert!(
        position("payment-platform/cache/cache-subnets")
            < position("payment-platform/cache/redis")
    );
}

#[tokio::test]
async fn test_subnet_collections_are_nonempty_and_deterministic() {
    let spec = DeploymentSpec::default();

    let (first_app, first) = run(&spec).await;
    let (_, second) = run(&spec).await;

    // One NAT gateway, 10.1.0.0/16: both collections populated.
    let mut network_id = None;
    for record in first_app.model().iter() {
        if record.name == "vpc" {
            network_id = Some(record.id);
        }
    }
    let record = first_app.model().get(network_id.unwrap()).unwrap();
    let attrs = record.attributes().unwrap();
    let publics = attrs["public_subnet_ids"].as_array().unwrap();
    let privates = attrs["private_subnet_ids"].as_array().unwrap();
    assert!(!publics.is_empty());
    assert!(!privates.is_empty());

    // Identical input, identical plan and outputs.
    assert_eq!(first.creation_order, second.creation_order);
    assert_eq!(first.outputs(), second.outputs());
}

#[tokio::test]
async fn test_pipeline_features_add_project_and_bucket_outputs() {
    let spec = DeploymentSpec::default().with_features(DeploymentFeatures::with_pipeline());
    let (_, result) = run(&spec).await;
    let outputs = result.outputs();

    assert_eq!(
        outputs.get("payment-platform/build_project_id"),
        Some(&"image-build-project".to_string())
    );
    assert!(outputs.contains_key("payment-platform/artifact_bucket"));
}

#[tokio::test]
async fn test_minimal_deployment_has_no_cache_or_cluster_outputs() {
    let spec = DeploymentSpec::default().with_features(DeploymentFeatures::minimal());
    let (_, result) = run(&spec).await;
    let outputs = result.outputs();

    assert!(outputs.contains_key("payment-platform/registry_arn"));
    assert!(!outputs.contains_key("payment-platform/redis_url"));
    assert!(!outputs.contains_key("payment-platform/cluster_name"));
}

#[tokio::test]
async fn test_external_admin_role_is_bound_but_never_mutated() {
    let mut spec = DeploymentSpec::default();
    spec.admin_role_arns
        .push("arn:aws:iam::999988887777:role/ops".to_string());

    let mut app = App::new(spec.name.clone());
    spec.instantiate(&mut app).unwrap();

    let mut mock = MockProv::new();
    mock.expect_provision()
        .returning(|descriptor| Ok(stub_attributes(descriptor)));
    // Exactly one mutation: the deploy role created in this pass. The
    // external ops role must never see a policy attachment.
    mock.expect_attach_policy()
        .withf(|identity, _| identity.ends_with(":role/deploy-role"))
        .times(1)
        .returning(|_, _| Ok(()));
    mock.expect_apply_binding()
        .withf(|b| !b.external || b.principal == "arn:aws:iam::999988887777:role/ops")
        .times(2)
        .returning(|_| Ok(()));

    synthesize(&mut app, &mock).await.unwrap();
}

/// Minimal attribute set covering every reference the composed deployment
/// resolves, derived from the descriptor alone.
fn stub_attributes(descriptor: &ResourceDescriptor) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("name".into(), serde_json::json!(descriptor.name.clone()));
    attrs.insert(
        "arn".into(),
        serde_json::json!(format!("arn:aws:iam::111111111111:role/{}", descriptor.name)),
    );
    attrs.insert("vpc_id".into(), serde_json::json!("vpc-stub"));
    attrs.insert(
        "cidr".into(),
        serde_json::json!(descriptor
            .inputs
            .get("cidr")
            .and_then(|v| v.as_str())
            .unwrap_or_default()),
    );
    attrs.insert("public_subnet_ids".into(), serde_json::json!(["subnet-a"]));
    attrs.insert("private_subnet_ids".into(), serde_json::json!(["subnet-b"]));
    attrs.insert("security_group_id".into(), serde_json::json!("sg-stub"));
    attrs.insert("uri".into(), serde_json::json!("registry.example/stub"));
    attrs.insert(
        "primary_endpoint_address".into(),
        serde_json::json!("cache.example"),
    );
    attrs.insert("primary_endpoint_port".into(), serde_json::json!("6379"));
    attrs
}
