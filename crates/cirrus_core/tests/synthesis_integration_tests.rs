//! Integration tests for the synthesis core.

use std::collections::BTreeMap;

use cirrus_core::{
    synthesize, App, Attributes, PrincipalSource, ProvisionFailure, Provisioner,
    ResolvedBinding, ResourceDescriptor, ResourceKind, SynthError, Value,
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

/// Provision stub returning an id, name, arn, and subnet collections
/// derived from the resource.
fn stub_attributes(descriptor: &ResourceDescriptor) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(
        "id".into(),
        serde_json::json!(format!("{}-id", descriptor.name)),
    );
    attrs.insert("name".into(), serde_json::json!(descriptor.name.clone()));
    attrs.insert(
        "arn".into(),
        serde_json::json!(format!("arn:test:{}", descriptor.name)),
    );
    attrs.insert(
        "public_subnet_ids".into(),
        serde_json::json!([format!("subnet-public-{}", descriptor.name)]),
    );
    attrs.insert(
        "private_subnet_ids".into(),
        serde_json::json!([format!("subnet-private-{}", descriptor.name)]),
    );
    attrs
}

fn permissive_mock() -> MockProv {
    let mut mock = MockProv::new();
    mock.expect_provision()
        .returning(|d| Ok(stub_attributes(d)));
    mock.expect_apply_binding().returning(|_| Ok(()));
    mock.expect_attach_policy().returning(|_, _| Ok(()));
    mock
}

#[tokio::test]
async fn test_chain_orders_network_before_group_before_replication() {
    let mut app = App::new("platform");
    let root = app.root();

    let network = app
        .declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
        .unwrap();

    let mut group_inputs = BTreeMap::new();
    group_inputs.insert(
        "subnet_ids".to_string(),
        Value::Ref(app.attribute(network, "private_subnet_ids")),
    );
    let group = app
        .declare(root, ResourceKind::SubnetGroup, "subnets", group_inputs)
        .unwrap();

    let mut cache_inputs = BTreeMap::new();
    cache_inputs.insert(
        "subnet_group_name".to_string(),
        Value::Ref(app.attribute(group, "name")),
    );
    app.declare(
        root,
        ResourceKind::CacheReplicationGroup,
        "redis",
        cache_inputs,
    )
    .unwrap();

    let mock = permissive_mock();
    let result = synthesize(&mut app, &mock).await.unwrap();

    assert_eq!(
        result.creation_order,
        vec!["platform/vpc", "platform/subnets", "platform/redis"]
    );
}

#[tokio::test]
async fn test_cycle_issues_zero_provisioning_calls() {
    let mut app = App::new("platform");
    let root = app.root();
    let a = app
        .declare(root, ResourceKind::Cluster, "a", BTreeMap::new())
        .unwrap();
    let b = app
        .declare(root, ResourceKind::IdentityRole, "b", BTreeMap::new())
        .unwrap();
    app.add_dependency(a, b);
    app.add_dependency(b, a);

    let mut mock = MockProv::new();
    mock.expect_provision().times(0);
    mock.expect_apply_binding().times(0);
    mock.expect_attach_policy().times(0);

    let err = synthesize(&mut app, &mock).await.unwrap_err();
    match err {
        SynthError::Cycle { members } => {
            assert!(members.iter().any(|m| m.starts_with("a (")));
            assert!(members.iter().any(|m| m.starts_with("b (")));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_binding_declared_before_principal_resolves() {
    let mut app = App::new("platform");
    let root = app.root();

    let cluster = app
        .declare(root, ResourceKind::Cluster, "workloads", BTreeMap::new())
        .unwrap();
    // Binding recorded before the role is even declared, let alone resolved.
    let role = app
        .declare(root, ResourceKind::IdentityRole, "deploy-role", BTreeMap::new())
        .unwrap();
    app.bind_master_role(cluster, role);

    let mut mock = MockProv::new();
    mock.expect_provision().returning(|d| Ok(stub_attributes(d)));
    mock.expect_attach_policy()
        .withf(|identity, policy| {
            identity == "arn:test:deploy-role" && policy == "cluster-access/workloads"
        })
        .times(1)
        .returning(|_, _| Ok(()));
    mock.expect_apply_binding()
        .withf(|b| b.cluster_name == "workloads" && !b.external)
        .times(1)
        .returning(|_| Ok(()));

    let result = synthesize(&mut app, &mock).await.unwrap();
    assert_eq!(result.bindings_applied, 1);
}

#[tokio::test]
async fn test_external_principal_is_never_mutated() {
    let mut app = App::new("platform");
    let root = app.root();

    let cluster = app
        .declare(root, ResourceKind::Cluster, "workloads", BTreeMap::new())
        .unwrap();
    app.bind_administrator(
        cluster,
        PrincipalSource::ExternalRoleArn("arn:aws:iam::111122223333:role/ops".into()),
    );

    let mut mock = MockProv::new();
    mock.expect_provision().returning(|d| Ok(stub_attributes(d)));
    mock.expect_attach_policy().times(0);
    mock.expect_apply_binding()
        .withf(|b| b.external && b.principal == "arn:aws:iam::111122223333:role/ops")
        .times(1)
        .returning(|_| Ok(()));

    synthesize(&mut app, &mock).await.unwrap();
}

#[tokio::test]
async fn test_provisioning_failure_publishes_no_outputs() {
    let mut app = App::new("platform");
    let root = app.root();
    let vpc = app
        .declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
        .unwrap();
    app.export(root, "vpc_id", app.attribute(vpc, "vpc_id"))
        .unwrap();

    let mut mock = MockProv::new();
    mock.expect_provision()
        .returning(|_| Err(ProvisionFailure::new("name collision")));
    mock.expect_apply_binding().times(0);
    mock.expect_attach_policy().times(0);

    let err = synthesize(&mut app, &mock).await.unwrap_err();
    assert!(matches!(err, SynthError::Provisioning { .. }));

    // Aborted pass: the registry stays unpublished.
    assert!(matches!(
        app.output(root, "vpc_id").unwrap_err(),
        SynthError::NotYetResolved { .. }
    ));
}

#[tokio::test]
async fn test_outputs_resolve_across_units_and_runs_deterministically() {
    let build = || {
        let mut app = App::new("platform");
        let root = app.root();
        let cache = app.child_unit(root, "cache");

        let vpc = app
            .declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
            .unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "vpc_id".to_string(),
            Value::Ref(app.attribute(vpc, "id")),
        );
        let redis = app
            .declare(cache, ResourceKind::CacheReplicationGroup, "redis", inputs)
            .unwrap();
        app.export(cache, "redis_name", app.attribute(redis, "name"))
            .unwrap();

        let imported = app.import(root, cache, "redis_name").unwrap();
        app.export(root, "redis_name", imported).unwrap();
        app
    };

    let mock = permissive_mock();
    let mut first = build();
    let first_result = synthesize(&mut first, &mock).await.unwrap();

    let mock = permissive_mock();
    let mut second = build();
    let second_result = synthesize(&mut second, &mock).await.unwrap();

    assert_eq!(first_result.creation_order, second_result.creation_order);
    assert_eq!(first_result.outputs(), second_result.outputs());
    assert_eq!(
        first_result.outputs().get("platform/redis_name"),
        Some(&"redis".to_string())
    );
    assert_eq!(
        first_result.outputs().get("platform/cache/redis_name"),
        Some(&"redis".to_string())
    );
}
