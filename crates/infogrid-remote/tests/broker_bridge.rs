//! Full-stack bridge test: a process-wide router composed from the UDS,
//! dynamic-state, userinfo, and store-backed providers, exposed to a
//! "remote" caller through the stub/skeleton pair. The remote caller
//! issues the identical queries a local caller would.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::watch;

use infogrid_broker::{BrokerError, InfoProvider, InfoRouter, QueryArgs};
use infogrid_kvstore::{KeyValueStore, KeyValueStoreProvider, MemoryStore};
use infogrid_nodestate::{
    DynamicStateProvider, HealthCheck, NodeStatus, ResourceBackend, ServiceComposer,
    UserInfoProvider,
};
use infogrid_remote::{RemoteProviderStub, SkeletonServer, channel};
use infogrid_uds::{
    DocumentUds, InstanceData, NodeDescription, ResourceInfo, StaticDescription, Uds, UdsProvider,
};

struct StubResource;

impl ResourceBackend for StubResource {
    fn node_state(&self, _instance: &InstanceData) -> anyhow::Result<NodeStatus> {
        Ok(NodeStatus::Ready)
    }
    fn node_address(&self, instance: &InstanceData) -> anyhow::Result<Value> {
        Ok(json!(instance.resource.endpoint))
    }
}

struct StubComposer;

impl ServiceComposer for StubComposer {
    fn service_state(&self, _instance: &InstanceData) -> anyhow::Result<NodeStatus> {
        Ok(NodeStatus::Ready)
    }
    fn node_attribute(&self, _node_id: &str, attribute: &Value) -> anyhow::Result<Value> {
        Ok(json!({"resolved": attribute}))
    }
    fn infrastructure_exists(&self, _infra_id: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

struct StubHealth;

impl HealthCheck for StubHealth {
    fn state(&self, _instance: &InstanceData) -> anyhow::Result<NodeStatus> {
        Ok(NodeStatus::Ready)
    }
}

fn instance(infra_id: &str, node_name: &str, node_id: &str) -> InstanceData {
    InstanceData {
        node_id: node_id.to_string(),
        infra_id: infra_id.to_string(),
        backend_id: "cloud-a".to_string(),
        resource: ResourceInfo {
            endpoint: format!("10.0.0.1:{node_id}"),
            extra: Map::new(),
        },
        node_description: NodeDescription {
            name: node_name.to_string(),
            node_type: Some("worker".to_string()),
            extra: Map::new(),
        },
        resolved_node_definition: None,
        state: None,
        extra: Map::new(),
    }
}

/// Build the component graph once, the way a deployment wires it at
/// startup: no global singletons, everything passed through constructors.
fn build_broker() -> (Arc<dyn Uds>, Arc<InfoRouter>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let uds: Arc<dyn Uds> = Arc::new(DocumentUds::new(Arc::clone(&store)));

    let dynamic = Arc::new(DynamicStateProvider::new(
        Arc::clone(&uds),
        Arc::new(StubResource),
        Arc::new(StubComposer),
        Arc::new(StubHealth),
    ));
    let userinfo = Arc::new(UserInfoProvider::new(Arc::clone(&uds), Arc::clone(&dynamic)));
    let uds_provider = Arc::new(UdsProvider::new(Arc::clone(&uds)));
    let store_provider = Arc::new(KeyValueStoreProvider::new(store));

    let router = Arc::new(InfoRouter::new(vec![
        dynamic,
        userinfo,
        uds_provider,
        store_provider,
    ]));
    (uds, router)
}

fn seed(uds: &Arc<dyn Uds>) {
    uds.add_infrastructure(&StaticDescription {
        infra_id: "X".to_string(),
        name: "demo".to_string(),
        user_id: Some("u1".to_string()),
        suspended: false,
        userinfo_strategy: None,
        notification: None,
        extra: Map::new(),
    })
    .unwrap();
    uds.register_started_node("X", "A", &instance("X", "A", "1"))
        .unwrap();
    uds.register_started_node("X", "B", &instance("X", "B", "2"))
        .unwrap();
}

#[test]
fn router_resolves_across_all_providers() {
    let (uds, router) = build_broker();
    seed(&uds);

    // Dynamic-state provider.
    let state = router
        .get("infrastructure.state", &QueryArgs::new().with_arg("X"))
        .unwrap();
    assert_eq!(state["A"]["1"]["state"], json!("ready"));

    // UDS provider.
    let name = router
        .get("infrastructure.name", &QueryArgs::new().with_arg("X"))
        .unwrap();
    assert_eq!(name, json!("demo"));

    // Userinfo provider.
    let userinfo = router
        .get("infrastructure.userinfo", &QueryArgs::new().with_arg("X"))
        .unwrap();
    assert_eq!(userinfo["A"]["1"], json!("10.0.0.1:1"));

    // Store-backed provider is the catch-all tail.
    let backend_type = router
        .get("uds.backend_type", &QueryArgs::new())
        .unwrap();
    assert_eq!(backend_type, json!("memory"));

    assert!(!router.can_get("no.such.key"));
}

#[tokio::test]
async fn remote_caller_issues_identical_queries() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (uds, router) = build_broker();
    seed(&uds);

    let (transport, deliveries) = channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = SkeletonServer::new(
        router.clone() as Arc<dyn InfoProvider>,
        deliveries,
        shutdown_rx,
    );
    let _server_handle = tokio::spawn(server.run());

    let stub = RemoteProviderStub::new(Arc::new(transport));

    let instances = stub
        .get(
            "infrastructure.node_instances",
            QueryArgs::new().with_arg("X"),
        )
        .await
        .unwrap();
    assert_eq!(instances["A"]["1"]["node_id"], json!("1"));
    assert_eq!(instances["B"]["2"]["node_id"], json!("2"));

    let found = stub
        .get(
            "node.find_one",
            QueryArgs::new()
                .with_kwarg("infra_id", "X")
                .with_kwarg("node_id", "2"),
        )
        .await
        .unwrap();
    assert_eq!(found["node_id"], json!("2"));

    let err = stub
        .get("no.such.key", QueryArgs::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::KeyNotFound(_)));

    let err = stub
        .get("infrastructure.name", QueryArgs::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Argument(_)));
}
