//! etcd 后端集成测试
//!
//! 这些测试需要运行中的 etcd 服务器实例。
//! 默认情况下，测试会被忽略，需要使用 `cargo test --test etcd_backend_test -- --ignored` 运行。
//!
//! 启动 etcd 服务器：
//! ```bash
//! docker run -d --name etcd-test -p 2379:2379 -p 2380:2380 \
//!   quay.io/coreos/etcd:v3.5.9 \
//!   etcd --advertise-client-urls=http://127.0.0.1:2379 \
//!        --listen-client-urls=http://0.0.0.0:2379
//! ```

#![cfg(feature = "etcd")]

use std::sync::Arc;

use tokio::time::{Duration, sleep, timeout};
use tokio_util::sync::CancellationToken;

use flare_polaris_resolver::discovery::RegistryBackend;
use flare_polaris_resolver::{
    EtcdRegistry, PolarisResolver, RawInstance, RegistryConfig, Resolver, ServiceKey,
    WatchResolver,
};

/// etcd 服务器地址
/// 可以通过环境变量 ETCD_ENDPOINTS 覆盖，默认为 http://127.0.0.1:2379
fn etcd_endpoints() -> Vec<String> {
    std::env::var("ETCD_ENDPOINTS")
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["http://127.0.0.1:2379".to_string()])
}

/// 测试命名空间
const TEST_NAMESPACE: &str = "flare-test";

async fn create_registry() -> EtcdRegistry {
    let config = RegistryConfig {
        endpoints: etcd_endpoints(),
        key_prefix: "polaris-test".to_string(),
        ..Default::default()
    };
    EtcdRegistry::new(&config)
        .await
        .expect("Failed to connect etcd")
}

/// 每个测试使用独立的服务名，避免互相干扰
fn unique_key(service: &str) -> ServiceKey {
    ServiceKey::new(TEST_NAMESPACE, format!("{}-{}", service, uuid::Uuid::new_v4()))
}

fn create_test_instance(id: &str, port: u16, weight: i32) -> RawInstance {
    RawInstance::new("127.0.0.1", port)
        .with_id(id)
        .with_protocol("grpc")
        .with_weight(weight)
        .with_metadata("env", "test")
}

/// 测试：键布局
#[tokio::test]
#[ignore]
async fn test_etcd_service_prefix() {
    let registry = create_registry().await;
    let key = ServiceKey::new("default", "orders");

    assert_eq!(
        registry.service_prefix(&key),
        "polaris-test/default/services/orders/"
    );
}

/// 测试：写入后可以解析
#[tokio::test]
#[ignore]
async fn test_etcd_resolve() {
    let registry = Arc::new(create_registry().await);
    let key = unique_key("resolve");

    registry
        .put_instance(&key, &create_test_instance("node-1", 8080, 0))
        .await
        .expect("Failed to put instance");
    registry
        .put_instance(&key, &create_test_instance("node-2", 8081, 5))
        .await
        .expect("Failed to put instance");

    let resolver = PolarisResolver::new(registry.clone());
    let result = resolver
        .resolve(&key.to_string())
        .await
        .expect("Failed to resolve");

    assert_eq!(result.endpoints.len(), 2);
    assert_eq!(result.endpoints[0].address(), "127.0.0.1:8080");
    assert_eq!(result.endpoints[0].weight(), 10);
    assert_eq!(result.endpoints[1].weight(), 5);

    // 清理
    registry.delete_instance(&key, "node-1").await.unwrap();
    registry.delete_instance(&key, "node-2").await.unwrap();

    assert!(resolver
        .resolve(&key.to_string())
        .await
        .unwrap_err()
        .is_no_instances());
}

/// 测试：监听新增、更新、删除
#[tokio::test]
#[ignore]
async fn test_etcd_watch() {
    let registry = Arc::new(create_registry().await);
    let key = unique_key("watch");
    let resolver = PolarisResolver::new(registry.clone());
    let token = CancellationToken::new();
    let desc = key.to_string();

    registry
        .put_instance(&key, &create_test_instance("node-1", 8080, 5))
        .await
        .unwrap();

    // 新增
    let handle = {
        let resolver = resolver.clone();
        let token = token.clone();
        let desc = desc.clone();
        tokio::spawn(async move { resolver.watch(&token, &desc).await })
    };
    sleep(Duration::from_millis(300)).await;
    registry
        .put_instance(&key, &create_test_instance("node-2", 8081, 5))
        .await
        .unwrap();
    let change = timeout(Duration::from_secs(5), handle)
        .await
        .expect("No add event received")
        .unwrap()
        .unwrap();
    assert_eq!(change.added.len(), 1);
    assert_eq!(change.added[0].address(), "127.0.0.1:8081");
    assert_eq!(change.result.endpoints.len(), 1);

    // 更新
    let handle = {
        let resolver = resolver.clone();
        let token = token.clone();
        let desc = desc.clone();
        tokio::spawn(async move { resolver.watch(&token, &desc).await })
    };
    sleep(Duration::from_millis(300)).await;
    registry
        .put_instance(&key, &create_test_instance("node-2", 8081, 0))
        .await
        .unwrap();
    let change = timeout(Duration::from_secs(5), handle)
        .await
        .expect("No update event received")
        .unwrap()
        .unwrap();
    assert_eq!(change.updated.len(), 1);
    assert_eq!(change.updated[0].weight(), 10);

    // 删除
    let handle = {
        let resolver = resolver.clone();
        let token = token.clone();
        let desc = desc.clone();
        tokio::spawn(async move { resolver.watch(&token, &desc).await })
    };
    sleep(Duration::from_millis(300)).await;
    registry.delete_instance(&key, "node-2").await.unwrap();
    let change = timeout(Duration::from_secs(5), handle)
        .await
        .expect("No delete event received")
        .unwrap()
        .unwrap();
    assert_eq!(change.removed.len(), 1);
    assert_eq!(change.removed[0].address(), "127.0.0.1:8081");

    registry.delete_instance(&key, "node-1").await.unwrap();
}

/// 测试：取消监听
#[tokio::test]
#[ignore]
async fn test_etcd_watch_cancel() {
    let registry = Arc::new(create_registry().await);
    let key = unique_key("cancel");
    let resolver = PolarisResolver::new(registry.clone());
    let token = CancellationToken::new();

    let handle = {
        let resolver = resolver.clone();
        let token = token.clone();
        let desc = key.to_string();
        tokio::spawn(async move { resolver.watch(&token, &desc).await })
    };
    sleep(Duration::from_millis(300)).await;
    token.cancel();

    let change = timeout(Duration::from_secs(5), handle)
        .await
        .expect("Watch did not stop")
        .unwrap()
        .unwrap();
    assert!(change.is_empty());

    // 空服务的快照查询
    let instances = registry.get_instances(&key).await.unwrap();
    assert!(instances.is_empty());
}
