//! 服务标识测试

use std::sync::Arc;

use flare_polaris_resolver::discovery::key::{DEFAULT_NAMESPACE, ServiceKey, TargetInfo, target};
use flare_polaris_resolver::{ErrorCode, InMemoryRegistry, PolarisResolver, Resolver};

/// 测试：没有命名空间标签时使用默认命名空间
#[test]
fn test_target_default_namespace() {
    let info = TargetInfo::new("orders");
    assert_eq!(target(&info, DEFAULT_NAMESPACE), "default:orders");
}

/// 测试：显式默认命名空间与缺省结果一致
#[test]
fn test_target_explicit_default_equals_absent() {
    let absent = TargetInfo::new("orders");
    let explicit = TargetInfo::new("orders").with_namespace(DEFAULT_NAMESPACE);

    assert_eq!(
        target(&absent, DEFAULT_NAMESPACE),
        target(&explicit, DEFAULT_NAMESPACE)
    );
}

/// 测试：相同输入得到相同输出
#[test]
fn test_target_deterministic() {
    let info = TargetInfo::new("orders")
        .with_namespace("production")
        .with_tag("cluster", "a");

    let first = target(&info, DEFAULT_NAMESPACE);
    for _ in 0..10 {
        assert_eq!(target(&info.clone(), DEFAULT_NAMESPACE), first);
    }
    assert_eq!(first, "production:orders");
}

/// 测试：非法命名空间标签回退到默认命名空间
#[test]
fn test_target_invalid_namespace_falls_back() {
    let empty = TargetInfo::new("orders").with_namespace("");
    let with_separator = TargetInfo::new("orders").with_namespace("a:b");

    assert_eq!(target(&empty, DEFAULT_NAMESPACE), "default:orders");
    assert_eq!(target(&with_separator, DEFAULT_NAMESPACE), "default:orders");
}

/// 测试：按第一个分隔符拆分
#[test]
fn test_service_key_parse() {
    let key = ServiceKey::parse("default:orders").unwrap();
    assert_eq!(key, ServiceKey::new("default", "orders"));
    assert_eq!(key.to_string(), "default:orders");

    let key: ServiceKey = "prod:grpc:orders".parse().unwrap();
    assert_eq!(key.namespace, "prod");
    assert_eq!(key.service, "grpc:orders");
    assert_eq!(key.to_string(), "prod:grpc:orders");
}

/// 测试：非法描述
#[test]
fn test_service_key_parse_invalid() {
    for desc in ["orders", ":orders", "default:", ""] {
        let err = ServiceKey::parse(desc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDescription, "desc {:?}", desc);
    }
}

/// 测试：target 与 ServiceKey 互相转换
#[test]
fn test_target_roundtrips_through_key() {
    let info = TargetInfo::new("payments").with_namespace("staging");
    let desc = target(&info, DEFAULT_NAMESPACE);
    let key = ServiceKey::parse(&desc).unwrap();

    assert_eq!(key, ServiceKey::new("staging", "payments"));
}

/// 测试：解析器使用配置的默认命名空间
#[test]
fn test_resolver_target_uses_configured_namespace() {
    let resolver = PolarisResolver::with_options(
        Arc::new(InMemoryRegistry::new()),
        flare_polaris_resolver::ResolverOptions {
            default_namespace: "flare".to_string(),
            ..Default::default()
        },
    );

    assert_eq!(resolver.target(&TargetInfo::new("orders")), "flare:orders");
    assert_eq!(resolver.name(), "Polaris");
}
