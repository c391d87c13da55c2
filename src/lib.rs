//! Flare Polaris Resolver
//!
//! 基于注册中心的服务发现解析器：规范服务标识、快照解析、变更监听与差异计算。
//! 只产出端点集合和变更增量，负载均衡、熔断、重试由消费方负责。

pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;

// Re-exports
pub use config::{BackendType, LoggingConfig, RegistryConfig, ResolverConfig, SeedInstance};
pub use error::{ConfigError, ErrorCode, RegistryError, ResolveError};

pub use discovery::{
    Change, ChangeStream, Endpoint, InMemoryRegistry, PolarisResolver, RawInstance,
    RegistryBackend, ResolveResult, Resolver, ResolverOptions, ServiceKey, TargetInfo,
    WatchResolver,
};
#[cfg(feature = "etcd")]
pub use discovery::EtcdRegistry;
