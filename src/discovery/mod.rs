//! 服务发现解析模块
//!
//! 将服务描述解析为端点集合，并监听注册中心的成员变化，
//! 转换为统一的新增/更新/移除变更记录

pub mod backend;
pub mod change;
pub mod instance;
pub mod key;
pub mod resolver;
pub mod stream;

pub use backend::{
    EventType, InstanceEvent, InstanceUpdate, RecordChange, RegistryBackend, ServiceEvent,
    SubscribeEvent, WatchResponse, create_backend,
};
pub use backend::memory::InMemoryRegistry;
#[cfg(feature = "etcd")]
pub use backend::etcd::EtcdRegistry;
pub use change::{Change, ResolveResult, diff};
pub use instance::{DEFAULT_WEIGHT, Endpoint, RawInstance, translate};
pub use key::{DEFAULT_NAMESPACE, KEY_SEPARATOR, ServiceKey, TargetInfo, target};
pub use resolver::{PolarisResolver, RESOLVER_NAME, Resolver, ResolverOptions, WatchResolver};
pub use stream::ChangeStream;
