//! 注册中心后端抽象和实现

#[cfg(feature = "etcd")]
pub mod etcd;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::{BackendType, RegistryConfig};
use crate::discovery::instance::RawInstance;
use crate::discovery::key::ServiceKey;
use crate::error::{ConfigError, RegistryError};

/// 注册中心后端 trait
///
/// 解析器只依赖这两个操作；客户端句柄在构造时创建一次，之后在所有调用间只读共享
/// 注意：由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// 查询服务当前的全部实例（一次往返）
    async fn get_instances(&self, key: &ServiceKey) -> Result<Vec<RawInstance>, RegistryError>;

    /// 订阅服务变化
    ///
    /// 返回订阅时刻的完整快照和后续事件通道。接收端被丢弃后，后端应停止推送并回收订阅
    async fn watch_service(&self, key: &ServiceKey) -> Result<WatchResponse, RegistryError>;
}

/// 订阅应答
#[derive(Debug)]
pub struct WatchResponse {
    /// 订阅时刻的全部实例
    pub all_instances: Vec<RawInstance>,

    /// 后续事件通道
    pub events: mpsc::Receiver<SubscribeEvent>,
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// 实例成员变化
    Instance,
    /// 服务级别事件（如订阅被注册中心重置）
    Service,
}

/// 订阅事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeEvent {
    Instance(InstanceEvent),
    Service(ServiceEvent),
}

impl SubscribeEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            SubscribeEvent::Instance(_) => EventType::Instance,
            SubscribeEvent::Service(_) => EventType::Service,
        }
    }
}

/// 实例成员变化事件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceEvent {
    pub added: Vec<RawInstance>,
    pub updated: Vec<InstanceUpdate>,
    pub deleted: Vec<RawInstance>,
}

impl InstanceEvent {
    pub fn added(instances: Vec<RawInstance>) -> Self {
        Self {
            added: instances,
            ..Default::default()
        }
    }

    pub fn deleted(instances: Vec<RawInstance>) -> Self {
        Self {
            deleted: instances,
            ..Default::default()
        }
    }

    pub fn updated(updates: Vec<InstanceUpdate>) -> Self {
        Self {
            updated: updates,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// 将一批键值记录变化合并为一个实例事件
    ///
    /// - 写入且有前值：更新
    /// - 写入无前值：新增
    /// - 删除且有前值：删除；无前值时无法还原实例，跳过
    pub fn from_records(records: impl IntoIterator<Item = RecordChange>) -> Self {
        let mut event = Self::default();

        for record in records {
            match record {
                RecordChange::Put { current: None, .. } => {}
                RecordChange::Put {
                    prev: Some(before),
                    current: Some(after),
                } => event.updated.push(InstanceUpdate { before, after }),
                RecordChange::Put {
                    prev: None,
                    current: Some(after),
                } => event.added.push(after),
                RecordChange::Delete { prev: Some(removed), .. } => event.deleted.push(removed),
                RecordChange::Delete { key, prev: None } => {
                    warn!(key = %key, "Delete event without previous value, skipping");
                }
            }
        }

        event
    }
}

/// 已解码的键值记录变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// 写入；`current` 为 `None` 表示新值无法解码
    Put {
        prev: Option<RawInstance>,
        current: Option<RawInstance>,
    },
    /// 删除
    Delete {
        key: String,
        prev: Option<RawInstance>,
    },
}

/// 实例更新（前后值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceUpdate {
    pub before: RawInstance,
    pub after: RawInstance,
}

/// 服务级别事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub key: ServiceKey,
    pub reason: String,
}

/// 根据配置创建注册中心后端
pub async fn create_backend(
    config: &RegistryConfig,
) -> Result<Arc<dyn RegistryBackend>, ConfigError> {
    match config.backend {
        BackendType::Memory => {
            let registry = memory::InMemoryRegistry::with_buffer(config.event_buffer);
            for seed in &config.instances {
                let key = ServiceKey::new(seed.namespace.as_str(), seed.service.as_str());
                registry.register(&key, seed.instance.clone()).await;
            }
            Ok(Arc::new(registry))
        }
        #[cfg(feature = "etcd")]
        BackendType::Etcd => {
            let registry = etcd::EtcdRegistry::new(config)
                .await
                .map_err(|e| ConfigError::Invalid(format!("failed to connect etcd: {}", e)))?;
            Ok(Arc::new(registry))
        }
        #[cfg(not(feature = "etcd"))]
        BackendType::Etcd => Err(ConfigError::Invalid(
            "etcd backend requires the `etcd` feature".to_string(),
        )),
    }
}
