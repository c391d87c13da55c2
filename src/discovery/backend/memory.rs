//! 内存注册中心后端（用于测试和嵌入式场景）

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

use crate::discovery::backend::{
    InstanceEvent, InstanceUpdate, RegistryBackend, SubscribeEvent, WatchResponse,
};
use crate::discovery::instance::RawInstance;
use crate::discovery::key::ServiceKey;
use crate::error::RegistryError;

/// 默认事件缓冲大小
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct RegistryState {
    services: HashMap<ServiceKey, Vec<RawInstance>>,
    subscribers: HashMap<ServiceKey, Vec<mpsc::Sender<SubscribeEvent>>>,
}

/// 内存注册中心
///
/// 注册、注销会向该服务的所有存活订阅推送实例事件，
/// 订阅方收到事件的顺序与成员修改的顺序一致
#[derive(Clone)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
    // 修改与推送在同一把锁内完成；查询和订阅只需要 state 锁
    publish: Arc<Mutex<()>>,
    unavailable: Arc<AtomicBool>,
    event_buffer: usize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_EVENT_BUFFER)
    }

    /// 指定每个订阅的事件缓冲大小
    pub fn with_buffer(event_buffer: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            publish: Arc::new(Mutex::new(())),
            unavailable: Arc::new(AtomicBool::new(false)),
            event_buffer: event_buffer.max(1),
        }
    }

    /// 模拟注册中心不可用
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 注册实例，同 ID 实例已存在时视为更新
    ///
    /// 未指定 ID 时自动生成，返回实际写入的实例
    pub async fn register(&self, key: &ServiceKey, mut instance: RawInstance) -> RawInstance {
        if instance.id.is_empty() {
            instance.id = uuid::Uuid::new_v4().to_string();
        }

        let _publish = self.publish.lock().await;
        let (event, senders) = {
            let mut state = self.state.write().await;
            let instances = state.services.entry(key.clone()).or_default();
            let event = match instances.iter_mut().find(|i| i.id == instance.id) {
                Some(existing) => {
                    let before = std::mem::replace(existing, instance.clone());
                    InstanceEvent::updated(vec![InstanceUpdate {
                        before,
                        after: instance.clone(),
                    }])
                }
                None => {
                    instances.push(instance.clone());
                    InstanceEvent::added(vec![instance.clone()])
                }
            };
            (event, Self::live_senders(&mut state, key))
        };

        debug!(
            key = %key,
            instance_id = %instance.id,
            address = %instance.address(),
            "Instance registered"
        );
        Self::deliver(senders, SubscribeEvent::Instance(event)).await;
        instance
    }

    /// 注销实例，返回被移除的实例
    pub async fn deregister(&self, key: &ServiceKey, instance_id: &str) -> Option<RawInstance> {
        let _publish = self.publish.lock().await;
        let (removed, senders) = {
            let mut state = self.state.write().await;
            let instances = state.services.get_mut(key)?;
            let pos = instances.iter().position(|i| i.id == instance_id)?;
            let removed = instances.remove(pos);
            (removed, Self::live_senders(&mut state, key))
        };

        debug!(key = %key, instance_id = %instance_id, "Instance deregistered");
        Self::deliver(
            senders,
            SubscribeEvent::Instance(InstanceEvent::deleted(vec![removed.clone()])),
        )
        .await;
        Some(removed)
    }

    /// 直接向订阅方推送事件，不修改成员，返回送达的订阅数
    pub async fn publish(&self, key: &ServiceKey, event: SubscribeEvent) -> usize {
        let _publish = self.publish.lock().await;
        let senders = {
            let mut state = self.state.write().await;
            Self::live_senders(&mut state, key)
        };
        Self::deliver(senders, event).await
    }

    /// 当前存活的订阅数
    pub async fn subscriber_count(&self, key: &ServiceKey) -> usize {
        let mut state = self.state.write().await;
        Self::live_senders(&mut state, key).len()
    }

    /// 当前实例列表
    pub async fn instances(&self, key: &ServiceKey) -> Vec<RawInstance> {
        self.state
            .read()
            .await
            .services
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable(
                "in-memory registry marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    // 清理已关闭的订阅，返回剩余发送端
    fn live_senders(
        state: &mut RegistryState,
        key: &ServiceKey,
    ) -> Vec<mpsc::Sender<SubscribeEvent>> {
        match state.subscribers.get_mut(key) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.clone()
            }
            None => Vec::new(),
        }
    }

    async fn deliver(senders: Vec<mpsc::Sender<SubscribeEvent>>, event: SubscribeEvent) -> usize {
        let mut delivered = 0;
        for tx in senders {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryBackend for InMemoryRegistry {
    async fn get_instances(&self, key: &ServiceKey) -> Result<Vec<RawInstance>, RegistryError> {
        self.check_available()?;
        Ok(self.instances(key).await)
    }

    async fn watch_service(&self, key: &ServiceKey) -> Result<WatchResponse, RegistryError> {
        self.check_available()?;

        // 快照与订阅登记在同一把锁内完成，避免漏掉两者之间的事件
        let mut state = self.state.write().await;
        let all_instances = state.services.get(key).cloned().unwrap_or_default();
        let (tx, rx) = mpsc::channel(self.event_buffer);
        state.subscribers.entry(key.clone()).or_default().push(tx);

        Ok(WatchResponse {
            all_instances,
            events: rx,
        })
    }
}
