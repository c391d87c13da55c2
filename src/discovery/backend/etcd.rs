//! etcd 注册中心后端
//!
//! 键布局：`[{key_prefix}/]{namespace}/services/{service}/{instance_id}`，值为 JSON 编码的 [`RawInstance`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, EventType as EtcdEventType, GetOptions, KeyValue, WatchOptions};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::discovery::backend::{
    InstanceEvent, RecordChange, RegistryBackend, ServiceEvent, SubscribeEvent, WatchResponse,
};
use crate::discovery::instance::RawInstance;
use crate::discovery::key::ServiceKey;
use crate::error::RegistryError;

/// etcd 注册中心后端
pub struct EtcdRegistry {
    client: Arc<Mutex<Client>>,
    key_prefix: String,
    event_buffer: usize,
}

impl EtcdRegistry {
    /// 连接 etcd
    pub async fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        if config.endpoints.is_empty() {
            return Err(RegistryError::Unavailable(
                "etcd endpoints not configured".to_string(),
            ));
        }

        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        let client = Client::connect(&config.endpoints, Some(options)).await?;

        info!(endpoints = ?config.endpoints, "Connected to etcd registry");

        Ok(Self::from_client(client, config.key_prefix.as_str(), config.event_buffer))
    }

    /// 使用已有客户端创建
    pub fn from_client(client: Client, key_prefix: &str, event_buffer: usize) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            key_prefix: key_prefix.trim_matches('/').to_string(),
            event_buffer: event_buffer.max(1),
        }
    }

    /// 服务下所有实例的键前缀
    pub fn service_prefix(&self, key: &ServiceKey) -> String {
        if self.key_prefix.is_empty() {
            format!("{}/services/{}/", key.namespace, key.service)
        } else {
            format!("{}/{}/services/{}/", self.key_prefix, key.namespace, key.service)
        }
    }

    fn instance_key(&self, key: &ServiceKey, instance_id: &str) -> String {
        format!("{}{}", self.service_prefix(key), instance_id)
    }

    /// 写入实例（注册方使用，不包含续约）
    pub async fn put_instance(
        &self,
        key: &ServiceKey,
        instance: &RawInstance,
    ) -> Result<(), RegistryError> {
        let value = serde_json::to_vec(instance)?;
        let mut client = self.client.lock().await;
        client.put(self.instance_key(key, &instance.id), value, None).await?;
        Ok(())
    }

    /// 删除实例
    pub async fn delete_instance(
        &self,
        key: &ServiceKey,
        instance_id: &str,
    ) -> Result<(), RegistryError> {
        let mut client = self.client.lock().await;
        client.delete(self.instance_key(key, instance_id), None).await?;
        Ok(())
    }
}

#[async_trait]
impl RegistryBackend for EtcdRegistry {
    async fn get_instances(&self, key: &ServiceKey) -> Result<Vec<RawInstance>, RegistryError> {
        let prefix = self.service_prefix(key);
        let mut client = self.client.lock().await;
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;

        Ok(resp.kvs().iter().filter_map(decode_instance).collect())
    }

    async fn watch_service(&self, key: &ServiceKey) -> Result<WatchResponse, RegistryError> {
        let prefix = self.service_prefix(key);

        let (all_instances, watcher, mut stream) = {
            let mut client = self.client.lock().await;
            let resp = client
                .get(prefix.clone(), Some(GetOptions::new().with_prefix()))
                .await?;
            let revision = resp.header().map(|h| h.revision()).unwrap_or(0);
            let all_instances: Vec<RawInstance> =
                resp.kvs().iter().filter_map(decode_instance).collect();

            // 从快照之后的版本开始监听，保证快照与事件之间不丢不重
            let opts = WatchOptions::new()
                .with_prefix()
                .with_prev_key()
                .with_start_revision(revision + 1);
            let (watcher, stream) = client.watch(prefix.clone(), Some(opts)).await?;
            (all_instances, watcher, stream)
        };

        let (tx, rx) = mpsc::channel(self.event_buffer);
        let service_key = key.clone();

        tokio::spawn(async move {
            let mut watcher = watcher;
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!(key = %service_key, "Watch receiver dropped, stopping etcd watch");
                        break;
                    }
                    message = stream.message() => match message {
                        Ok(Some(resp)) => {
                            if resp.canceled() {
                                let reason = resp.cancel_reason().to_string();
                                warn!(key = %service_key, reason = %reason, "etcd watch canceled by server");
                                let _ = tx
                                    .send(SubscribeEvent::Service(ServiceEvent {
                                        key: service_key.clone(),
                                        reason,
                                    }))
                                    .await;
                                break;
                            }

                            let event = collect_instance_event(resp.events());
                            if event.is_empty() {
                                continue;
                            }
                            if tx.send(SubscribeEvent::Instance(event)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!(key = %service_key, "etcd watch stream ended");
                            break;
                        }
                        Err(e) => {
                            warn!(key = %service_key, error = %e, "etcd watch stream failed");
                            break;
                        }
                    }
                }
            }

            if let Err(e) = watcher.cancel().await {
                debug!(key = %service_key, error = %e, "Failed to cancel etcd watcher");
            }
        });

        Ok(WatchResponse {
            all_instances,
            events: rx,
        })
    }
}

fn decode_instance(kv: &KeyValue) -> Option<RawInstance> {
    match serde_json::from_slice::<RawInstance>(kv.value()) {
        Ok(instance) => Some(instance),
        Err(e) => {
            warn!(
                key = %String::from_utf8_lossy(kv.key()),
                error = %e,
                "Skipping undecodable instance record"
            );
            None
        }
    }
}

// 一次 watch 应答中的所有事件合并为一个实例事件
fn collect_instance_event(events: &[etcd_client::Event]) -> InstanceEvent {
    InstanceEvent::from_records(events.iter().map(|ev| {
        let prev = ev.prev_kv().and_then(decode_instance);
        match ev.event_type() {
            EtcdEventType::Put => RecordChange::Put {
                prev,
                current: ev.kv().and_then(decode_instance),
            },
            EtcdEventType::Delete => RecordChange::Delete {
                key: ev
                    .kv()
                    .map(|kv| String::from_utf8_lossy(kv.key()).to_string())
                    .unwrap_or_default(),
                prev,
            },
        }
    }))
}
