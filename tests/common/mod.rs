//! 测试用注册中心后端

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use flare_polaris_resolver::discovery::{
    InMemoryRegistry, RegistryBackend, ServiceKey, SubscribeEvent, WatchResponse,
};
use flare_polaris_resolver::{RawInstance, RegistryError};

/// 每次订阅的预设行为
pub enum Script {
    /// 预先放入事件，通道保持打开
    Events(Vec<SubscribeEvent>),
    /// 通道立即关闭
    Closed,
    /// 订阅失败
    Fail,
}

/// 按脚本应答订阅的后端，脚本用完后订阅保持挂起
pub struct ScriptedBackend {
    snapshot: Vec<RawInstance>,
    script: Mutex<VecDeque<Script>>,
    parked: Mutex<Vec<mpsc::Sender<SubscribeEvent>>>,
    subscriptions: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new(snapshot: Vec<RawInstance>, script: Vec<Script>) -> Self {
        Self {
            snapshot,
            script: Mutex::new(script.into()),
            parked: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(0),
        }
    }

    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock().unwrap()
    }
}

#[async_trait]
impl RegistryBackend for ScriptedBackend {
    async fn get_instances(&self, _key: &ServiceKey) -> Result<Vec<RawInstance>, RegistryError> {
        Ok(self.snapshot.clone())
    }

    async fn watch_service(&self, key: &ServiceKey) -> Result<WatchResponse, RegistryError> {
        *self.subscriptions.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();

        let (tx, rx) = mpsc::channel(16);
        match next {
            Some(Script::Events(events)) => {
                for event in events {
                    tx.try_send(event).unwrap();
                }
                self.parked.lock().unwrap().push(tx);
            }
            Some(Script::Closed) => drop(tx),
            Some(Script::Fail) => {
                return Err(RegistryError::Unavailable(format!("subscribe {} failed", key)));
            }
            None => self.parked.lock().unwrap().push(tx),
        }

        Ok(WatchResponse {
            all_instances: self.snapshot.clone(),
            events: rx,
        })
    }
}

/// 等待内存注册中心出现订阅
pub async fn wait_for_subscriber(registry: &InMemoryRegistry, key: &ServiceKey) {
    while registry.subscriber_count(key).await == 0 {
        tokio::task::yield_now().await;
    }
}
