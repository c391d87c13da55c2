//! 基于注册中心的服务解析器
//!
//! - [`Resolver::resolve`]：一次往返获取完整快照
//! - [`WatchResolver::watch`]：打开一次订阅，等待取消或第一个事件后返回
//!
//! `watch` 是单次的：持续观察需要调用方循环调用（或使用 [`PolarisResolver::watch_stream`]），
//! 每次调用都会打开新的订阅

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::discovery::backend::{self, RegistryBackend, SubscribeEvent};
use crate::discovery::change::{self, Change, ResolveResult};
use crate::discovery::instance::{DEFAULT_WEIGHT, Endpoint, RawInstance, translate};
use crate::discovery::key::{self, DEFAULT_NAMESPACE, ServiceKey, TargetInfo};
use crate::discovery::stream::ChangeStream;
use crate::error::{ConfigError, RegistryError, ResolveError};

/// 解析器名称
pub const RESOLVER_NAME: &str = "Polaris";

/// 服务解析器
#[async_trait]
pub trait Resolver: Send + Sync {
    /// 生成规范服务描述
    fn target(&self, target: &TargetInfo) -> String;

    /// 快照解析
    async fn resolve(&self, desc: &str) -> Result<ResolveResult, ResolveError>;

    /// 计算两次解析结果的差异
    fn diff(
        &self,
        cache_key: &ServiceKey,
        prev: &ResolveResult,
        next: &ResolveResult,
    ) -> (Change, bool) {
        change::diff(cache_key, prev, next)
    }

    /// 解析器名称
    fn name(&self) -> &'static str;
}

/// 支持变更监听的解析器
#[async_trait]
pub trait WatchResolver: Resolver {
    /// 等待取消或第一个事件
    ///
    /// - 取消：返回空变更
    /// - 实例事件：返回分类后的增量，`result` 为订阅打开时的快照
    /// - 其他事件：返回空变更
    /// - 订阅失败或事件通道关闭：返回 [`ResolveError::Registry`]
    async fn watch(&self, token: &CancellationToken, desc: &str) -> Result<Change, ResolveError>;
}

/// 解析选项
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// 描述中没有命名空间时使用的命名空间
    pub default_namespace: String,
    /// 实例权重非正数时使用的权重
    pub default_weight: u32,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            default_weight: DEFAULT_WEIGHT,
        }
    }
}

/// Polaris 风格的注册中心解析器
///
/// 注册中心客户端句柄在构造时创建一次，之后在所有 `resolve`/`watch` 调用间只读共享；
/// 每次调用都构造新的本地结果，因此无需加锁
#[derive(Clone)]
pub struct PolarisResolver {
    backend: Arc<dyn RegistryBackend>,
    options: ResolverOptions,
}

impl PolarisResolver {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self::with_options(backend, ResolverOptions::default())
    }

    pub fn with_options(backend: Arc<dyn RegistryBackend>, options: ResolverOptions) -> Self {
        Self { backend, options }
    }

    /// 根据配置创建后端和解析器
    pub async fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = backend::create_backend(&config.registry).await?;
        let options = ResolverOptions {
            default_namespace: config.resolver.default_namespace.clone(),
            default_weight: config.resolver.default_weight,
        };
        info!(
            backend = ?config.registry.backend,
            default_namespace = %options.default_namespace,
            "🔍 Polaris resolver created"
        );
        Ok(Self::with_options(backend, options))
    }

    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }

    /// 持续监听，返回变更流
    ///
    /// 与 [`WatchResolver::watch`] 不同，流在后台保持同一个订阅，逐个推送实例事件，
    /// 直到 `token` 被取消或流被丢弃
    pub fn watch_stream(&self, desc: impl Into<String>, token: CancellationToken) -> ChangeStream {
        ChangeStream::spawn(self.clone(), desc.into(), token)
    }

    /// 以订阅快照构造结果
    pub(crate) fn snapshot(&self, key: &ServiceKey, instances: &[RawInstance]) -> ResolveResult {
        ResolveResult::cacheable(key.clone(), self.translate_all(key, instances))
    }

    fn translate_all(&self, key: &ServiceKey, instances: &[RawInstance]) -> Vec<Endpoint> {
        instances
            .iter()
            .map(|instance| {
                debug!(
                    key = %key,
                    address = %instance.address(),
                    weight = instance.weight,
                    "Instance translated"
                );
                translate(instance, self.options.default_weight)
            })
            .collect()
    }

    pub(crate) fn translate_event(
        &self,
        key: &ServiceKey,
        snapshot: ResolveResult,
        event: SubscribeEvent,
    ) -> Change {
        let event = match event {
            SubscribeEvent::Instance(event) => event,
            other => {
                debug!(
                    key = %key,
                    event_type = ?other.event_type(),
                    "Unclassified event, returning empty change"
                );
                return Change::empty();
            }
        };

        let change = Change {
            result: snapshot,
            added: self.translate_all(key, &event.added),
            updated: event
                .updated
                .iter()
                .map(|update| translate(&update.after, self.options.default_weight))
                .collect(),
            removed: self.translate_all(key, &event.deleted),
        };

        info!(
            key = %key,
            added = change.added.len(),
            updated = change.updated.len(),
            removed = change.removed.len(),
            "Instance event received"
        );
        change
    }
}

#[async_trait]
impl Resolver for PolarisResolver {
    fn target(&self, target: &TargetInfo) -> String {
        key::target(target, &self.options.default_namespace)
    }

    async fn resolve(&self, desc: &str) -> Result<ResolveResult, ResolveError> {
        let key = ServiceKey::parse(desc)?;
        let instances = self
            .backend
            .get_instances(&key)
            .await
            .map_err(|e| ResolveError::registry(&key, e))?;

        // 只返回可达实例：不健康或被隔离的实例不参与解析
        let instances: Vec<RawInstance> = instances
            .into_iter()
            .filter(RawInstance::is_available)
            .collect();
        if instances.is_empty() {
            return Err(ResolveError::NoInstances { key });
        }

        let endpoints = self.translate_all(&key, &instances);
        debug!(key = %key, count = endpoints.len(), "Snapshot resolved");
        Ok(ResolveResult::cacheable(key, endpoints))
    }

    fn name(&self) -> &'static str {
        RESOLVER_NAME
    }
}

#[async_trait]
impl WatchResolver for PolarisResolver {
    async fn watch(&self, token: &CancellationToken, desc: &str) -> Result<Change, ResolveError> {
        let key = ServiceKey::parse(desc)?;
        let mut watch = self
            .backend
            .watch_service(&key)
            .await
            .map_err(|e| ResolveError::registry(&key, e))?;

        // 快照在订阅打开时确定，不随本次事件更新
        let snapshot = self.snapshot(&key, &watch.all_instances);

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(key = %key, "[Polaris resolver] Watch has been finished");
                Ok(Change::empty())
            }
            event = watch.events.recv() => match event {
                Some(event) => Ok(self.translate_event(&key, snapshot, event)),
                None => Err(ResolveError::registry(
                    &key,
                    RegistryError::WatchClosed(key.to_string()),
                )),
            }
        }
    }
}
