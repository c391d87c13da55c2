//! 解析器错误类型

use super::code::ErrorCode;
use crate::discovery::key::ServiceKey;
use thiserror::Error;

/// 注册中心错误
///
/// 由注册中心后端在查询或订阅失败时返回，解析器原样透传，不做重试
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 注册中心不可达（网络、连接等）
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// 订阅的事件通道已关闭
    #[error("watch channel closed for {0}")]
    WatchClosed(String),

    /// 实例记录编解码失败
    #[error("instance codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// etcd 客户端错误
    #[cfg(feature = "etcd")]
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),
}

impl RegistryError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::Unavailable(_) => ErrorCode::RegistryUnavailable,
            RegistryError::WatchClosed(_) => ErrorCode::WatchClosed,
            RegistryError::Codec(_) => ErrorCode::RegistryCodecError,
            #[cfg(feature = "etcd")]
            RegistryError::Etcd(_) => ErrorCode::RegistryUnavailable,
        }
    }
}

/// 解析器错误
#[derive(Error, Debug)]
pub enum ResolveError {
    /// 注册中心正常应答，但实例列表为空
    #[error("no instance remains for {key}")]
    NoInstances { key: ServiceKey },

    /// 查询或订阅调用本身失败
    #[error("registry call failed for {key}: {source}")]
    Registry {
        key: ServiceKey,
        #[source]
        source: RegistryError,
    },

    /// 服务描述无法解析为 `namespace:service`
    #[error("invalid service description: {0:?}")]
    InvalidDescription(String),
}

impl ResolveError {
    /// 创建注册中心错误
    pub fn registry(key: &ServiceKey, source: RegistryError) -> Self {
        ResolveError::Registry {
            key: key.clone(),
            source,
        }
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::NoInstances { .. } => ErrorCode::NoInstances,
            ResolveError::Registry { source, .. } => source.code(),
            ResolveError::InvalidDescription(_) => ErrorCode::InvalidDescription,
        }
    }

    /// 是否为空实例错误
    pub fn is_no_instances(&self) -> bool {
        matches!(self, ResolveError::NoInstances { .. })
    }

    /// 是否为注册中心调用错误
    pub fn is_registry(&self) -> bool {
        matches!(self, ResolveError::Registry { .. })
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ConfigurationError
    }
}
