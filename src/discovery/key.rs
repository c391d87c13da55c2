//! 服务标识
//!
//! 将调用方的服务描述转换为 `namespace:service` 形式的规范字符串，
//! 并在解析、监听时再拆回 [`ServiceKey`]

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ResolveError;

/// 默认命名空间
pub const DEFAULT_NAMESPACE: &str = "default";

/// 命名空间与服务名之间的分隔符
pub const KEY_SEPARATOR: char = ':';

/// 命名空间标签名
pub const NAMESPACE_TAG: &str = "namespace";

/// 服务键（缓存键 + 注册中心查询键）
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey {
    pub namespace: String,
    pub service: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
        }
    }

    /// 从规范字符串解析，按第一个 `:` 拆分
    ///
    /// 服务名中允许出现 `:`，命名空间中不允许
    pub fn parse(desc: &str) -> Result<Self, ResolveError> {
        match desc.split_once(KEY_SEPARATOR) {
            Some((namespace, service)) if !namespace.is_empty() && !service.is_empty() => {
                Ok(Self::new(namespace, service))
            }
            _ => Err(ResolveError::InvalidDescription(desc.to_string())),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, KEY_SEPARATOR, self.service)
    }
}

impl FromStr for ServiceKey {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 调用方提供的服务描述（服务名 + 标签）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub service_name: String,
    pub tags: HashMap<String, String>,
}

impl TargetInfo {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tags: HashMap::new(),
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 设置命名空间标签
    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        self.with_tag(NAMESPACE_TAG, namespace)
    }

    /// 查询标签
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// 生成规范服务描述 `namespace:service`
///
/// 没有命名空间标签、标签为空、或标签包含分隔符时，一律回退到 `default_namespace`，
/// 保证生成的字符串可以按第一个 `:` 无歧义地拆回 [`ServiceKey`]
pub fn target(info: &TargetInfo, default_namespace: &str) -> String {
    let namespace = match info.tag(NAMESPACE_TAG) {
        None => default_namespace,
        Some("") => {
            warn!(service = %info.service_name, "Empty namespace tag, using default namespace");
            default_namespace
        }
        Some(ns) if ns.contains(KEY_SEPARATOR) => {
            warn!(
                service = %info.service_name,
                namespace = %ns,
                "Namespace tag contains key separator, using default namespace"
            );
            default_namespace
        }
        Some(ns) => ns,
    };

    ServiceKey::new(namespace, info.service_name.as_str()).to_string()
}
