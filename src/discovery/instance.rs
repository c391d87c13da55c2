//! 实例定义与转换

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// 默认权重（注册中心上报的权重 <= 0 时使用）
pub const DEFAULT_WEIGHT: u32 = 10;

/// 注册中心上报的原始实例记录
///
/// 字段与 Polaris 实例模型对齐，同时也是 etcd 后端中存储的 JSON 值格式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawInstance {
    /// 实例 ID（注册中心分配）
    #[serde(default)]
    pub id: String,

    /// 主机地址
    pub host: String,

    /// 端口
    pub port: u16,

    /// 协议（如 "tcp", "grpc"）
    #[serde(default)]
    pub protocol: String,

    /// 注册中心上报的权重，可能为 0 或负数
    #[serde(default)]
    pub weight: i32,

    /// 自定义元数据
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// 是否健康
    #[serde(default = "default_healthy")]
    pub healthy: bool,

    /// 是否被隔离
    #[serde(default)]
    pub isolated: bool,

    /// 版本
    #[serde(default)]
    pub version: Option<String>,
}

fn default_healthy() -> bool {
    true
}

impl RawInstance {
    /// 创建新的原始实例
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            id: String::new(),
            host: host.into(),
            port,
            protocol: String::new(),
            weight: 0,
            metadata: HashMap::new(),
            healthy: true,
            isolated: false,
            version: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// 健康且未被隔离
    pub fn is_available(&self) -> bool {
        self.healthy && !self.isolated
    }

    /// `host:port`，IPv6 主机加方括号
    pub fn address(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

/// 可达端点
///
/// 构造后不可变，权重保证为正数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    protocol: String,
    address: String,
    weight: u32,
    tags: HashMap<String, String>,
}

impl Endpoint {
    /// 创建端点，`weight <= 0` 时替换为 `default_weight`
    pub fn new(
        protocol: impl Into<String>,
        address: impl Into<String>,
        weight: i32,
        default_weight: u32,
        tags: HashMap<String, String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            weight: normalize_weight(weight, default_weight),
            tags,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// 查询标签
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl From<&RawInstance> for Endpoint {
    fn from(raw: &RawInstance) -> Self {
        translate(raw, DEFAULT_WEIGHT)
    }
}

/// 将注册中心原始实例转换为端点
pub fn translate(raw: &RawInstance, default_weight: u32) -> Endpoint {
    Endpoint::new(
        raw.protocol.as_str(),
        raw.address(),
        raw.weight,
        default_weight,
        raw.metadata.clone(),
    )
}

/// 权重归一化：非正数使用默认权重
pub fn normalize_weight(weight: i32, default_weight: u32) -> u32 {
    if weight > 0 {
        weight as u32
    } else {
        default_weight.max(1)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
