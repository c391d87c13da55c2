//! 解析器配置
//!
//! 示例：
//! ```toml
//! [resolver]
//! default_namespace = "default"
//! default_weight = 10
//!
//! [registry]
//! backend = "etcd"
//! endpoints = ["http://127.0.0.1:2379"]
//! key_prefix = "polaris"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};

use crate::discovery::instance::{DEFAULT_WEIGHT, RawInstance};
use crate::discovery::key::{DEFAULT_NAMESPACE, KEY_SEPARATOR};
use crate::error::ConfigError;

/// 注册中心地址环境变量（逗号分隔），覆盖配置文件
pub const ENV_REGISTRY_ENDPOINTS: &str = "REGISTRY_ENDPOINTS";

/// 注册中心后端类型环境变量，覆盖配置文件
pub const ENV_REGISTRY_BACKEND: &str = "REGISTRY_BACKEND";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolver: ResolverSection,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverSection {
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    #[serde(default = "default_weight")]
    pub default_weight: u32,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            default_weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub backend: BackendType,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// 内存后端的初始实例
    #[serde(default)]
    pub instances: Vec<SeedInstance>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            endpoints: Vec::new(),
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            event_buffer: default_event_buffer(),
            instances: Vec::new(),
        }
    }
}

/// 后端类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Etcd,
    Memory,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "etcd" => Ok(BackendType::Etcd),
            "memory" | "mem" | "in-memory" => Ok(BackendType::Memory),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

/// 内存后端初始实例
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedInstance {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub service: String,
    #[serde(flatten)]
    pub instance: RawInstance,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_weight() -> u32 {
    DEFAULT_WEIGHT
}

fn default_key_prefix() -> String {
    "polaris".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_event_buffer() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ResolverConfig {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 解析 TOML 并应用环境变量覆盖
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ResolverConfig = toml::from_str(content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoints) = std::env::var(ENV_REGISTRY_ENDPOINTS) {
            self.registry.endpoints = endpoints
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(backend) = std::env::var(ENV_REGISTRY_BACKEND) {
            self.registry.backend = backend.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ns = &self.resolver.default_namespace;
        if ns.is_empty() || ns.contains(KEY_SEPARATOR) {
            return Err(ConfigError::Invalid(format!(
                "default_namespace must be non-empty and must not contain '{}'",
                KEY_SEPARATOR
            )));
        }
        if self.resolver.default_weight == 0 {
            return Err(ConfigError::Invalid(
                "default_weight must be positive".to_string(),
            ));
        }
        if self.registry.backend == BackendType::Etcd && self.registry.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "etcd backend requires at least one endpoint".to_string(),
            ));
        }
        Ok(())
    }
}
