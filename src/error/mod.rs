//! 解析器错误处理模块
//!
//! 区分空实例（`NoInstances`）与注册中心调用失败（`Registry`），
//! 两者都直接返回给调用方，由调用方决定重试策略

pub mod code;
pub mod resolve_error;

pub use code::ErrorCode;
pub use resolve_error::{ConfigError, RegistryError, ResolveError};
