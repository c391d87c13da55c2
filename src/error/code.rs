//! 错误代码定义
//!
//! 错误代码按类别分组，每个类别占用1000个代码范围：
//! - 1000-1999: 解析相关错误
//! - 2000-2999: 注册中心相关错误
//! - 6000-6999: 配置相关错误

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 解析相关错误 (1000-1999)
    // ============================================================
    NoInstances = 1000,
    InvalidDescription = 1001,

    // ============================================================
    // 注册中心相关错误 (2000-2999)
    // ============================================================
    RegistryUnavailable = 2000,
    WatchClosed = 2001,
    RegistryCodecError = 2002,

    // ============================================================
    // 配置相关错误 (6000-6999)
    // ============================================================
    ConfigurationError = 6000,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoInstances => "NO_INSTANCES",
            ErrorCode::InvalidDescription => "INVALID_DESCRIPTION",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::WatchClosed => "WATCH_CLOSED",
            ErrorCode::RegistryCodecError => "REGISTRY_CODEC_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// 调用方是否可以通过重新调用恢复
    ///
    /// 重试策略由调用方决定，这里只给出分类提示
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NoInstances | ErrorCode::RegistryUnavailable | ErrorCode::WatchClosed
        )
    }
}
