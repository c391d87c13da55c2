//! 解析结果与变更记录

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::discovery::instance::Endpoint;
use crate::discovery::key::ServiceKey;

/// 一次快照解析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResult {
    /// 是否可以按 `cache_key` 缓存
    pub cacheable: bool,

    /// 缓存键（即服务键本身）
    pub cache_key: ServiceKey,

    /// 端点列表，保持注册中心上报顺序
    pub endpoints: Vec<Endpoint>,
}

impl ResolveResult {
    /// 创建可缓存的结果
    pub fn cacheable(cache_key: ServiceKey, endpoints: Vec<Endpoint>) -> Self {
        Self {
            cacheable: true,
            cache_key,
            endpoints,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// 将变更增量合并进当前结果，端点按地址匹配
    pub fn apply(&mut self, change: &Change) {
        self.endpoints
            .retain(|ep| !change.removed.iter().any(|r| r.address() == ep.address()));
        for ep in change.added.iter().chain(&change.updated) {
            match self.endpoints.iter_mut().find(|e| e.address() == ep.address()) {
                Some(existing) => *existing = ep.clone(),
                None => self.endpoints.push(ep.clone()),
            }
        }
    }
}

/// 一次成员变更
///
/// `result` 为本次监听打开订阅时的完整快照，不包含 `added`/`updated`/`removed`
/// 中的增量；需要最终一致视图的调用方自行合并（见 [`ResolveResult::apply`]）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub result: ResolveResult,
    pub added: Vec<Endpoint>,
    pub updated: Vec<Endpoint>,
    pub removed: Vec<Endpoint>,
}

impl Change {
    /// 空变更（取消或未分类事件）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 是否没有任何内容
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 增量是否为空
    pub fn has_delta(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// 比较两次解析结果，按地址计算增量
///
/// - 仅出现在 `next` 中的端点记为新增
/// - 仅出现在 `prev` 中的端点记为移除
/// - 两边都有但协议、权重或标签不同的端点记为更新（取 `next` 中的值）
///
/// 返回的 `result` 为以 `cache_key` 为键的 `next`，布尔值表示是否存在增量
pub fn diff(cache_key: &ServiceKey, prev: &ResolveResult, next: &ResolveResult) -> (Change, bool) {
    let prev_by_addr: HashMap<&str, &Endpoint> = prev
        .endpoints
        .iter()
        .map(|ep| (ep.address(), ep))
        .collect();
    let next_by_addr: HashMap<&str, &Endpoint> = next
        .endpoints
        .iter()
        .map(|ep| (ep.address(), ep))
        .collect();

    let mut added = Vec::new();
    let mut updated = Vec::new();
    for ep in &next.endpoints {
        match prev_by_addr.get(ep.address()) {
            None => added.push(ep.clone()),
            Some(old) if *old != ep => updated.push(ep.clone()),
            Some(_) => {}
        }
    }

    let removed: Vec<Endpoint> = prev
        .endpoints
        .iter()
        .filter(|ep| !next_by_addr.contains_key(ep.address()))
        .cloned()
        .collect();

    let change = Change {
        result: ResolveResult {
            cacheable: next.cacheable,
            cache_key: cache_key.clone(),
            endpoints: next.endpoints.clone(),
        },
        added,
        updated,
        removed,
    };
    let changed = change.has_delta();
    (change, changed)
}
