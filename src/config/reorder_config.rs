// ==========================================
// 在线课程后台 - 重排引擎配置
// ==========================================
// 存储: config_kv 表 (reorder.* 键)，缺省时使用默认值
// ==========================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 临时模块名称默认前缀
pub const DEFAULT_SCRATCH_PREFIX: &str = "__scratch_";

/// 单批次可分配的临时模块上限
pub const DEFAULT_MAX_SCRATCH_PER_BATCH: usize = 256;

// ==========================================
// OrphanPolicy - 未被认领的挤出课时如何安置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrphanPolicy {
    /// 原位空闲则放回，否则追加到目标模块末尾
    AppendToEnd,
    /// 留在临时模块中，由人工处理
    KeepInScratch,
}

impl OrphanPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrphanPolicy::AppendToEnd => "APPEND_TO_END",
            OrphanPolicy::KeepInScratch => "KEEP_IN_SCRATCH",
        }
    }
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "APPEND_TO_END" => Ok(OrphanPolicy::AppendToEnd),
            "KEEP_IN_SCRATCH" => Ok(OrphanPolicy::KeepInScratch),
            other => Err(format!("未知的 orphan_policy: {}", other)),
        }
    }
}

// ==========================================
// ReorderConfig - 引擎参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderConfig {
    /// 批次结束时删除空的临时模块
    pub dispose_scratch_modules: bool,
    pub orphan_policy: OrphanPolicy,
    pub scratch_name_prefix: String,
    pub max_scratch_per_batch: usize,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            dispose_scratch_modules: true,
            orphan_policy: OrphanPolicy::AppendToEnd,
            scratch_name_prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
            max_scratch_per_batch: DEFAULT_MAX_SCRATCH_PER_BATCH,
        }
    }
}

impl ReorderConfig {
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_scratch_disposal(mut self, dispose: bool) -> Self {
        self.dispose_scratch_modules = dispose;
        self
    }

    pub fn with_max_scratch_per_batch(mut self, max: usize) -> Self {
        self.max_scratch_per_batch = max;
        self
    }
}
