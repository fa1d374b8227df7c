// ==========================================
// 在线课程后台 - 模块领域模型
// ==========================================
// 模块是课时排序的命名空间
// 临时模块 (is_scratch) 只在一次重排事务内用于停放被挤出的课时
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Module - 课程模块
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub module_id: i64,
    pub name: String,
    pub is_scratch: bool,          // 临时停放模块，不对用户展示
    pub created_at: NaiveDateTime,
}

impl Module {
    /// 是否为普通 (对用户可见的) 模块
    pub fn is_visible(&self) -> bool {
        !self.is_scratch
    }
}
