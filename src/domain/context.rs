// ==========================================
// 在线课程后台 - 操作上下文
// ==========================================
// 每次引擎/API 调用显式传入，不依赖全局会话状态
// ==========================================

use serde::{Deserialize, Serialize};

/// 编辑操作上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditContext {
    /// 操作人 (管理员标识)
    pub actor: String,
}

impl EditContext {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    /// 本地维护工具使用的系统身份
    pub fn system() -> Self {
        Self::new("system")
    }

    /// 审计记录中使用的操作人 (空白时回落为 system)
    pub fn actor_or_system(&self) -> &str {
        let trimmed = self.actor.trim();
        if trimmed.is_empty() {
            "system"
        } else {
            trimmed
        }
    }
}
