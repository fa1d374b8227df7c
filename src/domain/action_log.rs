// ==========================================
// 在线课程后台 - 操作日志领域模型
// ==========================================
// 用途: 审计追踪 (谁在何时调整了哪些课时)
// 说明: 引擎本身不写日志，由 API 层在成功后写入
// ==========================================

use crate::domain::class_item::ClassRef;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID (UUID)
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub module_id: Option<i64>,          // 关联模块
    pub subject_ids: Vec<String>,        // 受影响课时 (如 VIDEO#12)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ReorderModule,   // 批量重排
    MoveClass,       // 单课时移动
    InsertClass,     // 新增课时
    RemoveClass,     // 删除课时
    PurgeScratch,    // 清理遗留临时模块
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReorderModule => "REORDER_MODULE",
            ActionType::MoveClass => "MOVE_CLASS",
            ActionType::InsertClass => "INSERT_CLASS",
            ActionType::RemoveClass => "REMOVE_CLASS",
            ActionType::PurgeScratch => "PURGE_SCRATCH",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REORDER_MODULE" => Some(ActionType::ReorderModule),
            "MOVE_CLASS" => Some(ActionType::MoveClass),
            "INSERT_CLASS" => Some(ActionType::InsertClass),
            "REMOVE_CLASS" => Some(ActionType::RemoveClass),
            "PURGE_SCRATCH" => Some(ActionType::PurgeScratch),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            module_id: None,
            subject_ids: Vec::new(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_module(mut self, module_id: i64) -> Self {
        self.module_id = Some(module_id);
        self
    }

    pub fn with_subjects(mut self, subjects: &[ClassRef]) -> Self {
        self.subject_ids = subjects.iter().map(|s| s.to_string()).collect();
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn action_type(&self) -> Option<ActionType> {
        ActionType::parse(&self.action_type)
    }
}
