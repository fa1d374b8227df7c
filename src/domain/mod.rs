// ==========================================
// 在线课程后台 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod class_item;
pub mod context;
pub mod module;
pub mod reorder;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use class_item::{
    ClassContent, ClassItem, ClassKind, ClassRef, SlotKey, EMPTY_MODULE_POSITION,
    NEUTRAL_POSITION,
};
pub use context::EditContext;
pub use module::Module;
pub use reorder::{
    EvictionRecord, EvictionState, MoveRequest, OrphanPlacement, ReconciliationReport,
};
