// ==========================================
// 在线课程后台 - 外部协作者接口
// ==========================================
// 职责: 权限判定与审计写入的 trait 接缝
// 说明: 宿主系统实现 trait；本地工具使用默认实现
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::class_item::ClassRef;
use crate::domain::context::EditContext;
use crate::repository::error::RepositoryResult;
use crate::repository::ActionLogRepository;
use serde_json::Value as JsonValue;

/// 模块编辑权限判定
///
/// API 层在调用引擎前检查；引擎自身不做权限判断
pub trait ModuleEditAuthorizer: Send + Sync {
    /// 操作人是否可以编辑指定模块
    fn may_edit_module(&self, ctx: &EditContext, module_id: i64) -> bool;

    /// 操作人是否可以执行维护操作（清理临时模块等）
    fn may_run_maintenance(&self, ctx: &EditContext) -> bool {
        let _ = ctx;
        false
    }
}

/// 本地管理员: 全部放行（CLI 与测试使用）
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAdminAuthorizer;

impl ModuleEditAuthorizer for LocalAdminAuthorizer {
    fn may_edit_module(&self, _ctx: &EditContext, _module_id: i64) -> bool {
        true
    }

    fn may_run_maintenance(&self, _ctx: &EditContext) -> bool {
        true
    }
}

/// 审计写入
pub trait AuditSink: Send + Sync {
    fn record_action(
        &self,
        ctx: &EditContext,
        kind: ActionType,
        module_id: Option<i64>,
        subject_ids: &[ClassRef],
        payload: Option<JsonValue>,
    ) -> RepositoryResult<()>;
}

/// 默认实现: 写入 action_log 表
impl AuditSink for ActionLogRepository {
    fn record_action(
        &self,
        ctx: &EditContext,
        kind: ActionType,
        module_id: Option<i64>,
        subject_ids: &[ClassRef],
        payload: Option<JsonValue>,
    ) -> RepositoryResult<()> {
        let mut log = ActionLog::new(kind, ctx.actor_or_system()).with_subjects(subject_ids);
        if let Some(module_id) = module_id {
            log = log.with_module(module_id);
        }
        if let Some(payload) = payload {
            log = log.with_payload(&payload);
        }
        self.insert(&log)?;
        Ok(())
    }
}
