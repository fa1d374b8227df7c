// ==========================================
// 在线课程后台 - 模块内容编辑 API
// ==========================================
// 职责: 权限检查 → 引擎/迁移器 → 审计
// 说明: 插入/删除需要“新增课时 + 位移”或“删除 + 位移”在同一事务内完成，
//       因此直接组合事务内的仓储与引擎函数
// 审计: 成功后写入；写入失败只记告警，不影响已提交的结果
// ==========================================

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::api::collaborators::{AuditSink, ModuleEditAuthorizer};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionType;
use crate::domain::class_item::{ClassContent, ClassItem, ClassRef, SlotKey};
use crate::domain::context::EditContext;
use crate::domain::module::Module;
use crate::domain::reorder::{MoveRequest, ReconciliationReport};
use crate::engine::error::{ReorderError, ReorderResult};
use crate::engine::scratch::generate_scratch_name;
use crate::engine::{ReconciliationEngine, RelocationOutcome, SingleItemRelocator};
use crate::perf::PerfGuard;
use crate::repository::{ClassPositionRepository, ModuleRepository};

// ==========================================
// 响应结构
// ==========================================

/// 模块内容视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleContentView {
    pub module: Module,
    pub items: Vec<ClassItem>,
}

/// 删除课时结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveClassOutcome {
    pub removed: ClassItem,
    /// 因补位而前移的课时数量
    pub shifted: usize,
}

// ==========================================
// ModuleContentApi
// ==========================================
pub struct ModuleContentApi {
    conn: Arc<Mutex<Connection>>,
    module_repo: Arc<ModuleRepository>,
    position_repo: Arc<ClassPositionRepository>,
    engine: Arc<ReconciliationEngine>,
    relocator: Arc<SingleItemRelocator>,
    authorizer: Arc<dyn ModuleEditAuthorizer>,
    audit: Arc<dyn AuditSink>,
}

impl ModuleContentApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        module_repo: Arc<ModuleRepository>,
        position_repo: Arc<ClassPositionRepository>,
        engine: Arc<ReconciliationEngine>,
        relocator: Arc<SingleItemRelocator>,
        authorizer: Arc<dyn ModuleEditAuthorizer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            conn,
            module_repo,
            position_repo,
            engine,
            relocator,
            authorizer,
            audit,
        }
    }

    // ==========================================
    // 重排
    // ==========================================

    /// 批量重排模块内容
    ///
    /// 目标模块与每个来源模块都需要编辑权限
    pub fn reorder_module(
        &self,
        ctx: &EditContext,
        module_id: i64,
        moves: &[MoveRequest],
    ) -> ApiResult<ReconciliationReport> {
        self.ensure_user_module(module_id)?;
        self.ensure_can_edit(ctx, module_id)?;
        let sources: BTreeSet<i64> = moves
            .iter()
            .map(|m| m.current_module_id)
            .filter(|&m| m != module_id)
            .collect();
        for source in sources {
            self.ensure_user_module(source)?;
            self.ensure_can_edit(ctx, source)?;
        }

        let report = self.engine.reconcile(ctx, module_id, moves)?;

        self.record_audit(
            ctx,
            ActionType::ReorderModule,
            Some(module_id),
            &report.touched_items(),
            Some(json!({
                "requests": moves.len(),
                "applied": report.applied.len(),
                "skipped": report.skipped,
                "evictions": report.evictions.len(),
                "reclaimed": report.reclaimed_count(),
                "orphan_placements": report.orphan_placements,
            })),
        );
        Ok(report)
    }

    /// 跨模块迁移单个课时
    pub fn move_class(
        &self,
        ctx: &EditContext,
        item: ClassRef,
        new_module_id: i64,
        new_position: i64,
    ) -> ApiResult<RelocationOutcome> {
        let current = self
            .position_repo
            .find_by_ref(item)?
            .ok_or_else(|| ApiError::NotFound(format!("课时{}不存在", item)))?;
        self.ensure_user_module(current.module_id)?;
        self.ensure_can_edit(ctx, current.module_id)?;
        if new_module_id != current.module_id {
            self.ensure_user_module(new_module_id)?;
            self.ensure_can_edit(ctx, new_module_id)?;
        }

        let outcome = self
            .relocator
            .relocate(ctx, item, new_module_id, new_position)?;

        if !outcome.is_noop() {
            let mut subjects = vec![outcome.item];
            if let Some(displaced) = &outcome.displaced {
                subjects.push(displaced.item);
            }
            self.record_audit(
                ctx,
                ActionType::MoveClass,
                Some(new_module_id),
                &subjects,
                serde_json::to_value(&outcome).ok(),
            );
        }
        Ok(outcome)
    }

    // ==========================================
    // 新增 / 删除
    // ==========================================

    /// 追加课时到模块末尾
    pub fn append_class(
        &self,
        ctx: &EditContext,
        module_id: i64,
        content: ClassContent,
    ) -> ApiResult<ClassItem> {
        self.ensure_user_module(module_id)?;
        self.ensure_can_edit(ctx, module_id)?;

        let item = self.in_transaction("content.append_class", |conn| {
            ensure_module_tx(conn, module_id)?;
            let highest = ClassPositionRepository::highest_position_tx(conn, module_id)?;
            Ok(ClassPositionRepository::insert_item_tx(
                conn,
                &content,
                module_id,
                highest.max(0) + 1,
            )?)
        })?;

        self.record_audit(
            ctx,
            ActionType::InsertClass,
            Some(module_id),
            &[item.class_ref()],
            Some(json!({ "position": item.position, "mode": "append" })),
        );
        Ok(item)
    }

    /// 在指定位置插入课时，原位置及之后的课时后移一位
    pub fn insert_class_at(
        &self,
        ctx: &EditContext,
        module_id: i64,
        position: i64,
        content: ClassContent,
    ) -> ApiResult<ClassItem> {
        if position <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "插入位置必须为正整数: {}",
                position
            )));
        }
        self.ensure_user_module(module_id)?;
        self.ensure_can_edit(ctx, module_id)?;

        let prefix = self.engine.config().scratch_name_prefix.clone();
        let item = self.in_transaction("content.insert_class_at", |conn| {
            ensure_module_tx(conn, module_id)?;

            // 新课时先落在暂存模块，再随位移批次进入目标槽位
            let holding = ModuleRepository::insert_module_tx(conn, &generate_scratch_name(&prefix), true)?;
            let authored = ClassPositionRepository::insert_item_tx(conn, &content, holding, 1)?;

            let mut moves: Vec<MoveRequest> = ClassPositionRepository::read_all_tx(conn, module_id)?
                .into_iter()
                .filter(|existing| existing.position >= position)
                .rev()
                .map(|existing| {
                    MoveRequest::within(existing.kind(), module_id, existing.position, existing.position + 1)
                })
                .collect();
            moves.push(MoveRequest::across(
                authored.kind(),
                authored.slot(),
                SlotKey::new(module_id, position),
            ));

            self.engine.reconcile_tx(conn, module_id, &moves)?;
            ModuleRepository::delete_if_empty_tx(conn, holding)?;

            ClassPositionRepository::find_by_ref_tx(conn, authored.class_ref())?
                .ok_or_else(|| ReorderError::NotFound(format!("课时{}", authored.class_ref())))
        })?;

        self.record_audit(
            ctx,
            ActionType::InsertClass,
            Some(module_id),
            &[item.class_ref()],
            Some(json!({ "position": item.position, "mode": "insert_at" })),
        );
        Ok(item)
    }

    /// 删除课时；close_gap 时后续课时前移一位
    pub fn remove_class(
        &self,
        ctx: &EditContext,
        item: ClassRef,
        close_gap: bool,
    ) -> ApiResult<RemoveClassOutcome> {
        let current = self
            .position_repo
            .find_by_ref(item)?
            .ok_or_else(|| ApiError::NotFound(format!("课时{}不存在", item)))?;
        let module_id = current.module_id;
        self.ensure_user_module(module_id)?;
        self.ensure_can_edit(ctx, module_id)?;

        let removed_position = current.position;
        let shifted = self.in_transaction("content.remove_class", |conn| {
            if !ClassPositionRepository::delete_item_tx(conn, item)? {
                return Err(ReorderError::NotFound(format!("课时{}", item)));
            }
            if !close_gap || removed_position <= 0 {
                return Ok(0);
            }

            let moves: Vec<MoveRequest> = ClassPositionRepository::read_all_tx(conn, module_id)?
                .into_iter()
                .filter(|later| later.position > removed_position)
                .map(|later| MoveRequest::within(later.kind(), module_id, later.position, later.position - 1))
                .collect();
            if moves.is_empty() {
                return Ok(0);
            }
            let report = self.engine.reconcile_tx(conn, module_id, &moves)?;
            Ok(report.applied.len())
        })?;

        self.record_audit(
            ctx,
            ActionType::RemoveClass,
            Some(module_id),
            &[item],
            Some(json!({ "position": removed_position, "close_gap": close_gap, "shifted": shifted })),
        );
        Ok(RemoveClassOutcome {
            removed: current,
            shifted,
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按位置升序列出模块内容
    pub fn list_module(&self, ctx: &EditContext, module_id: i64) -> ApiResult<ModuleContentView> {
        self.ensure_user_module(module_id)?;
        self.ensure_can_edit(ctx, module_id)?;
        let module = self
            .module_repo
            .find_by_id(module_id)?
            .ok_or_else(|| ApiError::NotFound(format!("模块(id={})不存在", module_id)))?;
        let items = self.position_repo.read_all(module_id)?;
        Ok(ModuleContentView { module, items })
    }

    /// 模块内最大位置（空模块为 -1）
    pub fn highest_position(&self, module_id: i64) -> ApiResult<i64> {
        if self.module_repo.find_by_id(module_id)?.is_none() {
            return Err(ApiError::NotFound(format!("模块(id={})不存在", module_id)));
        }
        Ok(self.position_repo.highest_position(module_id)?)
    }

    /// 可见模块列表
    pub fn list_modules(&self) -> ApiResult<Vec<Module>> {
        Ok(self.module_repo.list_visible()?)
    }

    // ==========================================
    // 维护
    // ==========================================

    /// 清理历史遗留的空临时模块
    pub fn purge_scratch_modules(&self, ctx: &EditContext) -> ApiResult<usize> {
        if !self.authorizer.may_run_maintenance(ctx) {
            return Err(ApiError::MaintenanceForbidden(ctx.actor_or_system().to_string()));
        }
        let removed = self.module_repo.purge_empty_scratch()?;
        tracing::info!(actor = ctx.actor_or_system(), removed, "scratch modules purged");

        self.record_audit(
            ctx,
            ActionType::PurgeScratch,
            None,
            &[],
            Some(json!({ "removed": removed })),
        );
        Ok(removed)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 临时模块不对外开放；不存在的模块交由后续步骤报告 NotFound
    fn ensure_user_module(&self, module_id: i64) -> ApiResult<()> {
        match self.module_repo.find_by_id(module_id)? {
            Some(module) if module.is_scratch => Err(ApiError::InvalidInput(format!(
                "模块(id={})是内部临时模块，不可编辑",
                module_id
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_can_edit(&self, ctx: &EditContext, module_id: i64) -> ApiResult<()> {
        if self.authorizer.may_edit_module(ctx, module_id) {
            return Ok(());
        }
        tracing::warn!(actor = ctx.actor_or_system(), module_id, "module edit denied");
        Err(ApiError::Unauthorized {
            actor: ctx.actor_or_system().to_string(),
            module_id,
        })
    }

    fn in_transaction<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> ReorderResult<T>,
    ) -> ReorderResult<T> {
        let _perf = PerfGuard::new(op);
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ReorderError::PersistenceError(format!("连接锁获取失败: {}", e)))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&*tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(op, error = %e, "content edit failed, rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(op, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn record_audit(
        &self,
        ctx: &EditContext,
        kind: ActionType,
        module_id: Option<i64>,
        subjects: &[ClassRef],
        payload: Option<JsonValue>,
    ) {
        if let Err(e) = self
            .audit
            .record_action(ctx, kind, module_id, subjects, payload)
        {
            tracing::warn!(
                action = kind.as_str(),
                module_id = ?module_id,
                error = %e,
                "audit record failed"
            );
        }
    }
}

fn ensure_module_tx(conn: &Connection, module_id: i64) -> ReorderResult<()> {
    if ModuleRepository::exists_tx(conn, module_id)? {
        Ok(())
    } else {
        Err(ReorderError::NotFound(format!("模块(id={})", module_id)))
    }
}
