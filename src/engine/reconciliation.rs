// ==========================================
// 在线课程后台 - 位置协调引擎
// ==========================================
// 职责: 在单个事务内把一批移动请求落到目标模块
// 红线:
// - 任何时刻 (id_module, class_order) 唯一，绝不出现两个课时共享槽位
// - 批次整体成功或整体回滚
// - 请求严格按提交顺序处理，引擎不排序
// 流程: 校验 → 解析身份 → 逐条落位(冲突挤出到临时模块) → 收尾安置 → 回收临时模块
// ==========================================

use crate::config::{OrphanPolicy, ReorderConfig};
use crate::domain::class_item::{ClassItem, ClassRef, SlotKey};
use crate::domain::context::EditContext;
use crate::domain::reorder::{MoveRequest, OrphanPlacement, ReconciliationReport};
use crate::engine::conflict_resolver::ConflictResolver;
use crate::engine::error::{ReorderError, ReorderResult};
use crate::engine::ledger::EvictionLedger;
use crate::engine::scratch::ScratchModuleAllocator;
use crate::perf::PerfGuard;
use crate::repository::{ClassPositionRepository, ModuleRepository};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

// ==========================================
// ReconciliationEngine
// ==========================================
pub struct ReconciliationEngine {
    conn: Arc<Mutex<Connection>>,
    config: ReorderConfig,
}

impl ReconciliationEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, config: ReorderConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &ReorderConfig {
        &self.config
    }

    fn get_conn(&self) -> ReorderResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReorderError::PersistenceError(format!("连接锁获取失败: {}", e)))
    }

    /// 应用一批移动请求
    ///
    /// # 返回
    /// - `Ok(true)`: 已提交
    /// - `Err(..)`: 已整体回滚，存储与调用前一致
    pub fn apply_batch(
        &self,
        ctx: &EditContext,
        target_module_id: i64,
        moves: &[MoveRequest],
    ) -> ReorderResult<bool> {
        self.reconcile(ctx, target_module_id, moves).map(|_| true)
    }

    /// 应用一批移动请求并返回执行摘要
    pub fn reconcile(
        &self,
        ctx: &EditContext,
        target_module_id: i64,
        moves: &[MoveRequest],
    ) -> ReorderResult<ReconciliationReport> {
        let _perf = PerfGuard::new("reorder.apply_batch");
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match self.reconcile_tx(&tx, target_module_id, moves) {
            Ok(report) => {
                tx.commit()?;
                tracing::info!(
                    actor = ctx.actor_or_system(),
                    module_id = target_module_id,
                    applied = report.applied.len(),
                    skipped = report.skipped,
                    evictions = report.evictions.len(),
                    reclaimed = report.reclaimed_count(),
                    orphans = report.orphan_placements.len(),
                    "reorder batch committed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(
                    actor = ctx.actor_or_system(),
                    module_id = target_module_id,
                    error = %e,
                    "reorder batch failed, rolling back"
                );
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// 事务内执行批次（调用方负责提交/回滚）
    pub(crate) fn reconcile_tx(
        &self,
        conn: &Connection,
        target_module_id: i64,
        moves: &[MoveRequest],
    ) -> ReorderResult<ReconciliationReport> {
        validate_batch(target_module_id, moves)?;
        if !ModuleRepository::exists_tx(conn, target_module_id)? {
            return Err(ReorderError::NotFound(format!("模块(id={})", target_module_id)));
        }

        let movers = resolve_movers(conn, moves)?;

        let mut report = ReconciliationReport::new(target_module_id);
        let mut allocator = ScratchModuleAllocator::new(&self.config);
        let mut ledger = EvictionLedger::new();

        for (request, mover) in moves.iter().zip(movers) {
            let Some(mover) = mover else {
                report.skipped += 1;
                continue;
            };
            let item = mover.class_ref();
            let slot_key = request.target_slot();

            // 该课时先前被挤出 → 从临时模块认领
            let live_slot = match ledger.reclaim(request.current_slot()) {
                Some(record) if record.evicted == item => record.parked_slot(),
                Some(record) => {
                    return Err(ReorderError::ConstraintViolation(format!(
                        "槽位{}的挤出记录属于{}，与请求课时{}不符",
                        record.slot_key, record.evicted, item
                    )))
                }
                None => mover.slot(),
            };

            if let Some(occupant) = ClassPositionRepository::occupant_at_tx(conn, slot_key)? {
                if occupant.class_ref() != item {
                    let eviction = ConflictResolver::evict(conn, &mut allocator, slot_key)?;
                    ledger.record(slot_key, eviction.scratch_module_id, &eviction.occupant)?;
                }
            }

            if live_slot.module_id != target_module_id {
                ClassPositionRepository::write_tx(conn, item, SlotKey::neutral(target_module_id))?;
            }
            ClassPositionRepository::write_tx(conn, item, slot_key)?;

            tracing::debug!(item = %item, from = %live_slot, to = %slot_key, "item placed");
            report.applied.push(item);
        }

        // 收尾: 未被认领的挤出课时
        for slot_key in ledger.pending_slots() {
            let Some(record) = ledger.mark_orphaned(slot_key) else {
                continue;
            };
            let placement = place_orphan(
                conn,
                target_module_id,
                record.evicted,
                record.parked_slot(),
                self.config.orphan_policy,
            )?;
            tracing::info!(item = %placement.item(), slot = %placement.slot(), "orphan placed");
            report.orphan_placements.push(placement);
        }

        report.scratch_allocated = allocator.allocated().to_vec();
        if self.config.dispose_scratch_modules {
            report.scratch_disposed = allocator.dispose(conn)?;
        }
        report.evictions = ledger.into_records();

        Ok(report)
    }
}

// ==========================================
// 输入校验 (任何写入之前)
// ==========================================
fn validate_batch(target_module_id: i64, moves: &[MoveRequest]) -> ReorderResult<()> {
    if target_module_id <= 0 {
        return Err(ReorderError::ValidationError(format!(
            "目标模块ID必须为正整数: {}",
            target_module_id
        )));
    }
    if moves.is_empty() {
        return Err(ReorderError::ValidationError("移动请求列表为空".to_string()));
    }

    let mut targets = HashSet::with_capacity(moves.len());
    let mut currents = HashSet::with_capacity(moves.len());
    for (idx, request) in moves.iter().enumerate() {
        if request.current_module_id <= 0
            || request.current_position <= 0
            || request.target_module_id <= 0
            || request.target_position <= 0
        {
            return Err(ReorderError::ValidationError(format!(
                "第{}条请求包含非正的模块ID或位置: {:?}",
                idx + 1,
                request
            )));
        }
        if request.target_module_id != target_module_id {
            return Err(ReorderError::ValidationError(format!(
                "第{}条请求的目标模块{}与批次模块{}不一致",
                idx + 1,
                request.target_module_id,
                target_module_id
            )));
        }
        if !targets.insert(request.target_slot()) {
            return Err(ReorderError::ValidationError(format!(
                "目标槽位{}被重复指定",
                request.target_slot()
            )));
        }
        if !currents.insert(request.current_slot()) {
            return Err(ReorderError::ValidationError(format!(
                "当前槽位{}被重复指定",
                request.current_slot()
            )));
        }
    }
    Ok(())
}

/// 按批次前的布局解析每条请求对应的课时（空操作为 None）
fn resolve_movers(conn: &Connection, moves: &[MoveRequest]) -> ReorderResult<Vec<Option<ClassItem>>> {
    moves
        .iter()
        .map(|request| {
            if request.is_noop() {
                return Ok(None);
            }
            match ClassPositionRepository::occupant_at_tx(conn, request.current_slot())? {
                Some(item) if item.kind() == request.item_kind => Ok(Some(item)),
                Some(item) => Err(ReorderError::NotFound(format!(
                    "槽位{}上是{}，不是{}",
                    request.current_slot(),
                    item.class_ref(),
                    request.item_kind
                ))),
                None => Err(ReorderError::NotFound(format!(
                    "槽位{}上没有{}",
                    request.current_slot(),
                    request.item_kind
                ))),
            }
        })
        .collect()
}

/// 安置一个未被认领的挤出课时
///
/// 挤出只发生在某条请求的目标槽位上，该槽位此后由这条请求的课时占据，
/// 因此原位在收尾时必然被占用，直接按 `OrphanPolicy` 处理。
fn place_orphan(
    conn: &Connection,
    module_id: i64,
    item: ClassRef,
    parked: SlotKey,
    policy: OrphanPolicy,
) -> ReorderResult<OrphanPlacement> {
    match policy {
        OrphanPolicy::AppendToEnd => {
            let highest = ClassPositionRepository::highest_position_tx(conn, module_id)?;
            let slot = SlotKey::new(module_id, highest.max(0) + 1);
            ClassPositionRepository::write_tx(conn, item, slot)?;
            Ok(OrphanPlacement::Appended { item, slot })
        }
        OrphanPolicy::KeepInScratch => Ok(OrphanPlacement::KeptInScratch { item, slot: parked }),
    }
}
