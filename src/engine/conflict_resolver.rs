// ==========================================
// 在线课程后台 - 槽位冲突处理
// ==========================================
// 职责: 目标槽位被占用时，把占用者挤出到新的临时模块
// 约束: 占用者在临时模块内保持原位置不变（临时模块初始为空，必然安全）
// ==========================================

use crate::domain::class_item::{ClassItem, SlotKey};
use crate::engine::error::{ReorderError, ReorderResult};
use crate::engine::scratch::ScratchModuleAllocator;
use crate::repository::ClassPositionRepository;
use rusqlite::Connection;

/// 一次挤出的结果
#[derive(Debug, Clone)]
pub struct Eviction {
    pub scratch_module_id: i64,
    /// 挤出前的占用者快照
    pub occupant: ClassItem,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// 挤出槽位占用者
    ///
    /// # 返回
    /// - `Ok(Eviction)`: 占用者已停放到临时模块
    /// - `Err(NotFound)`: 槽位为空（并发写入或调用方数据过期）
    pub fn evict(
        conn: &Connection,
        allocator: &mut ScratchModuleAllocator,
        slot_key: SlotKey,
    ) -> ReorderResult<Eviction> {
        let occupant = ClassPositionRepository::occupant_at_tx(conn, slot_key)?.ok_or_else(|| {
            ReorderError::NotFound(format!("待挤出的槽位{}为空", slot_key))
        })?;

        let scratch_module_id = allocator.allocate(conn)?;
        ClassPositionRepository::write_tx(
            conn,
            occupant.class_ref(),
            SlotKey::new(scratch_module_id, occupant.position),
        )?;

        tracing::debug!(
            slot = %slot_key,
            item = %occupant.class_ref(),
            scratch_module_id,
            "occupant evicted to scratch"
        );

        Ok(Eviction {
            scratch_module_id,
            occupant,
        })
    }
}
