// ==========================================
// 在线课程后台 - 挤出台账
// ==========================================
// 批次内记录: 哪个槽位的原占用者被挤出、停放在哪个临时模块
// 状态显式化: Pending → Reclaimed (被后续请求认领) / Orphaned (收尾安置)
// ==========================================

use crate::domain::class_item::{ClassItem, SlotKey};
use crate::domain::reorder::{EvictionRecord, EvictionState};
use crate::engine::error::{ReorderError, ReorderResult};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct EvictionLedger {
    records: BTreeMap<SlotKey, EvictionRecord>,
}

impl EvictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次挤出
    pub fn record(
        &mut self,
        slot_key: SlotKey,
        scratch_module_id: i64,
        evicted: &ClassItem,
    ) -> ReorderResult<&EvictionRecord> {
        if let Some(existing) = self.records.get(&slot_key) {
            return Err(ReorderError::ConstraintViolation(format!(
                "槽位{}在同一批次内被重复挤出 (已有 {:?} 记录)",
                slot_key, existing.state
            )));
        }

        let record = EvictionRecord {
            slot_key,
            scratch_module_id,
            evicted: evicted.class_ref(),
            evicted_item_kind: evicted.kind(),
            original_position: evicted.position,
            state: EvictionState::Pending,
        };
        Ok(self.records.entry(slot_key).or_insert(record))
    }

    /// 查询槽位上待认领的记录
    pub fn pending_at(&self, slot_key: SlotKey) -> Option<&EvictionRecord> {
        self.records
            .get(&slot_key)
            .filter(|r| r.state == EvictionState::Pending)
    }

    /// 认领: 记录转为 Reclaimed，返回其副本
    pub fn reclaim(&mut self, slot_key: SlotKey) -> Option<EvictionRecord> {
        let record = self
            .records
            .get_mut(&slot_key)
            .filter(|r| r.state == EvictionState::Pending)?;
        record.state = EvictionState::Reclaimed;
        Some(record.clone())
    }

    /// 仍待认领的槽位（按槽位升序）
    pub fn pending_slots(&self) -> Vec<SlotKey> {
        self.records
            .values()
            .filter(|r| r.state == EvictionState::Pending)
            .map(|r| r.slot_key)
            .collect()
    }

    /// 收尾阶段: 记录转为 Orphaned
    pub fn mark_orphaned(&mut self, slot_key: SlotKey) -> Option<EvictionRecord> {
        let record = self
            .records
            .get_mut(&slot_key)
            .filter(|r| r.state == EvictionState::Pending)?;
        record.state = EvictionState::Orphaned;
        Some(record.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<EvictionRecord> {
        self.records.into_values().collect()
    }
}
