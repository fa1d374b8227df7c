// ==========================================
// 在线课程后台 - 重排领域模型
// ==========================================
// MoveRequest: 调用方提交的单条移动意图
// EvictionRecord: 批次内的挤出记录 (仅存活于一个事务)
// ReconciliationReport: 批次执行结果摘要
// ==========================================

use crate::domain::class_item::{ClassKind, ClassRef, SlotKey};
use serde::{Deserialize, Serialize};

// ==========================================
// MoveRequest - 移动请求
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub item_kind: ClassKind,
    pub current_module_id: i64,
    pub current_position: i64,
    pub target_module_id: i64,
    pub target_position: i64,
}

impl MoveRequest {
    /// 同模块内调整位置
    pub fn within(item_kind: ClassKind, module_id: i64, from: i64, to: i64) -> Self {
        Self {
            item_kind,
            current_module_id: module_id,
            current_position: from,
            target_module_id: module_id,
            target_position: to,
        }
    }

    /// 跨模块移动
    pub fn across(item_kind: ClassKind, from: SlotKey, to: SlotKey) -> Self {
        Self {
            item_kind,
            current_module_id: from.module_id,
            current_position: from.position,
            target_module_id: to.module_id,
            target_position: to.position,
        }
    }

    pub fn current_slot(&self) -> SlotKey {
        SlotKey::new(self.current_module_id, self.current_position)
    }

    pub fn target_slot(&self) -> SlotKey {
        SlotKey::new(self.target_module_id, self.target_position)
    }

    /// 目标与当前一致 → 空操作
    pub fn is_noop(&self) -> bool {
        self.current_slot() == self.target_slot()
    }
}

// ==========================================
// EvictionState - 挤出记录状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvictionState {
    Pending,   // 已停放在临时模块，等待认领
    Reclaimed, // 被批次内后续请求认领
    Orphaned,  // 批次结束仍未认领，由收尾阶段安置
}

// ==========================================
// EvictionRecord - 挤出记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionRecord {
    pub slot_key: SlotKey,            // 被让出的槽位
    pub scratch_module_id: i64,       // 停放所在的临时模块
    pub evicted: ClassRef,            // 被挤出的课时
    pub evicted_item_kind: ClassKind,
    pub original_position: i64,       // 被挤出前的位置 (临时模块内保持不变)
    pub state: EvictionState,
}

impl EvictionRecord {
    /// 被挤出课时当前所在的槽位
    pub fn parked_slot(&self) -> SlotKey {
        SlotKey::new(self.scratch_module_id, self.original_position)
    }
}

// ==========================================
// OrphanPlacement - 收尾阶段的安置结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrphanPlacement {
    /// 追加到模块末尾
    Appended { item: ClassRef, slot: SlotKey },
    /// 按配置保留在临时模块
    KeptInScratch { item: ClassRef, slot: SlotKey },
}

impl OrphanPlacement {
    pub fn item(&self) -> ClassRef {
        match self {
            OrphanPlacement::Appended { item, .. }
            | OrphanPlacement::KeptInScratch { item, .. } => *item,
        }
    }

    pub fn slot(&self) -> SlotKey {
        match self {
            OrphanPlacement::Appended { slot, .. }
            | OrphanPlacement::KeptInScratch { slot, .. } => *slot,
        }
    }
}

// ==========================================
// ReconciliationReport - 批次执行摘要
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub module_id: i64,
    pub applied: Vec<ClassRef>,              // 实际移动的课时 (提交顺序)
    pub skipped: usize,                      // 空操作数量
    pub evictions: Vec<EvictionRecord>,      // 所有挤出记录 (终态)
    pub orphan_placements: Vec<OrphanPlacement>,
    pub scratch_allocated: Vec<i64>,
    pub scratch_disposed: Vec<i64>,
}

impl ReconciliationReport {
    pub fn new(module_id: i64) -> Self {
        Self {
            module_id,
            ..Default::default()
        }
    }

    /// 被移动或被安置的全部课时 (去重，用于审计)
    pub fn touched_items(&self) -> Vec<ClassRef> {
        let mut items: Vec<ClassRef> = self.applied.clone();
        for placement in &self.orphan_placements {
            if !items.contains(&placement.item()) {
                items.push(placement.item());
            }
        }
        items
    }

    pub fn reclaimed_count(&self) -> usize {
        self.evictions
            .iter()
            .filter(|r| r.state == EvictionState::Reclaimed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_detection() {
        let req = MoveRequest::within(ClassKind::Video, 3, 2, 2);
        assert!(req.is_noop());

        let req = MoveRequest::across(ClassKind::Video, SlotKey::new(3, 2), SlotKey::new(4, 2));
        assert!(!req.is_noop());
    }

    #[test]
    fn test_touched_items_deduplicates() {
        let a = ClassRef::video(1);
        let b = ClassRef::questionnaire(1);
        let mut report = ReconciliationReport::new(7);
        report.applied = vec![a];
        report.orphan_placements = vec![
            OrphanPlacement::Appended { item: b, slot: SlotKey::new(7, 3) },
            OrphanPlacement::KeptInScratch { item: a, slot: SlotKey::new(9, 1) },
        ];

        assert_eq!(report.touched_items(), vec![a, b]);
    }
}
