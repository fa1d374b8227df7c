// ==========================================
// 在线课程后台 - 单课时迁移
// ==========================================
// 固定三步，全部在一个事务内，每步校验后再进行下一步:
//   1. (当前模块, 0)
//   2. (新模块, 0)
//   3. (新模块, 新位置)
// 目标槽位被其他课时占用时，占用者先追加到新模块末尾
// ==========================================

use crate::domain::class_item::{ClassRef, SlotKey};
use crate::domain::context::EditContext;
use crate::engine::error::{ReorderError, ReorderResult};
use crate::perf::PerfGuard;
use crate::repository::{ClassPositionRepository, ModuleRepository};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// 被让位的课时
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Displacement {
    pub item: ClassRef,
    pub from: SlotKey,
    pub to: SlotKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationOutcome {
    pub item: ClassRef,
    pub from: SlotKey,
    pub to: SlotKey,
    pub displaced: Option<Displacement>,
}

impl RelocationOutcome {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

// ==========================================
// SingleItemRelocator
// ==========================================
pub struct SingleItemRelocator {
    conn: Arc<Mutex<Connection>>,
}

impl SingleItemRelocator {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> ReorderResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReorderError::PersistenceError(format!("连接锁获取失败: {}", e)))
    }

    /// 迁移单个课时
    pub fn move_item(
        &self,
        ctx: &EditContext,
        item: ClassRef,
        new_module_id: i64,
        new_position: i64,
    ) -> ReorderResult<bool> {
        self.relocate(ctx, item, new_module_id, new_position)
            .map(|_| true)
    }

    /// 迁移单个课时并返回迁移明细
    pub fn relocate(
        &self,
        ctx: &EditContext,
        item: ClassRef,
        new_module_id: i64,
        new_position: i64,
    ) -> ReorderResult<RelocationOutcome> {
        if item.class_id <= 0 || new_module_id <= 0 || new_position <= 0 {
            return Err(ReorderError::ValidationError(format!(
                "课时ID、模块ID与位置必须为正整数: {} → ({}, {})",
                item, new_module_id, new_position
            )));
        }

        let _perf = PerfGuard::new("reorder.move_item");
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match Self::relocate_tx(&tx, item, SlotKey::new(new_module_id, new_position)) {
            Ok(outcome) => {
                tx.commit()?;
                tracing::info!(
                    actor = ctx.actor_or_system(),
                    item = %outcome.item,
                    from = %outcome.from,
                    to = %outcome.to,
                    displaced = outcome.displaced.is_some(),
                    "class relocated"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    actor = ctx.actor_or_system(),
                    item = %item,
                    error = %e,
                    "class relocation failed, rolling back"
                );
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub(crate) fn relocate_tx(
        conn: &Connection,
        item: ClassRef,
        target: SlotKey,
    ) -> ReorderResult<RelocationOutcome> {
        let current = ClassPositionRepository::find_by_ref_tx(conn, item)?
            .ok_or_else(|| ReorderError::NotFound(format!("课时{}", item)))?;
        if !ModuleRepository::exists_tx(conn, target.module_id)? {
            return Err(ReorderError::NotFound(format!("模块(id={})", target.module_id)));
        }

        let from = current.slot();
        if from == target {
            return Ok(RelocationOutcome {
                item,
                from,
                to: target,
                displaced: None,
            });
        }

        ClassPositionRepository::write_tx(conn, item, SlotKey::neutral(from.module_id))?;
        ClassPositionRepository::write_tx(conn, item, SlotKey::neutral(target.module_id))?;

        let displaced = match ClassPositionRepository::occupant_at_tx(conn, target)? {
            Some(occupant) => {
                let highest = ClassPositionRepository::highest_position_tx(conn, target.module_id)?;
                let to = SlotKey::new(target.module_id, highest.max(0) + 1);
                ClassPositionRepository::write_tx(conn, occupant.class_ref(), to)?;
                Some(Displacement {
                    item: occupant.class_ref(),
                    from: target,
                    to,
                })
            }
            None => None,
        };

        ClassPositionRepository::write_tx(conn, item, target)?;

        Ok(RelocationOutcome {
            item,
            from,
            to: target,
            displaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::class_item::ClassContent;

    fn questionnaire(q: &str) -> ClassContent {
        ClassContent::Questionnaire {
            question: q.to_string(),
            options: ["1".into(), "2".into(), "3".into(), "4".into()],
            correct_option: 2,
        }
    }

    fn setup() -> (Arc<Mutex<Connection>>, i64, i64) {
        let conn = crate::db::open_in_memory_with_schema().unwrap();
        let m1 = ModuleRepository::insert_module_tx(&conn, "m1", false).unwrap();
        let m2 = ModuleRepository::insert_module_tx(&conn, "m2", false).unwrap();
        (Arc::new(Mutex::new(conn)), m1, m2)
    }

    #[test]
    fn test_move_to_free_slot_in_other_module() {
        let (conn, m1, m2) = setup();
        let a = {
            let c = conn.lock().unwrap();
            ClassPositionRepository::insert_item_tx(&c, &questionnaire("A"), m1, 1).unwrap()
        };

        let relocator = SingleItemRelocator::new(conn.clone());
        let outcome = relocator
            .relocate(&EditContext::system(), a.class_ref(), m2, 3)
            .unwrap();

        assert_eq!(outcome.from, SlotKey::new(m1, 1));
        assert_eq!(outcome.to, SlotKey::new(m2, 3));
        assert!(outcome.displaced.is_none());

        let c = conn.lock().unwrap();
        let moved = ClassPositionRepository::find_by_ref_tx(&c, a.class_ref()).unwrap().unwrap();
        assert_eq!(moved.slot(), SlotKey::new(m2, 3));
        assert_eq!(ClassPositionRepository::count_in_module_tx(&c, m1).unwrap(), 0);
    }

    #[test]
    fn test_held_target_displaces_occupant_to_end() {
        let (conn, m1, m2) = setup();
        let (a, b, c_item) = {
            let c = conn.lock().unwrap();
            (
                ClassPositionRepository::insert_item_tx(&c, &questionnaire("A"), m1, 1).unwrap(),
                ClassPositionRepository::insert_item_tx(&c, &questionnaire("B"), m2, 1).unwrap(),
                ClassPositionRepository::insert_item_tx(&c, &questionnaire("C"), m2, 2).unwrap(),
            )
        };

        let relocator = SingleItemRelocator::new(conn.clone());
        let outcome = relocator
            .relocate(&EditContext::system(), a.class_ref(), m2, 2)
            .unwrap();

        let displaced = outcome.displaced.unwrap();
        assert_eq!(displaced.item, c_item.class_ref());
        assert_eq!(displaced.to, SlotKey::new(m2, 3));

        let c = conn.lock().unwrap();
        let order: Vec<(i64, ClassRef)> = ClassPositionRepository::read_all_tx(&c, m2)
            .unwrap()
            .iter()
            .map(|i| (i.position, i.class_ref()))
            .collect();
        assert_eq!(
            order,
            vec![(1, b.class_ref()), (2, a.class_ref()), (3, c_item.class_ref())]
        );
    }

    #[test]
    fn test_own_slot_is_noop_and_missing_item_fails() {
        let (conn, m1, _m2) = setup();
        let a = {
            let c = conn.lock().unwrap();
            ClassPositionRepository::insert_item_tx(&c, &questionnaire("A"), m1, 2).unwrap()
        };
        let relocator = SingleItemRelocator::new(conn.clone());

        let outcome = relocator.relocate(&EditContext::system(), a.class_ref(), m1, 2).unwrap();
        assert!(outcome.is_noop());

        let err = relocator
            .move_item(&EditContext::system(), ClassRef::questionnaire(404), m1, 1)
            .unwrap_err();
        assert!(matches!(err, ReorderError::NotFound(_)));

        let err = relocator
            .move_item(&EditContext::system(), a.class_ref(), 999, 1)
            .unwrap_err();
        assert!(matches!(err, ReorderError::NotFound(_)));

        let err = relocator
            .move_item(&EditContext::system(), a.class_ref(), m1, 0)
            .unwrap_err();
        assert!(matches!(err, ReorderError::ValidationError(_)));
    }
}
