// ==========================================
// 在线课程后台 - 课时位置仓储 (PositionStore)
// ==========================================
// 覆盖两张物理表: class_video / class_questionnaire
// 红线: (id_module, class_order) 跨两表唯一
//       - 写入前显式检查占用者
//       - 库内 UNIQUE + 触发器兜底
// 说明: *_tx 系列函数接收调用方的连接/事务，供引擎在同一事务内组合使用
// ==========================================

use crate::domain::class_item::{
    ClassContent, ClassItem, ClassKind, ClassRef, SlotKey, EMPTY_MODULE_POSITION,
    NEUTRAL_POSITION,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const VIDEO_COLUMNS: &str =
    "id_video, id_module, class_order, title, video_ref, duration_minutes, description";
const QUESTIONNAIRE_COLUMNS: &str = "id_questionnaire, id_module, class_order, question, \
     option_1, option_2, option_3, option_4, correct_option";

// ==========================================
// ClassPositionRepository - 课时位置仓储
// ==========================================
pub struct ClassPositionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClassPositionRepository {
    /// 创建新的ClassPositionRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询槽位占用者（跨两种课时）
    ///
    /// # 返回
    /// - `Ok(Some(item))`: 槽位已被占用
    /// - `Ok(None)`: 槽位空闲
    pub fn occupant_at(&self, module_id: i64, position: i64) -> RepositoryResult<Option<ClassItem>> {
        let conn = self.get_conn()?;
        Self::occupant_at_tx(&conn, SlotKey::new(module_id, position))
    }

    /// 按身份查询课时
    pub fn find_by_ref(&self, item: ClassRef) -> RepositoryResult<Option<ClassItem>> {
        let conn = self.get_conn()?;
        Self::find_by_ref_tx(&conn, item)
    }

    /// 移动课时到指定槽位（幂等）
    ///
    /// # 返回
    /// - `Err(UniqueConstraintViolation)`: 槽位已被其他课时占用
    /// - `Err(NotFound)`: 课时不存在
    pub fn write(&self, item: ClassRef, module_id: i64, position: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::write_tx(&conn, item, SlotKey::new(module_id, position))
    }

    /// 模块内最大位置，空模块返回 -1
    pub fn highest_position(&self, module_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::highest_position_tx(&conn, module_id)
    }

    /// 按位置升序读取模块内全部课时
    pub fn read_all(&self, module_id: i64) -> RepositoryResult<Vec<ClassItem>> {
        let conn = self.get_conn()?;
        Self::read_all_tx(&conn, module_id)
    }

    /// 新建课时（作者录入）
    pub fn insert_item(
        &self,
        content: &ClassContent,
        module_id: i64,
        position: i64,
    ) -> RepositoryResult<ClassItem> {
        let conn = self.get_conn()?;
        Self::insert_item_tx(&conn, content, module_id, position)
    }

    /// 删除课时
    ///
    /// # 返回
    /// - `Ok(true)`: 已删除
    /// - `Ok(false)`: 课时不存在
    pub fn delete_item(&self, item: ClassRef) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::delete_item_tx(&conn, item)
    }

    /// 模块内课时数量（含中性位）
    pub fn count_in_module(&self, module_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::count_in_module_tx(&conn, module_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn occupant_at_tx(conn: &Connection, slot: SlotKey) -> RepositoryResult<Option<ClassItem>> {
        let video = conn
            .query_row(
                &format!(
                    "SELECT {} FROM class_video WHERE id_module = ?1 AND class_order = ?2",
                    VIDEO_COLUMNS
                ),
                params![slot.module_id, slot.position],
                map_video_row,
            )
            .optional()?;
        if video.is_some() {
            return Ok(video);
        }

        let questionnaire = conn
            .query_row(
                &format!(
                    "SELECT {} FROM class_questionnaire WHERE id_module = ?1 AND class_order = ?2",
                    QUESTIONNAIRE_COLUMNS
                ),
                params![slot.module_id, slot.position],
                map_questionnaire_row,
            )
            .optional()?;
        Ok(questionnaire)
    }

    pub(crate) fn find_by_ref_tx(conn: &Connection, item: ClassRef) -> RepositoryResult<Option<ClassItem>> {
        let found = match item.kind {
            ClassKind::Video => conn
                .query_row(
                    &format!("SELECT {} FROM class_video WHERE id_video = ?1", VIDEO_COLUMNS),
                    params![item.class_id],
                    map_video_row,
                )
                .optional()?,
            ClassKind::Questionnaire => conn
                .query_row(
                    &format!(
                        "SELECT {} FROM class_questionnaire WHERE id_questionnaire = ?1",
                        QUESTIONNAIRE_COLUMNS
                    ),
                    params![item.class_id],
                    map_questionnaire_row,
                )
                .optional()?,
        };
        Ok(found)
    }

    /// 事务内移动课时到指定槽位
    ///
    /// 槽位已属于该课时时直接返回（幂等）
    pub(crate) fn write_tx(conn: &Connection, item: ClassRef, slot: SlotKey) -> RepositoryResult<()> {
        if slot.module_id <= 0 || slot.position < NEUTRAL_POSITION {
            return Err(RepositoryError::ValidationError(format!(
                "非法槽位: {}",
                slot
            )));
        }

        if let Some(occupant) = Self::occupant_at_tx(conn, slot)? {
            if occupant.class_ref() == item {
                return Ok(());
            }
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "槽位{}已被{}占用，无法写入{}",
                slot,
                occupant.class_ref(),
                item
            )));
        }

        let rows = conn.execute(
            &format!(
                "UPDATE {} SET id_module = ?1, class_order = ?2 WHERE {} = ?3",
                item.kind.table(),
                item.kind.id_column()
            ),
            params![slot.module_id, slot.position, item.class_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found(item.kind.as_str(), item.class_id));
        }

        tracing::trace!(item = %item, slot = %slot, "class slot written");
        Ok(())
    }

    pub(crate) fn highest_position_tx(conn: &Connection, module_id: i64) -> RepositoryResult<i64> {
        let highest: Option<i64> = conn.query_row(
            r#"SELECT MAX(class_order) FROM (
                   SELECT class_order FROM class_video WHERE id_module = ?1 AND class_order > 0
                   UNION ALL
                   SELECT class_order FROM class_questionnaire WHERE id_module = ?1 AND class_order > 0
               )"#,
            params![module_id],
            |row| row.get(0),
        )?;
        Ok(highest.unwrap_or(EMPTY_MODULE_POSITION))
    }

    pub(crate) fn read_all_tx(conn: &Connection, module_id: i64) -> RepositoryResult<Vec<ClassItem>> {
        let mut items = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM class_video WHERE id_module = ?1",
                VIDEO_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![module_id], map_video_row)?
                .collect::<Result<Vec<ClassItem>, _>>()?;
            rows
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM class_questionnaire WHERE id_module = ?1",
            QUESTIONNAIRE_COLUMNS
        ))?;
        let questionnaires = stmt
            .query_map(params![module_id], map_questionnaire_row)?
            .collect::<Result<Vec<ClassItem>, _>>()?;
        items.extend(questionnaires);

        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    pub(crate) fn count_in_module_tx(conn: &Connection, module_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            r#"SELECT
                   (SELECT COUNT(*) FROM class_video WHERE id_module = ?1)
                 + (SELECT COUNT(*) FROM class_questionnaire WHERE id_module = ?1)"#,
            params![module_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub(crate) fn insert_item_tx(
        conn: &Connection,
        content: &ClassContent,
        module_id: i64,
        position: i64,
    ) -> RepositoryResult<ClassItem> {
        validate_content(content)?;
        if position <= NEUTRAL_POSITION {
            return Err(RepositoryError::FieldValueError {
                field: "position".to_string(),
                message: format!("位置必须为正整数: {}", position),
            });
        }

        let slot = SlotKey::new(module_id, position);
        if let Some(occupant) = Self::occupant_at_tx(conn, slot)? {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "槽位{}已被{}占用",
                slot,
                occupant.class_ref()
            )));
        }

        match content {
            ClassContent::Video {
                title,
                video_ref,
                duration_minutes,
                description,
            } => {
                conn.execute(
                    r#"INSERT INTO class_video (
                           id_module, class_order, title, video_ref, duration_minutes, description
                       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![module_id, position, title, video_ref, duration_minutes, description],
                )?;
            }
            ClassContent::Questionnaire {
                question,
                options,
                correct_option,
            } => {
                conn.execute(
                    r#"INSERT INTO class_questionnaire (
                           id_module, class_order, question,
                           option_1, option_2, option_3, option_4, correct_option
                       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        module_id,
                        position,
                        question,
                        options[0],
                        options[1],
                        options[2],
                        options[3],
                        *correct_option as i64,
                    ],
                )?;
            }
        }

        Ok(ClassItem {
            class_id: conn.last_insert_rowid(),
            module_id,
            position,
            content: content.clone(),
        })
    }

    pub(crate) fn delete_item_tx(conn: &Connection, item: ClassRef) -> RepositoryResult<bool> {
        let rows = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                item.kind.table(),
                item.kind.id_column()
            ),
            params![item.class_id],
        )?;
        Ok(rows > 0)
    }
}

/// 录入内容校验
fn validate_content(content: &ClassContent) -> RepositoryResult<()> {
    match content {
        ClassContent::Video {
            title,
            video_ref,
            duration_minutes,
            ..
        } => {
            if title.trim().is_empty() {
                return Err(RepositoryError::FieldValueError {
                    field: "title".to_string(),
                    message: "视频标题不能为空".to_string(),
                });
            }
            if video_ref.trim().is_empty() {
                return Err(RepositoryError::FieldValueError {
                    field: "video_ref".to_string(),
                    message: "视频引用不能为空".to_string(),
                });
            }
            if *duration_minutes < 0 {
                return Err(RepositoryError::FieldValueError {
                    field: "duration_minutes".to_string(),
                    message: format!("时长不能为负: {}", duration_minutes),
                });
            }
        }
        ClassContent::Questionnaire {
            question,
            correct_option,
            ..
        } => {
            if question.trim().is_empty() {
                return Err(RepositoryError::FieldValueError {
                    field: "question".to_string(),
                    message: "问题不能为空".to_string(),
                });
            }
            if *correct_option > 3 {
                return Err(RepositoryError::FieldValueError {
                    field: "correct_option".to_string(),
                    message: format!("正确选项下标应在 0..=3: {}", correct_option),
                });
            }
        }
    }
    Ok(())
}

fn map_video_row(row: &rusqlite::Row) -> rusqlite::Result<ClassItem> {
    Ok(ClassItem {
        class_id: row.get(0)?,
        module_id: row.get(1)?,
        position: row.get(2)?,
        content: ClassContent::Video {
            title: row.get(3)?,
            video_ref: row.get(4)?,
            duration_minutes: row.get(5)?,
            description: row.get(6)?,
        },
    })
}

fn map_questionnaire_row(row: &rusqlite::Row) -> rusqlite::Result<ClassItem> {
    let correct_option: i64 = row.get(8)?;
    Ok(ClassItem {
        class_id: row.get(0)?,
        module_id: row.get(1)?,
        position: row.get(2)?,
        content: ClassContent::Questionnaire {
            question: row.get(3)?,
            options: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
            correct_option: u8::try_from(correct_option).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Integer, Box::new(e))
            })?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::module_repo::ModuleRepository;

    fn setup() -> (ClassPositionRepository, ModuleRepository) {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        (
            ClassPositionRepository::new(conn.clone()),
            ModuleRepository::new(conn),
        )
    }

    fn video(title: &str) -> ClassContent {
        ClassContent::Video {
            title: title.to_string(),
            video_ref: format!("yt:{}", title),
            duration_minutes: 10,
            description: None,
        }
    }

    fn questionnaire(question: &str) -> ClassContent {
        ClassContent::Questionnaire {
            question: question.to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option: 2,
        }
    }

    #[test]
    fn test_occupant_lookup_spans_both_tables() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        let v = repo.insert_item(&video("v1"), m, 1).unwrap();
        let q = repo.insert_item(&questionnaire("q1"), m, 2).unwrap();

        assert_eq!(repo.occupant_at(m, 1).unwrap().unwrap().class_ref(), v.class_ref());
        assert_eq!(repo.occupant_at(m, 2).unwrap().unwrap().class_ref(), q.class_ref());
        assert!(repo.occupant_at(m, 3).unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_slot_held_by_other_kind() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        repo.insert_item(&video("v1"), m, 1).unwrap();

        let err = repo.insert_item(&questionnaire("q1"), m, 1).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_write_is_idempotent_and_rejects_foreign_occupant() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        let v = repo.insert_item(&video("v1"), m, 1).unwrap();
        let q = repo.insert_item(&questionnaire("q1"), m, 2).unwrap();

        repo.write(v.class_ref(), m, 1).unwrap();
        assert_eq!(repo.find_by_ref(v.class_ref()).unwrap().unwrap().position, 1);

        let err = repo.write(v.class_ref(), m, 2).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.find_by_ref(q.class_ref()).unwrap().unwrap().position, 2);

        repo.write(v.class_ref(), m, 5).unwrap();
        assert_eq!(repo.occupant_at(m, 5).unwrap().unwrap().class_ref(), v.class_ref());
    }

    #[test]
    fn test_write_missing_item_is_not_found() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        let err = repo.write(ClassRef::video(42), m, 1).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_store_constraint_backstops_direct_sql() {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        let repo = ClassPositionRepository::new(conn.clone());
        let m = ModuleRepository::new(conn.clone()).create("m").unwrap();
        repo.insert_item(&video("v1"), m, 1).unwrap();
        let q = repo.insert_item(&questionnaire("q1"), m, 2).unwrap();

        let c = conn.lock().unwrap();
        let err: RepositoryError = c
            .execute(
                "UPDATE class_questionnaire SET class_order = 1 WHERE id_questionnaire = ?1",
                params![q.class_id],
            )
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_highest_position_and_read_all_order() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        assert_eq!(repo.highest_position(m).unwrap(), EMPTY_MODULE_POSITION);

        repo.insert_item(&questionnaire("q7"), m, 7).unwrap();
        repo.insert_item(&video("v2"), m, 2).unwrap();
        repo.insert_item(&video("v4"), m, 4).unwrap();

        assert_eq!(repo.highest_position(m).unwrap(), 7);
        let positions: Vec<i64> = repo.read_all(m).unwrap().iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![2, 4, 7]);
        assert_eq!(repo.count_in_module(m).unwrap(), 3);
    }

    #[test]
    fn test_highest_position_ignores_neutral_slot() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        let v = repo.insert_item(&video("v1"), m, 1).unwrap();
        repo.write(v.class_ref(), m, NEUTRAL_POSITION).unwrap();

        assert_eq!(repo.highest_position(m).unwrap(), EMPTY_MODULE_POSITION);
        assert_eq!(repo.count_in_module(m).unwrap(), 1);
    }

    #[test]
    fn test_insert_validates_content() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();

        let bad = ClassContent::Questionnaire {
            question: "q".to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option: 4,
        };
        assert!(matches!(
            repo.insert_item(&bad, m, 1),
            Err(RepositoryError::FieldValueError { .. })
        ));
        assert!(matches!(
            repo.insert_item(&video("v"), m, 0),
            Err(RepositoryError::FieldValueError { .. })
        ));
    }

    #[test]
    fn test_delete_item() {
        let (repo, modules) = setup();
        let m = modules.create("m").unwrap();
        let q = repo.insert_item(&questionnaire("q1"), m, 1).unwrap();

        assert!(repo.delete_item(q.class_ref()).unwrap());
        assert!(!repo.delete_item(q.class_ref()).unwrap());
        assert!(repo.occupant_at(m, 1).unwrap().is_none());
    }
}
