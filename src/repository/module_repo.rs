// ==========================================
// 在线课程后台 - 模块数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: *_tx 系列函数接收调用方的连接/事务，供引擎在同一事务内组合使用
// ==========================================

use crate::domain::module::Module;
use crate::repository::class_position_repo::ClassPositionRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const MODULE_COLUMNS: &str = "id_module, name, is_scratch, created_at";

// ==========================================
// ModuleRepository - 模块仓储
// ==========================================
pub struct ModuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ModuleRepository {
    /// 创建新的ModuleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建普通模块
    ///
    /// # 返回
    /// - `Ok(module_id)`: 新模块ID
    /// - `Err(UniqueConstraintViolation)`: 名称重复
    pub fn create(&self, name: &str) -> RepositoryResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "模块名称不能为空".to_string(),
            });
        }
        let conn = self.get_conn()?;
        Self::insert_module_tx(&conn, name, false)
    }

    /// 按ID查询模块
    pub fn find_by_id(&self, module_id: i64) -> RepositoryResult<Option<Module>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, module_id)
    }

    /// 查询所有可见模块（不含临时模块）
    pub fn list_visible(&self) -> RepositoryResult<Vec<Module>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM module WHERE is_scratch = 0 ORDER BY id_module",
            MODULE_COLUMNS
        ))?;
        let modules = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<Module>, _>>()?;
        Ok(modules)
    }

    /// 查询所有临时模块
    pub fn list_scratch(&self) -> RepositoryResult<Vec<Module>> {
        let conn = self.get_conn()?;
        Self::list_scratch_tx(&conn)
    }

    /// 删除所有空的临时模块（清理历史遗留）
    ///
    /// # 返回
    /// - `Ok(count)`: 删除的模块数
    pub fn purge_empty_scratch(&self) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut removed = 0;
        for module in Self::list_scratch_tx(&tx)? {
            if Self::delete_if_empty_tx(&tx, module.module_id)? {
                removed += 1;
            }
        }

        tx.commit()?;
        Ok(removed)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 插入模块，返回新ID
    pub(crate) fn insert_module_tx(
        conn: &Connection,
        name: &str,
        is_scratch: bool,
    ) -> RepositoryResult<i64> {
        conn.execute(
            "INSERT INTO module (name, is_scratch) VALUES (?1, ?2)",
            params![name, if is_scratch { 1 } else { 0 }],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn find_by_id_tx(conn: &Connection, module_id: i64) -> RepositoryResult<Option<Module>> {
        let module = conn
            .query_row(
                &format!("SELECT {} FROM module WHERE id_module = ?1", MODULE_COLUMNS),
                params![module_id],
                map_row,
            )
            .optional()?;
        Ok(module)
    }

    pub(crate) fn exists_tx(conn: &Connection, module_id: i64) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM module WHERE id_module = ?1",
                params![module_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub(crate) fn list_scratch_tx(conn: &Connection) -> RepositoryResult<Vec<Module>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM module WHERE is_scratch = 1 ORDER BY id_module",
            MODULE_COLUMNS
        ))?;
        let modules = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<Module>, _>>()?;
        Ok(modules)
    }

    /// 模块为空时删除
    ///
    /// # 返回
    /// - `Ok(true)`: 已删除
    /// - `Ok(false)`: 模块仍有课时，未删除
    pub(crate) fn delete_if_empty_tx(conn: &Connection, module_id: i64) -> RepositoryResult<bool> {
        if ClassPositionRepository::count_in_module_tx(conn, module_id)? > 0 {
            return Ok(false);
        }
        let rows = conn.execute("DELETE FROM module WHERE id_module = ?1", params![module_id])?;
        Ok(rows > 0)
    }
}

/// 映射数据库行到Module对象
fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Module> {
    Ok(Module {
        module_id: row.get(0)?,
        name: row.get(1)?,
        is_scratch: row.get::<_, i64>(2)? != 0,
        created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(3)?, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?,
    })
}
