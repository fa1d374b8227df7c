use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, action_type, action_ts, actor, module_id, subject_ids, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE action_id = ?",
            LOG_COLUMNS
        ))?;

        match stmt.query_row(params![action_id], |row| self.map_row(row)) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定模块的操作日志（最新在前）
    pub fn find_by_module_id(&self, module_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE module_id = ? ORDER BY action_ts DESC, rowid DESC",
            LOG_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![module_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作人的日志
    pub fn find_by_actor(&self, actor: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE actor = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![actor, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 统计模块的操作次数
    pub fn count_by_module(&self, module_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE module_id = ?",
            params![module_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 映射数据库行到ActionLog对象
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(2)?;
        let subject_ids_str: String = row.get(5)?;
        let payload_json_str: Option<String> = row.get(6)?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: NaiveDateTime::parse_from_str(&action_ts_str, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
                })?,
            actor: row.get(3)?,
            module_id: row.get(4)?,
            subject_ids: serde_json::from_str(&subject_ids_str).unwrap_or_default(),
            payload_json: payload_json_str.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(7)?,
        })
    }
}
