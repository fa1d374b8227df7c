// ==========================================
// 在线课程后台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::config::reorder_config::{OrphanPolicy, ReorderConfig};
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "INSERT INTO config_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(format!("配置快照序列化失败: {}", e)))
    }

    // ===== 重排引擎配置 =====

    /// 加载重排引擎配置
    ///
    /// 格式错误的配置项回落为默认值并记录告警，不中断调用方
    pub fn load_reorder_config(&self) -> RepositoryResult<ReorderConfig> {
        let defaults = ReorderConfig::default();

        let dispose_raw = self.get_config_or_default(
            config_keys::DISPOSE_SCRATCH_MODULES,
            if defaults.dispose_scratch_modules { "true" } else { "false" },
        )?;
        let dispose_scratch_modules = match parse_bool(&dispose_raw) {
            Some(v) => v,
            None => {
                tracing::warn!(
                    config_key = config_keys::DISPOSE_SCRATCH_MODULES,
                    raw_value = %dispose_raw,
                    "配置格式错误，使用默认值"
                );
                defaults.dispose_scratch_modules
            }
        };

        let policy_raw =
            self.get_config_or_default(config_keys::ORPHAN_POLICY, defaults.orphan_policy.as_str())?;
        let orphan_policy = policy_raw.parse::<OrphanPolicy>().unwrap_or_else(|e| {
            tracing::warn!(config_key = config_keys::ORPHAN_POLICY, error = %e, "配置格式错误，使用默认值");
            defaults.orphan_policy
        });

        let scratch_name_prefix = self
            .get_config_value(config_keys::SCRATCH_NAME_PREFIX)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.scratch_name_prefix);

        let max_raw = self.get_config_value(config_keys::MAX_SCRATCH_PER_BATCH)?;
        let max_scratch_per_batch = match max_raw {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => v,
                _ => {
                    tracing::warn!(
                        config_key = config_keys::MAX_SCRATCH_PER_BATCH,
                        raw_value = %raw,
                        "配置格式错误，使用默认值"
                    );
                    defaults.max_scratch_per_batch
                }
            },
            None => defaults.max_scratch_per_batch,
        };

        Ok(ReorderConfig {
            dispose_scratch_modules,
            orphan_policy,
            scratch_name_prefix,
            max_scratch_per_batch,
        })
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const DISPOSE_SCRATCH_MODULES: &str = "reorder.dispose_scratch_modules";
    pub const ORPHAN_POLICY: &str = "reorder.orphan_policy";
    pub const SCRATCH_NAME_PREFIX: &str = "reorder.scratch_name_prefix";
    pub const MAX_SCRATCH_PER_BATCH: &str = "reorder.max_scratch_per_batch";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = crate::db::open_in_memory_with_schema().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let config = setup().load_reorder_config().unwrap();
        assert_eq!(config, ReorderConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let manager = setup();
        manager.set_config_value(config_keys::DISPOSE_SCRATCH_MODULES, "off").unwrap();
        manager.set_config_value(config_keys::ORPHAN_POLICY, "keep_in_scratch").unwrap();
        manager.set_config_value(config_keys::SCRATCH_NAME_PREFIX, "tmp_").unwrap();
        manager.set_config_value(config_keys::MAX_SCRATCH_PER_BATCH, "8").unwrap();

        let config = manager.load_reorder_config().unwrap();
        assert!(!config.dispose_scratch_modules);
        assert_eq!(config.orphan_policy, OrphanPolicy::KeepInScratch);
        assert_eq!(config.scratch_name_prefix, "tmp_");
        assert_eq!(config.max_scratch_per_batch, 8);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let manager = setup();
        manager.set_config_value(config_keys::DISPOSE_SCRATCH_MODULES, "maybe").unwrap();
        manager.set_config_value(config_keys::ORPHAN_POLICY, "SHUFFLE").unwrap();
        manager.set_config_value(config_keys::MAX_SCRATCH_PER_BATCH, "0").unwrap();

        assert_eq!(manager.load_reorder_config().unwrap(), ReorderConfig::default());
    }

    #[test]
    fn test_snapshot_contains_all_keys() {
        let manager = setup();
        manager.set_config_value(config_keys::ORPHAN_POLICY, "APPEND_TO_END").unwrap();
        manager.set_config_value(config_keys::ORPHAN_POLICY, "KEEP_IN_SCRATCH").unwrap();

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[config_keys::ORPHAN_POLICY], "KEEP_IN_SCRATCH");
    }
}
