// ==========================================
// 在线课程后台 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 建表幂等，可在任意已有库上重复执行
// - (module, position) 跨 class_video / class_questionnaire 两表唯一，由触发器强制
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试/演示用）
pub fn open_in_memory_with_schema() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS module (
    id_module INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    is_scratch INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS class_video (
    id_video INTEGER PRIMARY KEY AUTOINCREMENT,
    id_module INTEGER NOT NULL REFERENCES module(id_module),
    class_order INTEGER NOT NULL CHECK (class_order >= 0),
    title TEXT NOT NULL,
    video_ref TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL DEFAULT 0,
    description TEXT,
    UNIQUE (id_module, class_order)
);

CREATE TABLE IF NOT EXISTS class_questionnaire (
    id_questionnaire INTEGER PRIMARY KEY AUTOINCREMENT,
    id_module INTEGER NOT NULL REFERENCES module(id_module),
    class_order INTEGER NOT NULL CHECK (class_order >= 0),
    question TEXT NOT NULL,
    option_1 TEXT NOT NULL,
    option_2 TEXT NOT NULL,
    option_3 TEXT NOT NULL,
    option_4 TEXT NOT NULL,
    correct_option INTEGER NOT NULL CHECK (correct_option BETWEEN 0 AND 3),
    UNIQUE (id_module, class_order)
);

CREATE TRIGGER IF NOT EXISTS trg_class_video_slot_insert
BEFORE INSERT ON class_video
WHEN EXISTS (
    SELECT 1 FROM class_questionnaire
    WHERE id_module = NEW.id_module AND class_order = NEW.class_order
)
BEGIN
    SELECT RAISE(ABORT, 'UNIQUE constraint failed: class slot (id_module, class_order)');
END;

CREATE TRIGGER IF NOT EXISTS trg_class_video_slot_update
BEFORE UPDATE OF id_module, class_order ON class_video
WHEN EXISTS (
    SELECT 1 FROM class_questionnaire
    WHERE id_module = NEW.id_module AND class_order = NEW.class_order
)
BEGIN
    SELECT RAISE(ABORT, 'UNIQUE constraint failed: class slot (id_module, class_order)');
END;

CREATE TRIGGER IF NOT EXISTS trg_class_questionnaire_slot_insert
BEFORE INSERT ON class_questionnaire
WHEN EXISTS (
    SELECT 1 FROM class_video
    WHERE id_module = NEW.id_module AND class_order = NEW.class_order
)
BEGIN
    SELECT RAISE(ABORT, 'UNIQUE constraint failed: class slot (id_module, class_order)');
END;

CREATE TRIGGER IF NOT EXISTS trg_class_questionnaire_slot_update
BEFORE UPDATE OF id_module, class_order ON class_questionnaire
WHEN EXISTS (
    SELECT 1 FROM class_video
    WHERE id_module = NEW.id_module AND class_order = NEW.class_order
)
BEGIN
    SELECT RAISE(ABORT, 'UNIQUE constraint failed: class slot (id_module, class_order)');
END;

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    module_id INTEGER,
    subject_ids TEXT NOT NULL DEFAULT '[]',
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_module ON action_log(module_id, action_ts);

CREATE TABLE IF NOT EXISTS config_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// 建表（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
