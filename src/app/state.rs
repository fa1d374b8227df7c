// ==========================================
// 在线课程后台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、配置和 API 实例
// 约束: 所有仓储与引擎共享同一个连接 (Arc<Mutex<Connection>>)
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{AuditSink, LocalAdminAuthorizer, ModuleContentApi, ModuleEditAuthorizer};
use crate::config::{ConfigManager, ReorderConfig};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{ReconciliationEngine, SingleItemRelocator};
use crate::perf::install_sqlite_tracing;
use crate::repository::{ActionLogRepository, ClassPositionRepository, ModuleRepository};

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生效的重排配置（启动时从 config_kv 加载）
    pub reorder_config: ReorderConfig,

    /// 模块内容编辑API
    pub content_api: Arc<ModuleContentApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计查询）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 共享连接
    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    /// 创建新的AppState实例（本地管理员权限）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_authorizer(db_path, Arc::new(LocalAdminAuthorizer))
    }

    /// 使用宿主提供的权限判定创建AppState
    pub fn with_authorizer(
        db_path: String,
        authorizer: Arc<dyn ModuleEditAuthorizer>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库结构初始化失败: {}", e))?;
        install_sqlite_tracing(&mut conn);

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let reorder_config = config_manager
            .load_reorder_config()
            .map_err(|e| format!("重排配置加载失败: {}", e))?;
        tracing::info!(
            dispose_scratch_modules = reorder_config.dispose_scratch_modules,
            orphan_policy = reorder_config.orphan_policy.as_str(),
            max_scratch_per_batch = reorder_config.max_scratch_per_batch,
            "重排配置已加载"
        );

        // ==========================================
        // 仓储 / 引擎 / API
        // ==========================================
        let module_repo = Arc::new(ModuleRepository::new(conn.clone()));
        let position_repo = Arc::new(ClassPositionRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let engine = Arc::new(ReconciliationEngine::new(conn.clone(), reorder_config.clone()));
        let relocator = Arc::new(SingleItemRelocator::new(conn.clone()));

        let audit: Arc<dyn AuditSink> = action_log_repo.clone();
        let content_api = Arc::new(ModuleContentApi::new(
            conn.clone(),
            module_repo,
            position_repo,
            engine,
            relocator,
            authorizer,
            audit,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            reorder_config,
            content_api,
            config_manager,
            action_log_repo,
            conn,
        })
    }

    /// 共享连接（维护脚本与测试使用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 ELEARN_BACKOFFICE_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("ELEARN_BACKOFFICE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./elearn_backoffice.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("elearn-backoffice-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("elearn-backoffice");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("数据目录创建失败，回退到当前目录: {}", e);
            return "./elearn_backoffice.db".to_string();
        }
        path = path.join("elearn_backoffice.db");
    }

    path.to_string_lossy().to_string()
}
