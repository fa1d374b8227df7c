// ==========================================
// 在线课程后台 - API层错误类型
// ==========================================
// 职责: 把仓储/引擎错误转换为面向管理员的错误消息
// 约束: 重排失败只返回统一提示，不暴露槽位细节（细节写日志）
// ==========================================

use crate::engine::error::ReorderError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 重排失败时面向用户的统一提示
pub const REORDER_FAILED_MESSAGE: &str = "重排失败，请重试";

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权编辑模块: actor={actor}, module_id={module_id}")]
    Unauthorized { actor: String, module_id: i64 },

    #[error("无权执行维护操作: actor={0}")]
    MaintenanceForbidden(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("{0}")]
    ReorderFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn reorder_failed() -> Self {
        ApiError::ReorderFailed(REORDER_FAILED_MESSAGE.to_string())
    }
}

// ==========================================
// 从 ReorderError 转换
// ==========================================
impl From<ReorderError> for ApiError {
    fn from(err: ReorderError) -> Self {
        match err {
            ReorderError::ValidationError(msg) => ApiError::InvalidInput(msg),
            ReorderError::NotFound(msg) => ApiError::NotFound(msg),
            other => {
                tracing::warn!(error = %other, "reorder failed");
                ApiError::reorder_failed()
            }
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => {
                tracing::warn!(error = %msg, "constraint violation");
                ApiError::reorder_failed()
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
