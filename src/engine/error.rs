// ==========================================
// 在线课程后台 - 重排引擎错误类型
// ==========================================
// 分类:
// - ValidationError: 输入非法，任何写入之前发现
// - ConstraintViolation: 存储拒绝写入（槽位被意外占用）
// - NotFound: 预期的课时/模块不存在
// - PersistenceError: 连接/事务/查询失败
// 约束: 引擎不重试；任何错误都整体回滚
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReorderError {
    #[error("输入校验失败: {0}")]
    ValidationError(String),

    #[error("槽位冲突: {0}")]
    ConstraintViolation(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("持久化失败: {0}")]
    PersistenceError(String),
}

impl From<RepositoryError> for ReorderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => ReorderError::ConstraintViolation(msg),
            RepositoryError::NotFound { entity, id } => {
                ReorderError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::ValidationError(msg) => ReorderError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ReorderError::ValidationError(format!("{}: {}", field, message))
            }
            other => ReorderError::PersistenceError(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ReorderError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type ReorderResult<T> = Result<T, ReorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_taxonomy() {
        let e: ReorderError = RepositoryError::UniqueConstraintViolation("x".into()).into();
        assert!(matches!(e, ReorderError::ConstraintViolation(_)));

        let e: ReorderError = RepositoryError::not_found("VIDEO", 3).into();
        assert!(matches!(e, ReorderError::NotFound(ref m) if m.contains("VIDEO")));

        let e: ReorderError = RepositoryError::LockError("poisoned".into()).into();
        assert!(matches!(e, ReorderError::PersistenceError(_)));

        let e: ReorderError = RepositoryError::ForeignKeyViolation("fk".into()).into();
        assert!(matches!(e, ReorderError::PersistenceError(_)));
    }
}
