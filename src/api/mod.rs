// ==========================================
// 在线课程后台 - API 层
// ==========================================
// 职责: 模块内容编辑接口，供 CLI / 宿主系统调用
// ==========================================

pub mod collaborators;
pub mod error;
pub mod module_content_api;

// 重导出核心类型
pub use collaborators::{AuditSink, LocalAdminAuthorizer, ModuleEditAuthorizer};
pub use error::{ApiError, ApiResult, REORDER_FAILED_MESSAGE};
pub use module_content_api::{ModuleContentApi, ModuleContentView, RemoveClassOutcome};
