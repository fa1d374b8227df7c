// ==========================================
// 在线课程后台 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 同时作为 AuditSink 的默认 SQLite 实现
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
