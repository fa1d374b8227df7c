// ==========================================
// 在线课程后台 - 核心库
// ==========================================
// 系统定位: 课程模块内容的位置协调（重排、迁移、插入、删除）
// 技术栈: Rust + SQLite
// 红线: (模块, 位置) 任何时刻唯一；批次整体成功或整体回滚
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与值对象
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 位置协调
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能观测
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    ActionLog, ActionType, ClassContent, ClassItem, ClassKind, ClassRef, EditContext, Module,
    MoveRequest, ReconciliationReport, SlotKey,
};

// 引擎
pub use engine::{ReconciliationEngine, ReorderError, SingleItemRelocator};

// API
pub use api::{ApiError, ModuleContentApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "在线课程后台";
