// ==========================================
// 在线课程后台 - 引擎层
// ==========================================
// 职责: 模块内容重排的位置协调，不拼装业务 SQL
// 红线: (id_module, class_order) 任何时刻唯一；批次整体成功或整体回滚
// ==========================================

pub mod conflict_resolver;
pub mod error;
pub mod ledger;
pub mod reconciliation;
pub mod relocator;
pub mod scratch;

// 重导出核心引擎
pub use conflict_resolver::{ConflictResolver, Eviction};
pub use error::{ReorderError, ReorderResult};
pub use ledger::EvictionLedger;
pub use reconciliation::ReconciliationEngine;
pub use relocator::{Displacement, RelocationOutcome, SingleItemRelocator};
pub use scratch::{generate_scratch_name, ScratchModuleAllocator};
