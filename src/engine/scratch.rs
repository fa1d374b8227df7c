// ==========================================
// 在线课程后台 - 临时模块分配器
// ==========================================
// 职责: 在重排事务内创建临时停放模块，批次结束时回收空模块
// 命名: 前缀 + SHA-256(时间戳, 两个随机数) 的前 32 位十六进制
// 约束: 单批次分配数量有上限 (max_scratch_per_batch)
// ==========================================

use crate::config::ReorderConfig;
use crate::engine::error::{ReorderError, ReorderResult};
use crate::repository::ModuleRepository;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

/// 生成临时模块名称
pub fn generate_scratch_name(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let random = uuid::Uuid::new_v4().as_u128();
    let (r1, r2) = ((random >> 64) as u64, random as u64);

    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", nanos, r1, r2).as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}{}", prefix, &digest[..32])
}

// ==========================================
// ScratchModuleAllocator
// ==========================================
#[derive(Debug)]
pub struct ScratchModuleAllocator {
    prefix: String,
    limit: usize,
    allocated: Vec<i64>,
}

impl ScratchModuleAllocator {
    pub fn new(config: &ReorderConfig) -> Self {
        Self {
            prefix: config.scratch_name_prefix.clone(),
            limit: config.max_scratch_per_batch,
            allocated: Vec::new(),
        }
    }

    /// 创建一个空的临时模块，返回模块ID
    pub fn allocate(&mut self, conn: &Connection) -> ReorderResult<i64> {
        if self.allocated.len() >= self.limit {
            return Err(ReorderError::ValidationError(format!(
                "单批次临时模块数量超过上限 {}",
                self.limit
            )));
        }

        let name = generate_scratch_name(&self.prefix);
        let module_id = ModuleRepository::insert_module_tx(conn, &name, true)?;
        self.allocated.push(module_id);

        tracing::debug!(module_id, name = %name, "scratch module allocated");
        Ok(module_id)
    }

    /// 本批次已分配的临时模块
    pub fn allocated(&self) -> &[i64] {
        &self.allocated
    }

    /// 删除本批次分配且已清空的临时模块
    ///
    /// # 返回
    /// 被删除的模块ID；仍停放课时的模块保留
    pub fn dispose(&mut self, conn: &Connection) -> ReorderResult<Vec<i64>> {
        let mut disposed = Vec::new();
        for &module_id in &self.allocated {
            if ModuleRepository::delete_if_empty_tx(conn, module_id)? {
                disposed.push(module_id);
            } else {
                tracing::info!(module_id, "scratch module still holds an item, kept");
            }
        }
        Ok(disposed)
    }
}
