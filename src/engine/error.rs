// ==========================================
// 运输自动拼载引擎 - 引擎层错误类型
// ==========================================
// 职责: 定义引擎对外的错误类型
// 红线: 里程/舱位查询失败属于保守降级, 不在此处建模
// 工具: thiserror 派生宏
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// ValidationViolation - 移单校验明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub code: String,            // 校验码（如 BODY_TYPE_MISMATCH）
    pub message: String,         // 本地化文本（仅展示）
    pub order_id: Option<i64>,   // 触发校验的运单（可空）
}

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 人工操作校验 =====
    #[error("移单校验失败: {reason}")]
    MoveValidation {
        reason: String,
        violations: Vec<ValidationViolation>,
    },

    // ===== 数据访问 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("参考数据加载失败: {0}")]
    ReferenceData(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
