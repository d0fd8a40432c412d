// ==========================================
// 运输自动拼载引擎 - 领域类型定义
// ==========================================
// 红线: 计费方式与拼载类型分离, 拼载类型由计费方式派生
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 计费方式 (Tarification Type)
// ==========================================
// Doubledeck 不参与自动拼载, 仅人工指派
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TarificationType {
    Ftl,        // 整车
    Ltl,        // 零担
    Pooling,    // 集拼
    Milkrun,    // 循环取货
    Doubledeck, // 双层挂 (引擎外)
}

impl fmt::Display for TarificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TarificationType::Ftl => write!(f, "FTL"),
            TarificationType::Ltl => write!(f, "LTL"),
            TarificationType::Pooling => write!(f, "POOLING"),
            TarificationType::Milkrun => write!(f, "MILKRUN"),
            TarificationType::Doubledeck => write!(f, "DOUBLEDECK"),
        }
    }
}

impl TarificationType {
    /// 自动拼载评估的计费方式集合 (不含 Doubledeck)
    pub const GROUPABLE: [TarificationType; 4] = [
        TarificationType::Ftl,
        TarificationType::Ltl,
        TarificationType::Pooling,
        TarificationType::Milkrun,
    ];

    /// 映射为拼载类型 (点对点直发语义)
    ///
    /// # 返回
    /// - Doubledeck 无对应拼载类型, 返回 None
    pub fn autogrouping_type(&self) -> Option<AutogroupingType> {
        match self {
            TarificationType::Ftl => Some(AutogroupingType::FtlDirect),
            TarificationType::Ltl => Some(AutogroupingType::Ltl),
            TarificationType::Pooling => Some(AutogroupingType::Pooling),
            TarificationType::Milkrun => Some(AutogroupingType::Milkrun),
            TarificationType::Doubledeck => None,
        }
    }

    /// 从字符串解析计费方式
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FTL" => Some(TarificationType::Ftl),
            "LTL" => Some(TarificationType::Ltl),
            "POOLING" => Some(TarificationType::Pooling),
            "MILKRUN" => Some(TarificationType::Milkrun),
            "DOUBLEDECK" => Some(TarificationType::Doubledeck),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TarificationType::Ftl => "FTL",
            TarificationType::Ltl => "LTL",
            TarificationType::Pooling => "POOLING",
            TarificationType::Milkrun => "MILKRUN",
            TarificationType::Doubledeck => "DOUBLEDECK",
        }
    }
}

// ==========================================
// 拼载类型 (Autogrouping Type)
// ==========================================
// 面向用户的运输单类别, 由选中的计费方式派生
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutogroupingType {
    FtlDirect, // 整车直发
    FtlRoute,  // 整车串点
    Ltl,       // 零担
    Pooling,   // 集拼
    Milkrun,   // 循环取货
}

impl fmt::Display for AutogroupingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutogroupingType::FtlDirect => write!(f, "FTL_DIRECT"),
            AutogroupingType::FtlRoute => write!(f, "FTL_ROUTE"),
            AutogroupingType::Ltl => write!(f, "LTL"),
            AutogroupingType::Pooling => write!(f, "POOLING"),
            AutogroupingType::Milkrun => write!(f, "MILKRUN"),
        }
    }
}

// ==========================================
// 运单状态 (Order Status)
// ==========================================
// 红线: 仅 Created/Confirmed 状态的运单可进入拼载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,   // 已创建
    Confirmed, // 已确认
    Grouped,   // 已拼载
    Shipped,   // 已发运
    Cancelled, // 已取消
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "CREATED"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Grouped => write!(f, "GROUPED"),
            OrderStatus::Shipped => write!(f, "SHIPPED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl OrderStatus {
    /// 判断该状态的运单是否允许进入自动拼载
    pub fn is_groupable(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Confirmed)
    }
}

// ==========================================
// 里程查询结果 (Distance Result)
// ==========================================
// 红线: "查不到" 与 "里程为零" 必须可区分;
// 查不到时引擎保守降级 (不合并/不计价), 不报错
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceResult {
    Found(f64),  // 里程（公里）
    Unavailable, // 无法获取
}

impl DistanceResult {
    /// 是否查询成功
    pub fn is_found(&self) -> bool {
        matches!(self, DistanceResult::Found(_))
    }

    /// 取里程值
    pub fn value(&self) -> Option<f64> {
        match self {
            DistanceResult::Found(km) => Some(*km),
            DistanceResult::Unavailable => None,
        }
    }

    /// 排序用里程: 查不到按 0 参与排序
    pub fn value_or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }
}
