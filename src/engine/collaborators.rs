// ==========================================
// 运输自动拼载引擎 - 外部协作方接口
// ==========================================
// 职责: 定义里程查询与集拼舱位查询接口（不包含实现）
// 红线: 协作方失败保守降级 —— 里程查不到视为不可合并,
//       舱位查询失败视为无舱位; 均不向上抛错
// ==========================================

use crate::domain::order::RoutePoint;
use crate::domain::types::DistanceResult;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// DistanceProvider - 里程查询
// ==========================================
// 实现者: 地理服务适配层
// 红线: 实现方必须把自身错误折叠为 Unavailable, 不得 panic
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// 查询两个地点间的行车里程
    ///
    /// # 参数
    /// - from/to: 地点描述（仓库引用或自由文本城市）
    ///
    /// # 返回
    /// - DistanceResult::Found(km): 查询成功
    /// - DistanceResult::Unavailable: 查询失败或无数据
    async fn distance_km(&self, from: &RoutePoint, to: &RoutePoint) -> DistanceResult;
}

// ==========================================
// SlotQuery - 集拼舱位查询描述
// ==========================================
#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub company_id: i64,                  // 所属公司
    pub shipping_date: Option<NaiveDate>, // 发运日期
    pub shipping: RoutePoint,             // 发运地点
    pub delivery: RoutePoint,             // 卸货地点
    pub pallets: f64,                     // 托盘数
}

// ==========================================
// PoolingSlotProvider - 集拼舱位查询
// ==========================================
// 实现者: 外部订舱 API 适配层
#[async_trait]
pub trait PoolingSlotProvider: Send + Sync {
    /// 查询指定装载是否有可用集拼舱位
    ///
    /// # 返回
    /// - Ok(true): 有舱位
    /// - Ok(false): 无舱位
    /// - Err: 查询失败（调用方按无舱位降级处理）
    async fn has_slots(&self, query: &SlotQuery) -> anyhow::Result<bool>;
}
