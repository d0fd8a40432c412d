// ==========================================
// 运输自动拼载引擎 - 运单领域模型
// ==========================================
// 红线: 候选运单对引擎只读, 引擎仅回写车型/车厢/计费结果
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RoutePoint - 装卸货地点描述
// ==========================================
// 仓库 id 与自由文本字段二选一: 有仓库 id 以仓库为准,
// 否则按 城市/区域/详细地址 文本匹配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub warehouse_id: Option<i64>, // 仓库 id（有值时为精确地点）
    pub city: Option<String>,      // 城市（自由文本）
    pub region: Option<String>,    // 区域/省份（自由文本）
    pub address: Option<String>,   // 详细地址（自由文本）
}

impl RoutePoint {
    /// 卸货点去重用的标识: 仓库 id 优先, 其次城市
    ///
    /// # 返回
    /// - 归一化的地点键; 两个字段都缺失时返回 None
    pub fn point_key(&self) -> Option<String> {
        if let Some(id) = self.warehouse_id {
            return Some(format!("W{}", id));
        }
        self.city
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .map(|c| format!("C{}", c))
    }

    /// 人类可读的地点名称 (线路命名用)
    pub fn display_name(&self) -> String {
        if let Some(city) = self.city.as_deref().filter(|c| !c.trim().is_empty()) {
            return city.trim().to_string();
        }
        match self.warehouse_id {
            Some(id) => format!("W{}", id),
            None => "?".to_string(),
        }
    }

    /// 归一化的区域名称 (跨区域判定用)
    pub fn region_key(&self) -> Option<String> {
        self.region
            .as_deref()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
    }
}

// ==========================================
// CandidateOrder - 候选运单
// ==========================================
// 用途: 拼载引擎的不可变输入
// 引擎仅在结果中回写 body_type_id / vehicle_type_id / 计费方式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateOrder {
    // ===== 主键 =====
    pub order_id: i64, // 运单唯一标识

    // ===== 归属 =====
    pub company_id: i64,        // 所属公司
    pub status: OrderStatus,    // 运单状态

    // ===== 地点 =====
    pub shipping: RoutePoint, // 发运地点
    pub delivery: RoutePoint, // 卸货地点

    // ===== 时间 =====
    pub shipping_date: Option<DateTime<Utc>>, // 发运日期
    pub delivery_date: Option<DateTime<Utc>>, // 送达日期

    // ===== 载量 =====
    pub pallets: f64,   // 托盘数（可为小数, 聚合后向上取整）
    pub weight_kg: f64, // 重量（千克）

    // ===== 车辆约束 =====
    pub body_type_id: Option<i64>,    // 车厢类型
    pub vehicle_type_id: Option<i64>, // 指定车型（可空, 由引擎解析）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
}

impl CandidateOrder {
    /// 发运日期（仅日期部分, 分桶键用）
    pub fn shipping_day(&self) -> Option<NaiveDate> {
        self.shipping_date.map(|d| d.date_naive())
    }

    /// 送达日期（仅日期部分, 分桶键用）
    pub fn delivery_day(&self) -> Option<NaiveDate> {
        self.delivery_date.map(|d| d.date_naive())
    }

    /// 列出缺失的必填字段
    ///
    /// 必填: 发运/送达日期 + 四个地点文本字段
    /// (发运城市/发运地址/卸货城市/卸货地址)
    ///
    /// # 返回
    /// 缺失字段名列表（snake_case）, 为空表示字段齐全
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.shipping_date.is_none() {
            missing.push("shipping_date");
        }
        if self.delivery_date.is_none() {
            missing.push("delivery_date");
        }
        if is_blank(&self.shipping.city) {
            missing.push("shipping_city");
        }
        if is_blank(&self.shipping.address) {
            missing.push("shipping_address");
        }
        if is_blank(&self.delivery.city) {
            missing.push("delivery_city");
        }
        if is_blank(&self.delivery.address) {
            missing.push("delivery_address");
        }
        missing
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}
