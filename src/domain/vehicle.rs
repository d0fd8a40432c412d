// ==========================================
// 运输自动拼载引擎 - 车型领域模型
// ==========================================
// 红线: 载量约束优先于成本优化
// 用途: 容量判定, 车型适配
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Tonnage - 吨位档
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tonnage {
    pub tonnage_id: i64,    // 吨位档 id
    pub name: String,       // 名称（如 "20t"）
    pub max_weight_kg: f64, // 最大载重（千克）
}

// ==========================================
// VehicleType - 车型
// ==========================================
// 用途: 每次拼载调用加载一次, 调用内只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub vehicle_type_id: i64, // 车型 id
    pub body_type_id: i64,    // 车厢类型 id
    pub tonnage: Tonnage,     // 关联吨位档
    pub max_pallets: i32,     // 最大托盘数
    pub interregion: bool,    // 是否可跑跨区域线路
}

// ==========================================
// Trait: LoadCapacity
// ==========================================
// 用途: 装载约束检查接口
pub trait LoadCapacity {
    /// 检查给定托盘数/重量是否在容量内
    fn fits(&self, pallets: f64, weight_kg: f64) -> bool;

    /// 检查在当前聚合之上再装一单是否超限
    fn can_add(&self, current_pallets: f64, current_weight_kg: f64, add_pallets: f64, add_weight_kg: f64) -> bool;
}

impl LoadCapacity for VehicleType {
    /// 检查给定托盘数/重量是否在容量内
    ///
    /// # 参数
    /// - `pallets`: 托盘数
    /// - `weight_kg`: 重量（千克）
    fn fits(&self, pallets: f64, weight_kg: f64) -> bool {
        pallets <= self.max_pallets as f64 && weight_kg <= self.tonnage.max_weight_kg
    }

    /// 检查在当前聚合之上再装一单是否超限
    fn can_add(
        &self,
        current_pallets: f64,
        current_weight_kg: f64,
        add_pallets: f64,
        add_weight_kg: f64,
    ) -> bool {
        self.fits(current_pallets + add_pallets, current_weight_kg + add_weight_kg)
    }
}
