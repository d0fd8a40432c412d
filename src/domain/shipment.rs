// ==========================================
// 运输自动拼载引擎 - 拼载单与串点线路
// ==========================================
// 红线: 聚合托盘/重量在任一插入时刻不得超过已解析车型容量
// 生命周期: 仅存在于单次拼载调用内, 不落库
// ==========================================

use crate::domain::order::{CandidateOrder, RoutePoint};
use crate::domain::types::{AutogroupingType, DistanceResult, TarificationType};
use crate::domain::vehicle::VehicleType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ==========================================
// CostData - 单个计费方式的成本评估结果
// ==========================================
// valid=false 的记录仍携带 value/message 用于展示,
// 但不参与最优成本比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostData {
    pub value: Option<f64>,      // 成本值（不可用时可为 0 或空）
    pub carrier_id: Option<i64>, // 承运商 id
    pub valid: bool,             // 是否可参与最优比较
    pub message: Option<String>, // 不可用原因（本地化文本, 仅展示）
}

impl CostData {
    /// 可用成本
    pub fn available(value: f64, carrier_id: i64) -> Self {
        Self {
            value: Some(value),
            carrier_id: Some(carrier_id),
            valid: true,
            message: None,
        }
    }

    /// 不可用成本（带展示值与原因）
    pub fn unavailable(value: Option<f64>, message: String) -> Self {
        Self {
            value,
            carrier_id: None,
            valid: false,
            message: Some(message),
        }
    }
}

// ==========================================
// PseudoShipment - 拼载单
// ==========================================
// 同发运/卸货地点与日期的点对点运单打包, 尚未持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoShipment {
    pub shipment_id: i64,            // 调用内序号
    pub orders: Vec<CandidateOrder>, // 成员运单
    pub pallets: f64,                // 聚合托盘数
    pub weight_kg: f64,              // 聚合重量
    pub vehicle_type: VehicleType,   // 已解析车型
    pub route_distance: DistanceResult, // 发运->卸货里程（创建时计算一次）

    // 成本评估结果（CostCalculator 写入）
    pub costs: HashMap<TarificationType, CostData>,
    pub alternatives: HashMap<AutogroupingType, Vec<CostData>>,
}

impl PseudoShipment {
    /// 以种子运单创建拼载单
    pub fn seed(
        shipment_id: i64,
        order: CandidateOrder,
        vehicle_type: VehicleType,
        route_distance: DistanceResult,
    ) -> Self {
        let pallets = order.pallets;
        let weight_kg = order.weight_kg;
        Self {
            shipment_id,
            orders: vec![order],
            pallets,
            weight_kg,
            vehicle_type,
            route_distance,
            costs: HashMap::new(),
            alternatives: HashMap::new(),
        }
    }

    /// 加入运单并更新聚合值 (调用方负责容量校验)
    pub fn push_order(&mut self, order: CandidateOrder) {
        self.pallets += order.pallets;
        self.weight_kg += order.weight_kg;
        self.orders.push(order);
    }

    /// 种子运单 (分桶键保证成员同质, 地点/日期取首单即可)
    fn head(&self) -> &CandidateOrder {
        &self.orders[0]
    }

    pub fn company_id(&self) -> i64 {
        self.head().company_id
    }

    pub fn shipping_point(&self) -> &RoutePoint {
        &self.head().shipping
    }

    pub fn delivery_point(&self) -> &RoutePoint {
        &self.head().delivery
    }

    pub fn shipping_day(&self) -> Option<NaiveDate> {
        self.head().shipping_day()
    }

    pub fn delivery_day(&self) -> Option<NaiveDate> {
        self.head().delivery_day()
    }

    pub fn body_type_id(&self) -> i64 {
        self.vehicle_type.body_type_id
    }

    /// 成员运单触及的区域集合 (发运+卸货)
    pub fn regions(&self) -> BTreeSet<String> {
        let mut regions = BTreeSet::new();
        for order in &self.orders {
            if let Some(r) = order.shipping.region_key() {
                regions.insert(r);
            }
            if let Some(r) = order.delivery.region_key() {
                regions.insert(r);
            }
        }
        regions
    }

    /// 最优可用成本: 按计费方式声明顺序遍历, 严格更小者替换
    /// (同价时先声明的计费方式胜出, 保证确定性)
    ///
    /// # 返回
    /// - Some((计费方式, 成本)): 存在可用成本
    /// - None: 所有方式均不可用
    pub fn best_cost(&self) -> Option<(TarificationType, &CostData)> {
        let mut best: Option<(TarificationType, &CostData)> = None;
        for t in TarificationType::GROUPABLE {
            let Some(cost) = self.costs.get(&t) else { continue };
            if !cost.valid {
                continue;
            }
            let Some(value) = cost.value else { continue };
            match best {
                Some((_, b)) if value >= b.value.unwrap_or(f64::INFINITY) => {}
                _ => best = Some((t, cost)),
            }
        }
        best
    }

    /// 汇总所有计费方式的不可用原因 (运单被跳过时的展示文本)
    pub fn unavailability_reasons(&self) -> Vec<String> {
        let mut reasons: Vec<String> = Vec::new();
        for t in TarificationType::GROUPABLE {
            if let Some(cost) = self.costs.get(&t) {
                if let Some(msg) = &cost.message {
                    if !reasons.contains(msg) {
                        reasons.push(msg.clone());
                    }
                }
            }
        }
        reasons
    }
}

// ==========================================
// ShippingRoute - 串点线路
// ==========================================
// 同发运点/日期/车厢的拼载单按序合并, 作为单一整车评估
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingRoute {
    pub route_id: i64,                   // 调用内序号
    pub shipments: Vec<PseudoShipment>,  // 成员拼载单（有序）
    pub pallets: f64,                    // 聚合托盘数
    pub weight_kg: f64,                  // 聚合重量
    pub vehicle_type: VehicleType,       // 已解析车型
    pub ftl_cost: CostData,              // 串点整车成本
    pub ftl_alternatives: Vec<CostData>, // 串点整车备选承运成本
}

impl ShippingRoute {
    /// 以种子拼载单创建线路
    pub fn seed(route_id: i64, shipment: PseudoShipment) -> Self {
        let pallets = shipment.pallets;
        let weight_kg = shipment.weight_kg;
        let vehicle_type = shipment.vehicle_type.clone();
        Self {
            route_id,
            shipments: vec![shipment],
            pallets,
            weight_kg,
            vehicle_type,
            ftl_cost: CostData::unavailable(None, String::new()),
            ftl_alternatives: Vec::new(),
        }
    }

    /// 合并拼载单并更新聚合值 (调用方负责约束校验)
    pub fn push_shipment(&mut self, shipment: PseudoShipment) {
        self.pallets += shipment.pallets;
        self.weight_kg += shipment.weight_kg;
        self.shipments.push(shipment);
    }

    pub fn company_id(&self) -> i64 {
        self.shipments[0].company_id()
    }

    pub fn shipping_point(&self) -> &RoutePoint {
        self.shipments[0].shipping_point()
    }

    pub fn is_consolidated(&self) -> bool {
        self.shipments.len() > 1
    }

    /// 去重后的卸货点键 (保持成员顺序)
    pub fn distinct_delivery_points(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for shipment in &self.shipments {
            if let Some(key) = shipment.delivery_point().point_key() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// 线路触及的区域集合
    pub fn regions(&self) -> BTreeSet<String> {
        let mut regions = BTreeSet::new();
        for shipment in &self.shipments {
            regions.extend(shipment.regions());
        }
        regions
    }

    /// 是否跨区域 (触及区域数 > 1)
    pub fn interregion(&self) -> bool {
        self.regions().len() > 1
    }

    /// 成员直发最优成本之和 (无可用成本的成员按 0 计,
    /// 串点成本必须严格低于该和才入选)
    pub fn direct_cost_sum(&self) -> f64 {
        self.shipments
            .iter()
            .filter_map(|s| s.best_cost().and_then(|(_, c)| c.value))
            .sum()
    }

    /// 线路可读名称: 发运点 + 有序去重卸货点
    pub fn route_name(&self) -> String {
        let mut parts = vec![self.shipping_point().display_name()];
        let mut seen: Vec<String> = Vec::new();
        for shipment in &self.shipments {
            let point = shipment.delivery_point();
            if let Some(key) = point.point_key() {
                if !seen.contains(&key) {
                    seen.push(key);
                    parts.push(point.display_name());
                }
            }
        }
        parts.join(" → ")
    }
}
