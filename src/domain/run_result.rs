// ==========================================
// 运输自动拼载引擎 - 拼载结果模型
// ==========================================
// 红线: RunResult 按 run_id 追加写, 不回改;
// 后续 "应用" 操作物化真实运输单, 不反向污染结果集
// ==========================================

use crate::domain::order::CandidateOrder;
use crate::domain::types::{AutogroupingType, TarificationType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// SkippedOrder - 被跳过的运单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOrder {
    pub order: CandidateOrder, // 原始运单
    pub reason: String,        // 跳过原因（本地化文本, 仅展示）
}

// ==========================================
// AssignedOrder - 运单归属记录
// ==========================================
// 每个成功拼载的运单一行, 携带引擎回写的解析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedOrder {
    pub run_id: String,                  // 拼载批次
    pub order_id: i64,                   // 运单 id
    pub group_id: String,                // 所属运输单组
    pub pseudo_shipment_id: i64,         // 所属拼载单（调用内序号）
    pub body_type_id: i64,               // 回写车厢类型
    pub vehicle_type_id: i64,            // 回写车型
    pub tarification_type: Option<TarificationType>, // 回写计费方式
}

// ==========================================
// ShipmentGroup - 建议运输单
// ==========================================
// 每个建议创建的运输单一行; 未拼载运单汇入合成组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentGroup {
    pub group_id: String, // 运输单组 id（UUID）
    pub run_id: String,   // 拼载批次

    // ===== 分类与计费 =====
    pub autogrouping_type: Option<AutogroupingType>, // 拼载类型（合成组为空）
    pub tarification_type: Option<TarificationType>, // 选中计费方式
    pub carrier_id: Option<i64>,                     // 选中承运商
    pub cost: Option<f64>,                           // 最优成本

    // ===== 载量 =====
    pub pallets: f64,                 // 聚合托盘数
    pub weight_kg: f64,               // 聚合重量
    pub vehicle_type_id: Option<i64>, // 已解析车型
    pub body_type_id: Option<i64>,    // 车厢类型

    // ===== 时间与地点 =====
    pub shipping_date: Option<NaiveDate>,  // 成员最早发运日
    pub delivery_date: Option<NaiveDate>,  // 成员最晚送达日
    pub shipping_address: Option<String>,  // 发运地址（已 trim, 移单校验用）
    pub route_name: String,                // 可读线路名称

    // ===== 成员 =====
    pub order_ids: Vec<i64>, // 成员运单 id

    // ===== 可解释性 =====
    pub decision_reason_json: Option<String>, // 串点/直发决策依据（JSON, 仅展示）
}

// ==========================================
// CostAlternative - 备选承运成本
// ==========================================
// 每个运输单组 × 候选承运商/类型一行, 供人工改派
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAlternative {
    pub run_id: String,                      // 拼载批次
    pub group_id: String,                    // 所属运输单组
    pub autogrouping_type: AutogroupingType, // 拼载类型
    pub carrier_id: Option<i64>,             // 承运商
    pub value: Option<f64>,                  // 成本值
    pub valid: bool,                         // 是否可选
    pub message: Option<String>,             // 不可用原因
}

// ==========================================
// RunResult - 一次拼载调用的结果集
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,                         // 拼载批次 id
    pub assigned_orders: Vec<AssignedOrder>,    // 运单归属
    pub shipment_groups: Vec<ShipmentGroup>,    // 建议运输单
    pub cost_alternatives: Vec<CostAlternative>, // 备选承运成本
}

impl RunResult {
    /// 创建空结果集
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            assigned_orders: Vec::new(),
            shipment_groups: Vec::new(),
            cost_alternatives: Vec::new(),
        }
    }

    /// 统计某运输单组的备选成本行数
    pub fn alternatives_for(&self, group_id: &str) -> usize {
        self.cost_alternatives
            .iter()
            .filter(|a| a.group_id == group_id)
            .count()
    }
}
