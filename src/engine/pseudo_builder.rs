// ==========================================
// 运输自动拼载引擎 - 拼载单构建引擎
// ==========================================
// 职责: 候选运单分类 -> 精确分桶 -> 首次适应装箱
// 红线: 任一插入时刻聚合托盘/重量不得超过桶车型容量;
//       桶按发运日升序、桶内按托盘数降序处理 (结果确定性)
// ==========================================

use crate::domain::order::CandidateOrder;
use crate::domain::run_result::SkippedOrder;
use crate::domain::shipment::PseudoShipment;
use crate::domain::vehicle::LoadCapacity;
use crate::engine::collaborators::DistanceProvider;
use crate::engine::context::GroupingContext;
use crate::i18n::{t, t_with_args};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

// ==========================================
// 分桶键: 发运日在首位, BTreeMap 迭代即为升序
// ==========================================
type BucketKey = (NaiveDate, i64, i64, NaiveDate, String, String);

/// 分类通过的运单 (解析结果随行, 避免二次查询)
struct ClassifiedOrder {
    order: CandidateOrder,
    vehicle_type: crate::domain::vehicle::VehicleType,
    shipping_day: NaiveDate,
    delivery_day: NaiveDate,
}

/// 构建结果
#[derive(Debug, Clone)]
pub struct PseudoShipmentBuildResult {
    pub shipments: Vec<PseudoShipment>,  // 所有拼载单
    pub skipped: Vec<SkippedOrder>,      // 被跳过的运单（含原因）
}

// ==========================================
// PseudoShipmentBuilder - 拼载单构建引擎
// ==========================================
pub struct PseudoShipmentBuilder {
    // 无状态引擎
}

impl PseudoShipmentBuilder {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 将候选运单打包为拼载单
    ///
    /// 算法:
    /// 1) 分类: 状态/必填字段/车型解析不通过的运单直接跳过
    /// 2) 分桶: (车型, 公司, 发运日, 送达日, 发运地址, 卸货地址)
    ///    精确键, 按发运日升序处理
    /// 3) 桶内按托盘数降序首次适应装箱, 只扫描本桶已开的箱
    ///    (分桶键已保证同质性, 跨桶无合并可能)
    ///
    /// # 参数
    /// - ctx: 调用级上下文（车型缓存等）
    /// - distance_provider: 里程查询（新箱创建时计算一次）
    /// - orders: 候选运单
    #[instrument(skip(self, ctx, distance_provider, orders), fields(orders_count = orders.len()))]
    pub async fn build(
        &self,
        ctx: &GroupingContext,
        distance_provider: &dyn DistanceProvider,
        orders: Vec<CandidateOrder>,
    ) -> PseudoShipmentBuildResult {
        let mut skipped: Vec<SkippedOrder> = Vec::new();
        let mut buckets: BTreeMap<BucketKey, Vec<ClassifiedOrder>> = BTreeMap::new();

        // 1. 分类 + 分桶
        for order in orders {
            match self.classify(ctx, order) {
                Ok(classified) => {
                    let key = (
                        classified.shipping_day,
                        classified.vehicle_type.vehicle_type_id,
                        classified.order.company_id,
                        classified.delivery_day,
                        trimmed(&classified.order.shipping.address),
                        trimmed(&classified.order.delivery.address),
                    );
                    buckets.entry(key).or_default().push(classified);
                }
                Err((order, reason)) => skipped.push(SkippedOrder { order, reason }),
            }
        }

        debug!(buckets = buckets.len(), skipped = skipped.len(), "运单分类完成");

        // 2. 逐桶首次适应装箱
        let mut shipments: Vec<PseudoShipment> = Vec::new();
        let mut next_id: i64 = 1;

        for (_, mut entries) in buckets {
            // 桶内按托盘数降序 (稳定排序, 同数保持输入顺序)
            entries.sort_by(|a, b| {
                b.order
                    .pallets
                    .partial_cmp(&a.order.pallets)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            // 本桶已开的箱 (跨桶不可合并, 扫描窗口即本桶)
            let mut open_bins: Vec<PseudoShipment> = Vec::new();

            for entry in entries {
                let ClassifiedOrder {
                    order, vehicle_type, ..
                } = entry;

                let fitted = open_bins.iter_mut().find(|bin| {
                    bin.vehicle_type.can_add(
                        bin.pallets,
                        bin.weight_kg,
                        order.pallets,
                        order.weight_kg,
                    )
                });

                match fitted {
                    Some(bin) => bin.push_order(order),
                    None => {
                        // 新箱: 里程只在创建时计算一次
                        let route_distance = distance_provider
                            .distance_km(&order.shipping, &order.delivery)
                            .await;
                        open_bins.push(PseudoShipment::seed(
                            next_id,
                            order,
                            vehicle_type,
                            route_distance,
                        ));
                        next_id += 1;
                    }
                }
            }

            shipments.extend(open_bins);
        }

        debug!(shipments = shipments.len(), "拼载单构建完成");

        PseudoShipmentBuildResult { shipments, skipped }
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 单运单分类: 通过返回解析结果, 否则返回 (原单, 跳过原因)
    fn classify(
        &self,
        ctx: &GroupingContext,
        mut order: CandidateOrder,
    ) -> Result<ClassifiedOrder, (CandidateOrder, String)> {
        // 状态检查
        if !order.status.is_groupable() {
            return Err((order, t("group.status_not_allowed")));
        }

        // 必填字段检查 (日期 + 四个地点文本字段)
        let missing = order.missing_required_fields();
        if !missing.is_empty() {
            let reason = t_with_args("group.missing_fields", &[("fields", &missing.join(", "))]);
            return Err((order, reason));
        }
        let (Some(shipping_day), Some(delivery_day)) = (order.shipping_day(), order.delivery_day())
        else {
            return Err((
                order,
                t_with_args("group.missing_fields", &[("fields", "shipping_date, delivery_date")]),
            ));
        };

        // 车厢类型解析: 运单自带 -> 字典默认 -> 公司首个车厢
        let Some(body_type_id) = ctx.resolve_body_type(&order) else {
            return Err((order, t("group.vehicle_type_not_resolved")));
        };

        // 车型解析: 运单指定 -> 公司默认吨位档 -> 最高吨位
        let vehicle = order
            .vehicle_type_id
            .and_then(|id| ctx.vehicle_by_id(order.company_id, id))
            .or_else(|| ctx.resolve_vehicle(order.company_id, body_type_id));
        match vehicle {
            Some(v) => {
                let vehicle_type = v.clone();
                // 回写解析出的车厢类型 (结果装配时使用)
                order.body_type_id = Some(body_type_id);
                Ok(ClassifiedOrder {
                    order,
                    vehicle_type,
                    shipping_day,
                    delivery_day,
                })
            }
            None => Err((order, t("group.vehicle_type_not_resolved"))),
        }
    }
}

impl Default for PseudoShipmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or("").to_string()
}
