// ==========================================
// 运输自动拼载引擎 - 成本核算引擎
// ==========================================
// 职责: 逐计费方式评估拼载单成本, 评估串点线路整车成本
// 红线: 不可用成本仍记录 value/message 供展示, 但不参与最优比较;
//       舱位查询失败按无舱位降级, 不向上抛错
// ==========================================

use crate::domain::shipment::{CostData, PseudoShipment, ShippingRoute};
use crate::domain::types::TarificationType;
use crate::engine::collaborators::{PoolingSlotProvider, SlotQuery};
use crate::engine::context::GroupingContext;
use crate::engine::tariff_resolver::{LoadDescriptor, TariffResolver};
use crate::i18n::t;
use tracing::{instrument, warn};

/// 循环取货最低托盘数
const MILKRUN_MIN_PALLETS: f64 = 15.0;

// ==========================================
// CostCalculator - 成本核算引擎
// ==========================================
pub struct CostCalculator {
    resolver: TariffResolver,
}

impl CostCalculator {
    pub fn new() -> Self {
        Self {
            resolver: TariffResolver::new(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 评估拼载单在各计费方式下的成本
    ///
    /// 门禁顺序 (每个方式独立):
    /// 1) 方式未启用 -> 记录后不参与选择
    /// 2) 集拼/循环取货且公司要求舱位校验 -> 无舱位则记 0 值不可用
    /// 3) 循环取货托盘数 < 15 -> 不可用
    /// 4) 运价匹配: 未命中记 0 值不可用, 命中记可用成本
    ///
    /// 所有承运商报价按拼载类型归档, 供人工改派
    #[instrument(skip(self, ctx, slot_provider, shipment, enabled_types), fields(
        shipment_id = shipment.shipment_id,
        pallets = shipment.pallets
    ))]
    pub async fn evaluate_shipment(
        &self,
        ctx: &GroupingContext,
        slot_provider: &dyn PoolingSlotProvider,
        shipment: &mut PseudoShipment,
        enabled_types: &[TarificationType],
    ) {
        let company_id = shipment.company_id();
        let check_slots = ctx
            .settings(company_id)
            .map(|s| s.check_pooling_slots)
            .unwrap_or(false);

        for tarification_type in TarificationType::GROUPABLE {
            // 门禁1: 方式未启用
            if !enabled_types.contains(&tarification_type) {
                shipment.costs.insert(
                    tarification_type,
                    CostData::unavailable(None, t("cost.type_disabled")),
                );
                continue;
            }

            // 门禁2: 集拼/循环取货舱位校验
            let needs_slots = matches!(
                tarification_type,
                TarificationType::Pooling | TarificationType::Milkrun
            );
            if needs_slots && check_slots {
                let query = SlotQuery {
                    company_id,
                    shipping_date: shipment.shipping_day(),
                    shipping: shipment.shipping_point().clone(),
                    delivery: shipment.delivery_point().clone(),
                    pallets: shipment.pallets,
                };
                let has_slots = match slot_provider.has_slots(&query).await {
                    Ok(result) => result,
                    Err(e) => {
                        // 查询失败按无舱位降级
                        warn!(
                            shipment_id = shipment.shipment_id,
                            "舱位查询失败, 按无舱位处理: {}", e
                        );
                        false
                    }
                };
                if !has_slots {
                    shipment.costs.insert(
                        tarification_type,
                        CostData::unavailable(Some(0.0), t("cost.no_pooling_slots")),
                    );
                    continue;
                }
            }

            // 门禁3: 循环取货最低托盘数
            if tarification_type == TarificationType::Milkrun
                && shipment.pallets < MILKRUN_MIN_PALLETS
            {
                shipment.costs.insert(
                    tarification_type,
                    CostData::unavailable(None, t("cost.not_enough_pallets")),
                );
                continue;
            }

            // 门禁4: 运价匹配
            let Some(shipping_date) = shipment.shipping_day() else {
                shipment.costs.insert(
                    tarification_type,
                    CostData::unavailable(Some(0.0), t("cost.tariff_not_found")),
                );
                continue;
            };
            let load = LoadDescriptor {
                shipping: shipment.shipping_point(),
                delivery: shipment.delivery_point(),
                shipping_date,
                pallets: shipment.pallets,
                vehicle_type_id: shipment.vehicle_type.vehicle_type_id,
                body_type_id: shipment.body_type_id(),
            };

            match self
                .resolver
                .resolve(ctx.tariffs(company_id), &load, tarification_type)
            {
                Some(resolution) => {
                    shipment.costs.insert(
                        tarification_type,
                        CostData::available(resolution.best.price, resolution.best.carrier_id),
                    );
                    // 备选承运成本按拼载类型归档
                    if let Some(group_type) = tarification_type.autogrouping_type() {
                        let alternatives = resolution
                            .per_carrier
                            .iter()
                            .map(|q| CostData::available(q.price, q.carrier_id))
                            .collect();
                        shipment.alternatives.insert(group_type, alternatives);
                    }
                }
                None => {
                    shipment.costs.insert(
                        tarification_type,
                        CostData::unavailable(Some(0.0), t("cost.tariff_not_found")),
                    );
                }
            }
        }
    }

    /// 评估串点线路的整车成本
    ///
    /// 规则: 取单段里程最长的成员做整车计价,
    /// 叠加 串点附加费 × (去重卸货点数 - 1);
    /// 仅一个卸货点或任一成员里程不可得时成本不可用
    /// (该线路永远不会胜过直发)
    #[instrument(skip(self, ctx, route, enabled_types), fields(
        route_id = route.route_id,
        members = route.shipments.len()
    ))]
    pub async fn evaluate_route(
        &self,
        ctx: &GroupingContext,
        route: &mut ShippingRoute,
        enabled_types: &[TarificationType],
    ) {
        route.ftl_alternatives.clear();

        // 整车方式未启用时线路成本不可用
        if !enabled_types.contains(&TarificationType::Ftl) {
            route.ftl_cost = CostData::unavailable(None, t("cost.type_disabled"));
            return;
        }

        // 仅一个卸货点: 不参与串点计费
        let delivery_points = route.distinct_delivery_points();
        if delivery_points.len() <= 1 {
            route.ftl_cost = CostData::unavailable(None, t("cost.route_single_delivery_point"));
            return;
        }

        // 任一成员里程不可得: 成本不可用
        if route
            .shipments
            .iter()
            .any(|s| !s.route_distance.is_found())
        {
            route.ftl_cost = CostData::unavailable(None, t("cost.route_distance_unavailable"));
            return;
        }

        // 取单段里程最长的成员 (同里程取先入线路者)
        let Some(longest) = route.shipments.iter().reduce(|best, s| {
            if s.route_distance.value_or_zero() > best.route_distance.value_or_zero() {
                s
            } else {
                best
            }
        }) else {
            route.ftl_cost = CostData::unavailable(None, t("cost.route_single_delivery_point"));
            return;
        };

        let Some(shipping_date) = longest.shipping_day() else {
            route.ftl_cost = CostData::unavailable(Some(0.0), t("cost.tariff_not_found"));
            return;
        };
        let load = LoadDescriptor {
            shipping: longest.shipping_point(),
            delivery: longest.delivery_point(),
            shipping_date,
            pallets: route.pallets,
            vehicle_type_id: route.vehicle_type.vehicle_type_id,
            body_type_id: route.vehicle_type.body_type_id,
        };

        match self.resolver.resolve(
            ctx.tariffs(route.company_id()),
            &load,
            TarificationType::Ftl,
        ) {
            Some(resolution) => {
                // 每个报价叠加各自的串点附加费
                let extra_points = (delivery_points.len() - 1) as f64;
                let mut adjusted: Vec<CostData> = resolution
                    .per_carrier
                    .iter()
                    .map(|q| {
                        let surcharge = q.extra_point_rate.unwrap_or(0.0) * extra_points;
                        CostData::available(q.price + surcharge, q.carrier_id)
                    })
                    .collect();
                adjusted.sort_by(|a, b| {
                    a.value
                        .partial_cmp(&b.value)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.carrier_id.cmp(&b.carrier_id))
                });

                route.ftl_cost = adjusted[0].clone();
                route.ftl_alternatives = adjusted;
            }
            None => {
                route.ftl_cost = CostData::unavailable(Some(0.0), t("cost.tariff_not_found"));
            }
        }
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::company::CompanySettings;
    use crate::domain::order::{CandidateOrder, RoutePoint};
    use crate::domain::tariff::{LtlRateTable, Tariff};
    use crate::domain::types::{AutogroupingType, DistanceResult, OrderStatus};
    use crate::domain::vehicle::{Tonnage, VehicleType};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;

    /// 固定结果的舱位查询桩
    struct StaticSlots(bool);

    #[async_trait]
    impl PoolingSlotProvider for StaticSlots {
        async fn has_slots(&self, _query: &SlotQuery) -> anyhow::Result<bool> {
            Ok(self.0)
        }
    }

    /// 总是失败的舱位查询桩 (验证降级)
    struct FailingSlots;

    #[async_trait]
    impl PoolingSlotProvider for FailingSlots {
        async fn has_slots(&self, _query: &SlotQuery) -> anyhow::Result<bool> {
            anyhow::bail!("booking API unreachable")
        }
    }

    fn create_test_vehicle() -> VehicleType {
        VehicleType {
            vehicle_type_id: 1,
            body_type_id: 1,
            tonnage: Tonnage {
                tonnage_id: 1,
                name: "20t".to_string(),
                max_weight_kg: 20000.0,
            },
            max_pallets: 33,
            interregion: true,
        }
    }

    fn create_test_tariff(
        tariff_id: i64,
        carrier_id: i64,
        tarification_type: TarificationType,
        delivery_city: &str,
    ) -> Tariff {
        Tariff {
            tariff_id,
            company_id: 10,
            carrier_id,
            tarification_type,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            shipping_warehouse_id: None,
            delivery_warehouse_id: None,
            shipping_city: Some("Москва".to_string()),
            delivery_city: Some(delivery_city.to_string()),
            shipping_region: None,
            delivery_region: None,
            vehicle_type_id: None,
            body_type_id: None,
            ftl_rate: Some(30000.0),
            ltl_rates: LtlRateTable::empty()
                .with_rate(10, 11000.0)
                .with_rate(16, 16000.0)
                .with_rate(18, 18000.0),
            extra_point_rate: Some(1500.0),
            winter: None,
        }
    }

    fn create_test_context(check_pooling_slots: bool, tariffs: Vec<Tariff>) -> GroupingContext {
        let settings = CompanySettings {
            company_id: 10,
            default_tonnage_id: Some(1),
            body_type_ids: vec![1],
            max_unloading_points: None,
            region_overrun_limit: None,
            interregion_overrun_limit: None,
            check_pooling_slots,
        };
        GroupingContext::from_parts(
            HashMap::from([(10, vec![create_test_vehicle()])]),
            HashMap::from([(10, settings)]),
            HashMap::from([(10, tariffs)]),
            HashMap::from([(10, None)]),
        )
    }

    fn create_test_shipment(shipment_id: i64, delivery_city: &str, pallets: f64, distance_km: f64) -> PseudoShipment {
        let order = CandidateOrder {
            order_id: shipment_id * 100,
            company_id: 10,
            status: OrderStatus::Created,
            shipping: RoutePoint {
                warehouse_id: None,
                city: Some("Москва".to_string()),
                region: Some("Центр".to_string()),
                address: Some("ул. Ленина, 1".to_string()),
            },
            delivery: RoutePoint {
                warehouse_id: None,
                city: Some(delivery_city.to_string()),
                region: Some("Центр".to_string()),
                address: Some("адрес".to_string()),
            },
            shipping_date: Some(Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap()),
            delivery_date: Some(Utc.with_ymd_and_hms(2026, 2, 11, 8, 0, 0).unwrap()),
            pallets,
            weight_kg: pallets * 100.0,
            body_type_id: Some(1),
            vehicle_type_id: None,
            created_at: Utc::now(),
        };
        PseudoShipment::seed(
            shipment_id,
            order,
            create_test_vehicle(),
            DistanceResult::Found(distance_km),
        )
    }

    const ALL_TYPES: [TarificationType; 4] = TarificationType::GROUPABLE;

    #[tokio::test]
    async fn test_disabled_type_recorded_not_selected() {
        let ctx = create_test_context(false, vec![create_test_tariff(1, 500, TarificationType::Ltl, "Тверь")]);
        let calculator = CostCalculator::new();
        let mut shipment = create_test_shipment(1, "Тверь", 10.0, 160.0);

        // 仅启用零担
        calculator
            .evaluate_shipment(&ctx, &StaticSlots(true), &mut shipment, &[TarificationType::Ltl])
            .await;

        let ftl = shipment.costs.get(&TarificationType::Ftl).unwrap();
        assert!(!ftl.valid);
        assert_eq!(ftl.value, None);

        let (best_type, best) = shipment.best_cost().unwrap();
        assert_eq!(best_type, TarificationType::Ltl);
        assert_eq!(best.value, Some(11000.0));
    }

    #[tokio::test]
    async fn test_no_pooling_slots_zero_invalid() {
        let ctx = create_test_context(true, vec![create_test_tariff(1, 500, TarificationType::Pooling, "Тверь")]);
        let calculator = CostCalculator::new();
        let mut shipment = create_test_shipment(1, "Тверь", 10.0, 160.0);

        calculator
            .evaluate_shipment(&ctx, &StaticSlots(false), &mut shipment, &ALL_TYPES)
            .await;

        let pooling = shipment.costs.get(&TarificationType::Pooling).unwrap();
        assert!(!pooling.valid);
        assert_eq!(pooling.value, Some(0.0));
        assert!(pooling.message.is_some());
        // 其余方式也无运价 => 无可用成本
        assert!(shipment.best_cost().is_none());
    }

    #[tokio::test]
    async fn test_slot_provider_failure_degrades_to_no_slots() {
        let ctx = create_test_context(true, vec![create_test_tariff(1, 500, TarificationType::Pooling, "Тверь")]);
        let calculator = CostCalculator::new();
        let mut shipment = create_test_shipment(1, "Тверь", 10.0, 160.0);

        calculator
            .evaluate_shipment(&ctx, &FailingSlots, &mut shipment, &ALL_TYPES)
            .await;

        let pooling = shipment.costs.get(&TarificationType::Pooling).unwrap();
        assert!(!pooling.valid);
        assert_eq!(pooling.value, Some(0.0));
    }

    #[tokio::test]
    async fn test_milkrun_needs_fifteen_pallets() {
        let ctx = create_test_context(false, vec![create_test_tariff(1, 500, TarificationType::Milkrun, "Тверь")]);
        let calculator = CostCalculator::new();

        let mut small = create_test_shipment(1, "Тверь", 10.0, 160.0);
        calculator
            .evaluate_shipment(&ctx, &StaticSlots(true), &mut small, &ALL_TYPES)
            .await;
        let milkrun = small.costs.get(&TarificationType::Milkrun).unwrap();
        assert!(!milkrun.valid);
        assert_eq!(milkrun.value, None);

        // 16 板可用 (按档位表计价)
        let mut big = create_test_shipment(2, "Тверь", 16.0, 160.0);
        calculator
            .evaluate_shipment(&ctx, &StaticSlots(true), &mut big, &ALL_TYPES)
            .await;
        let milkrun = big.costs.get(&TarificationType::Milkrun).unwrap();
        assert!(milkrun.valid);
        assert_eq!(milkrun.value, Some(16000.0));
    }

    #[tokio::test]
    async fn test_alternatives_tagged_by_autogrouping_type() {
        let tariffs = vec![
            create_test_tariff(1, 500, TarificationType::Ltl, "Тверь"),
            create_test_tariff(2, 501, TarificationType::Ltl, "Тверь"),
            create_test_tariff(3, 502, TarificationType::Ftl, "Тверь"),
        ];
        let ctx = create_test_context(false, tariffs);
        let calculator = CostCalculator::new();
        let mut shipment = create_test_shipment(1, "Тверь", 10.0, 160.0);

        calculator
            .evaluate_shipment(&ctx, &StaticSlots(true), &mut shipment, &ALL_TYPES)
            .await;

        assert_eq!(
            shipment
                .alternatives
                .get(&AutogroupingType::Ltl)
                .map(|v| v.len()),
            Some(2)
        );
        assert_eq!(
            shipment
                .alternatives
                .get(&AutogroupingType::FtlDirect)
                .map(|v| v.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_route_cost_with_extra_point_surcharge() {
        let ctx = create_test_context(false, vec![create_test_tariff(1, 500, TarificationType::Ftl, "Тверь")]);
        let calculator = CostCalculator::new();

        // 最长成员 Тверь(160km), 两个去重卸货点 => 附加费 ×1
        let mut route = crate::domain::shipment::ShippingRoute::seed(
            1,
            create_test_shipment(1, "Тверь", 10.0, 160.0),
        );
        route.push_shipment(create_test_shipment(2, "Клин", 8.0, 65.0));

        calculator.evaluate_route(&ctx, &mut route, &ALL_TYPES).await;

        assert!(route.ftl_cost.valid);
        // 30000 + 1500 × (2-1)
        assert_eq!(route.ftl_cost.value, Some(31500.0));
        assert_eq!(route.ftl_alternatives.len(), 1);
    }

    #[tokio::test]
    async fn test_route_single_delivery_point_invalid() {
        let ctx = create_test_context(false, vec![create_test_tariff(1, 500, TarificationType::Ftl, "Тверь")]);
        let calculator = CostCalculator::new();

        let mut route = crate::domain::shipment::ShippingRoute::seed(
            1,
            create_test_shipment(1, "Тверь", 10.0, 160.0),
        );
        route.push_shipment(create_test_shipment(2, "Тверь", 8.0, 160.0));

        calculator.evaluate_route(&ctx, &mut route, &ALL_TYPES).await;

        assert!(!route.ftl_cost.valid);
        assert!(route.ftl_alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_route_unavailable_member_distance_invalid() {
        let ctx = create_test_context(false, vec![create_test_tariff(1, 500, TarificationType::Ftl, "Тверь")]);
        let calculator = CostCalculator::new();

        let mut route = crate::domain::shipment::ShippingRoute::seed(
            1,
            create_test_shipment(1, "Тверь", 10.0, 160.0),
        );
        let mut no_distance = create_test_shipment(2, "Клин", 8.0, 0.0);
        no_distance.route_distance = DistanceResult::Unavailable;
        route.push_shipment(no_distance);

        calculator.evaluate_route(&ctx, &mut route, &ALL_TYPES).await;

        assert!(!route.ftl_cost.valid);
    }
}
