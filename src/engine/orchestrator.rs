// ==========================================
// 运输自动拼载引擎 - 引擎编排器
// ==========================================
// 用途: 协调 拼载单构建 -> 线路合并 -> 车型适配 -> 成本核算
//       -> 串点/直发决策 -> 结果装配 的执行顺序
// 红线: 串点胜出条件为严格小于 (同价取直发);
//       结果集按 run_id 追加写, 引擎不直接落库
// ==========================================

use crate::domain::order::CandidateOrder;
use crate::domain::run_result::{
    AssignedOrder, CostAlternative, RunResult, ShipmentGroup, SkippedOrder,
};
use crate::domain::shipment::{PseudoShipment, ShippingRoute};
use crate::domain::types::{AutogroupingType, TarificationType};
use crate::engine::collaborators::{DistanceProvider, PoolingSlotProvider};
use crate::engine::context::GroupingContext;
use crate::engine::cost_calculator::CostCalculator;
use crate::engine::error::{EngineError, EngineResult, ValidationViolation};
use crate::engine::pseudo_builder::PseudoShipmentBuilder;
use crate::engine::repositories::{GroupedShipmentStore, ReferenceDataReader};
use crate::engine::route_builder::RouteBuilder;
use crate::engine::vehicle_fitter::VehicleTypeFitter;
use crate::i18n::t;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==========================================
// MoveOrdersOutcome - 移单结果
// ==========================================
#[derive(Debug, Clone)]
pub struct MoveOrdersOutcome {
    pub target: ShipmentGroup,               // 重算后的目标运输单
    pub updated_sources: Vec<ShipmentGroup>, // 重算后的源运输单
    pub deleted_sources: Vec<String>,        // 被移空删除的源运输单
}

// ==========================================
// AutogroupingOrchestrator - 引擎编排器
// ==========================================
pub struct AutogroupingOrchestrator<R>
where
    R: ReferenceDataReader,
{
    reference: Arc<R>,
    store: Arc<dyn GroupedShipmentStore>,
    distance_provider: Arc<dyn DistanceProvider>,
    slot_provider: Arc<dyn PoolingSlotProvider>,
    pseudo_builder: PseudoShipmentBuilder,
    route_builder: RouteBuilder,
    fitter: VehicleTypeFitter,
    calculator: CostCalculator,
}

impl<R> AutogroupingOrchestrator<R>
where
    R: ReferenceDataReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - reference: 参考数据读取器
    /// - store: 已拼载结果存取 (移单操作用)
    /// - distance_provider: 里程查询
    /// - slot_provider: 集拼舱位查询
    pub fn new(
        reference: Arc<R>,
        store: Arc<dyn GroupedShipmentStore>,
        distance_provider: Arc<dyn DistanceProvider>,
        slot_provider: Arc<dyn PoolingSlotProvider>,
    ) -> Self {
        Self {
            reference,
            store,
            distance_provider,
            slot_provider,
            pseudo_builder: PseudoShipmentBuilder::new(),
            route_builder: RouteBuilder::new(),
            fitter: VehicleTypeFitter::new(),
            calculator: CostCalculator::new(),
        }
    }

    // ==========================================
    // 对外操作1/2: 自动拼载
    // ==========================================

    /// 执行完整自动拼载流程
    ///
    /// 未拼载运单汇入合成 "未拼载" 组, 保证结果可见性
    ///
    /// # 参数
    /// - orders: 候选运单
    /// - run_id: 拼载批次 id
    /// - enabled_types: 本次启用的计费方式
    pub async fn group_orders(
        &self,
        orders: Vec<CandidateOrder>,
        run_id: &str,
        enabled_types: &[TarificationType],
    ) -> EngineResult<RunResult> {
        let (mut result, skipped) = self.run_grouping(orders, run_id, enabled_types).await?;

        // 汇入合成 "未拼载" 组
        if !skipped.is_empty() {
            let group_id = Uuid::new_v4().to_string();
            let pallets: f64 = skipped.iter().map(|s| s.order.pallets).sum();
            let weight_kg: f64 = skipped.iter().map(|s| s.order.weight_kg).sum();
            result.shipment_groups.push(ShipmentGroup {
                group_id,
                run_id: run_id.to_string(),
                autogrouping_type: None,
                tarification_type: None,
                carrier_id: None,
                cost: None,
                pallets,
                weight_kg,
                vehicle_type_id: None,
                body_type_id: None,
                shipping_date: None,
                delivery_date: None,
                shipping_address: None,
                route_name: t("group.ungrouped_name"),
                order_ids: skipped.iter().map(|s| s.order.order_id).collect(),
                decision_reason_json: Some(
                    json!({
                        "skipped": skipped
                            .iter()
                            .map(|s| json!({"order_id": s.order.order_id, "reason": s.reason}))
                            .collect::<Vec<_>>()
                    })
                    .to_string(),
                ),
            });
        }

        Ok(result)
    }

    /// 执行完整自动拼载流程 (跳过运单单独返回, 不合成组)
    pub async fn group_orders_collect_skipped(
        &self,
        orders: Vec<CandidateOrder>,
        run_id: &str,
        enabled_types: &[TarificationType],
    ) -> EngineResult<(RunResult, Vec<SkippedOrder>)> {
        self.run_grouping(orders, run_id, enabled_types).await
    }

    /// 拼载主流程
    #[instrument(skip(self, orders, enabled_types), fields(
        run_id = %run_id,
        orders_count = orders.len()
    ))]
    async fn run_grouping(
        &self,
        orders: Vec<CandidateOrder>,
        run_id: &str,
        enabled_types: &[TarificationType],
    ) -> EngineResult<(RunResult, Vec<SkippedOrder>)> {
        info!(orders_count = orders.len(), "开始执行自动拼载流程");

        // ==========================================
        // 步骤1: 加载调用级上下文
        // ==========================================
        debug!("步骤1: 加载参考数据上下文");
        let ctx = GroupingContext::load(self.reference.as_ref(), &orders).await?;

        // ==========================================
        // 步骤2: 拼载单构建 (分类 + 装箱)
        // ==========================================
        debug!("步骤2: 执行拼载单构建");
        let build_result = self
            .pseudo_builder
            .build(&ctx, self.distance_provider.as_ref(), orders)
            .await;
        let mut skipped = build_result.skipped;

        info!(
            shipments_count = build_result.shipments.len(),
            skipped_count = skipped.len(),
            "拼载单构建完成"
        );

        // ==========================================
        // 步骤3: 串点线路合并
        // ==========================================
        debug!("步骤3: 执行串点线路合并");
        let mut routes = self
            .route_builder
            .build(&ctx, self.distance_provider.as_ref(), build_result.shipments)
            .await;

        info!(routes_count = routes.len(), "串点线路合并完成");

        // ==========================================
        // 步骤4: 车型适配
        // ==========================================
        debug!("步骤4: 执行车型适配");
        self.fitter.refit_all(&ctx, &mut routes);

        // ==========================================
        // 步骤5: 成本核算
        // ==========================================
        debug!("步骤5: 执行成本核算");
        for route in routes.iter_mut() {
            for shipment in route.shipments.iter_mut() {
                self.calculator
                    .evaluate_shipment(&ctx, self.slot_provider.as_ref(), shipment, enabled_types)
                    .await;
            }
            self.calculator
                .evaluate_route(&ctx, route, enabled_types)
                .await;
        }

        // ==========================================
        // 步骤6: 串点/直发决策 + 结果装配
        // ==========================================
        debug!("步骤6: 执行决策与结果装配");
        let mut result = RunResult::new(run_id);

        for route in routes {
            let direct_sum = route.direct_cost_sum();
            let route_wins = route.is_consolidated()
                && route.ftl_cost.valid
                && route
                    .ftl_cost
                    .value
                    .map(|v| v < direct_sum)
                    .unwrap_or(false);

            if route_wins {
                self.emit_route_group(&mut result, run_id, &route, direct_sum);
            } else {
                let decision = route.is_consolidated().then(|| {
                    json!({
                        "chosen": "DIRECT",
                        "route_cost": route.ftl_cost.value,
                        "route_cost_valid": route.ftl_cost.valid,
                        "direct_cost_sum": direct_sum,
                    })
                    .to_string()
                });
                for shipment in &route.shipments {
                    match shipment.best_cost() {
                        Some(_) => self.emit_direct_group(
                            &mut result,
                            run_id,
                            shipment,
                            decision.clone(),
                        ),
                        None => {
                            // 所有计费方式不可用 => 成员运单整体跳过
                            let reasons = shipment.unavailability_reasons();
                            let reason = if reasons.is_empty() {
                                t("cost.tariff_not_found")
                            } else {
                                reasons.join("; ")
                            };
                            for order in &shipment.orders {
                                skipped.push(SkippedOrder {
                                    order: order.clone(),
                                    reason: reason.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        info!(
            groups_count = result.shipment_groups.len(),
            assigned_count = result.assigned_orders.len(),
            skipped_count = skipped.len(),
            "自动拼载流程完成"
        );

        Ok((result, skipped))
    }

    // ==========================================
    // 对外操作3: 人工移单
    // ==========================================

    /// 将一组已拼载运单移入目标运输单
    ///
    /// 校验: 车厢类型、发运日期 (仅日期)、发运地址必须与目标一致;
    /// 任一校验失败返回结构化错误, 不做任何改动。
    /// 通过后按单线路语义重算源/目标运输单的车型与成本,
    /// 丢弃两侧过期的备选成本行, 移空的源运输单删除。
    #[instrument(skip(self, order_ids, enabled_types), fields(
        target_group_id = %target_group_id,
        orders_count = order_ids.len()
    ))]
    pub async fn move_orders(
        &self,
        order_ids: &[i64],
        target_group_id: &str,
        enabled_types: &[TarificationType],
    ) -> EngineResult<MoveOrdersOutcome> {
        // 1. 读取目标运输单与待移动运单
        let target = self
            .store
            .find_group(target_group_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "ShipmentGroup".to_string(),
                id: target_group_id.to_string(),
            })?;

        let moved = self.store.find_orders_with_groups(order_ids).await?;

        // 2. 校验 (失败即返回, 不做任何改动)
        let violations = self.validate_move(&target, order_ids, &moved);
        if !violations.is_empty() {
            return Err(EngineError::MoveValidation {
                reason: violations
                    .iter()
                    .map(|v| v.message.clone())
                    .collect::<Vec<_>>()
                    .join("; "),
                violations,
            });
        }

        info!("移单校验通过, 开始重算");

        // 3. 组装受影响运输单的新成员集合
        let moved_ids: Vec<i64> = moved.iter().map(|(o, _)| o.order_id).collect();
        let mut source_group_ids: Vec<String> = Vec::new();
        for (_, group_id) in &moved {
            if group_id != target_group_id && !source_group_ids.contains(group_id) {
                source_group_ids.push(group_id.clone());
            }
        }

        let mut target_orders = self.store.find_group_orders(target_group_id).await?;
        target_orders.retain(|o| !moved_ids.contains(&o.order_id));
        target_orders.extend(moved.iter().map(|(o, _)| o.clone()));

        // 4. 加载上下文 (覆盖全部受影响运单)
        let mut all_orders = target_orders.clone();
        for group_id in &source_group_ids {
            let mut orders = self.store.find_group_orders(group_id).await?;
            orders.retain(|o| !moved_ids.contains(&o.order_id));
            all_orders.extend(orders);
        }
        let ctx = GroupingContext::load(self.reference.as_ref(), &all_orders).await?;

        // 5. 重算目标运输单
        let new_target = self
            .reprice_group(&ctx, &target, target_orders, enabled_types)
            .await?;

        // 6. 重算各源运输单, 移空的删除
        let mut updated_sources: Vec<ShipmentGroup> = Vec::new();
        let mut deleted_sources: Vec<String> = Vec::new();
        for group_id in &source_group_ids {
            let source = self
                .store
                .find_group(group_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "ShipmentGroup".to_string(),
                    id: group_id.clone(),
                })?;
            let mut orders = self.store.find_group_orders(group_id).await?;
            orders.retain(|o| !moved_ids.contains(&o.order_id));

            if orders.is_empty() {
                // 源运输单被移空: 删除并丢弃其备选成本行
                self.store.replace_alternatives(group_id, &[]).await?;
                self.store.delete_group(group_id).await?;
                deleted_sources.push(group_id.clone());
            } else {
                let updated = self
                    .reprice_group(&ctx, &source, orders, enabled_types)
                    .await?;
                updated_sources.push(updated);
            }
        }

        info!(
            updated_sources = updated_sources.len(),
            deleted_sources = deleted_sources.len(),
            "移单重算完成"
        );

        Ok(MoveOrdersOutcome {
            target: new_target,
            updated_sources,
            deleted_sources,
        })
    }

    // ==========================================
    // 辅助方法: 移单校验
    // ==========================================

    fn validate_move(
        &self,
        target: &ShipmentGroup,
        requested_ids: &[i64],
        moved: &[(CandidateOrder, String)],
    ) -> Vec<ValidationViolation> {
        let mut violations: Vec<ValidationViolation> = Vec::new();

        // 运单存在性
        let found_ids: Vec<i64> = moved.iter().map(|(o, _)| o.order_id).collect();
        let missing: Vec<String> = requested_ids
            .iter()
            .filter(|id| !found_ids.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            violations.push(ValidationViolation {
                code: "ORDERS_NOT_FOUND".to_string(),
                message: crate::i18n::t_with_args(
                    "move.orders_not_found",
                    &[("ids", &missing.join(", "))],
                ),
                order_id: None,
            });
        }

        let target_address = target.shipping_address.as_deref().map(str::trim);

        for (order, _) in moved {
            // 车厢类型一致
            if order.body_type_id != target.body_type_id {
                violations.push(ValidationViolation {
                    code: "BODY_TYPE_MISMATCH".to_string(),
                    message: t("move.body_type_mismatch"),
                    order_id: Some(order.order_id),
                });
            }

            // 发运日期一致 (仅日期)
            if order.shipping_day() != target.shipping_date {
                violations.push(ValidationViolation {
                    code: "SHIPPING_DATE_MISMATCH".to_string(),
                    message: t("move.shipping_date_mismatch"),
                    order_id: Some(order.order_id),
                });
            }

            // 发运地址在并集内一致
            let order_address = order.shipping.address.as_deref().map(str::trim);
            if order_address != target_address {
                violations.push(ValidationViolation {
                    code: "SHIPPING_ADDRESS_MISMATCH".to_string(),
                    message: t("move.shipping_address_mismatch"),
                    order_id: Some(order.order_id),
                });
            }
        }

        violations
    }

    // ==========================================
    // 辅助方法: 单运输单重算 (单线路语义)
    // ==========================================

    /// 按单线路语义重算运输单: 成员重新装箱 -> 强制并入一条线路
    /// -> 车型适配 -> 成本核算 -> 覆盖保存并替换备选成本行
    async fn reprice_group(
        &self,
        ctx: &GroupingContext,
        group: &ShipmentGroup,
        orders: Vec<CandidateOrder>,
        enabled_types: &[TarificationType],
    ) -> EngineResult<ShipmentGroup> {
        let order_ids: Vec<i64> = orders.iter().map(|o| o.order_id).collect();

        // 成员重新装箱 (成员资格人工指定, 不做跨组合并)
        let build_result = self
            .pseudo_builder
            .build(ctx, self.distance_provider.as_ref(), orders)
            .await;
        let mut shipments = build_result.shipments.into_iter();
        let Some(seed) = shipments.next() else {
            return Err(EngineError::ReferenceData(format!(
                "运输单 {} 的成员运单无法重新装箱",
                group.group_id
            )));
        };
        let mut route = ShippingRoute::seed(1, seed);
        for shipment in shipments {
            route.push_shipment(shipment);
        }

        // 车型适配 + 成本核算
        self.fitter.refit_route(ctx, &mut route);
        for shipment in route.shipments.iter_mut() {
            self.calculator
                .evaluate_shipment(ctx, self.slot_provider.as_ref(), shipment, enabled_types)
                .await;
        }
        self.calculator
            .evaluate_route(ctx, &mut route, enabled_types)
            .await;

        // 单/多拼载单分别取直发最优或串点成本
        let mut updated = group.clone();
        updated.order_ids = order_ids;
        updated.pallets = route.pallets;
        updated.weight_kg = route.weight_kg;
        updated.vehicle_type_id = Some(route.vehicle_type.vehicle_type_id);
        updated.body_type_id = Some(route.vehicle_type.body_type_id);
        updated.shipping_date = member_min_shipping_day(&route);
        updated.delivery_date = member_max_delivery_day(&route);
        updated.route_name = route.route_name();

        let mut alternatives: Vec<CostAlternative> = Vec::new();
        if route.is_consolidated() {
            updated.autogrouping_type = Some(AutogroupingType::FtlRoute);
            updated.tarification_type = Some(TarificationType::Ftl);
            updated.carrier_id = route.ftl_cost.carrier_id;
            updated.cost = if route.ftl_cost.valid {
                route.ftl_cost.value
            } else {
                None
            };
            for cost in &route.ftl_alternatives {
                alternatives.push(CostAlternative {
                    run_id: updated.run_id.clone(),
                    group_id: updated.group_id.clone(),
                    autogrouping_type: AutogroupingType::FtlRoute,
                    carrier_id: cost.carrier_id,
                    value: cost.value,
                    valid: cost.valid,
                    message: cost.message.clone(),
                });
            }
        } else {
            let shipment = &route.shipments[0];
            match shipment.best_cost() {
                Some((tarification_type, cost)) => {
                    updated.autogrouping_type = tarification_type.autogrouping_type();
                    updated.tarification_type = Some(tarification_type);
                    updated.carrier_id = cost.carrier_id;
                    updated.cost = cost.value;
                }
                None => {
                    updated.autogrouping_type = None;
                    updated.tarification_type = None;
                    updated.carrier_id = None;
                    updated.cost = None;
                }
            }
            alternatives.extend(collect_shipment_alternatives(
                &updated.run_id,
                &updated.group_id,
                shipment,
            ));
        }

        // 覆盖保存 + 替换备选成本行 (丢弃过期行)
        self.store
            .replace_alternatives(&updated.group_id, &alternatives)
            .await?;
        self.store.save_group(&updated).await?;

        Ok(updated)
    }

    // ==========================================
    // 辅助方法: 结果装配
    // ==========================================

    /// 装配串点运输单 (一条线路一单)
    fn emit_route_group(
        &self,
        result: &mut RunResult,
        run_id: &str,
        route: &ShippingRoute,
        direct_sum: f64,
    ) {
        let group_id = Uuid::new_v4().to_string();

        for shipment in &route.shipments {
            for order in &shipment.orders {
                result.assigned_orders.push(AssignedOrder {
                    run_id: run_id.to_string(),
                    order_id: order.order_id,
                    group_id: group_id.clone(),
                    pseudo_shipment_id: shipment.shipment_id,
                    body_type_id: route.vehicle_type.body_type_id,
                    vehicle_type_id: route.vehicle_type.vehicle_type_id,
                    tarification_type: Some(TarificationType::Ftl),
                });
            }
        }

        for cost in &route.ftl_alternatives {
            result.cost_alternatives.push(CostAlternative {
                run_id: run_id.to_string(),
                group_id: group_id.clone(),
                autogrouping_type: AutogroupingType::FtlRoute,
                carrier_id: cost.carrier_id,
                value: cost.value,
                valid: cost.valid,
                message: cost.message.clone(),
            });
        }

        result.shipment_groups.push(ShipmentGroup {
            group_id,
            run_id: run_id.to_string(),
            autogrouping_type: Some(AutogroupingType::FtlRoute),
            tarification_type: Some(TarificationType::Ftl),
            carrier_id: route.ftl_cost.carrier_id,
            cost: route.ftl_cost.value,
            pallets: route.pallets,
            weight_kg: route.weight_kg,
            vehicle_type_id: Some(route.vehicle_type.vehicle_type_id),
            body_type_id: Some(route.vehicle_type.body_type_id),
            shipping_date: member_min_shipping_day(route),
            delivery_date: member_max_delivery_day(route),
            shipping_address: route
                .shipping_point()
                .address
                .as_deref()
                .map(|a| a.trim().to_string()),
            route_name: route.route_name(),
            order_ids: route
                .shipments
                .iter()
                .flat_map(|s| s.orders.iter().map(|o| o.order_id))
                .collect(),
            decision_reason_json: Some(
                json!({
                    "chosen": "FTL_ROUTE",
                    "route_cost": route.ftl_cost.value,
                    "direct_cost_sum": direct_sum,
                    "members": route.shipments.len(),
                })
                .to_string(),
            ),
        });
    }

    /// 装配直发运输单 (一个拼载单一单; 调用方保证存在可用成本)
    fn emit_direct_group(
        &self,
        result: &mut RunResult,
        run_id: &str,
        shipment: &PseudoShipment,
        decision_reason_json: Option<String>,
    ) {
        let Some((tarification_type, best)) = shipment.best_cost() else {
            return;
        };
        let group_id = Uuid::new_v4().to_string();

        for order in &shipment.orders {
            result.assigned_orders.push(AssignedOrder {
                run_id: run_id.to_string(),
                order_id: order.order_id,
                group_id: group_id.clone(),
                pseudo_shipment_id: shipment.shipment_id,
                body_type_id: shipment.vehicle_type.body_type_id,
                vehicle_type_id: shipment.vehicle_type.vehicle_type_id,
                tarification_type: Some(tarification_type),
            });
        }

        result
            .cost_alternatives
            .extend(collect_shipment_alternatives(run_id, &group_id, shipment));

        result.shipment_groups.push(ShipmentGroup {
            group_id,
            run_id: run_id.to_string(),
            autogrouping_type: tarification_type.autogrouping_type(),
            tarification_type: Some(tarification_type),
            carrier_id: best.carrier_id,
            cost: best.value,
            pallets: shipment.pallets,
            weight_kg: shipment.weight_kg,
            vehicle_type_id: Some(shipment.vehicle_type.vehicle_type_id),
            body_type_id: Some(shipment.vehicle_type.body_type_id),
            shipping_date: shipment.shipping_day(),
            delivery_date: shipment.delivery_day(),
            shipping_address: shipment
                .shipping_point()
                .address
                .as_deref()
                .map(|a| a.trim().to_string()),
            route_name: format!(
                "{} → {}",
                shipment.shipping_point().display_name(),
                shipment.delivery_point().display_name()
            ),
            order_ids: shipment.orders.iter().map(|o| o.order_id).collect(),
            decision_reason_json,
        });
    }
}

// ==========================================
// 模块级辅助函数
// ==========================================

/// 成员最早发运日
fn member_min_shipping_day(route: &ShippingRoute) -> Option<NaiveDate> {
    route
        .shipments
        .iter()
        .flat_map(|s| s.orders.iter())
        .filter_map(|o| o.shipping_day())
        .min()
}

/// 成员最晚送达日
fn member_max_delivery_day(route: &ShippingRoute) -> Option<NaiveDate> {
    route
        .shipments
        .iter()
        .flat_map(|s| s.orders.iter())
        .filter_map(|o| o.delivery_day())
        .max()
}

/// 拼载单备选成本 -> 结果行
fn collect_shipment_alternatives(
    run_id: &str,
    group_id: &str,
    shipment: &PseudoShipment,
) -> Vec<CostAlternative> {
    let mut rows: Vec<CostAlternative> = Vec::new();
    for group_type in [
        AutogroupingType::FtlDirect,
        AutogroupingType::Ltl,
        AutogroupingType::Pooling,
        AutogroupingType::Milkrun,
    ] {
        if let Some(costs) = shipment.alternatives.get(&group_type) {
            for cost in costs {
                rows.push(CostAlternative {
                    run_id: run_id.to_string(),
                    group_id: group_id.to_string(),
                    autogrouping_type: group_type,
                    carrier_id: cost.carrier_id,
                    value: cost.value,
                    valid: cost.valid,
                    message: cost.message.clone(),
                });
            }
        }
    }
    rows
}
