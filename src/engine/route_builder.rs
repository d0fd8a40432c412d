// ==========================================
// 运输自动拼载引擎 - 串点线路构建引擎
// ==========================================
// 职责: 拼载单分桶 -> 首次适应合并为多卸货点线路
// 红线: 合并门禁三关: 容量 / 卸货点数上限 / 绕行系数;
//       任一里程查不到 => 拒绝合并 (保守降级)
// ==========================================

use crate::domain::order::RoutePoint;
use crate::domain::shipment::{PseudoShipment, ShippingRoute};
use crate::domain::types::DistanceResult;
use crate::domain::vehicle::LoadCapacity;
use crate::engine::collaborators::DistanceProvider;
use crate::engine::context::GroupingContext;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, trace};

// 分桶键: (发运日, 车厢类型, 发运地址)
type BucketKey = (NaiveDate, i64, String);

// ==========================================
// RouteBuilder - 串点线路构建引擎
// ==========================================
pub struct RouteBuilder {
    // 无状态引擎
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 将拼载单合并为串点线路
    ///
    /// 算法:
    /// 1) 按 (发运日, 车厢类型, 发运地址) 分桶
    /// 2) 桶内按线路里程降序、托盘数降序处理
    /// 3) 对本桶已开线路做首次适应: 容量、卸货点数、绕行系数
    ///    全部通过才合并; 未合并的拼载单独立成单线路
    ///
    /// # 参数
    /// - ctx: 调用级上下文（公司约束配置）
    /// - distance_provider: 里程查询（绕行系数用）
    /// - shipments: 拼载单列表
    #[instrument(skip(self, ctx, distance_provider, shipments), fields(shipments_count = shipments.len()))]
    pub async fn build(
        &self,
        ctx: &GroupingContext,
        distance_provider: &dyn DistanceProvider,
        shipments: Vec<PseudoShipment>,
    ) -> Vec<ShippingRoute> {
        let mut routes: Vec<ShippingRoute> = Vec::new();
        let mut next_id: i64 = 1;

        // 1. 分桶
        let mut buckets: BTreeMap<BucketKey, Vec<PseudoShipment>> = BTreeMap::new();
        for shipment in shipments {
            let Some(day) = shipment.shipping_day() else {
                // 无发运日的拼载单不参与合并, 直接成单线路
                routes.push(ShippingRoute::seed(next_id, shipment));
                next_id += 1;
                continue;
            };
            let key = (
                day,
                shipment.body_type_id(),
                shipment
                    .shipping_point()
                    .address
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .to_string(),
            );
            buckets.entry(key).or_default().push(shipment);
        }

        debug!(buckets = buckets.len(), "拼载单线路分桶完成");

        // 2. 逐桶首次适应合并
        for (_, mut members) in buckets {
            // 里程降序, 同里程托盘数降序 (稳定排序)
            members.sort_by(|a, b| {
                b.route_distance
                    .value_or_zero()
                    .partial_cmp(&a.route_distance.value_or_zero())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(
                        b.pallets
                            .partial_cmp(&a.pallets)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            });

            // 本桶已开的线路
            let mut open_routes: Vec<ShippingRoute> = Vec::new();

            for shipment in members {
                let mut target: Option<usize> = None;
                for (idx, route) in open_routes.iter().enumerate() {
                    if self
                        .can_merge(ctx, distance_provider, route, &shipment)
                        .await
                    {
                        target = Some(idx);
                        break;
                    }
                }

                match target {
                    Some(idx) => open_routes[idx].push_shipment(shipment),
                    None => {
                        open_routes.push(ShippingRoute::seed(next_id, shipment));
                        next_id += 1;
                    }
                }
            }

            routes.extend(open_routes);
        }

        debug!(routes = routes.len(), "串点线路构建完成");

        routes
    }

    /// 计算一组拼载单的绕行系数
    ///
    /// 串行路径: 所有成员的发运/卸货站点按日期升序连接,
    /// 连续重复站点去重; 系数 = 路径总里程 / 最长单段里程
    ///
    /// # 返回
    /// - Some(coefficient): 所有路段里程可得 (路径不足两站时为 1.0)
    /// - None: 任一路段里程不可得, 系数未定义
    pub async fn overrun_coefficient(
        &self,
        distance_provider: &dyn DistanceProvider,
        members: &[&PseudoShipment],
    ) -> Option<f64> {
        let stops = Self::sequential_stops(members);
        if stops.len() < 2 {
            return Some(1.0);
        }

        let mut total = 0.0_f64;
        let mut max_leg = 0.0_f64;
        for pair in stops.windows(2) {
            match distance_provider.distance_km(&pair[0], &pair[1]).await {
                DistanceResult::Found(km) => {
                    total += km;
                    max_leg = max_leg.max(km);
                }
                DistanceResult::Unavailable => return None,
            }
        }
        if max_leg <= 0.0 {
            return Some(1.0);
        }
        Some(total / max_leg)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 合并门禁: 容量 / 卸货点数 / 绕行系数
    async fn can_merge(
        &self,
        ctx: &GroupingContext,
        distance_provider: &dyn DistanceProvider,
        route: &ShippingRoute,
        candidate: &PseudoShipment,
    ) -> bool {
        // 门禁1: 合并后容量不超线路车型
        if !route.vehicle_type.fits(
            route.pallets + candidate.pallets,
            route.weight_kg + candidate.weight_kg,
        ) {
            trace!(route_id = route.route_id, "合并拒绝: 超出车型容量");
            return false;
        }

        let settings = ctx.settings(route.company_id());

        // 门禁2: 合并后去重卸货点数不超上限
        if let Some(max_points) = settings.and_then(|s| s.max_unloading_points) {
            let mut points: Vec<String> = route.distinct_delivery_points();
            if let Some(key) = candidate.delivery_point().point_key() {
                if !points.contains(&key) {
                    points.push(key);
                }
            }
            if points.len() as i32 > max_points {
                trace!(route_id = route.route_id, "合并拒绝: 超出卸货点数上限");
                return false;
            }
        }

        // 门禁3: 绕行系数不超阈值
        let mut members: Vec<&PseudoShipment> = route.shipments.iter().collect();
        members.push(candidate);

        // 阈值按合并后是否跨区域选取; 未配置 => 不设上限
        let mut regions: BTreeSet<String> = route.regions();
        regions.extend(candidate.regions());
        let interregion = regions.len() > 1;
        let limit = settings.and_then(|s| s.overrun_limit(interregion));

        match self.overrun_coefficient(distance_provider, &members).await {
            Some(coefficient) => match limit {
                Some(max) if coefficient > max => {
                    trace!(
                        route_id = route.route_id,
                        coefficient,
                        max,
                        "合并拒绝: 绕行系数超限"
                    );
                    false
                }
                _ => true,
            },
            None => {
                // 里程不可得 => 系数未定义 => 保守拒绝
                trace!(route_id = route.route_id, "合并拒绝: 路段里程不可得");
                false
            }
        }
    }

    /// 串行站点序列: 成员发运/卸货站点按日期升序, 连续重复去重
    fn sequential_stops(members: &[&PseudoShipment]) -> Vec<RoutePoint> {
        let mut dated: Vec<(NaiveDate, &RoutePoint)> = Vec::new();
        for shipment in members {
            if let Some(day) = shipment.shipping_day() {
                dated.push((day, shipment.shipping_point()));
            }
            if let Some(day) = shipment.delivery_day() {
                dated.push((day, shipment.delivery_point()));
            }
        }
        // 稳定排序: 同日期保持成员顺序
        dated.sort_by_key(|(day, _)| *day);

        let mut stops: Vec<RoutePoint> = Vec::new();
        for (_, point) in dated {
            let duplicate = stops
                .last()
                .map(|prev| prev.point_key() == point.point_key())
                .unwrap_or(false);
            if !duplicate {
                stops.push(point.clone());
            }
        }
        stops
    }
}

impl Default for RouteBuilder {
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
    use crate::domain::order::CandidateOrder;
    use crate::domain::types::OrderStatus;
    use crate::domain::vehicle::{Tonnage, VehicleType};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    /// 按城市对返回里程的测试桩
    struct MapDistance {
        legs: HashMap<(String, String), f64>,
    }

    impl MapDistance {
        fn new(legs: &[(&str, &str, f64)]) -> Self {
            let mut map = HashMap::new();
            for (from, to, km) in legs {
                map.insert((from.to_string(), to.to_string()), *km);
                map.insert((to.to_string(), from.to_string()), *km);
            }
            Self { legs: map }
        }
    }

    #[async_trait]
    impl DistanceProvider for MapDistance {
        async fn distance_km(&self, from: &RoutePoint, to: &RoutePoint) -> DistanceResult {
            let key = (
                from.city.clone().unwrap_or_default(),
                to.city.clone().unwrap_or_default(),
            );
            match self.legs.get(&key) {
                Some(km) => DistanceResult::Found(*km),
                None => DistanceResult::Unavailable,
            }
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

    fn create_test_settings(
        max_unloading_points: Option<i32>,
        region_limit: Option<f64>,
    ) -> CompanySettings {
        CompanySettings {
            company_id: 10,
            default_tonnage_id: Some(1),
            body_type_ids: vec![1],
            max_unloading_points,
            region_overrun_limit: region_limit,
            interregion_overrun_limit: None,
            check_pooling_slots: false,
        }
    }

    fn create_test_context(settings: CompanySettings) -> GroupingContext {
        GroupingContext::from_parts(
            HashMap::from([(10, vec![create_test_vehicle()])]),
            HashMap::from([(10, settings)]),
            HashMap::from([(10, Vec::new())]),
            HashMap::from([(10, None)]),
        )
    }

    fn create_test_shipment(
        shipment_id: i64,
        delivery_city: &str,
        pallets: f64,
        distance_km: f64,
    ) -> PseudoShipment {
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

    #[tokio::test]
    async fn test_merge_within_overrun_limit() {
        // Москва->Тверь 160km, Москва->Клин 65km, Тверь->Клин 90km
        // 串行路径: Москва -> Тверь -> Клин = 250, 最长段 160
        // 系数 250/160 ≈ 1.5625
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
            ("Тверь", "Клин", 90.0),
        ]);
        let ctx = create_test_context(create_test_settings(Some(3), Some(2.0)));
        let builder = RouteBuilder::new();

        let shipments = vec![
            create_test_shipment(1, "Тверь", 10.0, 160.0),
            create_test_shipment(2, "Клин", 8.0, 65.0),
        ];

        let routes = builder.build(&ctx, &distance, shipments).await;

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].shipments.len(), 2);
        // 里程降序: Тверь 在前
        assert_eq!(routes[0].shipments[0].shipment_id, 1);
        assert_eq!(routes[0].pallets, 18.0);
    }

    #[tokio::test]
    async fn test_overrun_limit_rejects_merge() {
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
            ("Тверь", "Клин", 90.0),
        ]);
        // 系数 1.5625 > 1.2 => 拒绝合并
        let ctx = create_test_context(create_test_settings(Some(3), Some(1.2)));
        let builder = RouteBuilder::new();

        let shipments = vec![
            create_test_shipment(1, "Тверь", 10.0, 160.0),
            create_test_shipment(2, "Клин", 8.0, 65.0),
        ];

        let routes = builder.build(&ctx, &distance, shipments).await;

        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.shipments.len() == 1));
    }

    #[tokio::test]
    async fn test_null_limit_means_no_ceiling() {
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
            ("Тверь", "Клин", 900.0), // 系数极大
        ]);
        let ctx = create_test_context(create_test_settings(None, None));
        let builder = RouteBuilder::new();

        let shipments = vec![
            create_test_shipment(1, "Тверь", 10.0, 160.0),
            create_test_shipment(2, "Клин", 8.0, 65.0),
        ];

        let routes = builder.build(&ctx, &distance, shipments).await;

        // 未配置上限 => 其余门禁通过即合并
        assert_eq!(routes.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_distance_rejects_merge() {
        // 缺 Тверь->Клин 路段 => 系数未定义 => 保守拒绝
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
        ]);
        let ctx = create_test_context(create_test_settings(None, Some(2.0)));
        let builder = RouteBuilder::new();

        let shipments = vec![
            create_test_shipment(1, "Тверь", 10.0, 160.0),
            create_test_shipment(2, "Клин", 8.0, 65.0),
        ];

        let routes = builder.build(&ctx, &distance, shipments).await;

        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn test_max_unloading_points_enforced() {
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
            ("Москва", "Ржев", 220.0),
            ("Тверь", "Клин", 90.0),
            ("Тверь", "Ржев", 120.0),
            ("Клин", "Ржев", 150.0),
            ("Ржев", "Клин", 150.0),
        ]);
        // 最多 2 个卸货点
        let ctx = create_test_context(create_test_settings(Some(2), None));
        let builder = RouteBuilder::new();

        let shipments = vec![
            create_test_shipment(1, "Ржев", 5.0, 220.0),
            create_test_shipment(2, "Тверь", 5.0, 160.0),
            create_test_shipment(3, "Клин", 5.0, 65.0),
        ];

        let routes = builder.build(&ctx, &distance, shipments).await;

        // 第三个卸货点进不了首条线路, 独立成线
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].shipments.len(), 2);
        assert_eq!(routes[1].shipments.len(), 1);
    }

    #[tokio::test]
    async fn test_different_body_type_never_merged() {
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Тверь", "Тверь", 0.0),
        ]);
        let ctx = create_test_context(create_test_settings(None, None));
        let builder = RouteBuilder::new();

        let a = create_test_shipment(1, "Тверь", 5.0, 160.0);
        let mut b = create_test_shipment(2, "Тверь", 5.0, 160.0);
        b.vehicle_type.body_type_id = 2;

        let routes = builder.build(&ctx, &distance, vec![a, b]).await;

        // 车厢类型不同 => 不同桶 => 永不合并
        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn test_overrun_coefficient_at_least_one() {
        let distance = MapDistance::new(&[
            ("Москва", "Тверь", 160.0),
            ("Москва", "Клин", 65.0),
            ("Тверь", "Клин", 90.0),
        ]);
        let builder = RouteBuilder::new();
        let a = create_test_shipment(1, "Тверь", 10.0, 160.0);
        let b = create_test_shipment(2, "Клин", 8.0, 65.0);

        let coefficient = builder
            .overrun_coefficient(&distance, &[&a, &b])
            .await
            .unwrap();

        // 路径总里程 >= 最长单段 => 系数 >= 1
        assert!(coefficient >= 1.0);
        assert!((coefficient - 250.0 / 160.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_consecutive_duplicate_stops_deduplicated() {
        let distance = MapDistance::new(&[("Москва", "Тверь", 160.0)]);
        let builder = RouteBuilder::new();
        // 两个同卸货城市的拼载单: 路径 Москва -> Тверь, 单段
        let a = create_test_shipment(1, "Тверь", 10.0, 160.0);
        let b = create_test_shipment(2, "Тверь", 8.0, 160.0);

        let coefficient = builder
            .overrun_coefficient(&distance, &[&a, &b])
            .await
            .unwrap();
        assert!((coefficient - 1.0).abs() < 1e-9);
    }
}
