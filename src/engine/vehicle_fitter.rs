// ==========================================
// 运输自动拼载引擎 - 车型适配引擎
// ==========================================
// 职责: 成员固定后, 为拼载单/线路重算最小可装车型
// 红线: 适配只找容量覆盖当前聚合的最小车型, 永不缩车;
//       跨区域装载优先可跑跨区域的车型
// ==========================================

use crate::domain::shipment::{PseudoShipment, ShippingRoute};
use crate::engine::context::GroupingContext;
use tracing::{instrument, warn};

// ==========================================
// VehicleTypeFitter - 车型适配引擎
// ==========================================
pub struct VehicleTypeFitter {
    // 无状态引擎
}

impl VehicleTypeFitter {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 重算单个拼载单的车型
    ///
    /// 依据: 托盘数向上取整、总重量、跨区域标志
    /// 无覆盖车型时保留现车型 (装箱阶段已保证容量)
    pub fn refit_shipment(&self, ctx: &GroupingContext, shipment: &mut PseudoShipment) {
        let pallets = shipment.pallets.ceil();
        let interregion = shipment.regions().len() > 1;

        match ctx.fit_smallest(
            shipment.company_id(),
            shipment.body_type_id(),
            pallets,
            shipment.weight_kg,
            interregion,
        ) {
            Some(vehicle) => shipment.vehicle_type = vehicle.clone(),
            None => {
                warn!(
                    shipment_id = shipment.shipment_id,
                    pallets, "无覆盖聚合载量的车型, 保留现车型"
                );
            }
        }
    }

    /// 重算单条线路及其成员拼载单的车型
    pub fn refit_route(&self, ctx: &GroupingContext, route: &mut ShippingRoute) {
        for shipment in route.shipments.iter_mut() {
            self.refit_shipment(ctx, shipment);
        }

        let pallets = route.pallets.ceil();
        let interregion = route.interregion();
        let company_id = route.company_id();
        let body_type_id = route.vehicle_type.body_type_id;

        match ctx.fit_smallest(company_id, body_type_id, pallets, route.weight_kg, interregion) {
            Some(vehicle) => route.vehicle_type = vehicle.clone(),
            None => {
                warn!(
                    route_id = route.route_id,
                    pallets, "无覆盖线路载量的车型, 保留现车型"
                );
            }
        }
    }

    /// 批量重算全部线路
    #[instrument(skip(self, ctx, routes), fields(routes_count = routes.len()))]
    pub fn refit_all(&self, ctx: &GroupingContext, routes: &mut [ShippingRoute]) {
        for route in routes.iter_mut() {
            self.refit_route(ctx, route);
        }
    }
}

impl Default for VehicleTypeFitter {
    fn default() -> Self {
        Self::new()
    }
}
