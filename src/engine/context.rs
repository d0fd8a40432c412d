// ==========================================
// 运输自动拼载引擎 - 调用级上下文
// ==========================================
// 职责: 每次拼载调用构造一次, 持有全部只读参考数据
// 红线: 上下文为调用级缓存, 不得跨并发调用共享
// ==========================================

use crate::domain::company::CompanySettings;
use crate::domain::order::CandidateOrder;
use crate::domain::tariff::Tariff;
use crate::domain::vehicle::{LoadCapacity, VehicleType};
use crate::engine::repositories::ReferenceDataReader;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

// ==========================================
// GroupingContext - 拼载调用上下文
// ==========================================
pub struct GroupingContext {
    vehicle_types: HashMap<i64, Vec<VehicleType>>, // 公司 -> 车型缓存
    settings: HashMap<i64, CompanySettings>,       // 公司 -> 拼载约束
    tariffs: HashMap<i64, Vec<Tariff>>,            // 公司 -> 运价集
    default_body_types: HashMap<i64, Option<i64>>, // 公司 -> 字典默认车厢
}

impl GroupingContext {
    /// 为一批候选运单涉及的公司加载参考数据
    ///
    /// # 参数
    /// - reader: 参考数据读取接口
    /// - orders: 候选运单（用于收集涉及的公司）
    #[instrument(skip(reader, orders), fields(orders_count = orders.len()))]
    pub async fn load<R: ReferenceDataReader + ?Sized>(
        reader: &R,
        orders: &[CandidateOrder],
    ) -> anyhow::Result<Self> {
        let company_ids: BTreeSet<i64> = orders.iter().map(|o| o.company_id).collect();

        let mut vehicle_types = HashMap::new();
        let mut settings = HashMap::new();
        let mut tariffs = HashMap::new();
        let mut default_body_types = HashMap::new();

        for company_id in company_ids {
            vehicle_types.insert(company_id, reader.load_vehicle_types(company_id).await?);
            settings.insert(company_id, reader.load_company_settings(company_id).await?);
            tariffs.insert(company_id, reader.load_tariffs(company_id).await?);
            default_body_types
                .insert(company_id, reader.load_default_body_type(company_id).await?);
        }

        debug!(companies = settings.len(), "拼载上下文加载完成");

        Ok(Self {
            vehicle_types,
            settings,
            tariffs,
            default_body_types,
        })
    }

    /// 直接以内存数据构造（移单重算等局部场景）
    pub fn from_parts(
        vehicle_types: HashMap<i64, Vec<VehicleType>>,
        settings: HashMap<i64, CompanySettings>,
        tariffs: HashMap<i64, Vec<Tariff>>,
        default_body_types: HashMap<i64, Option<i64>>,
    ) -> Self {
        Self {
            vehicle_types,
            settings,
            tariffs,
            default_body_types,
        }
    }

    /// 公司拼载约束
    pub fn settings(&self, company_id: i64) -> Option<&CompanySettings> {
        self.settings.get(&company_id)
    }

    /// 公司运价集
    pub fn tariffs(&self, company_id: i64) -> &[Tariff] {
        self.tariffs
            .get(&company_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 按 id 查车型
    pub fn vehicle_by_id(&self, company_id: i64, vehicle_type_id: i64) -> Option<&VehicleType> {
        self.vehicle_types
            .get(&company_id)?
            .iter()
            .find(|v| v.vehicle_type_id == vehicle_type_id)
    }

    // ==========================================
    // 车厢/车型解析
    // ==========================================

    /// 解析运单的车厢类型
    ///
    /// 顺序: 运单自带 -> 字典默认 -> 公司配置的首个车厢
    pub fn resolve_body_type(&self, order: &CandidateOrder) -> Option<i64> {
        if let Some(body_type) = order.body_type_id {
            return Some(body_type);
        }
        if let Some(Some(body_type)) = self.default_body_types.get(&order.company_id) {
            return Some(*body_type);
        }
        self.settings(order.company_id)?.fallback_body_type()
    }

    /// 按车厢解析运单的初始车型
    ///
    /// 顺序: 公司默认吨位档对应车型 -> 该车厢下最高吨位车型
    ///
    /// # 返回
    /// - None: 公司未配置任何该车厢的车型
    pub fn resolve_vehicle(&self, company_id: i64, body_type_id: i64) -> Option<&VehicleType> {
        let candidates: Vec<&VehicleType> = self
            .vehicle_types
            .get(&company_id)?
            .iter()
            .filter(|v| v.body_type_id == body_type_id)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        if let Some(settings) = self.settings(company_id) {
            if let Some(default_tonnage) = settings.default_tonnage_id {
                if let Some(v) = candidates
                    .iter()
                    .find(|v| v.tonnage.tonnage_id == default_tonnage)
                {
                    return Some(v);
                }
            }
        }

        // 无默认吨位档或未命中: 取最高吨位
        candidates
            .into_iter()
            .max_by(|a, b| {
                a.tonnage
                    .max_weight_kg
                    .partial_cmp(&b.tonnage.max_weight_kg)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// 适配能装下给定聚合载量的最小车型
    ///
    /// 规则: 同车厢、托盘与载重均覆盖; 跨区域装载优先取
    /// 可跑跨区域的车型, 无一命中时回退到全部候选
    ///
    /// # 返回
    /// - None: 无任何车型能覆盖该载量
    pub fn fit_smallest(
        &self,
        company_id: i64,
        body_type_id: i64,
        pallets: f64,
        weight_kg: f64,
        interregion: bool,
    ) -> Option<&VehicleType> {
        let all: Vec<&VehicleType> = self
            .vehicle_types
            .get(&company_id)?
            .iter()
            .filter(|v| v.body_type_id == body_type_id && v.fits(pallets, weight_kg))
            .collect();
        if all.is_empty() {
            return None;
        }

        let preferred: Vec<&VehicleType> = if interregion {
            let capable: Vec<&VehicleType> =
                all.iter().copied().filter(|v| v.interregion).collect();
            if capable.is_empty() { all } else { capable }
        } else {
            all
        };

        preferred.into_iter().min_by(|a, b| {
            (a.max_pallets, a.tonnage.max_weight_kg)
                .partial_cmp(&(b.max_pallets, b.tonnage.max_weight_kg))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
