// ==========================================
// 运输自动拼载引擎 - 运价匹配引擎
// ==========================================
// 职责: 按地点特异度逐级回退匹配运价并计价
// 红线: 特异度顺序固定: 仓库对 > 城市对 > 区域对,
//       命中即止; 车型/车厢限定各自独立做 "精确->不限" 回退
// ==========================================

use crate::domain::order::RoutePoint;
use crate::domain::tariff::Tariff;
use crate::domain::types::TarificationType;
use chrono::NaiveDate;
use tracing::{instrument, trace};

// ==========================================
// LoadDescriptor - 待计价装载描述
// ==========================================
#[derive(Debug, Clone)]
pub struct LoadDescriptor<'a> {
    pub shipping: &'a RoutePoint,  // 发运地点
    pub delivery: &'a RoutePoint,  // 卸货地点
    pub shipping_date: NaiveDate,  // 发运日期
    pub pallets: f64,              // 托盘数
    pub vehicle_type_id: i64,      // 已解析车型
    pub body_type_id: i64,         // 车厢类型
}

// ==========================================
// TariffQuote - 单承运商报价
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TariffQuote {
    pub tariff_id: i64,                // 命中的运价记录
    pub carrier_id: i64,               // 承运商
    pub price: f64,                    // 含冬季系数的最终价
    pub extra_point_rate: Option<f64>, // 串点附加费（每多一个卸货点）
}

// ==========================================
// TariffResolution - 匹配结果
// ==========================================
#[derive(Debug, Clone)]
pub struct TariffResolution {
    pub best: TariffQuote,            // 最低价报价
    pub per_carrier: Vec<TariffQuote>, // 每承运商最优报价（按价格升序）
}

// ==========================================
// TariffResolver - 运价匹配引擎
// ==========================================
pub struct TariffResolver {
    // 无状态引擎
}

impl TariffResolver {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 为装载匹配指定计费方式的运价
    ///
    /// 算法:
    /// 1) 过滤生效期覆盖发运日且计费方式一致的运价
    /// 2) 按特异度逐级尝试: 仓库对 -> 城市对 -> 区域对, 命中即止
    /// 3) 级内先做车型 "精确->不限" 回退, 再做车厢 "精确->不限" 回退
    /// 4) 计价后按承运商分组保留各自最低价, 总最优取全局最低
    ///    (同价取承运商 id 较小者, 保证确定性)
    ///
    /// # 返回
    /// - Some(TariffResolution): 至少一条可计价运价
    /// - None: 无可用运价
    #[instrument(skip(self, tariffs, load), fields(
        tarification_type = %tarification_type,
        shipping_date = %load.shipping_date,
        tariffs_count = tariffs.len()
    ))]
    pub fn resolve(
        &self,
        tariffs: &[Tariff],
        load: &LoadDescriptor<'_>,
        tarification_type: TarificationType,
    ) -> Option<TariffResolution> {
        // 1. 生效期 + 计费方式过滤
        let effective: Vec<&Tariff> = tariffs
            .iter()
            .filter(|t| {
                t.tarification_type == tarification_type && t.is_effective(load.shipping_date)
            })
            .collect();
        if effective.is_empty() {
            return None;
        }

        // 2. 特异度逐级回退, 命中即止
        let located = self.match_by_specificity(&effective, load)?;

        // 3. 车型/车厢限定各自独立回退
        let narrowed = Self::prefer_or_fallback(located, |t| t.vehicle_type_id, load.vehicle_type_id);
        let narrowed = Self::prefer_or_fallback(narrowed, |t| t.body_type_id, load.body_type_id);

        // 4. 计价并按承运商取各自最低
        let mut quotes: Vec<TariffQuote> = Vec::new();
        for tariff in narrowed {
            let Some(price) = tariff.price(load.pallets, load.shipping_date) else {
                trace!(tariff_id = tariff.tariff_id, "运价记录无可用费率, 跳过");
                continue;
            };
            match quotes.iter_mut().find(|q| q.carrier_id == tariff.carrier_id) {
                Some(existing) => {
                    if price < existing.price {
                        existing.tariff_id = tariff.tariff_id;
                        existing.price = price;
                        existing.extra_point_rate = tariff.extra_point_rate;
                    }
                }
                None => quotes.push(TariffQuote {
                    tariff_id: tariff.tariff_id,
                    carrier_id: tariff.carrier_id,
                    price,
                    extra_point_rate: tariff.extra_point_rate,
                }),
            }
        }
        if quotes.is_empty() {
            return None;
        }

        // 同价取承运商 id 较小者
        quotes.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.carrier_id.cmp(&b.carrier_id))
        });

        Some(TariffResolution {
            best: quotes[0].clone(),
            per_carrier: quotes,
        })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 按特异度逐级匹配, 返回首个非空级别
    fn match_by_specificity<'t>(
        &self,
        tariffs: &[&'t Tariff],
        load: &LoadDescriptor<'_>,
    ) -> Option<Vec<&'t Tariff>> {
        // 级别1: 发运/卸货仓库对精确匹配
        if let (Some(ship_wh), Some(del_wh)) =
            (load.shipping.warehouse_id, load.delivery.warehouse_id)
        {
            let matched: Vec<&Tariff> = tariffs
                .iter()
                .copied()
                .filter(|t| {
                    t.shipping_warehouse_id == Some(ship_wh)
                        && t.delivery_warehouse_id == Some(del_wh)
                })
                .collect();
            if !matched.is_empty() {
                return Some(matched);
            }
        }

        // 级别2: 城市对匹配 (运价未限定仓库)
        let matched: Vec<&Tariff> = tariffs
            .iter()
            .copied()
            .filter(|t| {
                t.shipping_warehouse_id.is_none()
                    && t.delivery_warehouse_id.is_none()
                    && text_matches(&t.shipping_city, &load.shipping.city)
                    && text_matches(&t.delivery_city, &load.delivery.city)
            })
            .collect();
        if !matched.is_empty() {
            return Some(matched);
        }

        // 级别3: 区域对匹配 (运价未限定仓库与城市)
        let matched: Vec<&Tariff> = tariffs
            .iter()
            .copied()
            .filter(|t| {
                t.shipping_warehouse_id.is_none()
                    && t.delivery_warehouse_id.is_none()
                    && t.shipping_city.is_none()
                    && t.delivery_city.is_none()
                    && text_matches(&t.shipping_region, &load.shipping.region)
                    && text_matches(&t.delivery_region, &load.delivery.region)
            })
            .collect();
        if matched.is_empty() {
            None
        } else {
            Some(matched)
        }
    }

    /// "精确->不限" 回退: 优先取限定值与装载一致的运价,
    /// 无一命中时回退到未限定的运价
    fn prefer_or_fallback<'t>(
        tariffs: Vec<&'t Tariff>,
        key: impl Fn(&Tariff) -> Option<i64>,
        wanted: i64,
    ) -> Vec<&'t Tariff> {
        let exact: Vec<&Tariff> = tariffs
            .iter()
            .copied()
            .filter(|t| key(t) == Some(wanted))
            .collect();
        if !exact.is_empty() {
            return exact;
        }
        tariffs.into_iter().filter(|t| key(t).is_none()).collect()
    }
}

impl Default for TariffResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// 自由文本匹配: 双方都有值且 trim+忽略大小写相等
fn text_matches(tariff_value: &Option<String>, load_value: &Option<String>) -> bool {
    match (tariff_value, load_value) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()) || normalize(a) == normalize(b),
        _ => false,
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tariff::{LtlRateTable, WinterPeriod};

    fn create_test_point(warehouse_id: Option<i64>, city: &str, region: &str) -> RoutePoint {
        RoutePoint {
            warehouse_id,
            city: Some(city.to_string()),
            region: Some(region.to_string()),
            address: Some("addr".to_string()),
        }
    }

    fn create_test_tariff(tariff_id: i64, carrier_id: i64, ftl_rate: f64) -> Tariff {
        Tariff {
            tariff_id,
            company_id: 10,
            carrier_id,
            tarification_type: TarificationType::Ftl,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            shipping_warehouse_id: None,
            delivery_warehouse_id: None,
            shipping_city: Some("Москва".to_string()),
            delivery_city: Some("Тверь".to_string()),
            shipping_region: None,
            delivery_region: None,
            vehicle_type_id: None,
            body_type_id: None,
            ftl_rate: Some(ftl_rate),
            ltl_rates: LtlRateTable::empty(),
            extra_point_rate: None,
            winter: None,
        }
    }

    fn create_test_load<'a>(
        shipping: &'a RoutePoint,
        delivery: &'a RoutePoint,
    ) -> LoadDescriptor<'a> {
        LoadDescriptor {
            shipping,
            delivery,
            shipping_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            pallets: 10.0,
            vehicle_type_id: 1,
            body_type_id: 1,
        }
    }

    #[test]
    fn test_warehouse_level_wins_over_city_level() {
        let shipping = create_test_point(Some(100), "Москва", "Центр");
        let delivery = create_test_point(Some(200), "Тверь", "Центр");
        let load = create_test_load(&shipping, &delivery);

        let mut warehouse_tariff = create_test_tariff(1, 500, 40000.0);
        warehouse_tariff.shipping_warehouse_id = Some(100);
        warehouse_tariff.delivery_warehouse_id = Some(200);
        // 城市级更便宜, 但特异度更低, 不应命中
        let city_tariff = create_test_tariff(2, 501, 30000.0);

        let resolver = TariffResolver::new();
        let resolution = resolver
            .resolve(&[warehouse_tariff, city_tariff], &load, TarificationType::Ftl)
            .unwrap();

        assert_eq!(resolution.best.tariff_id, 1);
        assert_eq!(resolution.per_carrier.len(), 1);
    }

    #[test]
    fn test_falls_back_to_region_level() {
        let shipping = create_test_point(None, "Клин", "Центр");
        let delivery = create_test_point(None, "Ржев", "Центр");
        let load = create_test_load(&shipping, &delivery);

        // 城市不匹配, 只有区域级运价可命中
        let mut region_tariff = create_test_tariff(1, 500, 25000.0);
        region_tariff.shipping_city = None;
        region_tariff.delivery_city = None;
        region_tariff.shipping_region = Some("Центр".to_string());
        region_tariff.delivery_region = Some("Центр".to_string());
        let city_tariff = create_test_tariff(2, 501, 20000.0);

        let resolver = TariffResolver::new();
        let resolution = resolver
            .resolve(&[region_tariff, city_tariff], &load, TarificationType::Ftl)
            .unwrap();

        assert_eq!(resolution.best.tariff_id, 1);
    }

    #[test]
    fn test_vehicle_type_preference_then_null_fallback() {
        let shipping = create_test_point(None, "Москва", "Центр");
        let delivery = create_test_point(None, "Тверь", "Центр");
        let load = create_test_load(&shipping, &delivery);

        // 车型精确匹配的运价优先, 即使更贵
        let mut exact = create_test_tariff(1, 500, 35000.0);
        exact.vehicle_type_id = Some(1);
        let mut null_vehicle = create_test_tariff(2, 501, 30000.0);
        null_vehicle.vehicle_type_id = None;
        let mut other_vehicle = create_test_tariff(3, 502, 20000.0);
        other_vehicle.vehicle_type_id = Some(9);

        let resolver = TariffResolver::new();
        let resolution = resolver
            .resolve(
                &[exact.clone(), null_vehicle.clone(), other_vehicle.clone()],
                &load,
                TarificationType::Ftl,
            )
            .unwrap();
        assert_eq!(resolution.best.tariff_id, 1);

        // 无精确匹配时回退到未限定车型的运价; 限定其它车型的不参与
        let resolution = resolver
            .resolve(&[null_vehicle, other_vehicle], &load, TarificationType::Ftl)
            .unwrap();
        assert_eq!(resolution.best.tariff_id, 2);
    }

    #[test]
    fn test_cheapest_per_carrier_and_deterministic_tie_break() {
        let shipping = create_test_point(None, "Москва", "Центр");
        let delivery = create_test_point(None, "Тверь", "Центр");
        let load = create_test_load(&shipping, &delivery);

        let tariffs = vec![
            create_test_tariff(1, 502, 30000.0),
            create_test_tariff(2, 502, 28000.0), // 同承运商更低价
            create_test_tariff(3, 501, 28000.0), // 同价, 承运商 id 更小
        ];

        let resolver = TariffResolver::new();
        let resolution = resolver
            .resolve(&tariffs, &load, TarificationType::Ftl)
            .unwrap();

        // 每承运商保留各自最低价
        assert_eq!(resolution.per_carrier.len(), 2);
        // 同价时承运商 id 较小者为最优
        assert_eq!(resolution.best.carrier_id, 501);
        assert_eq!(resolution.best.price, 28000.0);
    }

    #[test]
    fn test_winter_allowance_applied() {
        let shipping = create_test_point(None, "Москва", "Центр");
        let delivery = create_test_point(None, "Тверь", "Центр");
        let mut load = create_test_load(&shipping, &delivery);
        load.shipping_date = NaiveDate::from_ymd_opt(2026, 12, 15).unwrap();

        let mut tariff = create_test_tariff(1, 500, 30000.0);
        tariff.winter = Some(WinterPeriod {
            date_from: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            allowance_percent: 10.0,
        });

        let resolver = TariffResolver::new();
        let resolution = resolver
            .resolve(&[tariff], &load, TarificationType::Ftl)
            .unwrap();
        assert!((resolution.best.price - 33000.0).abs() < 1e-6);
    }

    #[test]
    fn test_expired_tariff_not_matched() {
        let shipping = create_test_point(None, "Москва", "Центр");
        let delivery = create_test_point(None, "Тверь", "Центр");
        let load = create_test_load(&shipping, &delivery);

        let mut tariff = create_test_tariff(1, 500, 30000.0);
        tariff.valid_to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();

        let resolver = TariffResolver::new();
        assert!(resolver
            .resolve(&[tariff], &load, TarificationType::Ftl)
            .is_none());
    }
}
