// ==========================================
// 运输自动拼载引擎 - 运价领域模型
// ==========================================
// 红线: 零担费率为 33 档显式索引表, 不做动态字段访问
// 用途: 运价匹配引擎只读输入
// ==========================================

use crate::domain::types::TarificationType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 零担费率档位数: 1..=33 板, 33 板以上按第 33 档计
pub const LTL_RATE_SLOTS: usize = 33;

// ==========================================
// LtlRateTable - 零担费率表
// ==========================================
// 下标 0 对应 1 板, 下标 32 对应 33 板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtlRateTable {
    rates: Vec<Option<f64>>, // 长度固定 33
}

impl LtlRateTable {
    /// 从 33 档费率数组构造
    pub fn new(rates: [Option<f64>; LTL_RATE_SLOTS]) -> Self {
        Self { rates: rates.to_vec() }
    }

    /// 空费率表 (全部档位缺失)
    pub fn empty() -> Self {
        Self { rates: vec![None; LTL_RATE_SLOTS] }
    }

    /// 设置某一档费率 (1..=33 板)
    pub fn with_rate(mut self, pallets: usize, rate: f64) -> Self {
        if (1..=LTL_RATE_SLOTS).contains(&pallets) {
            self.rates[pallets - 1] = Some(rate);
        }
        self
    }

    /// 按托盘数取档位费率
    ///
    /// 档位规则:
    /// - pallets <= 0  => 0 价
    /// - 1..=32        => 精确档位 (向上取整)
    /// - >= 33         => 第 33 档
    ///
    /// # 返回
    /// - Some(price): 档位有费率
    /// - None: 对应档位缺失
    pub fn rate_at(&self, pallets: f64) -> Option<f64> {
        if pallets <= 0.0 {
            return Some(0.0);
        }
        let slot = (pallets.ceil() as i64).clamp(1, LTL_RATE_SLOTS as i64) as usize;
        self.rates[slot - 1]
    }
}

// ==========================================
// WinterPeriod - 冬季涨价窗口
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinterPeriod {
    pub date_from: NaiveDate,       // 窗口起始（含）
    pub date_to: NaiveDate,         // 窗口结束（含）
    pub allowance_percent: f64,     // 涨价百分比
}

impl WinterPeriod {
    /// 判断日期是否落入冬季窗口
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_from <= date && date <= self.date_to
    }
}

// ==========================================
// Tariff - 运价记录
// ==========================================
// 地点匹配键分三级特异度: 仓库对 > 城市对 > 区域对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    // ===== 主键与归属 =====
    pub tariff_id: i64,     // 运价记录 id
    pub company_id: i64,    // 所属公司
    pub carrier_id: i64,    // 承运商 id
    pub tarification_type: TarificationType, // 计费方式

    // ===== 生效期 =====
    pub valid_from: NaiveDate, // 生效起始（含）
    pub valid_to: NaiveDate,   // 生效结束（含）

    // ===== 地点匹配键 =====
    pub shipping_warehouse_id: Option<i64>, // 发运仓库
    pub delivery_warehouse_id: Option<i64>, // 卸货仓库
    pub shipping_city: Option<String>,      // 发运城市
    pub delivery_city: Option<String>,      // 卸货城市
    pub shipping_region: Option<String>,    // 发运区域
    pub delivery_region: Option<String>,    // 卸货区域

    // ===== 车辆限定 =====
    pub vehicle_type_id: Option<i64>, // 限定车型（空=不限）
    pub body_type_id: Option<i64>,    // 限定车厢（空=不限）

    // ===== 费率 =====
    pub ftl_rate: Option<f64>,          // 整车一口价
    pub ltl_rates: LtlRateTable,        // 零担 33 档费率
    pub extra_point_rate: Option<f64>,  // 串点附加费（每多一个卸货点）
    pub winter: Option<WinterPeriod>,   // 冬季涨价窗口
}

impl Tariff {
    /// 判断发运日期是否在生效期内
    pub fn is_effective(&self, shipping_date: NaiveDate) -> bool {
        self.valid_from <= shipping_date && shipping_date <= self.valid_to
    }

    /// 冬季系数: 发运日落入窗口时为 1 + allowance/100, 否则为 1
    pub fn winter_coefficient(&self, shipping_date: NaiveDate) -> f64 {
        match &self.winter {
            Some(w) if w.contains(shipping_date) => 1.0 + w.allowance_percent / 100.0,
            _ => 1.0,
        }
    }

    /// 按计费方式计算基础价 (冬季系数前)
    ///
    /// 规则: Ftl 取整车一口价; 其余方式按零担档位表取价
    ///
    /// # 返回
    /// - Some(price): 可计价
    /// - None: 该方式对应费率缺失
    pub fn base_price(&self, pallets: f64) -> Option<f64> {
        match self.tarification_type {
            TarificationType::Ftl => self.ftl_rate,
            _ => self.ltl_rates.rate_at(pallets),
        }
    }

    /// 计算含冬季系数的最终价
    pub fn price(&self, pallets: f64, shipping_date: NaiveDate) -> Option<f64> {
        self.base_price(pallets)
            .map(|p| p * self.winter_coefficient(shipping_date))
    }
}
