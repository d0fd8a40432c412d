// ==========================================
// 运输自动拼载引擎 - 公司拼载约束配置
// ==========================================
// 用途: 每次拼载调用按公司加载一次, 调用内只读
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// CompanySettings - 公司级拼载约束
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_id: i64, // 公司 id

    // ===== 车型解析 =====
    pub default_tonnage_id: Option<i64>, // 默认吨位档（车型解析首选）
    pub body_type_ids: Vec<i64>,         // 公司配置的车厢类型（首个为兜底默认）

    // ===== 串点约束 =====
    pub max_unloading_points: Option<i32>,       // 单线路最大卸货点数（空=不限）
    pub region_overrun_limit: Option<f64>,       // 区域内绕行系数上限（空=不限）
    pub interregion_overrun_limit: Option<f64>,  // 跨区域绕行系数上限（空=不限）

    // ===== 集拼约束 =====
    pub check_pooling_slots: bool, // 是否校验集拼舱位
}

impl CompanySettings {
    /// 按线路是否跨区域取对应的绕行系数上限
    ///
    /// # 返回
    /// - Some(limit): 配置了上限
    /// - None: 未配置, 视为不限
    pub fn overrun_limit(&self, interregion: bool) -> Option<f64> {
        if interregion {
            self.interregion_overrun_limit
        } else {
            self.region_overrun_limit
        }
    }

    /// 兜底车厢类型: 公司配置的首个车厢
    pub fn fallback_body_type(&self) -> Option<i64> {
        self.body_type_ids.first().copied()
    }
}
