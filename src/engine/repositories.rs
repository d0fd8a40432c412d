// ==========================================
// 运输自动拼载引擎 - 数据访问接口
// ==========================================
// 职责: 定义引擎所需的参考数据读取与结果存取接口（不包含实现）
// 红线: 引擎不拼 SQL; 持久化由调用方实现
// ==========================================

use crate::domain::company::CompanySettings;
use crate::domain::order::CandidateOrder;
use crate::domain::run_result::{CostAlternative, ShipmentGroup};
use crate::domain::tariff::Tariff;
use crate::domain::vehicle::VehicleType;
use async_trait::async_trait;

// ==========================================
// ReferenceDataReader - 参考数据读取
// ==========================================
// 用途: 每次拼载调用开始时批量读取, 调用内只读
// 实现者: 调用方的仓储层
#[async_trait]
pub trait ReferenceDataReader: Send + Sync {
    /// 读取公司可用车型列表
    async fn load_vehicle_types(&self, company_id: i64) -> anyhow::Result<Vec<VehicleType>>;

    /// 读取公司运价集
    async fn load_tariffs(&self, company_id: i64) -> anyhow::Result<Vec<Tariff>>;

    /// 读取公司拼载约束配置
    async fn load_company_settings(&self, company_id: i64) -> anyhow::Result<CompanySettings>;

    /// 读取公司默认车厢类型（字典级兜底, 可空）
    async fn load_default_body_type(&self, company_id: i64) -> anyhow::Result<Option<i64>>;
}

// ==========================================
// GroupedShipmentStore - 已拼载结果存取
// ==========================================
// 用途: 移单操作读取/改写既有运输单组
// 实现者: 调用方的仓储层
#[async_trait]
pub trait GroupedShipmentStore: Send + Sync {
    /// 按 id 查运输单组
    async fn find_group(&self, group_id: &str) -> anyhow::Result<Option<ShipmentGroup>>;

    /// 查运输单组的全部成员运单
    async fn find_group_orders(&self, group_id: &str) -> anyhow::Result<Vec<CandidateOrder>>;

    /// 按运单 id 查运单及其当前所属运输单组
    async fn find_orders_with_groups(
        &self,
        order_ids: &[i64],
    ) -> anyhow::Result<Vec<(CandidateOrder, String)>>;

    /// 保存（覆盖）运输单组
    async fn save_group(&self, group: &ShipmentGroup) -> anyhow::Result<()>;

    /// 删除运输单组（移空源单时）
    async fn delete_group(&self, group_id: &str) -> anyhow::Result<()>;

    /// 整体替换运输单组的备选承运成本行
    async fn replace_alternatives(
        &self,
        group_id: &str,
        alternatives: &[CostAlternative],
    ) -> anyhow::Result<()>;
}
