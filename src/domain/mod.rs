// ==========================================
// 运输自动拼载引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod company;
pub mod order;
pub mod run_result;
pub mod shipment;
pub mod tariff;
pub mod types;
pub mod vehicle;

// 重导出核心类型
pub use company::CompanySettings;
pub use order::{CandidateOrder, RoutePoint};
pub use run_result::{AssignedOrder, CostAlternative, RunResult, ShipmentGroup, SkippedOrder};
pub use shipment::{CostData, PseudoShipment, ShippingRoute};
pub use tariff::{LtlRateTable, Tariff, WinterPeriod, LTL_RATE_SLOTS};
pub use types::{AutogroupingType, DistanceResult, OrderStatus, TarificationType};
pub use vehicle::{LoadCapacity, Tonnage, VehicleType};
