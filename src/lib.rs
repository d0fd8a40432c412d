// ==========================================
// 运输管理系统 - 自动拼载引擎核心库
// ==========================================
// 技术栈: Rust + tokio + tracing
// 系统定位: 决策支持引擎 (拼载方案建议, 人工最终控制权)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 业务规则
pub mod engine;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AutogroupingType, DistanceResult, OrderStatus, TarificationType};

// 领域实体
pub use domain::{
    CandidateOrder, CompanySettings, CostData, LoadCapacity, PseudoShipment, RoutePoint,
    RunResult, ShipmentGroup, ShippingRoute, SkippedOrder, Tariff, Tonnage, VehicleType,
};

// 引擎
pub use engine::{
    AutogroupingOrchestrator, CostCalculator, GroupingContext, PseudoShipmentBuilder,
    RouteBuilder, TariffResolver, VehicleTypeFitter,
};

// 协作方接口
pub use engine::collaborators::{DistanceProvider, PoolingSlotProvider, SlotQuery};
pub use engine::repositories::{GroupedShipmentStore, ReferenceDataReader};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "运输自动拼载引擎";

// ==========================================
// 预编译检查
// ==========================================
