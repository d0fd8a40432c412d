// ==========================================
// 运输自动拼载引擎 - 引擎层
// ==========================================
// 职责: 实现拼载业务规则引擎, 不拼 SQL
// 红线: Engine 不拼 SQL, 所有跳过/不可用必须输出 reason
// ==========================================

pub mod collaborators;
pub mod context;
pub mod cost_calculator;
pub mod error;
pub mod orchestrator;
pub mod pseudo_builder;
pub mod repositories;
pub mod route_builder;
pub mod tariff_resolver;
pub mod vehicle_fitter;

// 重导出核心引擎
pub use context::GroupingContext;
pub use cost_calculator::CostCalculator;
pub use error::{EngineError, EngineResult, ValidationViolation};
pub use orchestrator::{AutogroupingOrchestrator, MoveOrdersOutcome};
pub use pseudo_builder::{PseudoShipmentBuildResult, PseudoShipmentBuilder};
pub use route_builder::RouteBuilder;
pub use tariff_resolver::{LoadDescriptor, TariffQuote, TariffResolution, TariffResolver};
pub use vehicle_fitter::VehicleTypeFitter;
