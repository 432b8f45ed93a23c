pub mod cost;
pub mod error;
pub mod objective;
pub mod resources;
pub mod trace;

pub use cost::{CostModel, DynCostModel, TokenPricing};
pub use error::{Result, VigilError};
pub use objective::{Severity, SloDefinition, SloOperator, SloOutcome};
pub use resources::{ResourceSampler, ResourceUsage};
pub use trace::TraceContext;
