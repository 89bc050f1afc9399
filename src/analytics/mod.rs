//! Risk analytics for PortSim.

pub mod drawdown;
pub mod risk;

pub use drawdown::{max_drawdown, DrawdownTracker};
pub use risk::{
    LossProbability, PercentileSummary, PositionContribution, RiskAnalytics, RiskReport,
};
