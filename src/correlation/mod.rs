//! Correlation estimation, validation, and lag analysis for PortSim.

pub mod estimator;
pub mod lag;
pub mod matrix;

pub use estimator::{CorrelationEstimate, CorrelationEstimator};
pub use lag::{LagAnalysisResult, LagAnalyzer, PairLag};
pub use matrix::CorrelationMatrix;
