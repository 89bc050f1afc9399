//! Swap ranking for PortSim.

pub mod swap;

pub use swap::{SwapCandidate, SwapConstraints, SwapEvaluation, SwapObjective, SwapOptimizer};
