//! Monte Carlo simulation engine for PortSim.

pub mod engine;
pub mod progress;
pub mod sampler;

pub use engine::{MonteCarloEngine, SimulationResult};
pub use progress::{CancelToken, ProgressCallback, ProgressPhase};
pub use sampler::{HaltonSampler, Xoshiro256};
