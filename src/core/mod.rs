//! Core data types and errors for PortSim.

pub mod error;
pub mod returns;
pub mod types;

pub use error::{PortsimError, Result};
pub use returns::ReturnSeries;
pub use types::{
    CorrelationMethod, DistributionParams, FatTailMethod, HistoryWindow, Position,
    SimulationConfig,
};
