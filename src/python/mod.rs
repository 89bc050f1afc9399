//! Python bindings for PortSim (enabled by the `python` feature).

pub mod bindings;
pub mod numpy_bridge;
