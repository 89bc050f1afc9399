//! Error types for PortSim.

use thiserror::Error;

/// Result type alias for PortSim operations.
pub type Result<T> = std::result::Result<T, PortsimError>;

/// Error types for the simulation engine.
#[derive(Error, Debug)]
pub enum PortsimError {
    /// Insufficient observations for a requested statistic.
    #[error("Insufficient data: need at least {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// Correlation matrix fails validation and cannot be used.
    #[error("Invalid correlation matrix: {message}")]
    InvalidMatrix { message: String },

    /// Invalid configuration rejected before any computation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Numeric breakdown during simulation (failed Cholesky, NaN/Inf paths).
    #[error("Numeric instability in {context}")]
    NumericInstability { context: String },

    /// Invalid parameter value.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Empty data error.
    #[error("Empty data provided for {context}")]
    EmptyData { context: String },

    /// Run was cancelled at a batch boundary.
    #[error("Simulation cancelled")]
    Cancelled,

    /// Python conversion error.
    #[error("Python conversion error: {message}")]
    PythonError { message: String },
}

impl PortsimError {
    /// Create an insufficient data error.
    pub fn insufficient_data(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }

    /// Create an invalid matrix error.
    pub fn invalid_matrix(message: impl Into<String>) -> Self {
        Self::InvalidMatrix {
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a numeric instability error.
    pub fn numeric_instability(context: impl Into<String>) -> Self {
        Self::NumericInstability {
            context: context.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create an empty data error.
    pub fn empty_data(context: impl Into<String>) -> Self {
        Self::EmptyData {
            context: context.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<PortsimError> for pyo3::PyErr {
    fn from(err: PortsimError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
