//! Zero-copy numpy array interface.

use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Convert numpy array to Vec<f64>.
pub fn numpy_to_vec_f64(arr: PyReadonlyArray1<f64>) -> PyResult<Vec<f64>> {
    Ok(arr.as_slice()?.to_vec())
}

/// Convert numpy array to Vec<i64>.
pub fn numpy_to_vec_i64(arr: PyReadonlyArray1<i64>) -> PyResult<Vec<i64>> {
    Ok(arr.as_slice()?.to_vec())
}

/// Convert a 2-D numpy array to row-major nested vectors.
pub fn numpy_to_rows_f64(arr: PyReadonlyArray2<f64>) -> PyResult<Vec<Vec<f64>>> {
    let view = arr.as_array();
    Ok(view.rows().into_iter().map(|row| row.to_vec()).collect())
}

/// Convert Vec<f64> to numpy array.
pub fn vec_to_numpy_f64<'py>(py: Python<'py>, vec: Vec<f64>) -> &'py PyArray1<f64> {
    PyArray1::from_vec(py, vec)
}

/// Convert row-major nested vectors to a 2-D numpy array.
pub fn rows_to_numpy_f64<'py>(py: Python<'py>, rows: &[Vec<f64>]) -> PyResult<&'py PyArray2<f64>> {
    PyArray2::from_vec2(py, rows)
        .map_err(|e| PyValueError::new_err(format!("ragged matrix rows: {e}")))
}
