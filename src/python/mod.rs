use crate::data::{NoneScaler, Scaler, StandardScaler};
use crate::model::{DataFeatures, Stg2Seq, Stg2SeqConfig};
use crate::core::{Mode, Parameterized};
use ndarray::{Array2, Array4, Ix4};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::sync::Arc;

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyValueError, _>(e.to_string())
}

fn to_dim4(shape: Vec<usize>) -> PyResult<Ix4> {
    match shape.as_slice() {
        &[a, b, c, d] => Ok(Ix4(a, b, c, d)),
        other => Err(value_error(format!("expected a 4-d shape, got {:?}", other))),
    }
}

fn to_array4(data: Vec<f32>, shape: Vec<usize>) -> PyResult<Array4<f32>> {
    Array4::from_shape_vec(to_dim4(shape)?, data).map_err(value_error)
}

fn to_adjacency(rows: Vec<Vec<f64>>) -> PyResult<Array2<f64>> {
    let n = rows.len();
    if rows.iter().any(|r| r.len() != n) {
        return Err(value_error("adjacency matrix must be square"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, n), flat).map_err(value_error)
}

// --- Model Bindings ---

#[pyclass(name = "Stg2Seq")]
pub struct PyStg2Seq {
    inner: Stg2Seq,
}

#[pymethods]
impl PyStg2Seq {
    #[new]
    #[pyo3(signature = (config_json, adj_mx, feature_dim=2, output_dim=2, ext_dim=1, scaler_mean=None, scaler_std=None))]
    fn new(
        config_json: &str,
        adj_mx: Vec<Vec<f64>>,
        feature_dim: usize,
        output_dim: usize,
        ext_dim: usize,
        scaler_mean: Option<f32>,
        scaler_std: Option<f32>,
    ) -> PyResult<Self> {
        let config = Stg2SeqConfig::from_json_str(config_json).map_err(value_error)?;
        let data = DataFeatures::new(to_adjacency(adj_mx)?)
            .with_feature_dim(feature_dim)
            .with_output_dim(output_dim)
            .with_ext_dim(ext_dim);
        let scaler: Arc<dyn Scaler> = match (scaler_mean, scaler_std) {
            (Some(mean), Some(std)) => Arc::new(StandardScaler::new(mean, std)),
            _ => Arc::new(NoneScaler),
        };

        let inner = Stg2Seq::new(config, &data, scaler).map_err(value_error)?;
        Ok(PyStg2Seq { inner })
    }

    /// Returns the flattened forecast and its shape.
    #[pyo3(signature = (x, x_shape, y, y_shape, train=false))]
    fn forward(
        &self,
        x: Vec<f32>,
        x_shape: Vec<usize>,
        y: Vec<f32>,
        y_shape: Vec<usize>,
        train: bool,
    ) -> PyResult<(Vec<f32>, Vec<usize>)> {
        let x = to_array4(x, x_shape)?;
        let y = to_array4(y, y_shape)?;
        let out = if train {
            self.inner.forward_train(x.view(), y.view())
        } else {
            self.inner.forward_infer(x.view(), y.view())
        }
        .map_err(value_error)?;

        let shape = out.shape().to_vec();
        Ok((out.into_raw_vec(), shape))
    }

    fn calculate_loss(
        &self,
        x: Vec<f32>,
        x_shape: Vec<usize>,
        y: Vec<f32>,
        y_shape: Vec<usize>,
    ) -> PyResult<f32> {
        let x = to_array4(x, x_shape)?;
        let y = to_array4(y, y_shape)?;
        self.inner
            .calculate_loss(x.view(), y.view())
            .map_err(value_error)
    }

    fn train(&mut self) {
        self.inner.train();
    }

    fn eval(&mut self) {
        self.inner.eval();
    }

    #[getter]
    fn get_training(&self) -> bool {
        self.inner.mode() == Mode::Train
    }

    fn num_parameters(&self) -> usize {
        self.inner.num_parameters()
    }
}

#[pymodule]
fn stg2seq(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyStg2Seq>()?;
    Ok(())
}
