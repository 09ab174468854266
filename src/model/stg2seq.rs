//! STG2Seq forecaster.
//!
//! Long-term features are extracted once from the full history. Each horizon
//! step then runs the short-term extractor over a rolling window, fuses both
//! representations with temporal attention and reads one output channel per
//! predicted feature through channel attention.

use crate::core::ops::{concat_channels, concat_time, ensure_shape};
use crate::core::{Error, Mode, ParamMut, Parameterized, Result, Tensor4};
use crate::data::Scaler;
use crate::gnn::{ChannelAttention, FeatureExtractor, TemporalAttention};
use crate::graph::GraphSupport;
use crate::model::config::{DataFeatures, Stg2SeqConfig};
use crate::model::loss::masked_mse;
use ndarray::{s, ArrayD, ArrayView2, ArrayView3, ArrayView4, Axis};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, trace};

/// Number of channel attention heads; bounds the supported `output_dim`.
const MAX_OUTPUT_DIM: usize = 2;

/// Spatio-temporal graph sequence-to-sequence model.
#[derive(Debug)]
pub struct Stg2Seq {
    /// Hyperparameters
    config: Stg2SeqConfig,
    /// Number of graph nodes
    num_nodes: usize,
    /// Raw feature width
    feature_dim: usize,
    /// Predicted feature width
    output_dim: usize,
    /// External context width
    ext_dim: usize,
    /// Chebyshev support shared by every ConvST block
    support: Arc<GraphSupport>,
    /// Extractor over the full input history
    long_term: FeatureExtractor,
    /// Extractor over the rolling short-term window
    short_term: FeatureExtractor,
    /// Fuses short and long features over time
    attention_t: TemporalAttention,
    /// One head per predicted feature
    attention_c: Vec<ChannelAttention>,
    /// Maps normalized values back to physical units
    scaler: Arc<dyn Scaler>,
    /// Window policy used by [`Stg2Seq::forward`]
    mode: Mode,
}

impl Stg2Seq {
    /// Build a model with thread-local randomness.
    pub fn new(
        config: Stg2SeqConfig,
        data: &DataFeatures,
        scaler: Arc<dyn Scaler>,
    ) -> Result<Self> {
        Self::with_rng(config, data, scaler, &mut rand::thread_rng())
    }

    /// Build a model drawing initial parameters from `rng`.
    ///
    /// Fails if the configuration is inconsistent or the graph Laplacian
    /// cannot be scaled.
    pub fn with_rng<R: Rng + ?Sized>(
        config: Stg2SeqConfig,
        data: &DataFeatures,
        scaler: Arc<dyn Scaler>,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        data.validate()?;
        if config.dim_out < data.output_dim {
            return Err(Error::InvalidConfig(format!(
                "dim_out ({}) must be at least output_dim ({})",
                config.dim_out, data.output_dim
            )));
        }

        let support = Arc::new(GraphSupport::from_adjacency(data.adj_mx.view(), config.ks)?);
        let num_nodes = support.num_nodes();

        let long_term = FeatureExtractor::new(
            Arc::clone(&support),
            &config.long_term_kernels,
            data.output_dim,
            config.dim_out,
            config.batch_norm,
            rng,
        )?;
        let short_term = FeatureExtractor::new(
            Arc::clone(&support),
            &config.short_term_kernels,
            data.output_dim,
            config.dim_out,
            config.batch_norm,
            rng,
        )?;
        let attention_t = TemporalAttention::new(
            config.input_window + config.window,
            num_nodes,
            config.dim_out,
            data.ext_dim,
            rng,
        )?;
        let attention_c = (0..MAX_OUTPUT_DIM)
            .map(|_| ChannelAttention::new(num_nodes, config.dim_out, data.ext_dim, rng))
            .collect::<Result<Vec<_>>>()?;

        let model = Self {
            config,
            num_nodes,
            feature_dim: data.feature_dim,
            output_dim: data.output_dim,
            ext_dim: data.ext_dim,
            support,
            long_term,
            short_term,
            attention_t,
            attention_c,
            scaler,
            mode: Mode::default(),
        };
        info!(
            num_nodes,
            parameters = model.num_parameters(),
            "built STG2Seq model"
        );
        Ok(model)
    }

    /// Switch [`Stg2Seq::forward`] to teacher forcing.
    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    /// Switch [`Stg2Seq::forward`] to autoregressive decoding.
    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
    }

    /// Current window policy.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Forecast under the current mode.
    ///
    /// `x` is `(B, input_window, N, feature_dim)` exactly, `y` is
    /// `(B, output_window, N, output_dim + ext_dim or wider)`; the result is
    /// `(B, output_window, N, output_dim)`.
    pub fn forward(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<Tensor4> {
        self.decode(x, y, self.mode)
    }

    /// Forecast with teacher-forced short-term windows.
    pub fn forward_train(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<Tensor4> {
        self.decode(x, y, Mode::Train)
    }

    /// Forecast autoregressively; only the context features of `y` are read.
    pub fn forward_infer(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<Tensor4> {
        self.decode(x, y, Mode::Eval)
    }

    /// Alias of [`Stg2Seq::forward`].
    pub fn predict(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<Tensor4> {
        self.forward(x, y)
    }

    /// Denormalized `(predictions, ground truth)`.
    pub fn evaluate(
        &self,
        x: ArrayView4<'_, f32>,
        y: ArrayView4<'_, f32>,
    ) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
        let preds = self.predict(x, y)?;
        let truth = y.slice(s![.., .., .., ..self.output_dim]);

        Ok((
            self.scaler.inverse_transform(preds.view().into_dyn()),
            self.scaler.inverse_transform(truth.into_dyn()),
        ))
    }

    /// Masked MSE between denormalized predictions and labels.
    pub fn calculate_loss(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<f32> {
        let (preds, truth) = self.evaluate(x, y)?;
        masked_mse(preds.view(), truth.view(), self.config.null_value)
    }

    fn decode(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>, mode: Mode) -> Result<Tensor4> {
        if self.output_dim == 0 || self.output_dim > MAX_OUTPUT_DIM {
            return Err(Error::InvalidOutputDim(self.output_dim));
        }
        self.check_inputs(x, y)?;

        let od = self.output_dim;
        let window = self.config.window;
        let input_window = self.config.input_window;
        let output_window = self.config.output_window;

        // (B, output_dim, T, N)
        let inputs = x.slice(s![.., .., .., ..od]).permuted_axes([0, 3, 1, 2]);
        let labels = y.slice(s![.., .., .., ..od]).permuted_axes([0, 3, 1, 2]);
        // (B, output_window, ext_dim)
        let contexts = y.slice(s![.., .., 0, od..od + self.ext_dim]);

        let long_output = self.long_term.forward(inputs)?;
        let history = inputs.slice(s![.., .., input_window - window.., ..]);

        let mut preds: Vec<Tensor4> = Vec::with_capacity(output_window);
        match mode {
            Mode::Train => {
                let padded = concat_time(&[history, labels])?;
                for i in 0..output_window {
                    let short_input = padded.slice(s![.., .., i..i + window, ..]);
                    let pred = self.step(short_input, context_at(&contexts, i), long_output.view())?;
                    trace!(step = i, %mode, "decoded horizon step");
                    preds.push(pred);
                }
            }
            Mode::Eval => {
                let mut short_input = history.to_owned();
                for i in 0..output_window {
                    let pred = self.step(short_input.view(), context_at(&contexts, i), long_output.view())?;
                    trace!(step = i, %mode, "decoded horizon step");
                    short_input = concat_time(&[short_input.slice(s![.., .., 1.., ..]), pred.view()])?;
                    preds.push(pred);
                }
            }
        }

        let views: Vec<ArrayView4<'_, f32>> = preds.iter().map(|p| p.view()).collect();
        let forecast = concat_time(&views)?;
        Ok(forecast
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned())
    }

    /// One horizon step: `(B, output_dim, window, N)` to `(B, output_dim, 1, N)`.
    fn step(
        &self,
        short_input: ArrayView4<'_, f32>,
        context: ArrayView2<'_, f32>,
        long_output: ArrayView4<'_, f32>,
    ) -> Result<Tensor4> {
        let short_output = self.short_term.forward(short_input)?;
        let fused = concat_time(&[short_output.view(), long_output.view()])?;
        let summary = self.attention_t.forward(context, fused.view())?;

        let heads = self.attention_c[..self.output_dim]
            .iter()
            .map(|head| head.forward(context, summary.view()))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<ArrayView4<'_, f32>> = heads.iter().map(|h| h.view()).collect();
        concat_channels(&views)
    }

    fn check_inputs(&self, x: ArrayView4<'_, f32>, y: ArrayView4<'_, f32>) -> Result<()> {
        let batch = x.len_of(Axis(0));
        ensure_shape(
            "forward input X",
            x.shape(),
            &[batch, self.config.input_window, self.num_nodes, self.feature_dim],
        )?;

        let (y_batch, output_window, y_nodes, y_features) = y.dim();
        if y_batch != batch
            || output_window != self.config.output_window
            || y_nodes != self.num_nodes
            || y_features < self.output_dim + self.ext_dim
        {
            return Err(Error::shape(
                "forward labels y",
                format_args!(
                    "[{}, {}, {}, >={}]",
                    batch,
                    self.config.output_window,
                    self.num_nodes,
                    self.output_dim + self.ext_dim
                ),
                y.shape(),
            ));
        }
        Ok(())
    }

    /// Model configuration.
    pub fn config(&self) -> &Stg2SeqConfig {
        &self.config
    }

    /// Shared graph support.
    pub fn support(&self) -> &Arc<GraphSupport> {
        &self.support
    }

    /// Number of graph nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Raw feature width the model was built for.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Number of predicted features.
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Long-term extractor, e.g. for loading running statistics.
    pub fn long_term_mut(&mut self) -> &mut FeatureExtractor {
        &mut self.long_term
    }

    /// Short-term extractor, e.g. for loading running statistics.
    pub fn short_term_mut(&mut self) -> &mut FeatureExtractor {
        &mut self.short_term
    }
}

fn context_at<'a>(contexts: &'a ArrayView3<'_, f32>, step: usize) -> ArrayView2<'a, f32> {
    contexts.slice(s![.., step, ..])
}

impl Parameterized for Stg2Seq {
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        let mut params = self.long_term.parameters_mut();
        params.extend(self.short_term.parameters_mut());
        params.extend(self.attention_t.parameters_mut());
        for head in &mut self.attention_c {
            params.extend(head.parameters_mut());
        }
        params
    }

    fn num_parameters(&self) -> usize {
        self.long_term.num_parameters()
            + self.short_term.num_parameters()
            + self.attention_t.num_parameters()
            + self
                .attention_c
                .iter()
                .map(|h| h.num_parameters())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{NoneScaler, StandardScaler};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Array4};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn adjacency() -> Array2<f64> {
        array![[0.0, 1.0, 0.5], [1.0, 0.0, 2.0], [0.5, 2.0, 0.0]]
    }

    fn small_config() -> Stg2SeqConfig {
        Stg2SeqConfig {
            input_window: 3,
            output_window: 2,
            window: 2,
            dim_out: 4,
            ks: 2,
            ..Default::default()
        }
    }

    fn build(config: Stg2SeqConfig, output_dim: usize, seed: u64) -> Stg2Seq {
        let data = DataFeatures::new(adjacency())
            .with_feature_dim(output_dim + 1)
            .with_output_dim(output_dim)
            .with_ext_dim(1);
        Stg2Seq::with_rng(
            config,
            &data,
            Arc::new(NoneScaler),
            &mut StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    fn random(shape: (usize, usize, usize, usize), seed: u64) -> Tensor4 {
        let mut rng = StdRng::seed_from_u64(seed);
        Array4::from_shape_fn(shape, |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_zero_input_end_to_end() {
        let mut model = build(small_config(), 1, 1);
        let x = Array4::<f32>::zeros((2, 3, 3, 2));
        let y = Array4::<f32>::zeros((2, 2, 3, 2));

        let out = model.forward(x.view(), y.view()).unwrap();
        assert_eq!(out.shape(), &[2, 2, 3, 1]);

        // Zero weights everywhere: the forecast reduces to bias-only terms,
        // which are zero for a zero input.
        for (_, mut p) in model.parameters_mut() {
            p.fill(0.0);
        }
        for mode in [Mode::Train, Mode::Eval] {
            let out = model.decode(x.view(), y.view(), mode).unwrap();
            assert_eq!(out.shape(), &[2, 2, 3, 1]);
            assert!(out.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_zero_weights_are_deterministic() {
        let mut a = build(small_config(), 1, 1);
        let mut b = build(small_config(), 1, 99);
        for model in [&mut a, &mut b] {
            for (_, mut p) in model.parameters_mut() {
                p.fill(0.0);
            }
        }

        let x = random((2, 3, 3, 2), 5);
        let y = random((2, 2, 3, 2), 6);
        let out_a = a.forward_infer(x.view(), y.view()).unwrap();
        let out_b = b.forward_infer(x.view(), y.view()).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_mode_changes_values_not_shapes() {
        let mut model = build(small_config(), 2, 3);
        let x = random((3, 3, 3, 3), 7);
        let y = random((3, 2, 3, 3), 8);

        assert_eq!(model.mode(), Mode::Train);
        let train = model.forward(x.view(), y.view()).unwrap();
        model.eval();
        assert_eq!(model.mode(), Mode::Eval);
        let infer = model.forward(x.view(), y.view()).unwrap();
        model.train();

        assert_eq!(train.shape(), &[3, 2, 3, 2]);
        assert_eq!(train.shape(), infer.shape());
        assert_eq!(train, model.forward_train(x.view(), y.view()).unwrap());
        assert_eq!(infer, model.forward_infer(x.view(), y.view()).unwrap());
    }

    #[test]
    fn test_first_step_matches_across_modes() {
        // Step 0 reads the same history window in both modes.
        let model = build(small_config(), 1, 4);
        let x = random((2, 3, 3, 2), 9);
        let y = random((2, 2, 3, 2), 10);

        let train = model.forward_train(x.view(), y.view()).unwrap();
        let infer = model.forward_infer(x.view(), y.view()).unwrap();
        for b in 0..2 {
            for n in 0..3 {
                assert_abs_diff_eq!(train[[b, 0, n, 0]], infer[[b, 0, n, 0]], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_inference_ignores_future_labels() {
        let model = build(small_config(), 1, 5);
        let x = random((1, 3, 3, 2), 11);
        let y = random((1, 2, 3, 2), 12);

        let mut y_changed = y.clone();
        y_changed.slice_mut(s![.., .., .., 0]).fill(42.0);

        let a = model.forward_infer(x.view(), y.view()).unwrap();
        let b = model.forward_infer(x.view(), y_changed.view()).unwrap();
        assert_eq!(a, b);

        // Teacher forcing feeds the labels into step 1.
        let c = model.forward_train(x.view(), y.view()).unwrap();
        let d = model.forward_train(x.view(), y_changed.view()).unwrap();
        assert_ne!(c, d);
    }

    #[test]
    fn test_inference_feeds_back_previous_prediction() {
        let model = build(small_config(), 1, 12);
        let x = random((2, 3, 3, 2), 21);
        let y = random((2, 2, 3, 2), 22);

        let inputs = x.slice(s![.., .., .., ..1]).permuted_axes([0, 3, 1, 2]);
        let long_output = model.long_term.forward(inputs).unwrap();
        let history = inputs.slice(s![.., .., 1.., ..]);
        let contexts = y.slice(s![.., .., 0, 1..2]);

        let pred0 = model
            .step(history, contexts.slice(s![.., 0, ..]), long_output.view())
            .unwrap();
        // Drop the oldest step, append the step-0 prediction.
        let next_window = concat_time(&[history.slice(s![.., .., 1.., ..]), pred0.view()]).unwrap();
        let pred1 = model
            .step(next_window.view(), contexts.slice(s![.., 1, ..]), long_output.view())
            .unwrap();

        let out = model.forward_infer(x.view(), y.view()).unwrap();
        for b in 0..2 {
            for n in 0..3 {
                assert_abs_diff_eq!(out[[b, 0, n, 0]], pred0[[b, 0, 0, n]], epsilon = 1e-6);
                assert_abs_diff_eq!(out[[b, 1, n, 0]], pred1[[b, 0, 0, n]], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_window_of_one() {
        let config = Stg2SeqConfig {
            window: 1,
            output_window: 3,
            ..small_config()
        };
        let model = build(config, 1, 6);
        let x = random((1, 3, 3, 2), 13);
        let y = random((1, 3, 3, 2), 14);
        let out = model.forward_infer(x.view(), y.view()).unwrap();
        assert_eq!(out.shape(), &[1, 3, 3, 1]);
    }

    #[test]
    fn test_invalid_output_dim_fails_at_forward() {
        let data = DataFeatures::new(adjacency())
            .with_feature_dim(4)
            .with_output_dim(3)
            .with_ext_dim(1);
        let model = Stg2Seq::with_rng(
            small_config(),
            &data,
            Arc::new(NoneScaler),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        let x = Array4::<f32>::zeros((1, 3, 3, 4));
        let y = Array4::<f32>::zeros((1, 2, 3, 4));
        assert!(matches!(
            model.forward(x.view(), y.view()),
            Err(Error::InvalidOutputDim(3))
        ));
    }

    #[test]
    fn test_shape_checks() {
        let model = build(small_config(), 1, 7);
        let y = Array4::<f32>::zeros((1, 2, 3, 2));

        let wrong_nodes = Array4::<f32>::zeros((1, 3, 4, 2));
        assert!(matches!(
            model.forward(wrong_nodes.view(), y.view()),
            Err(Error::ShapeMismatch { .. })
        ));

        let wrong_history = Array4::<f32>::zeros((1, 4, 3, 2));
        assert!(model.forward(wrong_history.view(), y.view()).is_err());

        // X must carry exactly feature_dim features.
        let extra_features = Array4::<f32>::zeros((1, 3, 3, 3));
        assert!(matches!(
            model.forward(extra_features.view(), y.view()),
            Err(Error::ShapeMismatch { .. })
        ));

        let x = Array4::<f32>::zeros((1, 3, 3, 2));
        let no_context = Array4::<f32>::zeros((1, 2, 3, 1));
        assert!(model.forward(x.view(), no_context.view()).is_err());

        let wrong_batch = Array4::<f32>::zeros((2, 2, 3, 2));
        assert!(model.forward(x.view(), wrong_batch.view()).is_err());
    }

    #[test]
    fn test_construction_errors() {
        let data = DataFeatures::new(Array2::zeros((3, 3)))
            .with_feature_dim(2)
            .with_output_dim(1);
        let result = Stg2Seq::with_rng(
            small_config(),
            &data,
            Arc::new(NoneScaler),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(Error::DegenerateGraph(_))));

        let data = DataFeatures::new(adjacency()).with_feature_dim(2).with_output_dim(2);
        let narrow = Stg2SeqConfig {
            dim_out: 1,
            ..small_config()
        };
        assert!(matches!(
            Stg2Seq::new(narrow, &data, Arc::new(NoneScaler)),
            Err(Error::InvalidConfig(_))
        ));

        let wide_window = Stg2SeqConfig {
            window: 4,
            ..small_config()
        };
        assert!(Stg2Seq::new(wide_window, &data, Arc::new(NoneScaler)).is_err());
    }

    #[test]
    fn test_calculate_loss() {
        let data = DataFeatures::new(adjacency())
            .with_feature_dim(2)
            .with_output_dim(1)
            .with_ext_dim(1);
        let mut model = Stg2Seq::with_rng(
            small_config(),
            &data,
            Arc::new(StandardScaler::new(10.0, 2.0)),
            &mut StdRng::seed_from_u64(8),
        )
        .unwrap();
        for (_, mut p) in model.parameters_mut() {
            p.fill(0.0);
        }

        // Zero input and zero weights predict 0, which denormalizes to the mean 10.
        // Labels of 1.0 denormalize to 12, so every squared error is 4.
        let x = Array4::<f32>::zeros((1, 3, 3, 2));
        let mut y = Array4::<f32>::zeros((1, 2, 3, 2));
        y.slice_mut(s![.., .., .., 0]).fill(1.0);

        model.eval();
        let (preds, truth) = model.evaluate(x.view(), y.view()).unwrap();
        assert!(preds.iter().all(|&v| (v - 10.0).abs() < 1e-6));
        assert!(truth.iter().all(|&v| (v - 12.0).abs() < 1e-6));

        let loss = model.calculate_loss(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(loss, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_parameter_accounting() {
        let model = build(small_config(), 2, 9);
        let mut model_mut = build(small_config(), 2, 9);
        let counted: usize = model_mut.parameters_mut().iter().map(|(_, p)| p.len()).sum();
        assert_eq!(model.num_parameters(), counted);
        assert_eq!(model.support().order(), 2);
        assert_eq!(model.num_nodes(), 3);
        assert_eq!(model.feature_dim(), 3);
        assert_eq!(model.output_dim(), 2);
    }
}
