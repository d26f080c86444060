//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the transformation
//! `output = act(input × weights + bias)`.

use std::any::Any;
use std::fmt::Write as _;

use crate::error::{LayerError, LayerResult};
use crate::layers::{same_values, validate_parameters, Layer, LayerInfo};
use crate::numeric::Real;
use crate::parameters::{Gradients, Parameters};
use crate::store::{StoreReader, StoreWriter};
use crate::utils::activations::Activation;
use crate::utils::rng::ThreadContext;

const VERSION: u8 = 1;
const WEIGHTS: usize = 0;
const BIAS: usize = 1;

/// Dense (fully connected) layer with weights and biases.
///
/// Performs `y = act(xW + b)` where x is the input (input_size),
/// W is the weight matrix (input_size × output_size) stored row-major,
/// and b is the bias vector (output_size).
///
/// Needs no temporary space unless the activation can only be
/// differentiated from its pre-activation sum (softplus), in which case
/// `fprop` records the `outputs()` sums.
///
/// # Example
///
/// ```
/// use rust_neural_layers::layers::{DenseLayer, Layer, LayerExt};
/// use rust_neural_layers::utils::Activation;
///
/// let layer = DenseLayer::new("hidden", 3, 2, Activation::Tanh);
/// assert_eq!(layer.parameter_count(), 3 * 2 + 2);
/// assert_eq!(layer.apply_vec(&[1.0f32, 2.0, 3.0]), vec![0.0, 0.0]);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    info: LayerInfo,
    activation: Activation,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl DenseLayer {
    /// Create a dense layer with all parameters zero.
    pub fn new(
        name: impl Into<String>,
        input_size: usize,
        output_size: usize,
        activation: Activation,
    ) -> Self {
        let mut layer = Self {
            info: LayerInfo::new(name, input_size, output_size),
            activation,
            weights: vec![0.0; input_size * output_size],
            bias: vec![0.0; output_size],
        };
        layer.update_parameters();
        layer
    }

    /// Create a dense layer with Xavier initialization.
    ///
    /// Every parameter is drawn uniformly from [-limit, limit] where
    /// limit = sqrt(6 / (input_size + output_size)).
    pub fn xavier(
        name: impl Into<String>,
        input_size: usize,
        output_size: usize,
        activation: Activation,
        context: &mut ThreadContext,
    ) -> Self {
        let mut layer = Self::new(name, input_size, output_size, activation);
        layer.random_fill(Self::xavier_limit(input_size, output_size), context);
        layer
    }

    pub fn xavier_limit(input_size: usize, output_size: usize) -> f32 {
        let fan = input_size + output_size;
        if fan == 0 {
            0.0
        } else {
            (6.0f32 / fan as f32).sqrt()
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Row-major (inputs × outputs) weight matrix.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    pub fn weight(&self, input: usize, output: usize) -> f32 {
        self.weights[input * self.info.outputs() + output]
    }

    fn sums_into<F: Real>(&self, input: &[F], sums: &mut [F]) {
        let outputs = self.info.outputs();
        for (o, sum) in sums.iter_mut().enumerate() {
            let mut total = F::from_param(self.bias[o]);
            for (i, &x) in input.iter().enumerate() {
                total += x * F::from_param(self.weights[i * outputs + o]);
            }
            *sum = total;
        }
    }

    fn apply_impl<F: Real>(&self, input: &[F], output: &mut [F]) {
        self.info.check_io(input.len(), output.len());
        self.sums_into(input, output);
        for value in output.iter_mut() {
            *value = self.activation.apply(*value);
        }
    }

    fn fprop_impl<F: Real>(&self, inputs: &[F], temp_space: &mut [F], outputs: &mut [F]) {
        self.info
            .check_temp_space(temp_space.len(), self.fprop_temporary_space_required());
        if !self.activation.needs_preactivation() {
            return self.apply_impl(inputs, outputs);
        }

        self.info.check_io(inputs.len(), outputs.len());
        self.sums_into(inputs, temp_space);
        for (out, &sum) in outputs.iter_mut().zip(temp_space.iter()) {
            *out = self.activation.apply(sum);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bprop_impl<F: Real>(
        &self,
        inputs: &[F],
        outputs: &[F],
        temp_space: &[F],
        output_errors: &[F],
        input_errors: Option<&mut [F]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        self.info.check_bprop(
            inputs.len(),
            outputs.len(),
            output_errors.len(),
            input_errors.as_ref().map(|errors| errors.len()),
        );
        self.info
            .check_temp_space(temp_space.len(), self.fprop_temporary_space_required());
        self.info.check_gradient(gradient);

        let needs_pre = self.activation.needs_preactivation();
        let deltas: Vec<f64> = (0..self.info.outputs())
            .map(|o| {
                let pre = if needs_pre { Some(temp_space[o]) } else { None };
                (output_errors[o] * self.activation.derivative(outputs[o], pre)).widen()
            })
            .collect();

        let n_out = self.info.outputs();
        let mut groups = gradient.groups_mut();
        for (o, &delta) in deltas.iter().enumerate() {
            groups[BIAS][o] += example_weight * delta;
        }
        for (i, &x) in inputs.iter().enumerate() {
            let x = x.widen();
            for (o, &delta) in deltas.iter().enumerate() {
                groups[WEIGHTS][i * n_out + o] += example_weight * x * delta;
            }
        }

        if let Some(input_errors) = input_errors {
            for (i, err) in input_errors.iter_mut().enumerate() {
                let row = &self.weights[i * n_out..(i + 1) * n_out];
                let total: f64 = row
                    .iter()
                    .zip(&deltas)
                    .map(|(&w, &delta)| w as f64 * delta)
                    .sum();
                *err = F::narrow(total);
            }
        }
    }
}

impl Default for DenseLayer {
    fn default() -> Self {
        Self::new("", 0, 0, Activation::Identity)
    }
}

impl Layer for DenseLayer {
    fn info(&self) -> &LayerInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut LayerInfo {
        &mut self.info
    }

    fn print(&self) -> String {
        let mut out = format!(
            "{} '{}': {} -> {}, activation {}\n",
            self.class_id(),
            self.name(),
            self.inputs(),
            self.outputs(),
            self.activation.tag()
        );
        let n_out = self.outputs().max(1);
        for (i, row) in self.weights.chunks(n_out).enumerate() {
            let _ = writeln!(out, "  weights[{:3}] {:?}", i, row);
        }
        let _ = writeln!(out, "  bias         {:?}", self.bias);
        out
    }

    fn class_id(&self) -> &'static str {
        "dense"
    }

    fn targets(&self, maximum: f32) -> (f32, f32) {
        self.activation.targets(maximum)
    }

    fn validate(&self) -> LayerResult<()> {
        if self.info.outputs() == 0 && self.info.inputs() != 0 {
            return Err(LayerError::validation(
                self.name(),
                format!("{} inputs but no outputs", self.info.inputs()),
            ));
        }
        validate_parameters(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equal_impl(&self, other: &dyn Layer) -> bool {
        other
            .as_any()
            .downcast_ref::<DenseLayer>()
            .map_or(false, |other| {
                self.info.same_shape(&other.info)
                    && self.activation == other.activation
                    && same_values(&self.weights, &other.weights)
                    && same_values(&self.bias, &other.bias)
            })
    }

    fn add_parameters(&self, params: &mut Parameters) {
        params.add_matrix("weights", self.info.inputs(), self.info.outputs());
        params.add_vector("bias", self.info.outputs());
    }

    fn parameter_buffers(&self) -> Vec<&[f32]> {
        vec![&self.weights, &self.bias]
    }

    fn parameter_buffers_mut(&mut self) -> Vec<&mut [f32]> {
        vec![&mut self.weights, &mut self.bias]
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    fn serialize(&self, store: &mut StoreWriter) {
        store.write_u8(VERSION);
        store.write_str(self.name());
        store.write_size(self.inputs());
        store.write_size(self.outputs());
        store.write_str(self.activation.tag());
        store.write_f32_slice(&self.weights);
        store.write_f32_slice(&self.bias);
    }

    fn reconstitute(&mut self, store: &mut StoreReader<'_>) -> LayerResult<()> {
        let offset = store.offset();
        let version = store.read_u8()?;
        if version != VERSION {
            return Err(LayerError::format(
                offset,
                format!("unknown dense layer version {}", version),
            ));
        }
        let name = store.read_string()?;
        let offset = store.offset();
        let inputs = store.read_size()?;
        let outputs = store.read_size()?;
        // With no outputs there are no weights to bound the input count.
        if outputs == 0 && inputs != 0 {
            return Err(LayerError::format(
                offset,
                format!(
                    "dense layer '{}' declares {} inputs but no outputs",
                    name, inputs
                ),
            ));
        }
        let offset = store.offset();
        let tag = store.read_string()?;
        let activation = Activation::from_tag(&tag)
            .ok_or_else(|| LayerError::format(offset, format!("unknown activation '{}'", tag)))?;
        let offset = store.offset();
        let weights = store.read_f32_vec()?;
        if Some(weights.len()) != inputs.checked_mul(outputs) {
            return Err(LayerError::format(
                offset,
                format!(
                    "dense layer '{}' declares {} x {} but stores {} weights",
                    name,
                    inputs,
                    outputs,
                    weights.len()
                ),
            ));
        }
        let offset = store.offset();
        let bias = store.read_f32_vec()?;
        if bias.len() != outputs {
            return Err(LayerError::format(
                offset,
                format!(
                    "dense layer '{}' declares {} outputs but stores {} biases",
                    name,
                    outputs,
                    bias.len()
                ),
            ));
        }

        self.info = LayerInfo::new(name, inputs, outputs);
        self.activation = activation;
        self.weights = weights;
        self.bias = bias;
        self.update_parameters();
        Ok(())
    }

    fn make_copy(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn deep_copy(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn apply_f32(&self, input: &[f32], output: &mut [f32]) {
        self.apply_impl(input, output)
    }

    fn apply_f64(&self, input: &[f64], output: &mut [f64]) {
        self.apply_impl(input, output)
    }

    fn fprop_temporary_space_required(&self) -> usize {
        if self.activation.needs_preactivation() {
            self.info.outputs()
        } else {
            0
        }
    }

    fn fprop_f32(&self, inputs: &[f32], temp_space: &mut [f32], outputs: &mut [f32]) {
        self.fprop_impl(inputs, temp_space, outputs)
    }

    fn fprop_f64(&self, inputs: &[f64], temp_space: &mut [f64], outputs: &mut [f64]) {
        self.fprop_impl(inputs, temp_space, outputs)
    }

    fn bprop_f32(
        &self,
        inputs: &[f32],
        outputs: &[f32],
        temp_space: &[f32],
        output_errors: &[f32],
        input_errors: Option<&mut [f32]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        self.bprop_impl(
            inputs,
            outputs,
            temp_space,
            output_errors,
            input_errors,
            gradient,
            example_weight,
        )
    }

    fn bprop_f64(
        &self,
        inputs: &[f64],
        outputs: &[f64],
        temp_space: &[f64],
        output_errors: &[f64],
        input_errors: Option<&mut [f64]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        self.bprop_impl(
            inputs,
            outputs,
            temp_space,
            output_errors,
            input_errors,
            gradient,
            example_weight,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerExt;

    #[test]
    fn test_dense_layer_creation() {
        let layer = DenseLayer::new("dense", 10, 5, Activation::Identity);

        assert_eq!(layer.inputs(), 10);
        assert_eq!(layer.outputs(), 5);
        assert_eq!(layer.weights.len(), 50); // 10 × 5
        assert_eq!(layer.bias.len(), 5);
        assert_eq!(layer.parameters().parameter_count(), 55);
    }

    #[test]
    fn test_dense_layer_parameter_count() {
        let layer = DenseLayer::new("dense", 784, 512, Activation::Relu);

        // 784 × 512 weights + 512 biases = 401,408 + 512 = 401,920
        assert_eq!(layer.parameter_count(), 784 * 512 + 512);
    }

    #[test]
    fn test_xavier_initialization() {
        let mut context = ThreadContext::new(42);
        let layer = DenseLayer::xavier("dense", 100, 50, Activation::Tanh, &mut context);

        // Xavier limit = sqrt(6 / (100 + 50)) = sqrt(6 / 150) ≈ 0.2
        let limit = (6.0f32 / 150.0).sqrt();

        for &weight in layer.weights.iter().chain(&layer.bias) {
            assert!(
                weight >= -limit && weight <= limit,
                "Weight {} outside Xavier range [{}, {}]",
                weight,
                -limit,
                limit
            );
        }
        assert!(layer.weights.iter().any(|&w| w != 0.0));
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut context1 = ThreadContext::new(42);
        let layer1 = DenseLayer::xavier("dense", 10, 5, Activation::Tanh, &mut context1);

        let mut context2 = ThreadContext::new(42);
        let layer2 = DenseLayer::xavier("dense", 10, 5, Activation::Tanh, &mut context2);

        assert_eq!(layer1.weights, layer2.weights);
        assert_eq!(layer1.bias, layer2.bias);
    }

    #[test]
    fn test_weight_layout_row_major() {
        let mut layer = DenseLayer::new("dense", 2, 3, Activation::Identity);
        layer.weights = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        assert_eq!(layer.weight(1, 0), 4.0);
        // [1, 1] · W = [5, 7, 9]
        assert_eq!(layer.apply_vec(&[1.0f32, 1.0]), vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_softplus_requires_temp_space() {
        let layer = DenseLayer::new("dense", 4, 3, Activation::Softplus);
        assert_eq!(layer.fprop_temporary_space_required(), 3);

        let layer = DenseLayer::new("dense", 4, 3, Activation::Logistic);
        assert_eq!(layer.fprop_temporary_space_required(), 0);
    }

    #[test]
    fn test_fprop_records_preactivation() {
        let mut layer = DenseLayer::new("dense", 2, 1, Activation::Softplus);
        layer.weights = vec![0.5, -1.0];
        layer.bias = vec![0.25];

        let propagation = layer.forward(&[2.0f64, 1.0]);
        assert_eq!(propagation.temp_space(), &[0.25]);
        assert_eq!(
            propagation.outputs()[0],
            Activation::Softplus.apply(0.25f64)
        );
    }

    #[test]
    fn test_print_mentions_shape() {
        let layer = DenseLayer::new("hidden", 2, 3, Activation::Relu);
        let text = layer.print();
        assert!(text.contains("'hidden'"));
        assert!(text.contains("2 -> 3"));
        assert!(text.contains("relu"));
    }

    #[test]
    fn test_validate_catches_stale_view() {
        let mut layer = DenseLayer::new("dense", 2, 2, Activation::Identity);
        assert!(layer.validate().is_ok());

        layer.bias.push(0.0);
        assert!(matches!(
            layer.validate(),
            Err(LayerError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inputs_without_outputs() {
        let layer = DenseLayer::new("sink", 4, 0, Activation::Identity);
        let err = layer.validate().unwrap_err();
        assert!(err.to_string().contains("no outputs"), "{}", err);
        assert!(DenseLayer::default().validate().is_ok());
    }

    #[test]
    fn test_equal_compares_bits() {
        let mut layer = DenseLayer::new("dense", 2, 2, Activation::Identity);
        layer.weights[0] = f32::NAN;
        assert!(layer.equal(&layer.clone()));

        let mut other = layer.clone();
        other.weights[1] = 1.0;
        assert!(!layer.equal(&other));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut layer = DenseLayer::new("dense", 2, 2, Activation::Identity);
        layer.weights[3] = f32::NAN;

        let err = layer.validate().unwrap_err();
        assert!(err.to_string().contains("weights"), "{}", err);
    }
}
