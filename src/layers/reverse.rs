//! Transposed view of a shared dense layer.
//!
//! A `ReverseLayer` maps the outputs of a [`DenseLayer`] back to its inputs
//! through the transpose of the dense layer's weights, as in a tied-weight
//! autoencoder: `y = act(W · x + c)`. The dense layer is held behind an
//! [`Arc`] and is not one of this layer's parameters; only the reverse bias
//! `c` is trained here.
//!
//! `make_copy` keeps sharing the dense layer; `deep_copy` gives the copy its
//! own.

use std::any::Any;
use std::sync::Arc;

use crate::error::{LayerError, LayerResult};
use crate::layers::{same_values, validate_parameters, DenseLayer, Layer, LayerInfo};
use crate::numeric::Real;
use crate::parameters::{Gradients, Parameters};
use crate::store::{StoreReader, StoreWriter};
use crate::utils::activations::Activation;

const VERSION: u8 = 1;
const BIAS: usize = 0;

#[derive(Debug, Clone)]
pub struct ReverseLayer {
    info: LayerInfo,
    forward: Arc<DenseLayer>,
    activation: Activation,
    bias: Vec<f32>,
}

impl ReverseLayer {
    pub fn new(name: impl Into<String>, forward: Arc<DenseLayer>, activation: Activation) -> Self {
        let mut layer = Self {
            info: LayerInfo::new(name, forward.outputs(), forward.inputs()),
            bias: vec![0.0; forward.inputs()],
            forward,
            activation,
        };
        layer.update_parameters();
        layer
    }

    pub fn forward_layer(&self) -> &Arc<DenseLayer> {
        &self.forward
    }

    /// Whether both layers read the very same dense layer.
    pub fn shares_weights_with(&self, other: &ReverseLayer) -> bool {
        Arc::ptr_eq(&self.forward, &other.forward)
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    fn sums_into<F: Real>(&self, input: &[F], sums: &mut [F]) {
        let weights = self.forward.weights();
        let width = self.info.inputs();
        for (i, sum) in sums.iter_mut().enumerate() {
            let row = &weights[i * width..(i + 1) * width];
            let mut total = F::from_param(self.bias[i]);
            for (&w, &x) in row.iter().zip(input) {
                total += F::from_param(w) * x;
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
            .map(|i| {
                let pre = if needs_pre { Some(temp_space[i]) } else { None };
                (output_errors[i] * self.activation.derivative(outputs[i], pre)).widen()
            })
            .collect();

        let mut groups = gradient.groups_mut();
        for (i, &delta) in deltas.iter().enumerate() {
            groups[BIAS][i] += example_weight * delta;
        }

        if let Some(input_errors) = input_errors {
            let weights = self.forward.weights();
            let width = self.info.inputs();
            for (o, err) in input_errors.iter_mut().enumerate() {
                let total: f64 = deltas
                    .iter()
                    .enumerate()
                    .map(|(i, &delta)| weights[i * width + o] as f64 * delta)
                    .sum();
                *err = F::narrow(total);
            }
        }
    }
}

impl Default for ReverseLayer {
    fn default() -> Self {
        Self::new("", Arc::new(DenseLayer::default()), Activation::Identity)
    }
}

impl Layer for ReverseLayer {
    fn info(&self) -> &LayerInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut LayerInfo {
        &mut self.info
    }

    fn print(&self) -> String {
        format!(
            "{} '{}': {} -> {}, activation {}, transposing '{}'\n  bias {:?}\n",
            self.class_id(),
            self.name(),
            self.inputs(),
            self.outputs(),
            self.activation.tag(),
            self.forward.name(),
            self.bias
        )
    }

    fn class_id(&self) -> &'static str {
        "reverse"
    }

    fn targets(&self, maximum: f32) -> (f32, f32) {
        self.activation.targets(maximum)
    }

    fn validate(&self) -> LayerResult<()> {
        self.forward.validate()?;
        if self.info.inputs() != self.forward.outputs()
            || self.info.outputs() != self.forward.inputs()
        {
            return Err(LayerError::validation(
                self.name(),
                format!(
                    "shape {} -> {} is not the transpose of '{}' ({} -> {})",
                    self.info.inputs(),
                    self.info.outputs(),
                    self.forward.name(),
                    self.forward.inputs(),
                    self.forward.outputs()
                ),
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
            .downcast_ref::<ReverseLayer>()
            .map_or(false, |other| {
                self.info.same_shape(&other.info)
                    && self.activation == other.activation
                    && same_values(&self.bias, &other.bias)
                    && self.forward.equal(other.forward.as_ref())
            })
    }

    fn add_parameters(&self, params: &mut Parameters) {
        params.add_vector("bias", self.info.outputs());
    }

    fn parameter_buffers(&self) -> Vec<&[f32]> {
        vec![&self.bias]
    }

    fn parameter_buffers_mut(&mut self) -> Vec<&mut [f32]> {
        vec![&mut self.bias]
    }

    fn parameter_count(&self) -> usize {
        self.bias.len()
    }

    fn serialize(&self, store: &mut StoreWriter) {
        store.write_u8(VERSION);
        store.write_str(self.name());
        store.write_str(self.activation.tag());
        store.write_f32_slice(&self.bias);
        self.forward.serialize(store);
    }

    fn reconstitute(&mut self, store: &mut StoreReader<'_>) -> LayerResult<()> {
        let offset = store.offset();
        let version = store.read_u8()?;
        if version != VERSION {
            return Err(LayerError::format(
                offset,
                format!("unknown reverse layer version {}", version),
            ));
        }
        let name = store.read_string()?;
        let offset = store.offset();
        let tag = store.read_string()?;
        let activation = Activation::from_tag(&tag)
            .ok_or_else(|| LayerError::format(offset, format!("unknown activation '{}'", tag)))?;
        let bias = store.read_f32_vec()?;
        let offset = store.offset();
        let mut forward = DenseLayer::default();
        forward.reconstitute(store)?;
        if bias.len() != forward.inputs() {
            return Err(LayerError::format(
                offset,
                format!(
                    "reverse layer '{}' stores {} biases for a dense layer with {} inputs",
                    name,
                    bias.len(),
                    forward.inputs()
                ),
            ));
        }

        self.info = LayerInfo::new(name, forward.outputs(), forward.inputs());
        self.forward = Arc::new(forward);
        self.activation = activation;
        self.bias = bias;
        self.update_parameters();
        Ok(())
    }

    fn make_copy(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn deep_copy(&self) -> Box<dyn Layer> {
        Box::new(Self {
            forward: Arc::new(self.forward.as_ref().clone()),
            ..self.clone()
        })
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
