//! Element-wise affine layer: `y = scale * x + shift`.
//!
//! Learnable per-feature scale (initialized to 1.0) and shift (initialized
//! to 0.0), the affine half of a normalization layer without the batch
//! statistics.

use std::any::Any;

use crate::error::{LayerError, LayerResult};
use crate::layers::{same_values, validate_parameters, Layer, LayerInfo};
use crate::numeric::Real;
use crate::parameters::{Gradients, Parameters};
use crate::store::{StoreReader, StoreWriter};

const VERSION: u8 = 1;
const SCALE: usize = 0;
const SHIFT: usize = 1;

#[derive(Debug, Clone)]
pub struct ScaleShiftLayer {
    info: LayerInfo,
    scale: Vec<f32>,
    shift: Vec<f32>,
}

impl ScaleShiftLayer {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let mut layer = Self {
            info: LayerInfo::new(name, size, size),
            scale: vec![1.0; size],
            shift: vec![0.0; size],
        };
        layer.update_parameters();
        layer
    }

    pub fn size(&self) -> usize {
        self.info.inputs()
    }

    pub fn scale(&self) -> &[f32] {
        &self.scale
    }

    pub fn shift(&self) -> &[f32] {
        &self.shift
    }

    fn apply_impl<F: Real>(&self, input: &[F], output: &mut [F]) {
        self.info.check_io(input.len(), output.len());
        for (i, (out, &x)) in output.iter_mut().zip(input).enumerate() {
            *out = F::from_param(self.scale[i]) * x + F::from_param(self.shift[i]);
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
        self.info.check_temp_space(temp_space.len(), 0);
        self.info.check_gradient(gradient);

        let mut groups = gradient.groups_mut();
        for (i, (&x, &err)) in inputs.iter().zip(output_errors).enumerate() {
            let err = err.widen();
            groups[SCALE][i] += example_weight * err * x.widen();
            groups[SHIFT][i] += example_weight * err;
        }

        if let Some(input_errors) = input_errors {
            for (i, err) in input_errors.iter_mut().enumerate() {
                *err = output_errors[i] * F::from_param(self.scale[i]);
            }
        }
    }
}

impl Default for ScaleShiftLayer {
    fn default() -> Self {
        Self::new("", 0)
    }
}

impl Layer for ScaleShiftLayer {
    fn info(&self) -> &LayerInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut LayerInfo {
        &mut self.info
    }

    fn print(&self) -> String {
        format!(
            "{} '{}': {} features\n  scale {:?}\n  shift {:?}\n",
            self.class_id(),
            self.name(),
            self.size(),
            self.scale,
            self.shift
        )
    }

    fn class_id(&self) -> &'static str {
        "scale_shift"
    }

    fn targets(&self, maximum: f32) -> (f32, f32) {
        (-maximum, maximum)
    }

    fn validate(&self) -> LayerResult<()> {
        if self.info.inputs() != self.info.outputs() {
            return Err(LayerError::validation(
                self.name(),
                format!(
                    "inputs ({}) and outputs ({}) differ",
                    self.info.inputs(),
                    self.info.outputs()
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
            .downcast_ref::<ScaleShiftLayer>()
            .map_or(false, |other| {
                self.info.same_shape(&other.info)
                    && same_values(&self.scale, &other.scale)
                    && same_values(&self.shift, &other.shift)
            })
    }

    fn add_parameters(&self, params: &mut Parameters) {
        params.add_vector("scale", self.size());
        params.add_vector("shift", self.size());
    }

    fn parameter_buffers(&self) -> Vec<&[f32]> {
        vec![&self.scale, &self.shift]
    }

    fn parameter_buffers_mut(&mut self) -> Vec<&mut [f32]> {
        vec![&mut self.scale, &mut self.shift]
    }

    fn parameter_count(&self) -> usize {
        2 * self.size()
    }

    fn serialize(&self, store: &mut StoreWriter) {
        store.write_u8(VERSION);
        store.write_str(self.name());
        store.write_f32_slice(&self.scale);
        store.write_f32_slice(&self.shift);
    }

    fn reconstitute(&mut self, store: &mut StoreReader<'_>) -> LayerResult<()> {
        let offset = store.offset();
        let version = store.read_u8()?;
        if version != VERSION {
            return Err(LayerError::format(
                offset,
                format!("unknown scale_shift layer version {}", version),
            ));
        }
        let name = store.read_string()?;
        let scale = store.read_f32_vec()?;
        let offset = store.offset();
        let shift = store.read_f32_vec()?;
        if shift.len() != scale.len() {
            return Err(LayerError::format(
                offset,
                format!(
                    "scale_shift layer '{}' stores {} scales but {} shifts",
                    name,
                    scale.len(),
                    shift.len()
                ),
            ));
        }

        self.info = LayerInfo::new(name, scale.len(), scale.len());
        self.scale = scale;
        self.shift = shift;
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
