//! Precision-generic entry points for layers.
//!
//! [`LayerExt`] is implemented for every [`Layer`] (sized or `dyn`). It
//! checks buffer sizes, dispatches to the `_f32`/`_f64` kernels through
//! [`Real`], and adds the calling conventions the raw kernels cannot
//! express in safe Rust: whole-vector apply, input and output sharing one
//! buffer, and scoped ownership of one fprop/bprop round trip.

use crate::layers::Layer;
use crate::numeric::Real;
use crate::parameters::Gradients;

/// Buffers of one forward pass, kept for the matching backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation<F> {
    inputs: Vec<F>,
    temp_space: Vec<F>,
    outputs: Vec<F>,
}

impl<F: Real> Propagation<F> {
    pub fn inputs(&self) -> &[F] {
        &self.inputs
    }

    pub fn temp_space(&self) -> &[F] {
        &self.temp_space
    }

    pub fn outputs(&self) -> &[F] {
        &self.outputs
    }

    pub fn into_outputs(self) -> Vec<F> {
        self.outputs
    }
}

pub trait LayerExt: Layer {
    /// Apply the layer to `input`, writing `outputs()` values to `output`.
    ///
    /// # Panics
    ///
    /// If either buffer does not match the layer's shape.
    fn apply<F: Real>(&self, input: &[F], output: &mut [F]) {
        self.info().check_io(input.len(), output.len());
        F::apply(self, input, output)
    }

    /// Apply the layer and return the outputs in a new vector.
    fn apply_vec<F: Real>(&self, input: &[F]) -> Vec<F> {
        let mut output = vec![F::zero(); self.outputs()];
        self.apply(input, &mut output);
        output
    }

    /// Apply with input and output sharing `buffer`.
    ///
    /// The first `inputs()` elements are read and the first `outputs()`
    /// elements overwritten; `buffer` must hold at least `max_width()`.
    fn apply_in_place<F: Real>(&self, buffer: &mut [F]) {
        assert!(
            buffer.len() >= self.max_width(),
            "layer '{}': in-place buffer too small: expected at least {}, got {}",
            self.name(),
            self.max_width(),
            buffer.len()
        );
        let input = buffer[..self.inputs()].to_vec();
        self.apply(&input, &mut buffer[..self.outputs()]);
    }

    /// Zeroed temporary space of the size `fprop` requires.
    fn temp_space<F: Real>(&self) -> Vec<F> {
        vec![F::zero(); self.fprop_temporary_space_required()]
    }

    /// # Panics
    ///
    /// If `temp_space` is not exactly `fprop_temporary_space_required()` long
    /// or the buffers do not match the layer's shape.
    fn fprop<F: Real>(&self, inputs: &[F], temp_space: &mut [F], outputs: &mut [F]) {
        self.info().check_io(inputs.len(), outputs.len());
        self.info()
            .check_temp_space(temp_space.len(), self.fprop_temporary_space_required());
        F::fprop(self, inputs, temp_space, outputs)
    }

    #[allow(clippy::too_many_arguments)]
    fn bprop<F: Real>(
        &self,
        inputs: &[F],
        outputs: &[F],
        temp_space: &[F],
        output_errors: &[F],
        input_errors: Option<&mut [F]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        self.info().check_bprop(
            inputs.len(),
            outputs.len(),
            output_errors.len(),
            input_errors.as_ref().map(|errors| errors.len()),
        );
        self.info()
            .check_temp_space(temp_space.len(), self.fprop_temporary_space_required());
        self.info().check_gradient(gradient);
        F::bprop(
            self,
            inputs,
            outputs,
            temp_space,
            output_errors,
            input_errors,
            gradient,
            example_weight,
        )
    }

    /// Back-propagate with output and input errors sharing `errors`.
    ///
    /// The first `outputs()` elements are read as output errors and the first
    /// `inputs()` elements overwritten with input errors.
    #[allow(clippy::too_many_arguments)]
    fn bprop_in_place<F: Real>(
        &self,
        inputs: &[F],
        outputs: &[F],
        temp_space: &[F],
        errors: &mut [F],
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        assert!(
            errors.len() >= self.max_width(),
            "layer '{}': in-place error buffer too small: expected at least {}, got {}",
            self.name(),
            self.max_width(),
            errors.len()
        );
        let output_errors = errors[..self.outputs()].to_vec();
        let inputs_len = self.inputs();
        self.bprop(
            inputs,
            outputs,
            temp_space,
            &output_errors,
            Some(&mut errors[..inputs_len]),
            gradient,
            example_weight,
        );
    }

    /// Run `fprop` into freshly allocated, correctly sized buffers.
    fn forward<F: Real>(&self, input: &[F]) -> Propagation<F> {
        let mut temp_space = self.temp_space();
        let mut outputs = vec![F::zero(); self.outputs()];
        self.fprop(input, &mut temp_space, &mut outputs);
        Propagation {
            inputs: input.to_vec(),
            temp_space,
            outputs,
        }
    }

    /// `bprop` for the round trip recorded by [`forward`](Self::forward).
    fn backward<F: Real>(
        &self,
        propagation: &Propagation<F>,
        output_errors: &[F],
        input_errors: Option<&mut [F]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        self.bprop(
            &propagation.inputs,
            &propagation.outputs,
            &propagation.temp_space,
            output_errors,
            input_errors,
            gradient,
            example_weight,
        )
    }
}

impl<L: Layer + ?Sized> LayerExt for L {}
