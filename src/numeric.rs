//! Precision dispatch between the single- and double-width kernels.
//!
//! Every layer implements its numeric operations once per precision
//! (`apply_f32` / `apply_f64`, ...). [`Real`] lets generic code pick the
//! right one from the element type of the buffers it holds.

use std::fmt::{Debug, Display};
use std::ops::AddAssign;

use num_traits::Float;

use crate::layers::Layer;
use crate::parameters::Gradients;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Floating point element type accepted by the layer kernels.
pub trait Real:
    Float + AddAssign + Default + Debug + Display + Send + Sync + 'static + sealed::Sealed
{
    /// Convert a stored (single precision) parameter.
    fn from_param(value: f32) -> Self;

    /// Convert from the accumulator precision.
    fn narrow(value: f64) -> Self;

    /// Convert to the accumulator precision.
    fn widen(self) -> f64;

    fn apply<L: Layer + ?Sized>(layer: &L, input: &[Self], output: &mut [Self]);

    fn fprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[Self],
        temp_space: &mut [Self],
        outputs: &mut [Self],
    );

    #[allow(clippy::too_many_arguments)]
    fn bprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[Self],
        outputs: &[Self],
        temp_space: &[Self],
        output_errors: &[Self],
        input_errors: Option<&mut [Self]>,
        gradient: &mut Gradients,
        example_weight: f64,
    );
}

impl Real for f32 {
    fn from_param(value: f32) -> Self {
        value
    }

    fn narrow(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        self as f64
    }

    fn apply<L: Layer + ?Sized>(layer: &L, input: &[f32], output: &mut [f32]) {
        layer.apply_f32(input, output)
    }

    fn fprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[f32],
        temp_space: &mut [f32],
        outputs: &mut [f32],
    ) {
        layer.fprop_f32(inputs, temp_space, outputs)
    }

    fn bprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[f32],
        outputs: &[f32],
        temp_space: &[f32],
        output_errors: &[f32],
        input_errors: Option<&mut [f32]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        layer.bprop_f32(
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

impl Real for f64 {
    fn from_param(value: f32) -> Self {
        value as f64
    }

    fn narrow(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }

    fn apply<L: Layer + ?Sized>(layer: &L, input: &[f64], output: &mut [f64]) {
        layer.apply_f64(input, output)
    }

    fn fprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[f64],
        temp_space: &mut [f64],
        outputs: &mut [f64],
    ) {
        layer.fprop_f64(inputs, temp_space, outputs)
    }

    fn bprop<L: Layer + ?Sized>(
        layer: &L,
        inputs: &[f64],
        outputs: &[f64],
        temp_space: &[f64],
        output_errors: &[f64],
        input_errors: Option<&mut [f64]>,
        gradient: &mut Gradients,
        example_weight: f64,
    ) {
        layer.bprop_f64(
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
