//! Layer trait definition for neural network layers
//!
//! This module defines the core [`Layer`] trait that all layer types must
//! implement, and [`LayerInfo`], the state every layer carries (name, fixed
//! shape and parameter view).
//!
//! The numeric operations come in one method per precision (`apply_f32` /
//! `apply_f64`, ...). Callers normally go through
//! [`LayerExt`](super::LayerExt), which picks the precision from the buffer
//! type and checks buffer sizes.

use std::any::Any;
use std::fmt;

use crate::error::{LayerError, LayerResult};
use crate::parameters::{Gradients, Parameters};
use crate::store::{StoreReader, StoreWriter};
use crate::utils::rng::ThreadContext;

/// Name, shape and parameter view shared by every layer.
///
/// The shape is fixed at construction; only reconstitution replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerInfo {
    name: String,
    inputs: usize,
    outputs: usize,
    parameters: Parameters,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        let name = name.into();
        let parameters = Parameters::new(name.clone());
        Self {
            name,
            inputs,
            outputs,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Same name and shape.
    pub fn same_shape(&self, other: &LayerInfo) -> bool {
        self.name == other.name && self.inputs == other.inputs && self.outputs == other.outputs
    }

    fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    /// Panics unless the buffers match `inputs()` and `outputs()`.
    pub fn check_io(&self, input_len: usize, output_len: usize) {
        assert_eq!(
            input_len, self.inputs,
            "layer '{}': input len mismatch: expected {}, got {}",
            self.name, self.inputs, input_len
        );
        assert_eq!(
            output_len, self.outputs,
            "layer '{}': output len mismatch: expected {}, got {}",
            self.name, self.outputs, output_len
        );
    }

    pub fn check_temp_space(&self, len: usize, required: usize) {
        assert_eq!(
            len, required,
            "layer '{}': temp space len mismatch: expected {}, got {}",
            self.name, required, len
        );
    }

    pub fn check_gradient(&self, gradient: &Gradients) {
        assert!(
            gradient.matches(&self.parameters),
            "layer '{}': gradient accumulator was built for a different parameter layout ('{}')",
            self.name,
            gradient.layout().name()
        );
    }

    /// Checks the buffers handed to `bprop`.
    pub fn check_bprop(
        &self,
        inputs: usize,
        outputs: usize,
        output_errors: usize,
        input_errors: Option<usize>,
    ) {
        self.check_io(inputs, outputs);
        assert_eq!(
            output_errors, self.outputs,
            "layer '{}': output_errors len mismatch: expected {}, got {}",
            self.name, self.outputs, output_errors
        );
        if let Some(len) = input_errors {
            assert_eq!(
                len, self.inputs,
                "layer '{}': input_errors len mismatch: expected {}, got {}",
                self.name, self.inputs, len
            );
        }
    }
}

/// Core trait for neural network layers.
///
/// A layer maps `inputs()` values to `outputs()` values, can be trained by
/// back-propagation, owns its trainable parameters and can be persisted
/// without the caller knowing its concrete type.
///
/// # Concurrency
///
/// `apply` and `fprop` take `&self` and never mutate the layer, so any number
/// of threads may run them on one instance with their own buffers. `bprop`
/// also takes `&self`; the only thing it writes is the caller's
/// [`Gradients`], which must have a single writer.
pub trait Layer: Send + Sync + fmt::Debug {
    // ======================================================================
    // Info
    // ======================================================================

    fn info(&self) -> &LayerInfo;

    fn info_mut(&mut self) -> &mut LayerInfo;

    /// Human-readable dump of the whole layer, parameters included.
    fn print(&self) -> String;

    /// Stable name of the concrete type, used as the persistence tag.
    fn class_id(&self) -> &'static str;

    fn name(&self) -> &str {
        self.info().name()
    }

    fn inputs(&self) -> usize {
        self.info().inputs()
    }

    fn outputs(&self) -> usize {
        self.info().outputs()
    }

    /// Size of a buffer that can hold either the inputs or the outputs.
    fn max_width(&self) -> usize {
        self.inputs().max(self.outputs())
    }

    /// Output range to train towards when using the fraction `maximum` of
    /// the activation's range, e.g. (-0.8, 0.8) for tanh with 0.8.
    fn targets(&self, maximum: f32) -> (f32, f32);

    /// Check that all parameters are reasonable and invariants are met.
    fn validate(&self) -> LayerResult<()> {
        validate_parameters(self)
    }

    fn as_any(&self) -> &dyn Any;

    /// Semantic equality against a layer already known to share our type.
    fn equal_impl(&self, other: &dyn Layer) -> bool;

    /// True when replacing one layer by the other would have no effect.
    fn equal(&self, other: &dyn Layer) -> bool {
        self.as_any().type_id() == other.as_any().type_id() && self.equal_impl(other)
    }

    // ======================================================================
    // Parameters
    // ======================================================================

    fn parameters(&self) -> &Parameters {
        self.info().parameters()
    }

    /// Rebuild the parameter view from [`add_parameters`](Self::add_parameters).
    ///
    /// Must be called whenever the parameter storage is allocated or
    /// reallocated.
    fn update_parameters(&mut self) {
        let mut params = Parameters::new(self.name());
        self.add_parameters(&mut params);
        log::trace!(
            "layer '{}': parameter view rebuilt ({} groups, {} values)",
            self.name(),
            params.len(),
            params.parameter_count()
        );
        self.info_mut().set_parameters(params);
    }

    /// Register every trainable buffer, in the order
    /// [`parameter_buffers`](Self::parameter_buffers) returns them.
    fn add_parameters(&self, params: &mut Parameters);

    fn parameter_buffers(&self) -> Vec<&[f32]>;

    fn parameter_buffers_mut(&mut self) -> Vec<&mut [f32]>;

    /// Number of trainable scalars.
    fn parameter_count(&self) -> usize;

    /// Fill every parameter uniformly from [-limit, limit].
    fn random_fill(&mut self, limit: f32, context: &mut ThreadContext) {
        log::trace!(
            "layer '{}': random fill, limit {} (thread {})",
            self.name(),
            limit,
            context.thread_index()
        );
        for buffer in self.parameter_buffers_mut() {
            for value in buffer.iter_mut() {
                *value = context.uniform(limit);
            }
        }
    }

    fn zero_fill(&mut self) {
        for buffer in self.parameter_buffers_mut() {
            buffer.iter_mut().for_each(|value| *value = 0.0);
        }
    }

    // ======================================================================
    // Serialization
    // ======================================================================

    /// Write the type-specific state, without any type information.
    fn serialize(&self, store: &mut StoreWriter);

    /// Replace our state with what [`serialize`](Self::serialize) wrote.
    ///
    /// On error the layer is left unchanged.
    fn reconstitute(&mut self, store: &mut StoreReader<'_>) -> LayerResult<()>;

    /// Copy sharing any nested objects held behind shared pointers.
    fn make_copy(&self) -> Box<dyn Layer>;

    /// Copy owning everything; nothing is shared with `self`.
    fn deep_copy(&self) -> Box<dyn Layer>;

    /// Serialize preceded by [`class_id`](Self::class_id), for
    /// [`LayerRegistry::poly_reconstitute`](crate::registry::LayerRegistry::poly_reconstitute).
    fn poly_serialize(&self, store: &mut StoreWriter) {
        store.write_str(self.class_id());
        self.serialize(store);
    }

    // ======================================================================
    // Apply
    // ======================================================================

    /// Inference only: nothing is kept for a later bprop.
    fn apply_f32(&self, input: &[f32], output: &mut [f32]);

    fn apply_f64(&self, input: &[f64], output: &mut [f64]);

    // ======================================================================
    // Fprop
    // ======================================================================

    /// Number of elements of temporary space `fprop` fills for `bprop`.
    fn fprop_temporary_space_required(&self) -> usize {
        0
    }

    /// Compute `outputs` like `apply`, recording in `temp_space` whatever the
    /// matching `bprop` needs.
    ///
    /// The default implementation is for layers that need no temporary space.
    fn fprop_f32(&self, inputs: &[f32], temp_space: &mut [f32], outputs: &mut [f32]) {
        self.info().check_temp_space(temp_space.len(), 0);
        self.apply_f32(inputs, outputs)
    }

    fn fprop_f64(&self, inputs: &[f64], temp_space: &mut [f64], outputs: &mut [f64]) {
        self.info().check_temp_space(temp_space.len(), 0);
        self.apply_f64(inputs, outputs)
    }

    // ======================================================================
    // Bprop
    // ======================================================================

    /// Back-propagate `output_errors` (dE/doutput).
    ///
    /// `inputs`, `outputs` and `temp_space` are exactly those of the matching
    /// `fprop`. Adds `example_weight * dE/dparam` into `gradient`, never
    /// overwriting it, and writes dE/dinput into `input_errors` when given.
    /// `None` means no input errors are wanted and none are computed.
    #[allow(clippy::too_many_arguments)]
    fn bprop_f32(
        &self,
        inputs: &[f32],
        outputs: &[f32],
        temp_space: &[f32],
        output_errors: &[f32],
        input_errors: Option<&mut [f32]>,
        gradient: &mut Gradients,
        example_weight: f64,
    );

    #[allow(clippy::too_many_arguments)]
    fn bprop_f64(
        &self,
        inputs: &[f64],
        outputs: &[f64],
        temp_space: &[f64],
        output_errors: &[f64],
        input_errors: Option<&mut [f64]>,
        gradient: &mut Gradients,
        example_weight: f64,
    );
}

/// Checks shared by every layer: the parameter view matches the exposed
/// buffers group for group, `parameter_count` agrees with it and no value
/// is NaN or infinite.
pub fn validate_parameters<L: Layer + ?Sized>(layer: &L) -> LayerResult<()> {
    let view = layer.parameters();
    let buffers = layer.parameter_buffers();

    if view.len() != buffers.len() {
        return Err(LayerError::validation(
            layer.name(),
            format!(
                "parameter view has {} groups but the layer holds {} buffers",
                view.len(),
                buffers.len()
            ),
        ));
    }

    for (group, buffer) in view.groups().iter().zip(&buffers) {
        if group.len() != buffer.len() {
            return Err(LayerError::validation(
                layer.name(),
                format!(
                    "parameter group '{}' declared as {} but holds {} values",
                    group.name,
                    group.shape,
                    buffer.len()
                ),
            ));
        }
        if let Some(index) = buffer.iter().position(|value| !value.is_finite()) {
            return Err(LayerError::validation(
                layer.name(),
                format!(
                    "parameter '{}'[{}] is not finite ({})",
                    group.name, index, buffer[index]
                ),
            ));
        }
    }

    if view.parameter_count() != layer.parameter_count() {
        return Err(LayerError::validation(
            layer.name(),
            format!(
                "parameter_count() is {} but the view holds {}",
                layer.parameter_count(),
                view.parameter_count()
            ),
        ));
    }

    Ok(())
}

/// Bit-for-bit equality of two parameter buffers, so a NaN equals itself.
pub fn same_values(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl fmt::Display for dyn Layer + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

impl Clone for Box<dyn Layer> {
    fn clone(&self) -> Self {
        self.make_copy()
    }
}
