//! Parameter views and gradient accumulators.
//!
//! A [`Parameters`] value is the layout of a layer's trainable storage: an
//! ordered list of named groups with their shapes. It borrows nothing and
//! owns no values; the storage itself stays in the layer and is reached
//! through `Layer::parameter_buffers`, which yields one slice per group in
//! the same order. [`Gradients`] is the owning, double precision counterpart
//! that `bprop` accumulates into.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterShape {
    Vector(usize),
    Matrix { rows: usize, cols: usize },
}

impl ParameterShape {
    pub fn len(&self) -> usize {
        match *self {
            ParameterShape::Vector(len) => len,
            ParameterShape::Matrix { rows, cols } => rows * cols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ParameterShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterShape::Vector(len) => write!(f, "[{}]", len),
            ParameterShape::Matrix { rows, cols } => write!(f, "[{} x {}]", rows, cols),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterGroup {
    pub name: String,
    pub shape: ParameterShape,
    /// Position of the group's first value in the flattened parameter order.
    pub offset: usize,
}

impl ParameterGroup {
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }
}

/// Ordered, named layout of a layer's trainable buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    name: String,
    groups: Vec<ParameterGroup>,
}

impl Parameters {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    /// Name of the owning layer.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn add_vector(&mut self, name: &str, len: usize) {
        self.push(name, ParameterShape::Vector(len));
    }

    pub fn add_matrix(&mut self, name: &str, rows: usize, cols: usize) {
        self.push(name, ParameterShape::Matrix { rows, cols });
    }

    fn push(&mut self, name: &str, shape: ParameterShape) {
        assert!(
            self.get(name).is_none(),
            "parameter group '{}' registered twice for layer '{}'",
            name,
            self.name
        );
        let offset = self.parameter_count();
        self.groups.push(ParameterGroup {
            name: name.to_string(),
            shape,
            offset,
        });
    }

    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&ParameterGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of scalar parameters across all groups.
    pub fn parameter_count(&self) -> usize {
        self.groups.iter().map(ParameterGroup::len).sum()
    }

    /// Same groups, shapes and order; the owning layer's name is ignored.
    pub fn same_layout(&self, other: &Parameters) -> bool {
        self.groups == other.groups
    }
}

/// Per-example gradient accumulator shaped like a [`Parameters`] view.
///
/// Values are always held in double precision regardless of the precision
/// the forward pass ran in. A `Gradients` has a single writer; concurrent
/// training gives each worker its own and reduces them with [`add`](Self::add).
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    layout: Parameters,
    values: Vec<Vec<f64>>,
}

impl Gradients {
    pub fn zeros(parameters: &Parameters) -> Self {
        let values = parameters
            .groups()
            .iter()
            .map(|group| vec![0.0; group.len()])
            .collect();
        Self {
            layout: parameters.clone(),
            values,
        }
    }

    pub fn layout(&self) -> &Parameters {
        &self.layout
    }

    /// Whether this accumulator can receive gradients for `parameters`.
    pub fn matches(&self, parameters: &Parameters) -> bool {
        self.layout.same_layout(parameters)
    }

    /// Values of the group at `index`.
    pub fn values(&self, index: usize) -> &[f64] {
        &self.values[index]
    }

    pub fn group(&self, name: &str) -> Option<&[f64]> {
        self.layout
            .groups()
            .iter()
            .position(|group| group.name == name)
            .map(|index| self.values[index].as_slice())
    }

    /// Mutable slices for every group, in layout order.
    pub fn groups_mut(&mut self) -> Vec<&mut [f64]> {
        self.values.iter_mut().map(Vec::as_mut_slice).collect()
    }

    /// All values concatenated in layout order.
    pub fn flatten(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    pub fn clear(&mut self) {
        for group in &mut self.values {
            group.iter_mut().for_each(|value| *value = 0.0);
        }
    }

    /// Sum another accumulator for the same layout into this one.
    pub fn add(&mut self, other: &Gradients) {
        assert!(
            self.layout.same_layout(&other.layout),
            "cannot add gradients of layer '{}' into gradients of layer '{}'",
            other.layout.name(),
            self.layout.name()
        );
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_view() -> Parameters {
        let mut params = Parameters::new("hidden");
        params.add_matrix("weights", 3, 2);
        params.add_vector("bias", 2);
        params
    }

    #[test]
    fn test_offsets_follow_declaration_order() {
        let params = dense_view();

        assert_eq!(params.len(), 2);
        assert_eq!(params.parameter_count(), 8);
        assert_eq!(params.groups()[0].offset, 0);
        assert_eq!(params.groups()[1].offset, 6);
        assert_eq!(params.get("bias").map(|g| g.shape), Some(ParameterShape::Vector(2)));
    }

    #[test]
    fn test_clear_then_rebuild_is_identical() {
        let mut params = dense_view();
        let before = params.clone();

        params.clear();
        assert!(params.is_empty());
        params.add_matrix("weights", 3, 2);
        params.add_vector("bias", 2);

        assert_eq!(params, before);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_group_panics() {
        let mut params = Parameters::new("dup");
        params.add_vector("bias", 2);
        params.add_vector("bias", 2);
    }

    #[test]
    fn test_gradients_zeroed_and_shaped() {
        let grads = Gradients::zeros(&dense_view());

        assert!(grads.matches(&dense_view()));
        assert_eq!(grads.values(0).len(), 6);
        assert_eq!(grads.group("bias"), Some(&[0.0, 0.0][..]));
        assert!(grads.flatten().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gradients_add_and_clear() {
        let mut a = Gradients::zeros(&dense_view());
        let mut b = Gradients::zeros(&dense_view());
        a.groups_mut()[1][0] = 1.5;
        b.groups_mut()[1][0] = 2.0;
        b.groups_mut()[0][5] = -1.0;

        a.add(&b);
        assert_eq!(a.group("bias"), Some(&[3.5, 0.0][..]));
        assert_eq!(a.values(0)[5], -1.0);

        a.clear();
        assert!(a.flatten().iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "cannot add gradients")]
    fn test_gradients_add_layout_mismatch_panics() {
        let mut other = Parameters::new("other");
        other.add_vector("bias", 3);

        let mut a = Gradients::zeros(&dense_view());
        a.add(&Gradients::zeros(&other));
    }
}
