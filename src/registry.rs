//! Layer type registry and polymorphic persistence.
//!
//! `poly_serialize` writes a layer's `class_id` in front of its state. To
//! read it back without knowing the type, [`LayerRegistry`] maps each tag to
//! a constructor for an empty instance, which then reconstitutes itself.
//! The registry is an ordinary value built before any store is read;
//! there is no process-wide table, and a tag that was never registered is
//! an error rather than a fallback.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{LayerError, LayerResult};
use crate::layers::{DenseLayer, Layer, ReverseLayer, ScaleShiftLayer};
use crate::store::{StoreReader, StoreWriter};

/// Builds an empty instance ready for `reconstitute`.
pub type LayerFactory = fn() -> Box<dyn Layer>;

fn construct_default<L: Layer + Default + 'static>() -> Box<dyn Layer> {
    Box::new(L::default())
}

#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    factories: HashMap<String, LayerFactory>,
}

impl LayerRegistry {
    /// A registry that knows no types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every layer type of this crate.
    pub fn with_builtin_layers() -> LayerResult<Self> {
        let mut registry = Self::new();
        registry.register_layer::<DenseLayer>()?;
        registry.register_layer::<ScaleShiftLayer>()?;
        registry.register_layer::<ReverseLayer>()?;
        Ok(registry)
    }

    pub fn register(&mut self, class_id: &str, factory: LayerFactory) -> LayerResult<()> {
        if self.factories.contains_key(class_id) {
            return Err(LayerError::DuplicateType(class_id.to_string()));
        }
        log::debug!("registering layer type '{}'", class_id);
        self.factories.insert(class_id.to_string(), factory);
        Ok(())
    }

    /// Register `L` under the tag its default instance reports.
    pub fn register_layer<L: Layer + Default + 'static>(&mut self) -> LayerResult<()> {
        let class_id = L::default().class_id();
        self.register(class_id, construct_default::<L>)
    }

    pub fn contains(&self, class_id: &str) -> bool {
        self.factories.contains_key(class_id)
    }

    /// Registered tags, sorted.
    pub fn class_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Empty instance of the type registered under `class_id`.
    pub fn construct(&self, class_id: &str) -> LayerResult<Box<dyn Layer>> {
        self.factories
            .get(class_id)
            .map(|factory| factory())
            .ok_or_else(|| LayerError::UnknownType(class_id.to_string()))
    }

    /// Read a layer written by [`Layer::poly_serialize`].
    pub fn poly_reconstitute(&self, store: &mut StoreReader<'_>) -> LayerResult<Box<dyn Layer>> {
        let class_id = store.read_string()?;
        log::debug!(
            "reconstituting layer of type '{}' at offset {}",
            class_id,
            store.offset()
        );
        let mut layer = self.construct(&class_id)?;
        layer.reconstitute(store)?;
        Ok(layer)
    }

    /// Load a layer saved with [`save_layer`].
    pub fn load_layer<P: AsRef<Path>>(&self, path: P) -> LayerResult<Box<dyn Layer>> {
        let data = fs::read(path)?;
        let mut store = StoreReader::new(&data);
        let layer = self.poly_reconstitute(&mut store)?;
        store.expect_end()?;
        Ok(layer)
    }
}

/// Write `layer` with its type tag to `path`.
pub fn save_layer<P: AsRef<Path>>(layer: &dyn Layer, path: P) -> LayerResult<()> {
    let mut store = StoreWriter::new();
    layer.poly_serialize(&mut store);
    fs::write(path, store.as_bytes())?;
    Ok(())
}
