// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model Registry - open models addressed by generation-tagged handles
//!
//! A closed handle never resolves again, even after its slot has been
//! reused by a later [`ModelRegistry::open`].

use std::time::Instant;

use slotmap::SlotMap;

use crate::codec::Line;
use crate::error::{Error, Result};
use crate::export::export_step;
use crate::model::{Model, ModelConfig, Transform};
use crate::schema::{IfcSchema, TypeCatalog};
use crate::value::ArgumentValue;

slotmap::new_key_type! {
    /// Handle to an open model
    pub struct ModelHandle;
}

/// Owns every open model and the type catalog they share
pub struct ModelRegistry<C: TypeCatalog = IfcSchema> {
    models: SlotMap<ModelHandle, Model>,
    catalog: C,
    config: ModelConfig,
}

impl ModelRegistry<IfcSchema> {
    /// Registry over the built-in IFC catalog with default settings
    pub fn new() -> Self {
        Self::with_catalog(IfcSchema::new(), ModelConfig::default())
    }
}

impl Default for ModelRegistry<IfcSchema> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TypeCatalog> ModelRegistry<C> {
    pub fn with_catalog(catalog: C, config: ModelConfig) -> Self {
        Self {
            models: SlotMap::with_key(),
            catalog,
            config,
        }
    }

    /// Tokenize a STEP file into a new model.
    ///
    /// On any error no model is created.
    pub fn open(&mut self, data: &[u8]) -> Result<ModelHandle> {
        let start = Instant::now();
        let content = std::str::from_utf8(data).map_err(|e| {
            Error::parse(e.valid_up_to(), "source is not valid UTF-8")
        })?;

        let (model, stats) = Model::load(content, &self.catalog, &self.config)?;
        let lines = model.line_count();
        let tape_bytes = model.tape_len();
        let handle = self.models.insert(model);

        tracing::info!(
            ?handle,
            lines,
            tape_bytes,
            skipped_unknown = stats.skipped_unknown,
            duplicates = stats.duplicates,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Opened model"
        );
        Ok(handle)
    }

    /// Release a model; the handle is invalid afterwards
    pub fn close(&mut self, handle: ModelHandle) -> Result<()> {
        self.models
            .remove(handle)
            .map(|_| tracing::debug!(?handle, "Closed model"))
            .ok_or(Error::InvalidHandle(handle))
    }

    pub fn is_open(&self, handle: ModelHandle) -> bool {
        self.models.contains_key(handle)
    }

    /// Number of open models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, handle: ModelHandle) -> Result<&Model> {
        self.models.get(handle).ok_or(Error::InvalidHandle(handle))
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Result<&mut Model> {
        self.models.get_mut(handle).ok_or(Error::InvalidHandle(handle))
    }

    /// Decode one line of a model
    pub fn get_line(&mut self, handle: ModelHandle, id: u32) -> Result<Line> {
        self.model_mut(handle)?.get_line(id)
    }

    /// Encode a new version of a line; `arguments` must be a list
    pub fn write_line(
        &mut self,
        handle: ModelHandle,
        id: u32,
        type_code: u32,
        arguments: &ArgumentValue,
    ) -> Result<()> {
        let model = self
            .models
            .get_mut(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        model.write_line(&self.catalog, id, type_code, arguments)
    }

    pub fn delete_line(&mut self, handle: ModelHandle, id: u32) -> Result<()> {
        self.model_mut(handle)?.delete_line(id)
    }

    pub fn identifiers_of_type(&self, handle: ModelHandle, type_code: u32) -> Result<Vec<u32>> {
        Ok(self.model(handle)?.identifiers_of_type(type_code).collect())
    }

    pub fn all_identifiers(&self, handle: ModelHandle) -> Result<Vec<u32>> {
        Ok(self.model(handle)?.all_identifiers().collect())
    }

    /// Smallest identifier guaranteed unused in the model
    pub fn next_identifier(&self, handle: ModelHandle) -> Result<u32> {
        self.model(handle)?
            .next_identifier()
            .ok_or_else(|| Error::unsupported("identifier space exhausted"))
    }

    /// Render the model as STEP text
    pub fn export_as_text(&mut self, handle: ModelHandle) -> Result<Vec<u8>> {
        let start = Instant::now();
        let model = self
            .models
            .get_mut(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        let text = export_step(model, &self.catalog)?;
        tracing::info!(
            ?handle,
            bytes = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Exported model"
        );
        Ok(text.into_bytes())
    }

    /// Set a model's column-major 4x4 geometry transform
    pub fn set_geometry_transformation(&mut self, handle: ModelHandle, m: [f64; 16]) -> Result<()> {
        self.model_mut(handle)?.set_geometry_transformation(m);
        Ok(())
    }

    pub fn geometry_transformation(&self, handle: ModelHandle) -> Result<Transform> {
        Ok(*self.model(handle)?.geometry_transformation())
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Mutable catalog access, e.g. to register extra types
    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IfcType;

    const CONTENT: &[u8] = b"#1=IFCWALL($,$,'Wall-1');\n#2=IFCDOOR($,$,'Door-1');\n";

    #[test]
    fn test_open_and_close() {
        let mut registry = ModelRegistry::new();
        let handle = registry.open(CONTENT).unwrap();
        assert!(registry.is_open(handle));
        assert_eq!(registry.len(), 1);

        registry.close(handle).unwrap();
        assert!(!registry.is_open(handle));
        assert_eq!(registry.close(handle), Err(Error::InvalidHandle(handle)));
        assert_eq!(registry.get_line(handle, 1), Err(Error::InvalidHandle(handle)));
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut registry = ModelRegistry::new();
        let first = registry.open(CONTENT).unwrap();
        registry.close(first).unwrap();

        let second = registry.open(CONTENT).unwrap();
        assert_ne!(first, second);
        assert!(registry.get_line(second, 1).is_ok());
        assert_eq!(registry.get_line(first, 1), Err(Error::InvalidHandle(first)));
    }

    #[test]
    fn test_failed_open_creates_nothing() {
        let mut registry = ModelRegistry::new();
        assert!(matches!(
            registry.open(b"#1=IFCWALL($,$,'Wall-1'"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            registry.open(b"#1=IFCWALL('\xff');"),
            Err(Error::Parse { position: 12, .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_models_are_independent() {
        let mut registry = ModelRegistry::new();
        let a = registry.open(CONTENT).unwrap();
        let b = registry.open(CONTENT).unwrap();

        registry.delete_line(a, 1).unwrap();
        assert_eq!(registry.all_identifiers(a).unwrap(), vec![2]);
        assert_eq!(registry.all_identifiers(b).unwrap(), vec![1, 2]);
        assert_eq!(
            registry
                .identifiers_of_type(b, IfcType::IfcDoor.code())
                .unwrap(),
            vec![2]
        );
        assert_eq!(registry.next_identifier(a).unwrap(), 3);
    }
}
