//! Model factory catalog: type tag → constructor and parameter schema.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::builtin;
use super::model::{ModelConfig, ModelKind, VisionModel};
use crate::error::{ResourceError, Result};

/// Read access to the models already registered, for factories that build
/// on another model (e.g. a segmenter driven by a detector).
pub struct ModelLookup<'a> {
    models: &'a BTreeMap<String, VisionModel>,
}

impl<'a> ModelLookup<'a> {
    pub(crate) fn new(models: &'a BTreeMap<String, VisionModel>) -> Self {
        Self { models }
    }

    pub fn lookup(&self, name: &str) -> Result<VisionModel> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::not_found("model", name))
    }
}

pub type BuildFn = Arc<dyn Fn(&ModelConfig, &ModelLookup<'_>) -> Result<VisionModel> + Send + Sync>;

/// Constructor for one model type.
#[derive(Clone)]
pub struct ModelFactory {
    kind: ModelKind,
    schema: Value,
    build: BuildFn,
}

impl ModelFactory {
    pub fn new(
        kind: ModelKind,
        schema: Value,
        build: impl Fn(&ModelConfig, &ModelLookup<'_>) -> Result<VisionModel> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            schema,
            build: Arc::new(build),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub(crate) fn build(&self, config: &ModelConfig, models: &ModelLookup<'_>) -> Result<VisionModel> {
        let model = (self.build)(config, models)?;
        if model.kind() != self.kind {
            return Err(super::model::kind_mismatch(self.kind, model.kind()));
        }
        Ok(model)
    }
}

/// All model types a vision service can instantiate.
///
/// Built once at startup and shared by every service instance.
#[derive(Clone, Default)]
pub struct ModelFactories {
    factories: HashMap<String, ModelFactory>,
}

impl ModelFactories {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in model types registered.
    pub fn with_builtins() -> Result<Self> {
        let mut factories = Self::new();
        builtin::register(&mut factories)?;
        Ok(factories)
    }

    /// Register a model type. Tags are unique.
    pub fn register(&mut self, model_type: &str, factory: ModelFactory) -> Result<()> {
        if self.factories.contains_key(model_type) {
            return Err(ResourceError::conflict("model type", model_type));
        }
        self.factories.insert(model_type.to_string(), factory);
        Ok(())
    }

    pub fn get(&self, model_type: &str) -> Result<&ModelFactory> {
        self.factories.get(model_type).ok_or_else(|| {
            ResourceError::Validation(format!("model type {:?} is not registered", model_type))
        })
    }

    /// JSON Schema describing the parameters of `model_type`.
    pub fn parameter_schema(&self, model_type: &str) -> Result<Value> {
        self.factories
            .get(model_type)
            .map(|f| f.schema.clone())
            .ok_or_else(|| ResourceError::not_found("schema for model type", model_type))
    }

    /// Registered tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
