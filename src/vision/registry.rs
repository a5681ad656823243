//! Per-service model registry.
//!
//! Maps model names to models and records owner → dependent edges so that
//! removing an owner also removes what was created for it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::factory::{ModelFactories, ModelLookup};
use super::model::{kind_mismatch, ModelConfig, ModelKind, VisionModel};
use crate::error::{ResourceError, Result};

#[derive(Default)]
struct RegistryState {
    models: BTreeMap<String, VisionModel>,
    dependents: HashMap<String, Vec<String>>,
}

/// Thread-safe registry of a service's models.
pub struct ModelRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    pub async fn lookup(&self, name: &str) -> Result<VisionModel> {
        self.state
            .read()
            .await
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::not_found("model", name))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.models.contains_key(name)
    }

    /// All model names, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.state.read().await.models.keys().cloned().collect()
    }

    /// Names of models of one kind, sorted.
    pub async fn names_of(&self, kind: ModelKind) -> Vec<String> {
        self.state
            .read()
            .await
            .models
            .iter()
            .filter(|(_, model)| model.kind() == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.models.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.models.is_empty()
    }

    /// Insert a built model. Existing names are never overwritten.
    pub async fn insert(&self, name: &str, model: VisionModel) -> Result<()> {
        let mut state = self.state.write().await;
        if state.models.contains_key(name) {
            return Err(ResourceError::conflict("model", name));
        }
        state.models.insert(name.to_string(), model);
        Ok(())
    }

    /// Record that `dependent` must be removed together with `owner`.
    pub async fn link(&self, owner: &str, dependent: &str) {
        let mut state = self.state.write().await;
        let deps = state.dependents.entry(owner.to_string()).or_default();
        if !deps.iter().any(|d| d == dependent) {
            deps.push(dependent.to_string());
        }
    }

    /// Dependents currently recorded for `owner`.
    pub async fn dependents_of(&self, owner: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .dependents
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Build and insert the model described by `config`.
    ///
    /// With `expected` set, a factory of another kind is rejected before
    /// anything is built.
    pub async fn register(
        &self,
        config: &ModelConfig,
        factories: &ModelFactories,
        expected: Option<ModelKind>,
    ) -> Result<ModelKind> {
        let factory = factories.get(&config.model_type)?;
        if let Some(expected) = expected {
            if factory.kind() != expected {
                return Err(kind_mismatch(expected, factory.kind()));
            }
        }

        let mut state = self.state.write().await;
        if state.models.contains_key(&config.name) {
            return Err(ResourceError::conflict("model", config.name.clone()));
        }
        let model = factory.build(config, &ModelLookup::new(&state.models))?;
        let kind = model.kind();
        state.models.insert(config.name.clone(), model);
        tracing::info!(model = %config.name, model_type = %config.model_type, kind = %kind, "model registered");
        Ok(kind)
    }

    /// Register every config in order.
    ///
    /// Not transactional: on failure the models registered before the
    /// failing entry stay registered and the first error is returned.
    pub async fn register_all(&self, configs: &[ModelConfig], factories: &ModelFactories) -> Result<()> {
        for config in configs {
            self.register(config, factories, None).await?;
        }
        Ok(())
    }

    /// Remove `name` and, transitively, its dependents.
    ///
    /// Missing dependents are skipped. Release hooks run after the entries
    /// are gone; the first release failure is returned.
    pub async fn remove(&self, name: &str, expected: Option<ModelKind>) -> Result<()> {
        let removed = {
            let mut state = self.state.write().await;
            let kind = state
                .models
                .get(name)
                .map(VisionModel::kind)
                .ok_or_else(|| ResourceError::not_found("model", name))?;
            if let Some(expected) = expected {
                if kind != expected {
                    return Err(kind_mismatch(expected, kind));
                }
            }

            let mut removed = Vec::new();
            let mut pending = vec![name.to_string()];
            while let Some(next) = pending.pop() {
                if let Some(model) = state.models.remove(&next) {
                    pending.extend(state.dependents.remove(&next).unwrap_or_default());
                    removed.push((next, model));
                }
            }

            let gone: HashSet<String> = removed.iter().map(|(n, _)| n.clone()).collect();
            state.dependents.retain(|owner, deps| {
                deps.retain(|d| !gone.contains(d));
                !deps.is_empty() && !gone.contains(owner)
            });
            removed
        };

        let mut first_err = None;
        for (model_name, model) in removed {
            tracing::info!(model = %model_name, "model removed");
            if let Err(e) = model.release().await {
                tracing::warn!(model = %model_name, error = %e, "model release failed");
                first_err.get_or_insert(ResourceError::Upstream(format!(
                    "releasing model {}: {}",
                    model_name, e
                )));
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
