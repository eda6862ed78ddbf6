use crate::error::{OrmError, OrmResult};
use crate::metadata::column::{ColumnMetadata, ModelRef};
use crate::metadata::model::ModelMetadata;
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from model name to its finished metadata.
///
/// Names are matched case-insensitively. Entries are immutable once registered.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: HashMap<String, Arc<ModelMetadata>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a model.
    pub fn register(&mut self, model: ModelMetadata) -> OrmResult<()> {
        model.validate()?;
        let key = model.name().to_lowercase();
        if self.models.contains_key(&key) {
            return Err(OrmError::configuration(format!(
                "model `{}` is registered more than once",
                model.name()
            )));
        }
        self.models.insert(key, Arc::new(model));
        Ok(())
    }

    /// Consuming variant of [`Registry::register`].
    pub fn with(mut self, model: ModelMetadata) -> OrmResult<Self> {
        self.register(model)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> OrmResult<Arc<ModelMetadata>> {
        self.models
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| OrmError::configuration(format!("model `{name}` is not registered")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(&name.to_lowercase())
    }

    /// Resolve a (possibly deferred) model reference.
    pub fn resolve(&self, target: &ModelRef) -> OrmResult<Arc<ModelMetadata>> {
        let name = target.name();
        self.get(&name).map_err(|_| {
            OrmError::configuration(format!("relation target `{name}` is not registered"))
        })
    }

    /// Target model of a belongs-to or collection column.
    pub fn relation_target(
        &self,
        owner: &ModelMetadata,
        column: &ColumnMetadata,
    ) -> OrmResult<Arc<ModelMetadata>> {
        let target = column.target().ok_or_else(|| {
            OrmError::configuration(format!(
                "`{}.{}` is not a relation",
                owner.name(),
                column.property_name
            ))
        })?;
        self.resolve(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelMetadata>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
