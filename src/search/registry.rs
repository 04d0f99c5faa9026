use super::index::{IndexOptions, SqliteIndex};
use super::SearchIndex;
use crate::config::{IndexDefinition, IndexKind, IndexingSettings};
use crate::domain::services::PublicAccessService;
use crate::error::{IndexError, IndexResult};
use crate::scope::ScopeProvider;
use crate::validation::{ContentValueSetValidator, ValueSetValidator, Validator};
use crate::value_set::IndexCategory;
use std::sync::Arc;
use tracing::info;

/// Registered index sinks, in registration order.
#[derive(Clone, Default)]
pub struct IndexRegistry {
    indexes: Vec<Arc<dyn SearchIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a [`SqliteIndex`] under `settings.index_root` for every configured index.
    pub async fn from_settings(
        settings: &IndexingSettings,
        public_access: Arc<dyn PublicAccessService>,
        scope_provider: Arc<dyn ScopeProvider>,
    ) -> IndexResult<Self> {
        settings.validate()?;
        let mut registry = Self::new();
        for definition in &settings.indexes {
            let validator = build_validator(definition, &public_access, &scope_provider);
            let options = IndexOptions::new(&definition.name)
                .published_values_only(definition.published_values_only)
                .enable_default_event_handler(definition.enable_default_event_handler);
            let index = SqliteIndex::open(&settings.index_root, options, validator).await?;
            registry.register(Arc::new(index))?;
        }
        info!(count = registry.len(), root = %settings.index_root.display(), "indexes opened");
        Ok(registry)
    }

    pub fn register(&mut self, index: Arc<dyn SearchIndex>) -> IndexResult<()> {
        if self.get(index.name()).is_some() {
            return Err(IndexError::Config(format!(
                "an index named {} is already registered",
                index.name()
            )));
        }
        self.indexes.push(index);
        Ok(())
    }

    /// Case-insensitive lookup by index name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchIndex>> {
        self.indexes
            .iter()
            .find(|i| i.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn indexes(&self) -> &[Arc<dyn SearchIndex>] {
        &self.indexes
    }

    pub fn names(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Validator matching an index definition.
pub fn build_validator(
    definition: &IndexDefinition,
    public_access: &Arc<dyn PublicAccessService>,
    scope_provider: &Arc<dyn ScopeProvider>,
) -> Arc<dyn Validator> {
    match definition.kind {
        IndexKind::Content => Arc::new(
            ContentValueSetValidator::new(
                definition.published_values_only,
                definition.support_protected_content,
                Arc::clone(public_access),
                Arc::clone(scope_provider),
            )
            .with_parent_id(definition.parent_id)
            .with_item_types(
                definition.include_item_types.clone(),
                definition.exclude_item_types.clone(),
            )
            .with_fields(
                definition.include_fields.clone(),
                definition.exclude_fields.clone(),
            ),
        ),
        IndexKind::Members => Arc::new(
            ValueSetValidator::for_members(
                definition.include_fields.clone(),
                definition.exclude_fields.clone(),
            )
            .with_item_types(
                definition.include_item_types.clone(),
                definition.exclude_item_types.clone(),
            ),
        ),
        // Excluded types are dropped by the populator, which still walks through them.
        IndexKind::DeliveryApi => Arc::new(
            ValueSetValidator::new(Some(vec![IndexCategory::Content])).with_fields(
                definition.include_fields.clone(),
                definition.exclude_fields.clone(),
            ),
        ),
    }
}
