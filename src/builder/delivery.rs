//! Value sets for the delivery API index.
//!
//! Documents are keyed by content GUID, one per published culture for variant
//! content. Field content comes from a collection of [`ContentIndexHandler`]s; when two
//! handlers produce the same field name (compared case-insensitively) the first one
//! registered wins.

use super::ValueSetBuilder;
use crate::domain::Content;
use crate::error::IndexResult;
use crate::value_set::{FieldKey, FieldValue, IndexCategory, ValueSet, ValueSetFields};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub const ITEM_ID: &str = "itemId";
pub const ANCESTOR_IDS: &str = "ancestorIds";
pub const CONTENT_TYPE: &str = "contentType";
pub const NAME: &str = "name";
pub const CREATE_DATE: &str = "createDate";
pub const UPDATE_DATE: &str = "updateDate";
pub const LEVEL: &str = "level";
pub const SORT_ORDER: &str = "sortOrder";
pub const PATH: &str = "path";
pub const CULTURE: &str = "culture";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    pub field_name: String,
    pub values: Vec<FieldValue>,
}

impl IndexField {
    pub fn new(field_name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self {
            field_name: field_name.into(),
            values,
        }
    }

    pub fn single(field_name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field_name, vec![value.into()])
    }
}

/// Contributes fields for one content item in one culture (`None` for invariant).
pub trait ContentIndexHandler: Send + Sync {
    fn name(&self) -> &str;

    fn fields(&self, content: &Content, culture: Option<&str>) -> Vec<IndexField>;
}

fn culture_name(content: &Content, culture: Option<&str>) -> String {
    culture
        .and_then(|c| content.cultures.get(&c.to_lowercase()))
        .and_then(|c| c.publish_name.clone().or_else(|| Some(c.name.clone())))
        .or_else(|| content.publish_name.clone())
        .unwrap_or_else(|| content.entity.name.clone())
}

/// `itemId` and `ancestorIds`.
#[derive(Debug, Default)]
pub struct AncestorsSelectorIndexer;

impl ContentIndexHandler for AncestorsSelectorIndexer {
    fn name(&self) -> &str {
        "ancestors"
    }

    fn fields(&self, content: &Content, _culture: Option<&str>) -> Vec<IndexField> {
        let ancestors = content
            .entity
            .ancestor_ids()
            .into_iter()
            .map(|id| FieldValue::Raw(id.to_string()))
            .collect();
        vec![
            IndexField::single(ITEM_ID, FieldValue::Raw(content.entity.key.to_string())),
            IndexField::new(ANCESTOR_IDS, ancestors),
        ]
    }
}

#[derive(Debug, Default)]
pub struct ContentTypeFilterIndexer;

impl ContentIndexHandler for ContentTypeFilterIndexer {
    fn name(&self) -> &str {
        "contentType"
    }

    fn fields(&self, content: &Content, _culture: Option<&str>) -> Vec<IndexField> {
        vec![IndexField::single(
            CONTENT_TYPE,
            FieldValue::Raw(content.content_type.alias.clone()),
        )]
    }
}

/// Sort keys: name, dates, level, sort order and path.
#[derive(Debug, Default)]
pub struct SortIndexer;

impl ContentIndexHandler for SortIndexer {
    fn name(&self) -> &str {
        "sort"
    }

    fn fields(&self, content: &Content, culture: Option<&str>) -> Vec<IndexField> {
        let entity = &content.entity;
        let update_date = culture
            .and_then(|c| content.cultures.get(&c.to_lowercase()))
            .map(|c| c.update_date)
            .unwrap_or(entity.update_date);
        vec![
            IndexField::single(NAME, culture_name(content, culture)),
            IndexField::single(CREATE_DATE, entity.create_date),
            IndexField::single(UPDATE_DATE, update_date),
            IndexField::single(LEVEL, entity.level),
            IndexField::single(SORT_ORDER, entity.sort_order),
            IndexField::single(PATH, FieldValue::Raw(entity.path.clone())),
        ]
    }
}

/// Ordered handler list.
#[derive(Clone, Default)]
pub struct ContentIndexHandlerCollection {
    handlers: Vec<Arc<dyn ContentIndexHandler>>,
}

impl ContentIndexHandlerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::new()
            .push(Arc::new(AncestorsSelectorIndexer))
            .push(Arc::new(ContentTypeFilterIndexer))
            .push(Arc::new(SortIndexer))
    }

    pub fn push(mut self, handler: Arc<dyn ContentIndexHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ContentIndexHandler>> {
        self.handlers.iter()
    }
}

/// Document id for one culture of a content item.
pub fn document_id(content: &Content, culture: Option<&str>) -> String {
    match culture {
        Some(culture) => format!("{}|{}", content.entity.key, culture.to_lowercase()),
        None => content.entity.key.to_string(),
    }
}

pub struct DeliveryApiContentValueSetBuilder {
    handlers: Arc<ContentIndexHandlerCollection>,
}

impl DeliveryApiContentValueSetBuilder {
    pub fn new(handlers: Arc<ContentIndexHandlerCollection>) -> Self {
        Self { handlers }
    }

    fn build(&self, content: &Content, culture: Option<&str>) -> ValueSet {
        let mut out = ValueSetFields::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(CULTURE.to_lowercase());
        out.set_one(
            FieldKey::invariant(CULTURE),
            FieldValue::Raw(culture.map(str::to_lowercase).unwrap_or_default()),
        );

        for handler in self.handlers.iter() {
            for field in handler.fields(content, culture) {
                if !seen.insert(field.field_name.to_lowercase()) {
                    debug!(
                        handler = handler.name(),
                        field = %field.field_name,
                        "field already provided by an earlier handler, skipping"
                    );
                    continue;
                }
                out.set(FieldKey::invariant(field.field_name), field.values);
            }
        }

        ValueSet::new(
            document_id(content, culture),
            IndexCategory::Content,
            content.content_type.alias.clone(),
            out.into_values(),
        )
    }
}

#[async_trait]
impl ValueSetBuilder<Content> for DeliveryApiContentValueSetBuilder {
    async fn get_value_sets(&self, items: &[Content]) -> IndexResult<Vec<ValueSet>> {
        let mut sets = Vec::new();
        for content in items.iter().filter(|c| c.published) {
            if content.varies_by_culture() {
                for culture in content.published_cultures() {
                    sets.push(self.build(content, Some(&culture.culture)));
                }
            } else {
                sets.push(self.build(content, None));
            }
        }
        Ok(sets)
    }
}
