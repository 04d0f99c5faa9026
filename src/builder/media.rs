use super::property_editors::PropertyEditorCollection;
use super::{ValueSetBuilder, add_properties, add_tree_fields, profile_name, resolve_profiles};
use crate::domain::Media;
use crate::domain::services::UserService;
use crate::error::IndexResult;
use crate::value_set::{FieldKey, FieldValue, IndexCategory, ValueSet, ValueSetFields, fields};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct MediaValueSetBuilder {
    editors: Arc<PropertyEditorCollection>,
    users: Arc<dyn UserService>,
}

impl MediaValueSetBuilder {
    pub fn new(editors: Arc<PropertyEditorCollection>, users: Arc<dyn UserService>) -> Self {
        Self { editors, users }
    }
}

#[async_trait]
impl ValueSetBuilder<Media> for MediaValueSetBuilder {
    async fn get_value_sets(&self, items: &[Media]) -> IndexResult<Vec<ValueSet>> {
        let profiles = resolve_profiles(self.users.as_ref(), items.iter().map(|m| &m.entity)).await?;
        let mut sets = Vec::with_capacity(items.len());

        for media in items {
            let entity = &media.entity;
            let mut out = ValueSetFields::new();

            add_tree_fields(&mut out, entity, &media.media_type, &entity.name, &media.url_segment);
            if let Some(name) = profile_name(&profiles, entity.creator_id) {
                out.set_one(FieldKey::invariant(fields::CREATOR_NAME), name);
            }
            if let Some(url) = media.file_url.as_deref().filter(|u| !u.is_empty()) {
                out.set_one(
                    FieldKey::invariant(fields::MEDIA_FILE),
                    FieldValue::Raw(url.to_string()),
                );
            }

            let invariant_keys: BTreeSet<FieldKey> = out.keys().cloned().collect();
            add_properties(
                &mut out,
                &invariant_keys,
                &self.editors,
                &media.properties,
                std::iter::empty(),
                false,
            );

            sets.push(ValueSet::new(
                entity.id.to_string(),
                IndexCategory::Media,
                media.media_type.alias.clone(),
                out.into_values(),
            ));
        }

        Ok(sets)
    }
}
