use super::property_editors::PropertyEditorCollection;
use super::{ValueSetBuilder, add_properties, add_tree_fields, profile_name, resolve_profiles};
use crate::domain::Content;
use crate::domain::services::UserService;
use crate::error::IndexResult;
use crate::value_set::{FieldKey, FieldValue, IndexCategory, ValueSet, ValueSetFields, fields};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds content value sets.
///
/// With `published_values_only` the builder reads publish names and published
/// property values; otherwise it reads the edited ones.
pub struct ContentValueSetBuilder {
    editors: Arc<PropertyEditorCollection>,
    users: Arc<dyn UserService>,
    published_values_only: bool,
}

impl ContentValueSetBuilder {
    pub fn new(
        editors: Arc<PropertyEditorCollection>,
        users: Arc<dyn UserService>,
        published_values_only: bool,
    ) -> Self {
        Self {
            editors,
            users,
            published_values_only,
        }
    }

    pub fn published_values_only(&self) -> bool {
        self.published_values_only
    }

    fn node_name(&self, content: &Content) -> String {
        if self.published_values_only {
            content
                .publish_name
                .clone()
                .unwrap_or_else(|| content.entity.name.clone())
        } else {
            content.entity.name.clone()
        }
    }
}

#[async_trait]
impl ValueSetBuilder<Content> for ContentValueSetBuilder {
    async fn get_value_sets(&self, items: &[Content]) -> IndexResult<Vec<ValueSet>> {
        let profiles = resolve_profiles(self.users.as_ref(), items.iter().map(|c| &c.entity)).await?;
        let mut sets = Vec::with_capacity(items.len());

        for content in items {
            let entity = &content.entity;
            let mut out = ValueSetFields::new();

            add_tree_fields(
                &mut out,
                entity,
                &content.content_type,
                &self.node_name(content),
                &content.url_segment,
            );
            if let Some(name) = profile_name(&profiles, entity.creator_id) {
                out.set_one(FieldKey::invariant(fields::CREATOR_NAME), name);
            }
            out.set_one(FieldKey::invariant(fields::WRITER_ID), entity.writer_id);
            if let Some(name) = profile_name(&profiles, entity.writer_id) {
                out.set_one(FieldKey::invariant(fields::WRITER_NAME), name);
            }
            out.set_one(
                FieldKey::invariant(fields::TEMPLATE_ID),
                content.template_id.unwrap_or(0),
            );
            out.set_one(
                FieldKey::invariant(fields::PUBLISHED),
                FieldValue::flag(content.published),
            );
            out.set_one(
                FieldKey::invariant(fields::VARIES_BY_CULTURE),
                FieldValue::flag(content.varies_by_culture()),
            );

            if content.varies_by_culture() {
                for culture in content.available_cultures() {
                    let code = culture.culture.as_str();
                    let name = if self.published_values_only {
                        culture.publish_name.clone().unwrap_or_default()
                    } else {
                        culture.name.clone()
                    };
                    out.set_one(
                        FieldKey::cultured(fields::URL_NAME, code),
                        FieldValue::Raw(culture.url_segment.clone()),
                    );
                    out.set_one(FieldKey::cultured(fields::NODE_NAME, code), name);
                    out.set_one(
                        FieldKey::cultured(fields::PUBLISHED, code),
                        FieldValue::flag(culture.published),
                    );
                    out.set_one(
                        FieldKey::cultured(fields::UPDATE_DATE, code),
                        culture.update_date,
                    );
                }
            }

            let invariant_keys: BTreeSet<FieldKey> = out.keys().cloned().collect();
            add_properties(
                &mut out,
                &invariant_keys,
                &self.editors,
                &content.properties,
                content.available_cultures().map(|c| c.culture.as_str()),
                self.published_values_only,
            );

            sets.push(ValueSet::new(
                entity.id.to_string(),
                IndexCategory::Content,
                content.content_type.alias.clone(),
                out.into_values(),
            ));
        }

        Ok(sets)
    }
}
