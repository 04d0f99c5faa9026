//! Turn domain entities into [`ValueSet`]s.
//!
//! There is one builder per entity kind. The content builder comes in two
//! projections: all values (edited names and property values) and published values
//! only. The delivery API builder keys documents by GUID and delegates its fields to
//! pluggable [`delivery::ContentIndexHandler`]s.

pub mod content;
pub mod delivery;
pub mod media;
pub mod member;
pub mod property_editors;

use crate::domain::services::UserService;
use crate::domain::{ContentTypeRef, Property, TreeEntity, UserProfile};
use crate::error::IndexResult;
use crate::value_set::{FieldKey, FieldValue, ValueSet, ValueSetFields, fields};
use async_trait::async_trait;
use property_editors::PropertyEditorCollection;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub use content::ContentValueSetBuilder;
pub use delivery::DeliveryApiContentValueSetBuilder;
pub use media::MediaValueSetBuilder;
pub use member::MemberValueSetBuilder;

#[async_trait]
pub trait ValueSetBuilder<T: Sync>: Send + Sync {
    /// Builds value sets for a batch of entities, in input order.
    async fn get_value_sets(&self, items: &[T]) -> IndexResult<Vec<ValueSet>>;
}

/// Resolves creator and writer names for a whole batch with one lookup.
pub(crate) async fn resolve_profiles<'a>(
    users: &dyn UserService,
    entities: impl Iterator<Item = &'a TreeEntity>,
) -> IndexResult<HashMap<i32, UserProfile>> {
    let ids: BTreeSet<i32> = entities
        .flat_map(|e| [e.creator_id, e.writer_id])
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<i32> = ids.into_iter().collect();
    users.get_profiles_by_id(&ids).await
}

/// Writes the identity and tree fields every entity kind shares.
pub(crate) fn add_tree_fields(
    out: &mut ValueSetFields,
    entity: &TreeEntity,
    item_type: &ContentTypeRef,
    node_name: &str,
    url_name: &str,
) {
    out.set_one(FieldKey::invariant(fields::ICON), item_type.icon.as_str());
    out.set_one(FieldKey::invariant(fields::ID), entity.id);
    out.set_one(
        FieldKey::invariant(fields::KEY),
        FieldValue::Raw(entity.key.to_string()),
    );
    out.set_one(FieldKey::invariant(fields::PARENT_ID), entity.parent_id);
    out.set_one(FieldKey::invariant(fields::LEVEL), entity.level);
    out.set_one(FieldKey::invariant(fields::CREATOR_ID), entity.creator_id);
    out.set_one(FieldKey::invariant(fields::SORT_ORDER), entity.sort_order);
    out.set_one(FieldKey::invariant(fields::CREATE_DATE), entity.create_date);
    out.set_one(FieldKey::invariant(fields::UPDATE_DATE), entity.update_date);
    out.set_one(FieldKey::invariant(fields::NODE_NAME), node_name);
    out.set_one(
        FieldKey::invariant(fields::URL_NAME),
        FieldValue::Raw(url_name.to_string()),
    );
    out.set_one(
        FieldKey::invariant(fields::PATH),
        FieldValue::Raw(entity.path.clone()),
    );
    out.set_one(FieldKey::invariant(fields::NODE_TYPE), item_type.id);

    out.set_one(FieldKey::invariant(fields::NODE_ID_SPECIAL), entity.id);
    out.set_one(
        FieldKey::invariant(fields::KEY_SPECIAL),
        FieldValue::Raw(entity.key.to_string()),
    );
    out.set_one(
        FieldKey::invariant(fields::NODE_TYPE_ALIAS_SPECIAL),
        FieldValue::Raw(item_type.alias.to_lowercase()),
    );
    out.set_one(
        FieldKey::invariant(fields::ICON_SPECIAL),
        FieldValue::Raw(item_type.icon.clone()),
    );
    out.set_one(
        FieldKey::invariant(fields::PATH_SPECIAL),
        FieldValue::Raw(entity.path.clone()),
    );
}

/// Adds the values an editor produces for one property and culture.
///
/// Properties without a registered editor are skipped. Values for a key that already
/// holds property values are appended; keys written by the invariant block are left
/// alone.
pub(crate) fn add_property_values(
    out: &mut ValueSetFields,
    invariant_keys: &BTreeSet<FieldKey>,
    editors: &PropertyEditorCollection,
    property: &Property,
    culture: Option<&str>,
    published: bool,
) {
    let Some(editor) = editors.get(&property.editor_alias) else {
        debug!(
            property = %property.alias,
            editor = %property.editor_alias,
            "no index value contributor registered, skipping property"
        );
        return;
    };

    for index_value in editor.index_values(property, culture, published) {
        if index_value.field_name.trim().is_empty() {
            continue;
        }
        let key = FieldKey::new(index_value.field_name, index_value.culture.as_deref());
        if invariant_keys.contains(&key) {
            debug!(field = %key, "property value collides with a system field, skipping");
            continue;
        }
        out.append(key, index_value.values);
    }
}

/// Adds every property of an entity, repeating culture-variant properties per culture.
pub(crate) fn add_properties<'a>(
    out: &mut ValueSetFields,
    invariant_keys: &BTreeSet<FieldKey>,
    editors: &PropertyEditorCollection,
    properties: &[Property],
    cultures: impl Iterator<Item = &'a str> + Clone,
    published: bool,
) {
    for property in properties {
        if property.varies_by_culture {
            for culture in cultures.clone() {
                add_property_values(out, invariant_keys, editors, property, Some(culture), published);
            }
        } else {
            add_property_values(out, invariant_keys, editors, property, None, published);
        }
    }
}

pub(crate) fn profile_name(profiles: &HashMap<i32, UserProfile>, id: i32) -> Option<&str> {
    profiles.get(&id).map(|p| p.name.as_str())
}
