use super::property_editors::PropertyEditorCollection;
use super::{ValueSetBuilder, add_properties, add_tree_fields};
use crate::domain::Member;
use crate::error::IndexResult;
use crate::value_set::{FieldKey, IndexCategory, ValueSet, ValueSetFields, fields};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct MemberValueSetBuilder {
    editors: Arc<PropertyEditorCollection>,
}

impl MemberValueSetBuilder {
    pub fn new(editors: Arc<PropertyEditorCollection>) -> Self {
        Self { editors }
    }
}

#[async_trait]
impl ValueSetBuilder<Member> for MemberValueSetBuilder {
    async fn get_value_sets(&self, items: &[Member]) -> IndexResult<Vec<ValueSet>> {
        let mut sets = Vec::with_capacity(items.len());

        for member in items {
            let entity = &member.entity;
            let mut out = ValueSetFields::new();

            add_tree_fields(&mut out, entity, &member.member_type, &entity.name, "");
            out.set_one(FieldKey::invariant(fields::LOGIN_NAME), member.login_name.as_str());
            out.set_one(FieldKey::invariant(fields::EMAIL), member.email.as_str());

            let invariant_keys: BTreeSet<FieldKey> = out.keys().cloned().collect();
            add_properties(
                &mut out,
                &invariant_keys,
                &self.editors,
                &member.properties,
                std::iter::empty(),
                false,
            );

            sets.push(ValueSet::new(
                entity.id.to_string(),
                IndexCategory::Member,
                member.member_type.alias.clone(),
                out.into_values(),
            ));
        }

        Ok(sets)
    }
}
