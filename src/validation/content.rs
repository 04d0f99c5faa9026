use super::{ValidationResult, ValidationStatus, Validator, ValueSetValidator};
use crate::domain::services::PublicAccessService;
use crate::domain::{RECYCLE_BIN_CONTENT, RECYCLE_BIN_MEDIA};
use crate::scope::ScopeProvider;
use crate::value_set::{FieldKey, IndexCategory, ValueSet, fields};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Fields the content rules read. Field lists never drop them, so a filtered value set
/// validates the same way again.
const CONTENT_RULE_FIELDS: &[&str] = &[fields::PUBLISHED, fields::VARIES_BY_CULTURE, fields::PATH];

/// Validator for content and media indexes.
///
/// Runs the base category/type/field rules, then the publish-state, culture, path,
/// recycle-bin and protection rules.
pub struct ContentValueSetValidator {
    base: ValueSetValidator,
    published_values_only: bool,
    support_protected_content: bool,
    parent_id: Option<i32>,
    public_access: Arc<dyn PublicAccessService>,
    scope_provider: Arc<dyn ScopeProvider>,
}

impl ContentValueSetValidator {
    pub fn new(
        published_values_only: bool,
        support_protected_content: bool,
        public_access: Arc<dyn PublicAccessService>,
        scope_provider: Arc<dyn ScopeProvider>,
    ) -> Self {
        Self {
            base: ValueSetValidator {
                retained_fields: CONTENT_RULE_FIELDS.iter().map(|f| f.to_string()).collect(),
                ..ValueSetValidator::new(Some(vec![IndexCategory::Content, IndexCategory::Media]))
            },
            published_values_only,
            support_protected_content,
            parent_id: None,
            public_access,
            scope_provider,
        }
    }

    /// Restricts the index to descendants of `parent_id`.
    pub fn with_parent_id(mut self, parent_id: Option<i32>) -> Self {
        self.parent_id = parent_id.filter(|id| *id > 0);
        self
    }

    pub fn with_item_types(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.base = self.base.with_item_types(include, exclude);
        self
    }

    pub fn with_fields(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.base = self.base.with_fields(include, exclude);
        self
    }

    pub fn published_values_only(&self) -> bool {
        self.published_values_only
    }

    pub fn parent_id(&self) -> Option<i32> {
        self.parent_id
    }

    /// The path must run through the configured parent.
    pub fn validate_path(&self, path: &str) -> bool {
        match self.parent_id {
            Some(parent_id) => path.contains(&format!(",{parent_id},")),
            None => true,
        }
    }

    /// Published-only indexes never hold items that sit in a recycle bin.
    pub fn validate_recycle_bin(&self, path: &str, category: &IndexCategory) -> bool {
        if !self.published_values_only {
            return true;
        }
        let recycle_bin_id = match category {
            IndexCategory::Media => RECYCLE_BIN_MEDIA,
            _ => RECYCLE_BIN_CONTENT,
        };
        !path
            .split(',')
            .any(|segment| segment.trim().parse::<i32>().ok() == Some(recycle_bin_id))
    }

    pub fn validate_protected_content(&self, path: &str, category: &IndexCategory) -> bool {
        if self.support_protected_content || *category != IndexCategory::Content {
            return true;
        }
        let _scope = self.scope_provider.create_scope(true);
        !self.public_access.is_protected(path)
    }

    /// Cultures whose `__Published_<culture>` flag is not `y`.
    fn unpublished_cultures(value_set: &ValueSet) -> BTreeSet<String> {
        value_set
            .values()
            .iter()
            .filter(|(key, _)| key.base == fields::PUBLISHED)
            .filter_map(|(key, values)| {
                let culture = key.culture.as_ref()?;
                let published = values
                    .first()
                    .and_then(|v| v.as_str())
                    .map(|v| v == fields::YES)
                    .unwrap_or(false);
                (!published).then(|| culture.clone())
            })
            .collect()
    }
}

impl Validator for ContentValueSetValidator {
    fn validate(&self, value_set: &ValueSet) -> ValidationResult {
        let base = self.base.validate(value_set);
        if base.status == ValidationStatus::Failed {
            return base;
        }

        let mut values = base.value_set.values().clone();
        let category = value_set.category();

        if self.published_values_only && *category == IndexCategory::Content {
            if value_set.first_value(fields::PUBLISHED).as_deref() != Some(fields::YES) {
                return ValidationResult::new(ValidationStatus::Failed, value_set.clone());
            }

            if value_set.first_value(fields::VARIES_BY_CULTURE).as_deref() == Some(fields::YES) {
                let unpublished = Self::unpublished_cultures(value_set);
                if !unpublished.is_empty() {
                    values.retain(|key: &FieldKey, _| {
                        key.culture
                            .as_ref()
                            .map(|c| !unpublished.contains(c))
                            .unwrap_or(true)
                    });
                }
            }
        }

        let path = match value_set.first_value(fields::PATH) {
            Some(path) if !path.trim().is_empty() => path,
            _ => return ValidationResult::new(ValidationStatus::Failed, value_set.clone()),
        };

        let filtered = value_set.with_values(values);

        if !self.validate_path(&path)
            || !self.validate_recycle_bin(&path, category)
            || !self.validate_protected_content(&path, category)
        {
            return ValidationResult::new(ValidationStatus::Filtered, filtered);
        }

        ValidationResult::new(ValidationStatus::Valid, filtered)
    }

    fn describe(&self) -> BTreeMap<String, String> {
        let mut out = self.base.describe();
        out.insert(
            "PublishedValuesOnly".to_string(),
            self.published_values_only.to_string(),
        );
        out.insert(
            "SupportProtectedContent".to_string(),
            self.support_protected_content.to_string(),
        );
        if let Some(parent_id) = self.parent_id {
            out.insert("ParentId".to_string(), parent_id.to_string());
        }
        out
    }
}
