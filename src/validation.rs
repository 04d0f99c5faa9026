//! Accept, reject or filter value sets before they reach an index.
//!
//! Validation outcomes are data. [`ValidationStatus::Failed`] means the value set is
//! unusable and must never be written; [`ValidationStatus::Filtered`] means the entity
//! must not currently be in the index, so any existing entry for its id is removed.
//! Sinks rely on that difference to purge entries for items that moved into an
//! excluded state (recycle bin, unpublished, protected) after they were indexed.

pub mod content;

use crate::value_set::{FieldValues, IndexCategory, ValueSet, fields};
use std::collections::BTreeMap;

pub use content::ContentValueSetValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Index the (possibly field-filtered) value set.
    Valid,
    /// Remove any existing entry for this id.
    Filtered,
    /// Structurally invalid; never index, leave existing entries alone.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub value_set: ValueSet,
}

impl ValidationResult {
    pub fn new(status: ValidationStatus, value_set: ValueSet) -> Self {
        Self { status, value_set }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, value_set: &ValueSet) -> ValidationResult;

    /// Configuration summary surfaced by diagnostics.
    fn describe(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Fields kept in member indexes unless configured otherwise.
pub const DEFAULT_MEMBER_INDEX_FIELDS: &[&str] = &[
    fields::ID,
    fields::NODE_NAME,
    fields::UPDATE_DATE,
    fields::LOGIN_NAME,
    fields::EMAIL,
    fields::KEY_SPECIAL,
];

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Category, item-type and field-list rules shared by every index.
#[derive(Debug, Clone, Default)]
pub struct ValueSetValidator {
    /// `None` accepts every category.
    pub valid_categories: Option<Vec<IndexCategory>>,
    pub include_item_types: Vec<String>,
    pub exclude_item_types: Vec<String>,
    /// Matched against the field's base name, so one entry covers all cultures.
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    /// Kept whatever the field lists say.
    pub retained_fields: Vec<String>,
}

impl ValueSetValidator {
    pub fn new(valid_categories: Option<Vec<IndexCategory>>) -> Self {
        Self {
            valid_categories,
            ..Default::default()
        }
    }

    /// Member validator restricted to [`DEFAULT_MEMBER_INDEX_FIELDS`] when no include
    /// list is given.
    pub fn for_members(include_fields: Vec<String>, exclude_fields: Vec<String>) -> Self {
        let include_fields = if include_fields.is_empty() {
            DEFAULT_MEMBER_INDEX_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect()
        } else {
            include_fields
        };
        Self {
            valid_categories: Some(vec![IndexCategory::Member]),
            include_fields,
            exclude_fields,
            ..Default::default()
        }
    }

    pub fn with_item_types(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.include_item_types = include;
        self.exclude_item_types = exclude;
        self
    }

    pub fn with_fields(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.include_fields = include;
        self.exclude_fields = exclude;
        self
    }

    /// Copy of `values` without the fields the include/exclude lists reject.
    pub fn filter_fields(&self, values: &FieldValues) -> FieldValues {
        values
            .iter()
            .filter(|(key, _)| {
                contains_ignore_case(&self.retained_fields, &key.base)
                    || ((self.include_fields.is_empty()
                        || contains_ignore_case(&self.include_fields, &key.base))
                        && !contains_ignore_case(&self.exclude_fields, &key.base))
            })
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect()
    }
}

impl Validator for ValueSetValidator {
    fn validate(&self, value_set: &ValueSet) -> ValidationResult {
        if let Some(categories) = &self.valid_categories {
            if !categories.contains(value_set.category()) {
                return ValidationResult::new(ValidationStatus::Failed, value_set.clone());
            }
        }

        if !self.include_item_types.is_empty()
            && !contains_ignore_case(&self.include_item_types, value_set.item_type())
        {
            return ValidationResult::new(ValidationStatus::Failed, value_set.clone());
        }

        if contains_ignore_case(&self.exclude_item_types, value_set.item_type()) {
            return ValidationResult::new(ValidationStatus::Failed, value_set.clone());
        }

        if self.include_fields.is_empty() && self.exclude_fields.is_empty() {
            return ValidationResult::new(ValidationStatus::Valid, value_set.clone());
        }

        let filtered = self.filter_fields(value_set.values());
        ValidationResult::new(ValidationStatus::Valid, value_set.with_values(filtered))
    }

    fn describe(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(categories) = &self.valid_categories {
            out.insert(
                "ValidCategories".to_string(),
                categories
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        let lists = [
            ("IncludeItemTypes", &self.include_item_types),
            ("ExcludeItemTypes", &self.exclude_item_types),
            ("IncludeFields", &self.include_fields),
            ("ExcludeFields", &self.exclude_fields),
        ];
        for (name, list) in lists {
            if !list.is_empty() {
                out.insert(name.to_string(), list.join(","));
            }
        }
        out
    }
}
