//! The unit of indexable data.
//!
//! A [`ValueSet`] is the flat, named-field projection of a single entity. It is built
//! fresh for every builder invocation, flows through a validator and ends at an index
//! sink; it is never persisted on its own.
//!
//! Field names are kept structured as a [`FieldKey`] (`base` plus optional culture)
//! and are only flattened into `base_<culture>` strings at the sink boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known field names written by the builders.
pub mod fields {
    pub const ID: &str = "id";
    pub const KEY: &str = "key";
    pub const PARENT_ID: &str = "parentID";
    pub const LEVEL: &str = "level";
    pub const CREATOR_ID: &str = "creatorID";
    pub const CREATOR_NAME: &str = "creatorName";
    pub const WRITER_ID: &str = "writerID";
    pub const WRITER_NAME: &str = "writerName";
    pub const SORT_ORDER: &str = "sortOrder";
    pub const CREATE_DATE: &str = "createDate";
    pub const UPDATE_DATE: &str = "updateDate";
    pub const NODE_NAME: &str = "nodeName";
    pub const URL_NAME: &str = "urlName";
    pub const PATH: &str = "path";
    pub const NODE_TYPE: &str = "nodeType";
    pub const TEMPLATE_ID: &str = "templateID";
    pub const ICON: &str = "icon";
    pub const LOGIN_NAME: &str = "loginName";
    pub const EMAIL: &str = "email";
    pub const MEDIA_FILE: &str = "umbracoFile";

    pub const NODE_ID_SPECIAL: &str = "__NodeId";
    pub const KEY_SPECIAL: &str = "__Key";
    pub const NODE_TYPE_ALIAS_SPECIAL: &str = "__NodeTypeAlias";
    pub const ICON_SPECIAL: &str = "__Icon";
    pub const PATH_SPECIAL: &str = "__Path";
    pub const PUBLISHED: &str = "__Published";
    pub const VARIES_BY_CULTURE: &str = "__VariesByCulture";

    /// Prefix of fields that are stored but never full-text indexed.
    pub const RAW_PREFIX: &str = "__Raw_";

    /// Sentinel used instead of booleans for flag fields.
    pub const YES: &str = "y";
    pub const NO: &str = "n";
}

/// Category tag of a value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexCategory {
    Content,
    Media,
    Member,
    #[serde(untagged)]
    Other(String),
}

impl IndexCategory {
    pub fn as_str(&self) -> &str {
        match self {
            IndexCategory::Content => "content",
            IndexCategory::Media => "media",
            IndexCategory::Member => "member",
            IndexCategory::Other(name) => name,
        }
    }
}

impl fmt::Display for IndexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured field name: a base name and an optional culture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub base: String,
    pub culture: Option<String>,
}

impl FieldKey {
    pub fn invariant(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            culture: None,
        }
    }

    /// Culture codes are stored lower-cased so `en-US` and `en-us` address the same field.
    pub fn cultured(base: impl Into<String>, culture: &str) -> Self {
        Self {
            base: base.into(),
            culture: Some(culture.to_lowercase()),
        }
    }

    pub fn new(base: impl Into<String>, culture: Option<&str>) -> Self {
        match culture {
            Some(c) if !c.is_empty() => Self::cultured(base, c),
            _ => Self::invariant(base),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.base.starts_with(fields::RAW_PREFIX)
    }

    /// Flattened name used by index sinks.
    pub fn index_name(&self) -> String {
        match &self.culture {
            Some(culture) => format!("{}_{}", self.base, culture),
            None => self.base.clone(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.culture {
            Some(culture) => write!(f, "{}_{}", self.base, culture),
            None => f.write_str(&self.base),
        }
    }
}

/// A single primitive field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(DateTime<Utc>),
    /// Stored as an untokenized term.
    Raw(String),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Date(_) => "date",
            FieldValue::Raw(_) => "raw",
        }
    }

    /// String form used for storage and exact-match comparisons.
    pub fn as_index_string(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Raw(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Decimal(d) => d.to_string(),
            FieldValue::Date(d) => d.to_rfc3339(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Raw(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) | FieldValue::Raw(s) if s.trim().is_empty())
    }

    pub fn flag(value: bool) -> Self {
        FieldValue::Raw(if value { fields::YES } else { fields::NO }.to_string())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

pub type FieldValues = BTreeMap<FieldKey, Vec<FieldValue>>;

/// Flat, named-field representation of an entity prepared for indexing.
///
/// `id`, `category` and `item_type` are fixed at construction. The values can only be
/// replaced wholesale through [`ValueSet::with_values`], which is how validators hand
/// back a filtered copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSet {
    id: String,
    category: IndexCategory,
    item_type: String,
    values: FieldValues,
}

impl ValueSet {
    pub fn new(
        id: impl Into<String>,
        category: IndexCategory,
        item_type: impl Into<String>,
        values: FieldValues,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            item_type: item_type.into(),
            values,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &IndexCategory {
        &self.category
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Copy of this value set carrying a different field map.
    pub fn with_values(&self, values: FieldValues) -> Self {
        Self {
            id: self.id.clone(),
            category: self.category.clone(),
            item_type: self.item_type.clone(),
            values,
        }
    }

    pub fn get(&self, key: &FieldKey) -> Option<&[FieldValue]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn get_invariant(&self, base: &str) -> Option<&[FieldValue]> {
        self.get(&FieldKey::invariant(base))
    }

    /// First value of an invariant field rendered as a string.
    pub fn first_value(&self, base: &str) -> Option<String> {
        self.get_invariant(base)
            .and_then(|values| values.first())
            .map(FieldValue::as_index_string)
    }

    pub fn contains_key(&self, key: &FieldKey) -> bool {
        self.values.contains_key(key)
    }
}

/// Accumulates fields for one value set.
///
/// Invariant fields are written with [`ValueSetFields::set`], which refuses to overwrite
/// a key that already holds values. Property-derived fields go through
/// [`ValueSetFields::append`], which keeps every value in arrival order.
#[derive(Debug, Default, Clone)]
pub struct ValueSetFields {
    values: FieldValues,
}

impl ValueSetFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field that must not already be present. Returns `false` when the key was
    /// taken, leaving the existing values untouched.
    pub fn set(&mut self, key: FieldKey, values: Vec<FieldValue>) -> bool {
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, values);
        true
    }

    pub fn set_one(&mut self, key: FieldKey, value: impl Into<FieldValue>) -> bool {
        self.set(key, vec![value.into()])
    }

    pub fn append(&mut self, key: FieldKey, values: impl IntoIterator<Item = FieldValue>) {
        self.values.entry(key).or_default().extend(values);
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.values.keys()
    }

    pub fn into_values(self) -> FieldValues {
        self.values
    }
}
