//! Per-editor index value contributors.
//!
//! Each property editor decides how its stored value turns into index fields. A
//! contributor returns `(field name, culture, values)` triples; the builder flattens
//! them into the value set.

use crate::domain::{Property, PropertyData};
use crate::value_set::{FieldValue, fields};
use std::collections::HashMap;
use std::sync::Arc;

pub const TEXT_BOX: &str = "text";
pub const TEXT_AREA: &str = "textarea";
pub const TAGS: &str = "tags";
pub const RICH_TEXT: &str = "rich_text";
pub const NUMERIC: &str = "numeric";
pub const DATE: &str = "date";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexValue {
    pub field_name: String,
    pub culture: Option<String>,
    pub values: Vec<FieldValue>,
}

impl IndexValue {
    pub fn new(field_name: impl Into<String>, culture: Option<&str>, values: Vec<FieldValue>) -> Self {
        Self {
            field_name: field_name.into(),
            culture: culture.map(str::to_string),
            values,
        }
    }
}

pub trait IndexValueContributor: Send + Sync {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue>;
}

fn data_values(data: &PropertyData) -> Vec<FieldValue> {
    match data {
        PropertyData::Text(s) => vec![FieldValue::Text(s.clone())],
        PropertyData::Integer(i) => vec![FieldValue::Integer(*i)],
        PropertyData::Decimal(d) => vec![FieldValue::Decimal(*d)],
        PropertyData::Date(d) => vec![FieldValue::Date(*d)],
        PropertyData::List(items) => items.iter().map(|s| FieldValue::Text(s.clone())).collect(),
    }
}

/// Writes the stored value as-is under the property alias.
#[derive(Debug, Default)]
pub struct DefaultIndexValues;

impl IndexValueContributor for DefaultIndexValues {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue> {
        match property.get_value(culture, published) {
            Some(data) => vec![IndexValue::new(&property.alias, culture, data_values(data))],
            None => Vec::new(),
        }
    }
}

/// One value per tag. Comma separated text is split.
#[derive(Debug, Default)]
pub struct TagsIndexValues;

impl IndexValueContributor for TagsIndexValues {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue> {
        let tags: Vec<FieldValue> = match property.get_value(culture, published) {
            Some(PropertyData::List(items)) => items
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(FieldValue::from)
                .collect(),
            Some(PropertyData::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(FieldValue::from)
                .collect(),
            Some(other) => data_values(other),
            None => return Vec::new(),
        };
        if tags.is_empty() {
            return Vec::new();
        }
        vec![IndexValue::new(&property.alias, culture, tags)]
    }
}

/// Markup-stripped text under the alias, plus the untouched markup under `__Raw_<alias>`.
#[derive(Debug, Default)]
pub struct RichTextIndexValues;

/// Drops everything between `<` and `>` and collapses whitespace.
pub fn strip_html(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl IndexValueContributor for RichTextIndexValues {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue> {
        let Some(PropertyData::Text(markup)) = property.get_value(culture, published) else {
            return Vec::new();
        };
        vec![
            IndexValue::new(&property.alias, culture, vec![FieldValue::Text(strip_html(markup))]),
            IndexValue::new(
                format!("{}{}", fields::RAW_PREFIX, property.alias),
                culture,
                vec![FieldValue::Raw(markup.clone())],
            ),
        ]
    }
}

/// Numbers stay numeric. Text that parses as a number is converted.
#[derive(Debug, Default)]
pub struct NumericIndexValues;

impl IndexValueContributor for NumericIndexValues {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue> {
        let value = match property.get_value(culture, published) {
            Some(PropertyData::Integer(i)) => FieldValue::Integer(*i),
            Some(PropertyData::Decimal(d)) => FieldValue::Decimal(*d),
            Some(PropertyData::Text(s)) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    FieldValue::Integer(i)
                } else if let Ok(d) = s.parse::<f64>() {
                    FieldValue::Decimal(d)
                } else {
                    return Vec::new();
                }
            }
            _ => return Vec::new(),
        };
        vec![IndexValue::new(&property.alias, culture, vec![value])]
    }
}

/// Dates stay dates. RFC 3339 text is parsed.
#[derive(Debug, Default)]
pub struct DateIndexValues;

impl IndexValueContributor for DateIndexValues {
    fn index_values(&self, property: &Property, culture: Option<&str>, published: bool) -> Vec<IndexValue> {
        let value = match property.get_value(culture, published) {
            Some(PropertyData::Date(d)) => FieldValue::Date(*d),
            Some(PropertyData::Text(s)) => match chrono::DateTime::parse_from_rfc3339(s.trim()) {
                Ok(d) => FieldValue::Date(d.with_timezone(&chrono::Utc)),
                Err(_) => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        vec![IndexValue::new(&property.alias, culture, vec![value])]
    }
}

/// Registry of contributors keyed by property editor alias.
#[derive(Clone, Default)]
pub struct PropertyEditorCollection {
    editors: HashMap<String, Arc<dyn IndexValueContributor>>,
}

impl PropertyEditorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection with the built-in editors registered.
    pub fn with_defaults() -> Self {
        let text: Arc<dyn IndexValueContributor> = Arc::new(DefaultIndexValues);
        Self::new()
            .register(TEXT_BOX, Arc::clone(&text))
            .register(TEXT_AREA, text)
            .register(TAGS, Arc::new(TagsIndexValues))
            .register(RICH_TEXT, Arc::new(RichTextIndexValues))
            .register(NUMERIC, Arc::new(NumericIndexValues))
            .register(DATE, Arc::new(DateIndexValues))
    }

    pub fn register(mut self, editor_alias: &str, editor: Arc<dyn IndexValueContributor>) -> Self {
        self.editors.insert(editor_alias.to_string(), editor);
        self
    }

    pub fn get(&self, editor_alias: &str) -> Option<&Arc<dyn IndexValueContributor>> {
        self.editors.get(editor_alias)
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}

