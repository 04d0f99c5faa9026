//! Read-side model of the content store.
//!
//! These types are what the content, media and member services hand to the indexing
//! engine. They carry only what indexing needs: tree position, publish state, culture
//! variants and raw property data.

pub mod services;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Id of the virtual root every path starts with.
pub const ROOT_ID: i32 = -1;
/// Id of the content recycle bin.
pub const RECYCLE_BIN_CONTENT: i32 = -20;
/// Id of the media recycle bin.
pub const RECYCLE_BIN_MEDIA: i32 = -21;

/// The document, media or member type an item was created from.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeRef {
    pub id: i32,
    pub alias: String,
    pub icon: String,
    pub varies_by_culture: bool,
}

impl ContentTypeRef {
    pub fn new(id: i32, alias: impl Into<String>) -> Self {
        Self {
            id,
            alias: alias.into(),
            icon: String::new(),
            varies_by_culture: false,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn variant(mut self) -> Self {
        self.varies_by_culture = true;
        self
    }
}

/// Per-culture state of a culture-variant item.
#[derive(Debug, Clone, PartialEq)]
pub struct CultureInfo {
    pub culture: String,
    pub name: String,
    pub publish_name: Option<String>,
    pub url_segment: String,
    pub published: bool,
    pub update_date: DateTime<Utc>,
}

/// Raw value stored on a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyData {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(DateTime<Utc>),
    List(Vec<String>),
}

/// One stored value of a property, optionally bound to a culture.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub culture: Option<String>,
    pub edited: Option<PropertyData>,
    pub published: Option<PropertyData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub alias: String,
    pub editor_alias: String,
    pub varies_by_culture: bool,
    pub values: Vec<PropertyValue>,
}

impl Property {
    /// An invariant property whose edited and published values are the same.
    pub fn invariant(
        alias: impl Into<String>,
        editor_alias: impl Into<String>,
        data: PropertyData,
    ) -> Self {
        Self {
            alias: alias.into(),
            editor_alias: editor_alias.into(),
            varies_by_culture: false,
            values: vec![PropertyValue {
                culture: None,
                edited: Some(data.clone()),
                published: Some(data),
            }],
        }
    }

    /// Looks up the value for a culture (`None` for invariant), edited or published.
    pub fn get_value(&self, culture: Option<&str>, published: bool) -> Option<&PropertyData> {
        self.values
            .iter()
            .find(|v| match (&v.culture, culture) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            })
            .and_then(|v| {
                if published {
                    v.published.as_ref()
                } else {
                    v.edited.as_ref()
                }
            })
    }
}

/// Fields shared by every tree-structured entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntity {
    pub id: i32,
    pub key: Uuid,
    pub parent_id: i32,
    pub level: i32,
    /// Comma separated ancestor ids, starting at the root and ending with `id`.
    pub path: String,
    pub sort_order: i32,
    pub name: String,
    pub creator_id: i32,
    pub writer_id: i32,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub trashed: bool,
}

impl TreeEntity {
    /// Ancestor ids as parsed from `path`, root first, excluding the item itself.
    pub fn ancestor_ids(&self) -> Vec<i32> {
        self.path
            .split(',')
            .filter_map(|s| s.trim().parse::<i32>().ok())
            .filter(|id| *id != self.id && *id != ROOT_ID)
            .collect()
    }
}

/// A document in the content tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub entity: TreeEntity,
    pub content_type: ContentTypeRef,
    pub published: bool,
    pub publish_name: Option<String>,
    pub url_segment: String,
    pub template_id: Option<i32>,
    /// Available cultures keyed by lower-cased culture code. Empty for invariant content.
    pub cultures: BTreeMap<String, CultureInfo>,
    pub properties: Vec<Property>,
}

impl Content {
    pub fn id(&self) -> i32 {
        self.entity.id
    }

    pub fn varies_by_culture(&self) -> bool {
        self.content_type.varies_by_culture
    }

    pub fn available_cultures(&self) -> impl Iterator<Item = &CultureInfo> + Clone {
        self.cultures.values()
    }

    pub fn is_culture_published(&self, culture: &str) -> bool {
        self.cultures
            .get(&culture.to_lowercase())
            .map(|c| c.published)
            .unwrap_or(false)
    }

    pub fn published_cultures(&self) -> impl Iterator<Item = &CultureInfo> + Clone {
        self.cultures.values().filter(|c| c.published)
    }
}

/// An item in the media tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub entity: TreeEntity,
    pub media_type: ContentTypeRef,
    pub url_segment: String,
    /// Source url of the attached file, when there is one.
    pub file_url: Option<String>,
    pub properties: Vec<Property>,
}

impl Media {
    pub fn id(&self) -> i32 {
        self.entity.id
    }
}

/// A site member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub entity: TreeEntity,
    pub member_type: ContentTypeRef,
    pub login_name: String,
    pub email: String,
    pub properties: Vec<Property>,
}

impl Member {
    pub fn id(&self) -> i32 {
        self.entity.id
    }
}

/// Back-office user resolved for creator/writer names.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
}
