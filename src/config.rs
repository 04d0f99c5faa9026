//! Index and engine configuration.
//!
//! Settings are plain serde structs loaded from JSON. Missing keys fall back to the
//! defaults, which describe the four standard indexes.

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const INTERNAL_INDEX_NAME: &str = "InternalIndex";
pub const EXTERNAL_INDEX_NAME: &str = "ExternalIndex";
pub const MEMBERS_INDEX_NAME: &str = "MembersIndex";
pub const DELIVERY_API_CONTENT_INDEX_NAME: &str = "DeliveryApiContentIndex";

pub const CONTENT_PAGE_SIZE: u64 = 10_000;
pub const MEDIA_PAGE_SIZE: u64 = 10_000;
pub const MEMBER_PAGE_SIZE: u64 = 1_000;
/// Page size for branch and content-type refreshes driven by notifications.
pub const REFRESH_PAGE_SIZE: u64 = 500;
/// Page size of the search used to delete every document of a removed type.
pub const DELETE_BY_TYPE_PAGE_SIZE: u64 = 500;

/// Which populators and validator an index gets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Content and media.
    Content,
    Members,
    DeliveryApi,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexDefinition {
    pub name: String,
    pub kind: IndexKind,
    pub published_values_only: bool,
    /// Whether the incremental indexing handler writes to this index.
    pub enable_default_event_handler: bool,
    /// Restrict content to descendants of this node.
    pub parent_id: Option<i32>,
    pub support_protected_content: bool,
    pub include_item_types: Vec<String>,
    /// For delivery API indexes these types are left out but their children are kept.
    pub exclude_item_types: Vec<String>,
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
}

impl Default for IndexDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: IndexKind::Content,
            published_values_only: false,
            enable_default_event_handler: true,
            parent_id: None,
            support_protected_content: true,
            include_item_types: Vec::new(),
            exclude_item_types: Vec::new(),
            include_fields: Vec::new(),
            exclude_fields: Vec::new(),
        }
    }
}

impl IndexDefinition {
    /// All content and media, including unpublished and protected items.
    pub fn internal() -> Self {
        Self {
            name: INTERNAL_INDEX_NAME.to_string(),
            ..Default::default()
        }
    }

    /// Published content and media, protected content left out.
    pub fn external() -> Self {
        Self {
            name: EXTERNAL_INDEX_NAME.to_string(),
            published_values_only: true,
            support_protected_content: false,
            ..Default::default()
        }
    }

    pub fn members() -> Self {
        Self {
            name: MEMBERS_INDEX_NAME.to_string(),
            kind: IndexKind::Members,
            ..Default::default()
        }
    }

    /// Published content keyed by GUID. Kept in sync by its own handler, so the default
    /// event handler is off.
    pub fn delivery_api() -> Self {
        Self {
            name: DELIVERY_API_CONTENT_INDEX_NAME.to_string(),
            kind: IndexKind::DeliveryApi,
            published_values_only: true,
            enable_default_event_handler: false,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Directory holding one database per index.
    pub index_root: PathBuf,
    /// How long the startup rebuild waits for the application to settle.
    pub rebuild_on_startup_delay_ms: u64,
    pub indexes: Vec<IndexDefinition>,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            index_root: default_index_root(),
            rebuild_on_startup_delay_ms: 60_000,
            indexes: vec![
                IndexDefinition::internal(),
                IndexDefinition::external(),
                IndexDefinition::members(),
                IndexDefinition::delivery_api(),
            ],
        }
    }
}

/// `<local data dir>/cms-index/indexes`, or the temp dir when there is no data dir.
pub fn default_index_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cms-index")
        .join("indexes")
}

impl IndexingSettings {
    pub fn from_json_str(json: &str) -> IndexResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> IndexResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.rebuild_on_startup_delay_ms)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> IndexResult<()> {
        let mut seen = HashSet::new();
        for definition in &self.indexes {
            let name = definition.name.trim();
            if name.is_empty() {
                return Err(IndexError::Config("index name is empty".into()));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(IndexError::Config(format!("duplicate index name: {name}")));
            }
        }
        Ok(())
    }
}
