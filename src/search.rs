//! Index sinks and the searcher surface the engine needs from them.
//!
//! A sink receives value sets, runs them through its [`Validator`] and stores what
//! survives. The engine never talks to a storage engine directly; populators, the
//! rebuilder and the indexing handler only see [`SearchIndex`].
//!
//! # Validation at the sink
//!
//! - [`ValidationStatus::Valid`](crate::validation::ValidationStatus::Valid): the
//!   (possibly field-filtered) value set replaces any existing document with that id.
//! - [`ValidationStatus::Filtered`](crate::validation::ValidationStatus::Filtered): any
//!   existing document with that id is removed.
//! - [`ValidationStatus::Failed`](crate::validation::ValidationStatus::Failed): the
//!   value set is dropped and the index is left untouched.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cms_index::search::{IndexOptions, IndexQuery, SearchIndex, SearchOptions, SqliteIndex};
//! use cms_index::validation::ValueSetValidator;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> cms_index::IndexResult<()> {
//! let index = SqliteIndex::open(
//!     Path::new("/var/lib/cms/indexes"),
//!     IndexOptions::new("InternalIndex"),
//!     Arc::new(ValueSetValidator::new(None)),
//! )
//! .await?;
//!
//! let hits = index
//!     .search(&IndexQuery::field("nodeType", "1051"), &SearchOptions::new(0, 500))
//!     .await?;
//! println!("{} documents of type 1051", hits.total_item_count);
//! # Ok(())
//! # }
//! ```

pub mod index;
pub mod query;
pub mod registry;

use crate::error::IndexResult;
use crate::validation::Validator;
use crate::value_set::ValueSet;
use async_trait::async_trait;

pub use index::{IndexOptions, SqliteIndex};
pub use query::{IndexQuery, SearchOptions, SearchResult, SearchResults};
pub use registry::IndexRegistry;

/// What one `index_items` call did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOperationSummary {
    pub indexed: u64,
    pub removed: u64,
    pub rejected: u64,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    fn name(&self) -> &str;

    fn published_values_only(&self) -> bool;

    fn enable_default_event_handler(&self) -> bool;

    fn validator(&self) -> &dyn Validator;

    /// Whether the index has been created and not wiped since.
    async fn index_exists(&self) -> IndexResult<bool>;

    /// Wipes every document and marks the index as created.
    async fn create_index(&self) -> IndexResult<()>;

    async fn index_items(&self, items: Vec<ValueSet>) -> IndexResult<IndexOperationSummary>;

    /// Removes the document with `id` along with every document below it in the tree.
    /// Returns the number of documents removed.
    async fn delete_from_index(&self, id: &str) -> IndexResult<u64>;

    async fn search(&self, query: &IndexQuery, options: &SearchOptions) -> IndexResult<SearchResults>;

    async fn document_count(&self) -> IndexResult<u64>;

    /// Distinct flattened field names present in the index.
    async fn field_names(&self) -> IndexResult<Vec<String>>;
}
