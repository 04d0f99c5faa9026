//! # cms_index
//!
//! Search indexing and synchronization engine for a content management system.
//! It turns content, media and member entities into flat value sets, validates them
//! per index and keeps every registered index in step with the content store, both by
//! full rebuilds and by incremental updates tied to units of work.
//!
//! ## Features
//!
//! - **Value sets**: Structured field keys with optional culture, multi-valued fields
//! - **Validation**: Category, type and field rules plus publish, path, recycle-bin and protection checks
//! - **Population**: Paged sweeps of the content store with a streaming published-ancestor filter
//! - **Rebuilds**: Single-writer gated, non-reentrant, foreground or background
//! - **Incremental sync**: Indexing actions deferred until the unit of work commits
//! - **SQLite sink**: One database per index with FTS5 full-text search
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cms_index::config::IndexingSettings;
//! use cms_index::diagnostics::IndexRebuildStatusManager;
//! use cms_index::domain::services::ServiceContext;
//! use cms_index::populate::default_populators;
//! use cms_index::rebuild::IndexRebuilder;
//! use cms_index::runtime::{MainDomFlag, RuntimeLevel, RuntimeLevelState};
//! use cms_index::scope::DefaultScopeProvider;
//! use cms_index::search::IndexRegistry;
//! use cms_index::tasks::TokioTaskQueue;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run(services: ServiceContext) -> cms_index::IndexResult<()> {
//! let settings = IndexingSettings::default();
//! let registry = IndexRegistry::from_settings(
//!     &settings,
//!     services.public_access.clone(),
//!     Arc::new(DefaultScopeProvider),
//! )
//! .await?;
//!
//! let editors = Arc::new(cms_index::builder::property_editors::PropertyEditorCollection::with_defaults());
//! let handlers = Arc::new(cms_index::builder::delivery::ContentIndexHandlerCollection::with_defaults());
//! let populators = default_populators(&settings, &services, editors, handlers);
//!
//! let rebuilder = IndexRebuilder::new(
//!     registry,
//!     populators,
//!     Arc::new(MainDomFlag::new(true)),
//!     Arc::new(RuntimeLevelState::new(RuntimeLevel::Run)),
//!     Arc::new(TokioTaskQueue::new()),
//!     Arc::new(IndexRebuildStatusManager::new()),
//! );
//!
//! // Rebuild everything in the foreground
//! rebuilder.rebuild_indexes(false, Duration::ZERO, false).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **[`value_set`]**: The unit of indexable data
//! - **[`domain`]**: Entities and the collaborator services that supply them
//! - **[`builder`]**: Entity to value-set projection, property editors, delivery API handlers
//! - **[`validation`]**: Per-index acceptance rules
//! - **[`search`]**: Index sink trait, SQLite implementation and registry
//! - **[`populate`]**: Full paged sweeps
//! - **[`rebuild`]**: Gated, non-reentrant rebuilds
//! - **[`handler`]**: Incremental sync and notification handling
//! - **[`deferred`]** and **[`scope`]**: Work held back until a unit of work commits
//! - **[`tasks`]**: Background work queue
//! - **[`diagnostics`]**: Health checks, metadata and rebuild progress
//! - **[`config`]**: Settings loaded from JSON
//! - **[`error`]**: Unified error handling
//!
//! ## Incremental Sync
//!
//! ```rust,no_run
//! use cms_index::handler::IndexingHandler;
//! use cms_index::scope::{DefaultScopeProvider, ScopeProvider};
//! # use cms_index::domain::Content;
//!
//! # fn save(handler: &IndexingHandler, content: Content) {
//! let mut scope = DefaultScopeProvider.create_scope(false);
//! handler.reindex_for_content(Some(scope.context()), content, true);
//! scope.complete();
//! // Indexing is queued when the scope drops, and only because it completed
//! drop(scope);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`IndexResult<T>`] wrapping [`IndexError`]. Validation
//! outcomes are not errors: they travel as [`validation::ValidationResult`] values.
//! Gating refusals (not the main process, rebuild already running) are logged no-ops.

pub mod builder;
pub mod config;
pub mod deferred;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod handler;
pub mod populate;
pub mod rebuild;
pub mod runtime;
pub mod scope;
pub mod search;
pub mod tasks;
pub mod validation;
pub mod value_set;

/// Re-exports the most commonly used types for convenience.
pub use error::{IndexError, IndexResult};
