//! Collaborator interfaces consumed by the indexing engine.
//!
//! The content store, member store and user directory live outside this crate; the
//! engine only sees them through these traits.

use super::{Content, Media, Member, UserProfile};
use crate::error::IndexResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One page of a paged query plus the total number of matching rows.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    /// Whatever order the store finds cheapest.
    #[default]
    Unspecified,
    /// Shallowest first; parents always precede their children.
    PathAscending,
}

/// Filter pushed down to the content query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentQuery {
    pub published_only: bool,
    pub ordering: Ordering,
}

impl ContentQuery {
    pub fn published_by_path() -> Self {
        Self {
            published_only: true,
            ordering: Ordering::PathAscending,
        }
    }

    pub fn by_path() -> Self {
        Self {
            published_only: false,
            ordering: Ordering::PathAscending,
        }
    }
}

#[async_trait]
pub trait ContentService: Send + Sync {
    async fn get_paged_descendants(
        &self,
        parent_id: i32,
        page_index: u64,
        page_size: u64,
        query: ContentQuery,
    ) -> IndexResult<Page<Content>>;

    async fn get_root_content(&self) -> IndexResult<Vec<Content>>;

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Content>>;

    /// Whether the item and every ancestor up to the root is published.
    async fn is_path_published(&self, content: &Content) -> IndexResult<bool>;

    async fn get_paged_of_types(
        &self,
        content_type_ids: &[i32],
        page_index: u64,
        page_size: u64,
        ordering: Ordering,
    ) -> IndexResult<Page<Content>>;
}

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn get_paged_descendants(
        &self,
        parent_id: i32,
        page_index: u64,
        page_size: u64,
    ) -> IndexResult<Page<Media>>;

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Media>>;

    async fn get_paged_of_types(
        &self,
        media_type_ids: &[i32],
        page_index: u64,
        page_size: u64,
    ) -> IndexResult<Page<Media>>;
}

#[async_trait]
pub trait MemberService: Send + Sync {
    /// Members ordered by login name, optionally restricted to one member type alias.
    async fn get_all(
        &self,
        page_index: u64,
        page_size: u64,
        member_type_alias: Option<&str>,
    ) -> IndexResult<Page<Member>>;

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Member>>;

    async fn member_type_aliases(&self, member_type_ids: &[i32]) -> IndexResult<Vec<String>>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    /// Bulk lookup used once per batch; unknown ids are simply absent from the map.
    async fn get_profiles_by_id(&self, ids: &[i32]) -> IndexResult<HashMap<i32, UserProfile>>;
}

/// Public-access (member protection) rules. Rules are held in memory by the host.
pub trait PublicAccessService: Send + Sync {
    fn is_protected(&self, path: &str) -> bool;
}

/// Every service the engine talks to, bundled for wiring.
#[derive(Clone)]
pub struct ServiceContext {
    pub content: Arc<dyn ContentService>,
    pub media: Arc<dyn MediaService>,
    pub members: Arc<dyn MemberService>,
    pub users: Arc<dyn UserService>,
    pub public_access: Arc<dyn PublicAccessService>,
}
