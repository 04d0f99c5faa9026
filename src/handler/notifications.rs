//! Cache-refresh notifications translated into indexing actions.

use super::IndexingHandler;
use crate::config::{DELETE_BY_TYPE_PAGE_SIZE, REFRESH_PAGE_SIZE};
use crate::domain::services::{ContentQuery, Ordering};
use crate::domain::Content;
use crate::error::IndexResult;
use crate::scope::ScopeContext;
use crate::search::{IndexQuery, SearchOptions};
use crate::value_set::fields;
use bitflags::bitflags;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

bitflags! {
    /// What changed in a content or media tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TreeChangeTypes: u8 {
        const REFRESH_NODE = 1;
        const REFRESH_BRANCH = 1 << 1;
        const REMOVE = 1 << 2;
        const REFRESH_ALL = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContentTypeChangeTypes: u8 {
        const CREATE = 1;
        /// The type's own structure changed; items of the type need re-indexing.
        const REFRESH_MAIN = 1 << 1;
        /// Something the type depends on changed.
        const REFRESH_OTHER = 1 << 2;
        const REMOVE = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChange {
    pub id: i32,
    pub change_types: TreeChangeTypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaChange {
    pub id: i32,
    pub change_types: TreeChangeTypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberChange {
    pub id: i32,
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTypeKind {
    Content,
    Media,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypeChange {
    pub id: i32,
    pub kind: ContentTypeKind,
    pub change_types: ContentTypeChangeTypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageChangeType {
    Update,
    Remove,
    /// The language's culture code changed.
    ChangeCulture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChange {
    pub iso_code: String,
    pub change_type: LanguageChangeType,
}

#[derive(Default)]
struct TypeChanges {
    removed: Vec<i32>,
    refreshed: Vec<i32>,
}

impl IndexingHandler {
    fn accepts_notifications(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        if !self.can_index() {
            debug!("indexers suspended, ignoring notification");
            return false;
        }
        true
    }

    /// Published means the item is published and so is every ancestor.
    async fn published_state(&self, content: &Content) -> IndexResult<bool> {
        if !content.published {
            return Ok(false);
        }
        self.services().content.is_path_published(content).await
    }

    pub async fn handle_content_changes(
        &self,
        scope: Option<&ScopeContext>,
        changes: &[ContentChange],
    ) -> IndexResult<()> {
        if !self.accepts_notifications() {
            return Ok(());
        }

        for change in changes {
            if change.change_types.contains(TreeChangeTypes::REMOVE) {
                self.delete_index_for_entity(scope, change.id, false);
                continue;
            }
            if change.change_types.contains(TreeChangeTypes::REFRESH_ALL) {
                // full refreshes are served by rebuilds
                continue;
            }
            if !change
                .change_types
                .intersects(TreeChangeTypes::REFRESH_NODE | TreeChangeTypes::REFRESH_BRANCH)
            {
                continue;
            }

            let Some(content) = self.services().content.get_by_id(change.id).await? else {
                self.delete_index_for_entity(scope, change.id, false);
                continue;
            };

            let is_published = self.published_state(&content).await?;
            if !is_published {
                self.delete_index_for_entity(scope, change.id, true);
            }
            let parent_id = content.id();
            self.reindex_for_content(scope, content, is_published);

            if change.change_types.contains(TreeChangeTypes::REFRESH_BRANCH) {
                self.refresh_content_branch(scope, parent_id, is_published)
                    .await?;
            }
        }
        Ok(())
    }

    /// Re-indexes every descendant. Below an unpublished node everything counts as
    /// unpublished.
    async fn refresh_content_branch(
        &self,
        scope: Option<&ScopeContext>,
        parent_id: i32,
        parent_published: bool,
    ) -> IndexResult<()> {
        let mut masked: Option<HashSet<i32>> = parent_published.then(HashSet::new);
        let mut page_index = 0;
        let mut total = u64::MAX;

        while page_index * REFRESH_PAGE_SIZE < total {
            let page = self
                .services()
                .content
                .get_paged_descendants(parent_id, page_index, REFRESH_PAGE_SIZE, ContentQuery::by_path())
                .await?;
            total = page.total;
            page_index += 1;
            if page.is_empty() {
                break;
            }

            for descendant in page.items {
                let mut is_published = false;
                if let Some(masked) = masked.as_mut() {
                    if masked.contains(&descendant.entity.parent_id) || !descendant.published {
                        masked.insert(descendant.id());
                    } else {
                        is_published = true;
                    }
                }
                self.reindex_for_content(scope, descendant, is_published);
            }
        }
        Ok(())
    }

    pub async fn handle_media_changes(
        &self,
        scope: Option<&ScopeContext>,
        changes: &[MediaChange],
    ) -> IndexResult<()> {
        if !self.accepts_notifications() {
            return Ok(());
        }

        for change in changes {
            if change.change_types.contains(TreeChangeTypes::REMOVE) {
                self.delete_index_for_entity(scope, change.id, false);
                continue;
            }
            if change.change_types.contains(TreeChangeTypes::REFRESH_ALL) {
                continue;
            }
            if !change
                .change_types
                .intersects(TreeChangeTypes::REFRESH_NODE | TreeChangeTypes::REFRESH_BRANCH)
            {
                continue;
            }

            let Some(media) = self.services().media.get_by_id(change.id).await? else {
                self.delete_index_for_entity(scope, change.id, false);
                continue;
            };

            if media.entity.trashed {
                self.delete_index_for_entity(scope, change.id, true);
            }
            let parent_id = media.id();
            let is_published = !media.entity.trashed;
            self.reindex_for_media(scope, media, is_published);

            if change.change_types.contains(TreeChangeTypes::REFRESH_BRANCH) {
                self.refresh_media_branch(scope, parent_id).await?;
            }
        }
        Ok(())
    }

    async fn refresh_media_branch(&self, scope: Option<&ScopeContext>, parent_id: i32) -> IndexResult<()> {
        let mut page_index = 0;
        let mut total = u64::MAX;
        while page_index * REFRESH_PAGE_SIZE < total {
            let page = self
                .services()
                .media
                .get_paged_descendants(parent_id, page_index, REFRESH_PAGE_SIZE)
                .await?;
            total = page.total;
            page_index += 1;
            if page.is_empty() {
                break;
            }
            for descendant in page.items {
                let is_published = !descendant.entity.trashed;
                self.reindex_for_media(scope, descendant, is_published);
            }
        }
        Ok(())
    }

    pub async fn handle_member_changes(
        &self,
        scope: Option<&ScopeContext>,
        changes: &[MemberChange],
    ) -> IndexResult<()> {
        if !self.accepts_notifications() {
            return Ok(());
        }

        for change in changes {
            if change.removed {
                self.delete_index_for_entity(scope, change.id, false);
                continue;
            }
            match self.services().members.get_by_id(change.id).await? {
                Some(member) => self.reindex_for_member(scope, member),
                None => self.delete_index_for_entity(scope, change.id, false),
            }
        }
        Ok(())
    }

    pub async fn handle_content_type_changes(
        &self,
        scope: Option<&ScopeContext>,
        changes: &[ContentTypeChange],
    ) -> IndexResult<()> {
        if !self.accepts_notifications() {
            return Ok(());
        }

        let mut by_kind: HashMap<ContentTypeKind, TypeChanges> = HashMap::new();
        for change in changes {
            let entry = by_kind.entry(change.kind).or_default();
            if change.change_types.contains(ContentTypeChangeTypes::REMOVE) {
                entry.removed.push(change.id);
            } else if change
                .change_types
                .intersects(ContentTypeChangeTypes::REFRESH_MAIN | ContentTypeChangeTypes::REFRESH_OTHER)
            {
                entry.refreshed.push(change.id);
            }
        }

        for (kind, type_changes) in &by_kind {
            if !type_changes.refreshed.is_empty() {
                match kind {
                    ContentTypeKind::Content => {
                        self.refresh_content_of_content_types(scope, &type_changes.refreshed)
                            .await?
                    }
                    ContentTypeKind::Media => {
                        self.refresh_media_of_media_types(scope, &type_changes.refreshed)
                            .await?
                    }
                    ContentTypeKind::Member => {
                        self.refresh_member_of_member_types(scope, &type_changes.refreshed)
                            .await?
                    }
                }
            }
            for type_id in &type_changes.removed {
                self.delete_documents_of_type(scope, *type_id).await?;
            }
        }
        Ok(())
    }

    async fn refresh_content_of_content_types(
        &self,
        scope: Option<&ScopeContext>,
        content_type_ids: &[i32],
    ) -> IndexResult<()> {
        let mut page_index = 0;
        let mut total = u64::MAX;
        while page_index * REFRESH_PAGE_SIZE < total {
            let page = self
                .services()
                .content
                .get_paged_of_types(content_type_ids, page_index, REFRESH_PAGE_SIZE, Ordering::PathAscending)
                .await?;
            total = page.total;
            page_index += 1;
            if page.is_empty() {
                break;
            }

            // path-published answers, keyed by the item they were computed for
            let mut publish_checked: HashMap<i32, bool> = HashMap::new();
            for content in page.items {
                let mut is_published = false;
                if content.published {
                    is_published = match publish_checked.get(&content.entity.parent_id) {
                        Some(parent_published) => *parent_published,
                        None => {
                            let published = self.services().content.is_path_published(&content).await?;
                            publish_checked.insert(content.id(), published);
                            published
                        }
                    };
                }
                self.reindex_for_content(scope, content, is_published);
            }
        }
        Ok(())
    }

    async fn refresh_media_of_media_types(
        &self,
        scope: Option<&ScopeContext>,
        media_type_ids: &[i32],
    ) -> IndexResult<()> {
        let mut page_index = 0;
        let mut total = u64::MAX;
        while page_index * REFRESH_PAGE_SIZE < total {
            let page = self
                .services()
                .media
                .get_paged_of_types(media_type_ids, page_index, REFRESH_PAGE_SIZE)
                .await?;
            total = page.total;
            page_index += 1;
            if page.is_empty() {
                break;
            }
            for media in page.items {
                let is_published = !media.entity.trashed;
                self.reindex_for_media(scope, media, is_published);
            }
        }
        Ok(())
    }

    async fn refresh_member_of_member_types(
        &self,
        scope: Option<&ScopeContext>,
        member_type_ids: &[i32],
    ) -> IndexResult<()> {
        let aliases = self
            .services()
            .members
            .member_type_aliases(member_type_ids)
            .await?;
        for alias in &aliases {
            let mut page_index = 0;
            let mut total = u64::MAX;
            while page_index * REFRESH_PAGE_SIZE < total {
                let page = self
                    .services()
                    .members
                    .get_all(page_index, REFRESH_PAGE_SIZE, Some(alias.as_str()))
                    .await?;
                total = page.total;
                page_index += 1;
                if page.is_empty() {
                    break;
                }
                for member in page.items {
                    self.reindex_for_member(scope, member);
                }
            }
        }
        Ok(())
    }

    /// Finds every indexed document of a removed type and deletes each one.
    pub async fn delete_documents_of_type(
        &self,
        scope: Option<&ScopeContext>,
        type_id: i32,
    ) -> IndexResult<()> {
        let query = IndexQuery::field(fields::NODE_TYPE, type_id.to_string());
        let mut ids: BTreeSet<i32> = BTreeSet::new();

        for index in self.registry().indexes() {
            let mut page_index = 0;
            let mut total = u64::MAX;
            while page_index * DELETE_BY_TYPE_PAGE_SIZE < total {
                let options = SearchOptions::new(page_index * DELETE_BY_TYPE_PAGE_SIZE, DELETE_BY_TYPE_PAGE_SIZE);
                let results = index.search(&query, &options).await?;
                total = results.total_item_count;
                page_index += 1;
                if results.is_empty() {
                    break;
                }
                ids.extend(results.ids().filter_map(|id| id.parse::<i32>().ok()));
            }
        }

        debug!(type_id, count = ids.len(), "deleting documents of removed type");
        for id in ids {
            self.delete_index_for_entity(scope, id, false);
        }
        Ok(())
    }

    /// Removed languages and culture code changes invalidate every culture-suffixed
    /// field, so all indexes are rebuilt.
    pub async fn handle_language_changes(&self, changes: &[LanguageChange]) -> IndexResult<()> {
        if !self.enabled() {
            return Ok(());
        }
        let needs_rebuild = changes.iter().any(|c| {
            matches!(
                c.change_type,
                LanguageChangeType::Remove | LanguageChangeType::ChangeCulture
            )
        });
        if needs_rebuild {
            info!("language removed or culture changed, rebuilding all indexes");
            self.rebuilder()
                .rebuild_indexes(false, Duration::ZERO, true)
                .await?;
        }
        Ok(())
    }

    /// Boot-time wiring of indexing.
    ///
    /// Outside the main process indexing is suspended. When no index takes
    /// default-handler writes the handlers are switched off. Otherwise, once the
    /// runtime is fully up, empty indexes are rebuilt in the background after the
    /// configured delay.
    pub async fn handle_application_starting(&self) -> IndexResult<()> {
        if !self.inner.main_dom.is_main_dom() {
            info!("not the main process, indexing suspended");
            self.suspend_indexers();
            return Ok(());
        }

        if !self
            .registry()
            .indexes()
            .iter()
            .any(|i| i.enable_default_event_handler())
        {
            info!("no index has the default event handler enabled, indexing handlers deactivated");
            self.set_enabled(false);
            return Ok(());
        }

        if self.rebuilder().can_run() {
            let delay = self.startup_delay();
            info!(delay_ms = delay.as_millis() as u64, "scheduling rebuild of empty indexes");
            self.rebuilder().rebuild_indexes(true, delay, true).await?;
        }
        Ok(())
    }
}
