use super::{IndexPopulator, RegisteredIndexes, index_batch, total_batches};
use crate::builder::ValueSetBuilder;
use crate::config::CONTENT_PAGE_SIZE;
use crate::diagnostics::PopulatorProgress;
use crate::domain::services::{ContentQuery, ContentService};
use crate::domain::{Content, ROOT_ID};
use crate::error::IndexResult;
use crate::search::SearchIndex;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Fills the delivery API index with reachable published content.
///
/// Items of a disallowed content type are left out, but they still count as
/// reachable ancestors so their children can be indexed.
pub struct DeliveryApiContentIndexPopulator {
    content: Arc<dyn ContentService>,
    builder: Arc<dyn ValueSetBuilder<Content>>,
    registered: RegisteredIndexes,
    disallowed_content_types: Vec<String>,
    page_size: u64,
}

impl DeliveryApiContentIndexPopulator {
    pub fn new(
        content: Arc<dyn ContentService>,
        builder: Arc<dyn ValueSetBuilder<Content>>,
        registered: RegisteredIndexes,
    ) -> Self {
        Self {
            content,
            builder,
            registered,
            disallowed_content_types: Vec::new(),
            page_size: CONTENT_PAGE_SIZE,
        }
    }

    pub fn with_disallowed_content_types(mut self, aliases: Vec<String>) -> Self {
        self.disallowed_content_types = aliases;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn is_disallowed_content_type(&self, alias: &str) -> bool {
        self.disallowed_content_types
            .iter()
            .any(|a| a.eq_ignore_ascii_case(alias))
    }

    /// Path-ordered page in, indexable items out. `reachable` carries the ids of
    /// published ancestors (disallowed ones included) across pages.
    pub fn filter_allowed(&self, items: Vec<Content>, reachable: &mut HashSet<i32>) -> Vec<Content> {
        let mut allowed = Vec::new();
        for item in items {
            let entity = &item.entity;
            if entity.level != 1 && !reachable.contains(&entity.parent_id) {
                continue;
            }
            reachable.insert(entity.id);
            if !self.is_disallowed_content_type(&item.content_type.alias) {
                allowed.push(item);
            }
        }
        allowed
    }
}

#[async_trait]
impl IndexPopulator for DeliveryApiContentIndexPopulator {
    fn name(&self) -> &str {
        "DeliveryApiContentIndexPopulator"
    }

    fn registered_indexes(&self) -> &RegisteredIndexes {
        &self.registered
    }

    async fn populate_indexes(
        &self,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        let mut reachable: HashSet<i32> = HashSet::new();
        let mut page_index = 0;
        loop {
            let page = self
                .content
                .get_paged_descendants(
                    ROOT_ID,
                    page_index,
                    self.page_size,
                    ContentQuery::published_by_path(),
                )
                .await?;
            let fetched = page.len() as u64;
            progress.batch(page_index + 1, total_batches(page.total, self.page_size));

            if fetched > 0 {
                let allowed = self.filter_allowed(page.items, &mut reachable);
                let value_sets = self.builder.get_value_sets(&allowed).await?;
                index_batch(indexes, value_sets).await?;
            }

            page_index += 1;
            if fetched < self.page_size {
                break;
            }
        }
        Ok(())
    }
}
