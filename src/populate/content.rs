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
use tracing::debug;

/// Fills content indexes, either with every item or with published items only.
pub struct ContentIndexPopulator {
    name: &'static str,
    content: Arc<dyn ContentService>,
    builder: Arc<dyn ValueSetBuilder<Content>>,
    registered: RegisteredIndexes,
    published_values_only: bool,
    parent_id: Option<i32>,
    page_size: u64,
}

impl ContentIndexPopulator {
    pub fn new(
        content: Arc<dyn ContentService>,
        builder: Arc<dyn ValueSetBuilder<Content>>,
        registered: RegisteredIndexes,
    ) -> Self {
        Self {
            name: "ContentIndexPopulator",
            content,
            builder,
            registered,
            published_values_only: false,
            parent_id: None,
            page_size: CONTENT_PAGE_SIZE,
        }
    }

    /// Populator that only indexes items whose whole ancestor chain is published.
    pub fn published(
        content: Arc<dyn ContentService>,
        builder: Arc<dyn ValueSetBuilder<Content>>,
        registered: RegisteredIndexes,
    ) -> Self {
        Self {
            name: "PublishedContentIndexPopulator",
            published_values_only: true,
            ..Self::new(content, builder, registered)
        }
    }

    pub fn with_parent_id(mut self, parent_id: Option<i32>) -> Self {
        self.parent_id = parent_id.filter(|id| *id > 0);
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn published_values_only(&self) -> bool {
        self.published_values_only
    }

    async fn index_all_content(
        &self,
        parent_id: i32,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        let mut page_index = 0;
        loop {
            let page = self
                .content
                .get_paged_descendants(parent_id, page_index, self.page_size, ContentQuery::default())
                .await?;
            let fetched = page.len() as u64;
            progress.batch(page_index + 1, total_batches(page.total, self.page_size));

            if fetched > 0 {
                let value_sets = self.builder.get_value_sets(&page.items).await?;
                index_batch(indexes, value_sets).await?;
            }

            page_index += 1;
            if fetched < self.page_size {
                break;
            }
        }
        Ok(())
    }

    async fn index_published_content(
        &self,
        parent_id: i32,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        let mut published_pages: HashSet<i32> = HashSet::new();
        if parent_id != ROOT_ID {
            published_pages.insert(parent_id);
        }

        let mut page_index = 0;
        loop {
            let page = self
                .content
                .get_paged_descendants(
                    parent_id,
                    page_index,
                    self.page_size,
                    ContentQuery::published_by_path(),
                )
                .await?;
            let fetched = page.len() as u64;
            progress.batch(page_index + 1, total_batches(page.total, self.page_size));

            if fetched > 0 {
                let indexable = filter_published_chain(page.items, &mut published_pages);
                debug!(
                    populator = self.name,
                    page = page_index,
                    fetched,
                    indexable = indexable.len(),
                    "published content page"
                );
                let value_sets = self.builder.get_value_sets(&indexable).await?;
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

/// Keeps items whose parent has already been accepted. Level-1 items are always
/// accepted. Pages must arrive in path order.
pub fn filter_published_chain(items: Vec<Content>, published: &mut HashSet<i32>) -> Vec<Content> {
    items
        .into_iter()
        .filter(|item| {
            let entity = &item.entity;
            if entity.level == 1 || published.contains(&entity.parent_id) {
                published.insert(entity.id);
                true
            } else {
                false
            }
        })
        .collect()
}

#[async_trait]
impl IndexPopulator for ContentIndexPopulator {
    fn name(&self) -> &str {
        self.name
    }

    fn registered_indexes(&self) -> &RegisteredIndexes {
        &self.registered
    }

    async fn populate_indexes(
        &self,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        let parent_id = self.parent_id.unwrap_or(ROOT_ID);
        if self.published_values_only {
            self.index_published_content(parent_id, indexes, progress).await
        } else {
            self.index_all_content(parent_id, indexes, progress).await
        }
    }
}
