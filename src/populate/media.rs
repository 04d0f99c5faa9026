use super::{IndexPopulator, RegisteredIndexes, index_batch, total_batches};
use crate::builder::ValueSetBuilder;
use crate::config::MEDIA_PAGE_SIZE;
use crate::diagnostics::PopulatorProgress;
use crate::domain::services::MediaService;
use crate::domain::{Media, ROOT_ID};
use crate::error::IndexResult;
use crate::search::SearchIndex;
use async_trait::async_trait;
use std::sync::Arc;

pub struct MediaIndexPopulator {
    media: Arc<dyn MediaService>,
    builder: Arc<dyn ValueSetBuilder<Media>>,
    registered: RegisteredIndexes,
    parent_id: Option<i32>,
    page_size: u64,
}

impl MediaIndexPopulator {
    pub fn new(
        media: Arc<dyn MediaService>,
        builder: Arc<dyn ValueSetBuilder<Media>>,
        registered: RegisteredIndexes,
    ) -> Self {
        Self {
            media,
            builder,
            registered,
            parent_id: None,
            page_size: MEDIA_PAGE_SIZE,
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
}

#[async_trait]
impl IndexPopulator for MediaIndexPopulator {
    fn name(&self) -> &str {
        "MediaIndexPopulator"
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
        let mut page_index = 0;
        loop {
            let page = self
                .media
                .get_paged_descendants(parent_id, page_index, self.page_size)
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
}
