use super::{IndexPopulator, RegisteredIndexes, index_batch, total_batches};
use crate::builder::ValueSetBuilder;
use crate::config::MEMBER_PAGE_SIZE;
use crate::diagnostics::PopulatorProgress;
use crate::domain::Member;
use crate::domain::services::MemberService;
use crate::error::IndexResult;
use crate::search::SearchIndex;
use async_trait::async_trait;
use std::sync::Arc;

/// Fills member indexes, optionally one member type at a time.
pub struct MemberIndexPopulator {
    members: Arc<dyn MemberService>,
    builder: Arc<dyn ValueSetBuilder<Member>>,
    registered: RegisteredIndexes,
    member_types: Vec<String>,
    page_size: u64,
}

impl MemberIndexPopulator {
    pub fn new(
        members: Arc<dyn MemberService>,
        builder: Arc<dyn ValueSetBuilder<Member>>,
        registered: RegisteredIndexes,
    ) -> Self {
        Self {
            members,
            builder,
            registered,
            member_types: Vec::new(),
            page_size: MEMBER_PAGE_SIZE,
        }
    }

    /// Only index members of these type aliases.
    pub fn with_member_types(mut self, member_types: Vec<String>) -> Self {
        self.member_types = member_types;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn index_members(
        &self,
        member_type: Option<&str>,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        let mut page_index = 0;
        loop {
            let page = self
                .members
                .get_all(page_index, self.page_size, member_type)
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

#[async_trait]
impl IndexPopulator for MemberIndexPopulator {
    fn name(&self) -> &str {
        "MemberIndexPopulator"
    }

    fn registered_indexes(&self) -> &RegisteredIndexes {
        &self.registered
    }

    async fn populate_indexes(
        &self,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()> {
        if self.member_types.is_empty() {
            return self.index_members(None, indexes, progress).await;
        }
        for member_type in &self.member_types {
            self.index_members(Some(member_type.as_str()), indexes, progress).await?;
        }
        Ok(())
    }
}
