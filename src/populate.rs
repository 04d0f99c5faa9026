//! Full, paged data sweeps that fill indexes from scratch.
//!
//! A populator is registered against index names. The rebuilder hands every populator
//! the full list of indexes it is rebuilding; [`IndexPopulator::populate`] keeps the ones
//! the populator is registered for, reads its data source once per page and fans each
//! batch out to all of them.
//!
//! Paging stops on the first page shorter than the page size, so a source holding
//! exactly one full page is read twice.

pub mod content;
pub mod delivery;
pub mod media;
pub mod member;

use crate::builder::property_editors::PropertyEditorCollection;
use crate::builder::delivery::ContentIndexHandlerCollection;
use crate::builder::{
    ContentValueSetBuilder, DeliveryApiContentValueSetBuilder, MediaValueSetBuilder,
    MemberValueSetBuilder,
};
use crate::config::{IndexKind, IndexingSettings};
use crate::diagnostics::{IndexRebuildStatusManager, PopulatorProgress};
use crate::domain::services::ServiceContext;
use crate::error::IndexResult;
use crate::search::SearchIndex;
use crate::value_set::ValueSet;
use async_trait::async_trait;
use std::sync::Arc;

pub use content::ContentIndexPopulator;
pub use delivery::DeliveryApiContentIndexPopulator;
pub use media::MediaIndexPopulator;
pub use member::MemberIndexPopulator;

/// Index names a populator is responsible for.
#[derive(Debug, Clone, Default)]
pub struct RegisteredIndexes(Vec<String>);

impl RegisteredIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, index_name: impl Into<String>) {
        let name = index_name.into();
        if !self.contains(&name) {
            self.0.push(name);
        }
    }

    pub fn contains(&self, index_name: &str) -> bool {
        self.0.iter().any(|n| n.eq_ignore_ascii_case(index_name))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for RegisteredIndexes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut out = Self::new();
        for name in iter {
            out.register(name);
        }
        out
    }
}

#[async_trait]
pub trait IndexPopulator: Send + Sync {
    fn name(&self) -> &str;

    fn registered_indexes(&self) -> &RegisteredIndexes;

    fn is_registered(&self, index: &dyn SearchIndex) -> bool {
        self.registered_indexes().contains(index.name())
    }

    /// Sweeps the data source into `indexes`, all of which this populator is
    /// registered for.
    async fn populate_indexes(
        &self,
        indexes: &[Arc<dyn SearchIndex>],
        progress: &PopulatorProgress,
    ) -> IndexResult<()>;

    /// Populates the subset of `indexes` this populator is registered for.
    async fn populate(
        &self,
        indexes: &[Arc<dyn SearchIndex>],
        status: Option<Arc<IndexRebuildStatusManager>>,
    ) -> IndexResult<()> {
        let targets: Vec<Arc<dyn SearchIndex>> = indexes
            .iter()
            .filter(|i| self.is_registered(i.as_ref()))
            .cloned()
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let progress = match status {
            Some(manager) => PopulatorProgress::new(
                manager,
                targets.iter().map(|i| i.name().to_string()).collect(),
                self.name(),
            ),
            None => PopulatorProgress::detached(),
        };

        progress.start();
        let result = self.populate_indexes(&targets, &progress).await;
        progress.finish();
        result
    }
}

/// Pushes one batch to every target index.
pub(crate) async fn index_batch(
    indexes: &[Arc<dyn SearchIndex>],
    value_sets: Vec<ValueSet>,
) -> IndexResult<()> {
    if value_sets.is_empty() {
        return Ok(());
    }
    for index in indexes {
        index.index_items(value_sets.clone()).await?;
    }
    Ok(())
}

pub(crate) fn total_batches(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Content indexes sharing a publish mode and parent branch.
fn content_groups(settings: &IndexingSettings) -> Vec<((bool, Option<i32>), RegisteredIndexes)> {
    let mut groups: Vec<((bool, Option<i32>), RegisteredIndexes)> = Vec::new();
    for definition in settings.indexes.iter().filter(|d| d.kind == IndexKind::Content) {
        let key = (
            definition.published_values_only,
            definition.parent_id.filter(|id| *id > 0),
        );
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, registered)) => registered.register(definition.name.clone()),
            None => groups.push((key, [definition.name.clone()].into_iter().collect())),
        }
    }
    groups
}

/// Wires the standard populators to the indexes configured in `settings`.
///
/// Content indexes are grouped by publish mode and parent branch. Each group gets the
/// all-content or published-content populator for its branch, and media indexes get one
/// media populator per branch. Member indexes get the member populator; delivery API
/// indexes get the delivery populator.
pub fn default_populators(
    settings: &IndexingSettings,
    services: &ServiceContext,
    editors: Arc<PropertyEditorCollection>,
    delivery_handlers: Arc<ContentIndexHandlerCollection>,
) -> Vec<Arc<dyn IndexPopulator>> {
    let mut populators: Vec<Arc<dyn IndexPopulator>> = Vec::new();
    let groups = content_groups(settings);

    for ((published, parent_id), registered) in &groups {
        let builder = Arc::new(ContentValueSetBuilder::new(
            Arc::clone(&editors),
            Arc::clone(&services.users),
            *published,
        ));
        let populator = if *published {
            ContentIndexPopulator::published(Arc::clone(&services.content), builder, registered.clone())
        } else {
            ContentIndexPopulator::new(Arc::clone(&services.content), builder, registered.clone())
        };
        populators.push(Arc::new(populator.with_parent_id(*parent_id)));
    }

    // Media ignores the publish mode, so only the branch splits it.
    let mut media_groups: Vec<(Option<i32>, RegisteredIndexes)> = Vec::new();
    for ((_, parent_id), registered) in &groups {
        match media_groups.iter_mut().find(|(p, _)| p == parent_id) {
            Some((_, names)) => registered.names().iter().for_each(|n| names.register(n.clone())),
            None => media_groups.push((*parent_id, registered.clone())),
        }
    }
    for (parent_id, registered) in media_groups {
        populators.push(Arc::new(
            MediaIndexPopulator::new(
                Arc::clone(&services.media),
                Arc::new(MediaValueSetBuilder::new(
                    Arc::clone(&editors),
                    Arc::clone(&services.users),
                )),
                registered,
            )
            .with_parent_id(parent_id),
        ));
    }

    let member_indexes: RegisteredIndexes = settings
        .indexes
        .iter()
        .filter(|d| d.kind == IndexKind::Members)
        .map(|d| d.name.clone())
        .collect();
    if !member_indexes.names().is_empty() {
        populators.push(Arc::new(MemberIndexPopulator::new(
            Arc::clone(&services.members),
            Arc::new(MemberValueSetBuilder::new(Arc::clone(&editors))),
            member_indexes,
        )));
    }

    for definition in settings
        .indexes
        .iter()
        .filter(|d| d.kind == IndexKind::DeliveryApi)
    {
        populators.push(Arc::new(
            DeliveryApiContentIndexPopulator::new(
                Arc::clone(&services.content),
                Arc::new(DeliveryApiContentValueSetBuilder::new(Arc::clone(
                    &delivery_handlers,
                ))),
                [definition.name.clone()].into_iter().collect(),
            )
            .with_disallowed_content_types(definition.exclude_item_types.clone()),
        ));
    }

    populators
}
