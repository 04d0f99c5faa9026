//! Incremental index synchronization.
//!
//! Entry points take the caller's scope. With a scope, the indexing action is buffered
//! on it and released only if the scope commits; without one it is released at once.
//! A released action always runs on the background queue, so value-set building and
//! index writes never block the caller.

pub mod notifications;

use crate::builder::property_editors::PropertyEditorCollection;
use crate::builder::{
    ContentValueSetBuilder, MediaValueSetBuilder, MemberValueSetBuilder, ValueSetBuilder,
};
use crate::deferred::defer_or_execute;
use crate::domain::services::ServiceContext;
use crate::domain::{Content, Media, Member};
use crate::error::IndexResult;
use crate::rebuild::IndexRebuilder;
use crate::runtime::MainDom;
use crate::scope::ScopeContext;
use crate::search::{IndexRegistry, SearchIndex};
use crate::tasks::{BackgroundTaskQueue, work_item};
use crate::value_set::ValueSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use notifications::{
    ContentChange, ContentTypeChange, ContentTypeChangeTypes, ContentTypeKind, LanguageChange,
    LanguageChangeType, MediaChange, MemberChange, TreeChangeTypes,
};

/// One unit of index synchronization work.
#[derive(Debug, Clone)]
pub enum IndexingAction {
    ReIndexContent { content: Content, is_published: bool },
    ReIndexMedia { media: Media, is_published: bool },
    ReIndexMember { member: Member },
    Delete { id: i32, keep_if_unpublished: bool },
}

impl IndexingAction {
    pub fn entity_id(&self) -> i32 {
        match self {
            IndexingAction::ReIndexContent { content, .. } => content.id(),
            IndexingAction::ReIndexMedia { media, .. } => media.id(),
            IndexingAction::ReIndexMember { member } => member.id(),
            IndexingAction::Delete { id, .. } => *id,
        }
    }
}

struct HandlerInner {
    registry: IndexRegistry,
    services: ServiceContext,
    content_builder: Arc<dyn ValueSetBuilder<Content>>,
    published_content_builder: Arc<dyn ValueSetBuilder<Content>>,
    media_builder: Arc<dyn ValueSetBuilder<Media>>,
    member_builder: Arc<dyn ValueSetBuilder<Member>>,
    tasks: Arc<dyn BackgroundTaskQueue>,
    /// Released actions, executed one at a time in release order.
    released: UnboundedSender<IndexingAction>,
    pending: Mutex<UnboundedReceiver<IndexingAction>>,
    /// Set while a work item is draining `pending`.
    draining: AtomicBool,
    main_dom: Arc<dyn MainDom>,
    rebuilder: IndexRebuilder,
    startup_delay: Duration,
    enabled: AtomicBool,
    suspended: AtomicBool,
    tried_while_suspended: AtomicBool,
}

#[derive(Clone)]
pub struct IndexingHandler {
    inner: Arc<HandlerInner>,
}

impl IndexingHandler {
    pub fn new(
        services: ServiceContext,
        editors: Arc<PropertyEditorCollection>,
        tasks: Arc<dyn BackgroundTaskQueue>,
        main_dom: Arc<dyn MainDom>,
        rebuilder: IndexRebuilder,
        startup_delay: Duration,
    ) -> Self {
        let content_builder = Arc::new(ContentValueSetBuilder::new(
            Arc::clone(&editors),
            Arc::clone(&services.users),
            false,
        ));
        let published_content_builder = Arc::new(ContentValueSetBuilder::new(
            Arc::clone(&editors),
            Arc::clone(&services.users),
            true,
        ));
        let media_builder = Arc::new(MediaValueSetBuilder::new(
            Arc::clone(&editors),
            Arc::clone(&services.users),
        ));
        let member_builder = Arc::new(MemberValueSetBuilder::new(editors));
        let (released, pending) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(HandlerInner {
                registry: rebuilder.registry().clone(),
                services,
                content_builder,
                published_content_builder,
                media_builder,
                member_builder,
                tasks,
                released,
                pending: Mutex::new(pending),
                draining: AtomicBool::new(false),
                main_dom,
                rebuilder,
                startup_delay,
                enabled: AtomicBool::new(true),
                suspended: AtomicBool::new(false),
                tried_while_suspended: AtomicBool::new(false),
            }),
        }
    }

    /// Handlers only act in the main process, and only while some index wants them.
    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst) && self.inner.main_dom.is_main_dom()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// `false` while suspended; a refused notification is remembered for
    /// [`IndexingHandler::resume_indexers`].
    pub fn can_index(&self) -> bool {
        if !self.inner.suspended.load(Ordering::SeqCst) {
            return true;
        }
        self.inner.tried_while_suspended.store(true, Ordering::SeqCst);
        false
    }

    pub fn suspend_indexers(&self) {
        debug!("suspending indexers");
        self.inner.suspended.store(true, Ordering::SeqCst);
    }

    /// Lifts suspension. If notifications were dropped meanwhile, every index is
    /// rebuilt in the background.
    pub async fn resume_indexers(&self) -> IndexResult<()> {
        debug!("resuming indexers");
        self.inner.suspended.store(false, Ordering::SeqCst);
        if !self.inner.tried_while_suspended.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("notifications were ignored while suspended, rebuilding all indexes");
        self.inner
            .rebuilder
            .rebuild_indexes(false, Duration::ZERO, true)
            .await
    }

    pub fn reindex_for_content(&self, scope: Option<&ScopeContext>, content: Content, is_published: bool) {
        self.enqueue(scope, IndexingAction::ReIndexContent { content, is_published });
    }

    pub fn reindex_for_media(&self, scope: Option<&ScopeContext>, media: Media, is_published: bool) {
        self.enqueue(scope, IndexingAction::ReIndexMedia { media, is_published });
    }

    pub fn reindex_for_member(&self, scope: Option<&ScopeContext>, member: Member) {
        self.enqueue(scope, IndexingAction::ReIndexMember { member });
    }

    /// Removes the entity from indexes. With `keep_if_unpublished` only published-only
    /// indexes drop it.
    pub fn delete_index_for_entity(&self, scope: Option<&ScopeContext>, id: i32, keep_if_unpublished: bool) {
        self.enqueue(scope, IndexingAction::Delete { id, keep_if_unpublished });
    }

    fn enqueue(&self, scope: Option<&ScopeContext>, action: IndexingAction) {
        let this = self.clone();
        defer_or_execute(scope, move || this.queue(action));
    }

    /// Hands the action to the background queue. Actions run in the order they were
    /// released, so a delete released after a re-index of the same item wins.
    fn queue(&self, action: IndexingAction) {
        if self.inner.released.send(action).is_err() {
            return;
        }
        self.start_draining();
    }

    fn start_draining(&self) {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let this = self.clone();
        self.inner
            .tasks
            .queue_background_work_item(work_item(move |token| async move { this.drain(token).await }));
    }

    fn next_released(&self) -> Option<IndexingAction> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .try_recv()
            .ok()
    }

    async fn drain(&self, token: CancellationToken) {
        loop {
            while let Some(action) = self.next_released() {
                if token.is_cancelled() {
                    warn!(id = action.entity_id(), "background queue shut down, dropping indexing action");
                    continue;
                }
                if let Err(e) = self.execute(&action).await {
                    error!(id = action.entity_id(), error = %e, "indexing action failed");
                }
            }

            self.inner.draining.store(false, Ordering::SeqCst);
            // An action sent after the last receive but before the flag cleared saw a
            // running drain and did not start one.
            let idle = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_empty();
            if idle
                || self
                    .inner
                    .draining
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                return;
            }
        }
    }

    /// Indexes that take default-handler writes for an item with this publish state.
    fn target_indexes(&self, is_published: bool) -> impl Iterator<Item = &Arc<dyn SearchIndex>> {
        self.inner
            .registry
            .indexes()
            .iter()
            .filter(move |i| is_published || !i.published_values_only())
            .filter(|i| i.enable_default_event_handler())
    }

    async fn write(index: &dyn SearchIndex, value_sets: &[ValueSet]) {
        if let Err(e) = index.index_items(value_sets.to_vec()).await {
            error!(index = index.name(), error = %e, "failed to index items");
        }
    }

    /// Runs one action against the registered indexes.
    pub async fn execute(&self, action: &IndexingAction) -> IndexResult<()> {
        match action {
            IndexingAction::ReIndexContent { content, is_published } => {
                let items = std::slice::from_ref(content);
                let published_sets: OnceCell<Vec<ValueSet>> = OnceCell::new();
                let all_sets: OnceCell<Vec<ValueSet>> = OnceCell::new();

                for index in self.target_indexes(*is_published) {
                    let value_sets = if index.published_values_only() {
                        published_sets
                            .get_or_try_init(|| self.inner.published_content_builder.get_value_sets(items))
                            .await?
                    } else {
                        all_sets
                            .get_or_try_init(|| self.inner.content_builder.get_value_sets(items))
                            .await?
                    };
                    Self::write(index.as_ref(), value_sets).await;
                }
            }
            IndexingAction::ReIndexMedia { media, is_published } => {
                let value_sets = self
                    .inner
                    .media_builder
                    .get_value_sets(std::slice::from_ref(media))
                    .await?;
                for index in self.target_indexes(*is_published) {
                    Self::write(index.as_ref(), &value_sets).await;
                }
            }
            IndexingAction::ReIndexMember { member } => {
                let value_sets = self
                    .inner
                    .member_builder
                    .get_value_sets(std::slice::from_ref(member))
                    .await?;
                for index in self.target_indexes(true) {
                    Self::write(index.as_ref(), &value_sets).await;
                }
            }
            IndexingAction::Delete { id, keep_if_unpublished } => {
                let id = id.to_string();
                for index in self
                    .inner
                    .registry
                    .indexes()
                    .iter()
                    .filter(|i| i.published_values_only() || !keep_if_unpublished)
                    .filter(|i| i.enable_default_event_handler())
                {
                    if let Err(e) = index.delete_from_index(&id).await {
                        error!(index = index.name(), id = %id, error = %e, "failed to delete from index");
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn services(&self) -> &ServiceContext {
        &self.inner.services
    }

    pub(crate) fn registry(&self) -> &IndexRegistry {
        &self.inner.registry
    }

    pub(crate) fn rebuilder(&self) -> &IndexRebuilder {
        &self.inner.rebuilder
    }

    pub(crate) fn startup_delay(&self) -> Duration {
        self.inner.startup_delay
    }
}
