//! Full index rebuilds.
//!
//! Only the main process writes indexes, and only once the application is fully
//! running; when either signal is off every rebuild request is a no-op. Inside one
//! process at most one sweep runs at a time: a request that finds the rebuild lock
//! taken logs a warning and returns without queueing.

use crate::diagnostics::IndexRebuildStatusManager;
use crate::error::{IndexError, IndexResult};
use crate::populate::IndexPopulator;
use crate::runtime::{MainDom, RuntimeLevel, RuntimeState};
use crate::search::{IndexRegistry, SearchIndex};
use crate::tasks::{BackgroundTaskQueue, work_item};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct RebuilderInner {
    registry: IndexRegistry,
    populators: Vec<Arc<dyn IndexPopulator>>,
    main_dom: Arc<dyn MainDom>,
    runtime_state: Arc<dyn RuntimeState>,
    tasks: Arc<dyn BackgroundTaskQueue>,
    status: Arc<IndexRebuildStatusManager>,
    rebuild_lock: Mutex<()>,
}

#[derive(Clone)]
pub struct IndexRebuilder {
    inner: Arc<RebuilderInner>,
}

impl IndexRebuilder {
    pub fn new(
        registry: IndexRegistry,
        populators: Vec<Arc<dyn IndexPopulator>>,
        main_dom: Arc<dyn MainDom>,
        runtime_state: Arc<dyn RuntimeState>,
        tasks: Arc<dyn BackgroundTaskQueue>,
        status: Arc<IndexRebuildStatusManager>,
    ) -> Self {
        Self {
            inner: Arc::new(RebuilderInner {
                registry,
                populators,
                main_dom,
                runtime_state,
                tasks,
                status,
                rebuild_lock: Mutex::new(()),
            }),
        }
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.inner.registry
    }

    pub fn status(&self) -> &Arc<IndexRebuildStatusManager> {
        &self.inner.status
    }

    pub fn can_run(&self) -> bool {
        self.inner.main_dom.is_main_dom() && self.inner.runtime_state.level() == RuntimeLevel::Run
    }

    /// Whether any populator is registered for the index.
    pub fn can_rebuild(&self, index_name: &str) -> bool {
        match self.inner.registry.get(index_name) {
            Some(index) => self
                .inner
                .populators
                .iter()
                .any(|p| p.is_registered(index.as_ref())),
            None => false,
        }
    }

    /// Rebuilds one index.
    ///
    /// With `use_background_thread` the work is queued and this returns at once; an
    /// unknown index is then only logged. Otherwise an unknown index is an error.
    pub async fn rebuild_index(
        &self,
        index_name: &str,
        delay: Duration,
        use_background_thread: bool,
    ) -> IndexResult<()> {
        if !self.can_run() {
            debug!(index = index_name, "rebuild skipped, this process may not write indexes");
            return Ok(());
        }

        if use_background_thread {
            info!(index = index_name, "starting async background thread for rebuilding index");
            let this = self.clone();
            let index_name = index_name.to_string();
            self.inner.tasks.queue_background_work_item(work_item(move |token| async move {
                if let Err(e) = this.rebuild_index_with_token(&index_name, delay, token).await {
                    error!(index = %index_name, error = %e, "index rebuild failed");
                }
            }));
            return Ok(());
        }

        self.rebuild_index_with_token(index_name, delay, CancellationToken::new())
            .await
    }

    /// Rebuilds every index, or only those that do not exist yet.
    pub async fn rebuild_indexes(
        &self,
        only_empty_indexes: bool,
        delay: Duration,
        use_background_thread: bool,
    ) -> IndexResult<()> {
        if !self.can_run() {
            debug!("rebuild skipped, this process may not write indexes");
            return Ok(());
        }

        if use_background_thread {
            info!(only_empty_indexes, "starting async background thread for rebuilding indexes");
            let this = self.clone();
            self.inner.tasks.queue_background_work_item(work_item(move |token| async move {
                if let Err(e) = this
                    .rebuild_indexes_with_token(only_empty_indexes, delay, token)
                    .await
                {
                    error!(error = %e, "index rebuild failed");
                }
            }));
            return Ok(());
        }

        self.rebuild_indexes_with_token(only_empty_indexes, delay, CancellationToken::new())
            .await
    }

    /// Sleeps for `delay`. Returns `false` if cancelled first.
    async fn settle(delay: Duration, token: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !token.is_cancelled();
        }
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    pub async fn rebuild_index_with_token(
        &self,
        index_name: &str,
        delay: Duration,
        token: CancellationToken,
    ) -> IndexResult<()> {
        if !Self::settle(delay, &token).await {
            return Ok(());
        }

        let Ok(_guard) = self.inner.rebuild_lock.try_lock() else {
            warn!(index = index_name, "call was made to rebuild an index but a rebuild is already running");
            return Ok(());
        };

        let index = self
            .inner
            .registry
            .get(index_name)
            .ok_or_else(|| IndexError::IndexNotFound(index_name.to_string()))?;

        index.create_index().await?;
        self.run_populators(&[index], &token).await;
        Ok(())
    }

    pub async fn rebuild_indexes_with_token(
        &self,
        only_empty_indexes: bool,
        delay: Duration,
        token: CancellationToken,
    ) -> IndexResult<()> {
        if !Self::settle(delay, &token).await {
            return Ok(());
        }

        let Ok(_guard) = self.inner.rebuild_lock.try_lock() else {
            warn!("call was made to rebuild indexes but a rebuild is already running");
            return Ok(());
        };

        let mut indexes: Vec<Arc<dyn SearchIndex>> = Vec::new();
        for index in self.inner.registry.indexes() {
            if only_empty_indexes && index.index_exists().await? {
                continue;
            }
            indexes.push(Arc::clone(index));
        }
        if indexes.is_empty() {
            debug!(only_empty_indexes, "no indexes to rebuild");
            return Ok(());
        }

        for index in &indexes {
            index.create_index().await?;
        }
        self.run_populators(&indexes, &token).await;
        Ok(())
    }

    async fn run_populators(&self, indexes: &[Arc<dyn SearchIndex>], token: &CancellationToken) {
        let names: Vec<String> = indexes.iter().map(|i| i.name().to_string()).collect();
        self.inner.status.start_rebuild(&names);
        info!(indexes = ?names, "rebuilding indexes");

        for populator in &self.inner.populators {
            if token.is_cancelled() {
                info!(indexes = ?names, "rebuild cancelled");
                break;
            }
            if let Err(e) = populator
                .populate(indexes, Some(Arc::clone(&self.inner.status)))
                .await
            {
                error!(populator = populator.name(), error = %e, "index populating failed for populator");
            }
        }

        self.inner.status.finish_rebuild(&names);
    }
}
