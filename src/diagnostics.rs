//! Health, metadata and rebuild progress for operators.

use crate::error::IndexResult;
use crate::search::{IndexQuery, SearchIndex, SearchOptions};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopulatorStatus {
    pub name: String,
    pub is_running: bool,
    pub current_batch: u64,
    pub total_batches: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexRebuildStatus {
    pub is_rebuilding: bool,
    pub populators: Vec<PopulatorStatus>,
}

/// Process-local rebuild progress keyed by index name.
///
/// Populators of overlapping rebuilds update entries from different tasks, so every
/// update goes through the map's per-entry lock.
#[derive(Debug, Default)]
pub struct IndexRebuildStatusManager {
    statuses: DashMap<String, IndexRebuildStatus>,
}

impl IndexRebuildStatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the indexes as rebuilding and clears their populator progress.
    pub fn start_rebuild(&self, index_names: &[String]) {
        for name in index_names {
            self.statuses.insert(
                name.clone(),
                IndexRebuildStatus {
                    is_rebuilding: true,
                    populators: Vec::new(),
                },
            );
        }
    }

    pub fn finish_rebuild(&self, index_names: &[String]) {
        for name in index_names {
            let mut status = self.statuses.entry(name.clone()).or_default();
            status.is_rebuilding = false;
            for populator in status.populators.iter_mut() {
                populator.is_running = false;
            }
        }
    }

    pub fn update_populator<F>(&self, index_name: &str, populator: &str, update: F)
    where
        F: FnOnce(&mut PopulatorStatus),
    {
        let mut status = self.statuses.entry(index_name.to_string()).or_default();
        match status.populators.iter_mut().find(|p| p.name == populator) {
            Some(existing) => update(existing),
            None => {
                let mut entry = PopulatorStatus {
                    name: populator.to_string(),
                    ..Default::default()
                };
                update(&mut entry);
                status.populators.push(entry);
            }
        }
    }

    pub fn status(&self, index_name: &str) -> Option<IndexRebuildStatus> {
        self.statuses.get(index_name).map(|s| s.value().clone())
    }

    pub fn is_rebuilding(&self, index_name: &str) -> bool {
        self.statuses
            .get(index_name)
            .map(|s| s.is_rebuilding)
            .unwrap_or(false)
    }

    pub fn all(&self) -> BTreeMap<String, IndexRebuildStatus> {
        self.statuses
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

/// Progress reporter handed to one populator for one sweep.
#[derive(Clone)]
pub struct PopulatorProgress {
    manager: Option<Arc<IndexRebuildStatusManager>>,
    index_names: Vec<String>,
    populator: String,
}

impl PopulatorProgress {
    pub fn new(
        manager: Arc<IndexRebuildStatusManager>,
        index_names: Vec<String>,
        populator: impl Into<String>,
    ) -> Self {
        Self {
            manager: Some(manager),
            index_names,
            populator: populator.into(),
        }
    }

    /// Reporter that records nothing.
    pub fn detached() -> Self {
        Self {
            manager: None,
            index_names: Vec::new(),
            populator: String::new(),
        }
    }

    fn update<F>(&self, update: F)
    where
        F: Fn(&mut PopulatorStatus),
    {
        if let Some(manager) = &self.manager {
            for name in &self.index_names {
                manager.update_populator(name, &self.populator, &update);
            }
        }
    }

    pub fn start(&self) {
        self.update(|p| {
            p.is_running = true;
            p.current_batch = 0;
            p.total_batches = 0;
        });
    }

    pub fn batch(&self, current_batch: u64, total_batches: u64) {
        self.update(|p| {
            p.current_batch = current_batch;
            p.total_batches = total_batches;
        });
    }

    pub fn finish(&self) {
        self.update(|p| p.is_running = false);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
}

/// Read-only view over one index for the operations surface.
pub struct IndexDiagnostics {
    index: Arc<dyn SearchIndex>,
}

impl IndexDiagnostics {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Runs a trial search. Failures come back as a message, never as an error.
    pub async fn is_healthy(&self) -> HealthStatus {
        match self
            .index
            .search(&IndexQuery::text("test"), &SearchOptions::new(0, 1))
            .await
        {
            Ok(_) => HealthStatus {
                healthy: true,
                message: None,
            },
            Err(e) => {
                warn!(index = self.index.name(), error = %e, "index health check failed");
                HealthStatus {
                    healthy: false,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn document_count(&self) -> IndexResult<u64> {
        self.index.document_count().await
    }

    pub async fn field_names(&self) -> IndexResult<Vec<String>> {
        self.index.field_names().await
    }

    /// Counts, flags and validator configuration.
    pub async fn metadata(&self) -> IndexResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        out.insert(
            "DocumentCount".to_string(),
            self.index.document_count().await?.to_string(),
        );
        out.insert(
            "FieldCount".to_string(),
            self.index.field_names().await?.len().to_string(),
        );
        out.insert(
            "PublishedValuesOnly".to_string(),
            self.index.published_values_only().to_string(),
        );
        out.insert(
            "EnableDefaultEventHandler".to_string(),
            self.index.enable_default_event_handler().to_string(),
        );
        out.extend(self.index.validator().describe());
        Ok(out)
    }
}
