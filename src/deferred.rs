//! Indexing work held back until a unit of work commits.
//!
//! The action buffer is enlisted on the scope at [`INDEXING_ENLIST_PRIORITY`], which
//! runs after default-priority hooks (the store's own completion work) and before
//! lower-priority ones. On commit the buffered actions run once each, in the order
//! they were added; on rollback they are dropped.

use crate::scope::ScopeContext;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const INDEXING_ENLIST_PRIORITY: i32 = 80;

const DEFERRED_ACTIONS_KEY: &str = "examineEvents";

pub type DeferredAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct DeferredActions {
    actions: Mutex<Vec<DeferredAction>>,
}

impl DeferredActions {
    /// The scope's action buffer, created and enlisted on first use. `None` when there
    /// is no scope, in which case callers run the action immediately.
    pub fn get(scope: Option<&ScopeContext>) -> Option<Arc<DeferredActions>> {
        scope?.enlist(
            DEFERRED_ACTIONS_KEY,
            DeferredActions::default,
            |completed, actions: &DeferredActions| actions.execute(completed),
            INDEXING_ENLIST_PRIORITY,
        )
    }

    pub fn add(&self, action: DeferredAction) {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn execute(&self, completed: bool) {
        let actions = std::mem::take(&mut *self.actions.lock().unwrap_or_else(|e| e.into_inner()));
        if !completed {
            debug!(discarded = actions.len(), "scope rolled back, dropping deferred indexing actions");
            return;
        }
        for action in actions {
            action();
        }
    }
}

/// Adds `action` to the scope's buffer, or runs it now when there is no scope.
pub fn defer_or_execute<F>(scope: Option<&ScopeContext>, action: F)
where
    F: FnOnce() + Send + 'static,
{
    match DeferredActions::get(scope) {
        Some(actions) => actions.add(Box::new(action)),
        None => action(),
    }
}
