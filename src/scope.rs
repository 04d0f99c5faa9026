//! Units of work and their completion hooks.
//!
//! A [`Scope`] brackets a set of writes. Components that must only act once the writes
//! are durable enlist a completion hook on the scope's [`ScopeContext`]; hooks run when
//! the scope is dropped and are told whether it completed or rolled back.
//!
//! The context is passed explicitly: callers that run inside a unit of work hand
//! `Some(scope.context())` down the call chain, everything else passes `None`.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Priority of hooks that do not ask for a specific slot.
pub const DEFAULT_ENLIST_PRIORITY: i32 = 100;

type CompletionHook = Box<dyn FnOnce(bool) + Send>;

struct Enlisted {
    key: String,
    priority: i32,
    item: Arc<dyn Any + Send + Sync>,
    on_complete: CompletionHook,
}

/// Per-scope registry of enlisted objects and completion hooks.
pub struct ScopeContext {
    id: Uuid,
    enlisted: Mutex<Vec<Enlisted>>,
}

impl ScopeContext {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            enlisted: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Enlisted>> {
        self.enlisted.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the object enlisted under `key`, creating and registering it on first use.
    ///
    /// `on_complete` receives the completion flag and the shared object when the scope
    /// ends. Hooks run in descending `priority` order; hooks with equal priority run in
    /// enlistment order.
    ///
    /// Returns `None` if `key` is already enlisted with a different type.
    pub fn enlist<T, C, F>(&self, key: &str, create: C, on_complete: F, priority: i32) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
        C: FnOnce() -> T,
        F: FnOnce(bool, &T) + Send + 'static,
    {
        let mut entries = self.entries();
        if let Some(existing) = entries.iter().find(|e| e.key == key) {
            return match existing.item.clone().downcast::<T>() {
                Ok(item) => Some(item),
                Err(_) => {
                    warn!(scope = %self.id, key, "key already enlisted with a different type");
                    None
                }
            };
        }

        let item = Arc::new(create());
        let hook_item = item.clone();
        entries.push(Enlisted {
            key: key.to_string(),
            priority,
            item: item.clone(),
            on_complete: Box::new(move |completed| on_complete(completed, &hook_item)),
        });
        Some(item)
    }

    /// Registers a plain completion hook with no shared object.
    pub fn on_complete<F>(&self, key: &str, priority: i32, hook: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let _ = self.enlist(key, || (), move |completed, _: &()| hook(completed), priority);
    }

    fn run_completion(&self, completed: bool) {
        let mut hooks: Vec<Enlisted> = std::mem::take(&mut *self.entries());
        // stable sort keeps enlistment order within a priority
        hooks.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!(scope = %self.id, completed, hooks = hooks.len(), "scope exiting");
        for hook in hooks {
            (hook.on_complete)(completed);
        }
    }
}

/// A unit of work. Dropping it without calling [`Scope::complete`] rolls it back,
/// unless it was created with auto-complete.
pub struct Scope {
    context: Arc<ScopeContext>,
    completed: bool,
    auto_complete: bool,
}

impl Scope {
    pub fn new(auto_complete: bool) -> Self {
        Self {
            context: Arc::new(ScopeContext::new()),
            completed: false,
            auto_complete,
        }
    }

    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    /// Marks the unit of work as successful. Hooks still only run when the scope drops.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_completed(&self) -> bool {
        self.completed || self.auto_complete
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let completed = self.is_completed();
        self.context.run_completion(completed);
    }
}

/// Creates units of work.
pub trait ScopeProvider: Send + Sync {
    fn create_scope(&self, auto_complete: bool) -> Scope;
}

/// Scope provider with no backing transaction; scopes only drive completion hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScopeProvider;

impl ScopeProvider for DefaultScopeProvider {
    fn create_scope(&self, auto_complete: bool) -> Scope {
        Scope::new(auto_complete)
    }
}
