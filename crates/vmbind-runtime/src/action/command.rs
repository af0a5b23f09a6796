//! Command actions: invocable, enable-aware wrappers around a method
//! resolved by name on the current target.
//!
//! # Enabled state
//!
//! Evaluated on every query from the current resolution:
//!
//! | Resolution | Enabled |
//! |------------|---------|
//! | target `Unset` | `true` (invoking fails with `TargetNotSet`) |
//! | target `Absent` | `target_null.reports_enabled()` |
//! | method missing | `action_non_existent.reports_enabled()` |
//! | no guard property | `true` |
//! | guard property | its current value |
//!
//! # Threading
//!
//! Queries and invocations belong on the UI thread. Guard changes may be
//! raised from any thread; re-resolution takes the action's own lock and
//! enabled-changed listeners are always run through the [`UiExecutor`].
//!
//! # Invariants
//!
//! 1. A superseded guard subscription is unbound before the new one is
//!    registered; late events from it are dropped (generation check).
//! 2. No lock is held while the target method, the guard accessor, or a
//!    listener runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error};
use vmbind_core::UiExecutor;

use super::behaviour::ActionConfig;
use super::describe::Parameter;
use super::error::ActionError;
use super::guard::GuardObserver;
use super::resolver::{ActionResolver, Resolution};
use super::target::{AttributeSubscription, BackupSubject, Subject, TargetSource, TargetValue};

type Listener = Arc<dyn Fn(&CommandAction) + Send + Sync>;
type WeakListener = Weak<dyn Fn(&CommandAction) + Send + Sync>;

struct ActionState {
    resolver: ActionResolver,
    guard: GuardObserver,
}

struct ActionInner {
    method_name: String,
    config: ActionConfig,
    source: TargetSource,
    executor: Arc<dyn UiExecutor>,
    state: Mutex<ActionState>,
    listeners: Mutex<Vec<WeakListener>>,
    /// Bumped on every retarget; guard events from older targets are dropped.
    generation: AtomicU64,
    attribute_subscriptions: Mutex<Vec<AttributeSubscription>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ActionInner {
    /// Re-read the source and re-resolve. The source is read under the state
    /// lock so concurrent attribute writes commit in the order they are read.
    fn retarget(self: &Arc<Self>) -> Result<(), ActionError> {
        let changed = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            let target = self.source.current();
            match state.resolver.resolve(target)? {
                Resolution::Unchanged => false,
                Resolution::Changed => {
                    let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                    let weak = Arc::downgrade(self);
                    state
                        .guard
                        .rebind(state.resolver.target().as_target(), move || {
                            if let Some(inner) = weak.upgrade()
                                && inner.generation.load(Ordering::Acquire) == generation
                            {
                                inner.raise_can_execute_changed();
                            }
                        });
                    true
                }
            }
        };
        if changed {
            self.raise_can_execute_changed();
        }
        Ok(())
    }

    fn live_listeners(&self) -> Vec<Listener> {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|w| w.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }

    fn raise_can_execute_changed(self: &Arc<Self>) {
        if self.live_listeners().is_empty() {
            return;
        }
        debug!(method = %self.method_name, "can-execute changed");
        let weak = Arc::downgrade(self);
        self.executor.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                // Snapshot at delivery time so listeners removed meanwhile stay silent.
                let listeners = inner.live_listeners();
                let action = CommandAction { inner };
                for listener in &listeners {
                    listener(&action);
                }
            }
        }));
    }

    fn fail(&self, err: ActionError) -> ActionError {
        error!(error = %err, "action cannot be invoked");
        err
    }
}

/// An invocable, observable action bound to a method by name.
///
/// Cloning yields another handle to the same action.
#[derive(Clone)]
pub struct CommandAction {
    inner: Arc<ActionInner>,
}

impl fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("CommandAction")
            .field("method_name", &self.inner.method_name)
            .field("target", state.resolver.target())
            .field("bound", &state.resolver.method().is_some())
            .field("guard", &state.guard)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl CommandAction {
    /// Action that follows `subject`'s target attribute, falling back to
    /// `backup` while the subject has no target.
    ///
    /// Fails with [`ActionError::InvalidSignature`] if the initial target
    /// declares the method with more than one parameter.
    pub fn new(
        subject: Arc<dyn Subject>,
        backup: Option<BackupSubject>,
        method_name: impl Into<String>,
        config: ActionConfig,
        executor: Arc<dyn UiExecutor>,
    ) -> Result<Self, ActionError> {
        let action = Self::build(
            TargetSource::Subject { subject, backup },
            method_name.into(),
            config,
            executor,
        );
        action.watch_source();
        action.refresh()?;
        Ok(action)
    }

    /// Action bound to a fixed target.
    pub fn with_target(
        target: impl Into<TargetValue>,
        method_name: impl Into<String>,
        config: ActionConfig,
        executor: Arc<dyn UiExecutor>,
    ) -> Result<Self, ActionError> {
        let action = Self::build(
            TargetSource::Explicit(target.into()),
            method_name.into(),
            config,
            executor,
        );
        action.refresh()?;
        Ok(action)
    }

    fn build(
        source: TargetSource,
        method_name: String,
        config: ActionConfig,
        executor: Arc<dyn UiExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                state: Mutex::new(ActionState {
                    resolver: ActionResolver::new(method_name.clone()),
                    guard: GuardObserver::new(method_name.clone()),
                }),
                method_name,
                config,
                source,
                executor,
                listeners: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                attribute_subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    fn watch_source(&self) {
        let subscriptions = self
            .inner
            .source
            .attributes()
            .into_iter()
            .map(|attribute| {
                let weak = Arc::downgrade(&self.inner);
                attribute.subscribe(move |_value: &TargetValue| match weak.upgrade() {
                    Some(inner) => inner.retarget(),
                    None => Ok(()),
                })
            })
            .collect();
        *lock(&self.inner.attribute_subscriptions) = subscriptions;
    }

    /// Re-read the target and re-resolve the method if it changed.
    pub fn refresh(&self) -> Result<(), ActionError> {
        self.inner.retarget()
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.inner.method_name
    }

    /// Name of the guard property consulted for the enabled state.
    #[must_use]
    pub fn guard_name(&self) -> String {
        lock(&self.inner.state).guard.guard_name().to_owned()
    }

    #[must_use]
    pub fn config(&self) -> ActionConfig {
        self.inner.config
    }

    /// The currently resolved target.
    #[must_use]
    pub fn target(&self) -> TargetValue {
        lock(&self.inner.state).resolver.target().clone()
    }

    /// Whether the action can currently be invoked.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        let config = self.inner.config;
        let accessor = {
            let state = lock(&self.inner.state);
            match state.resolver.target() {
                TargetValue::Unset => return true,
                TargetValue::Absent => return config.target_null.reports_enabled(),
                TargetValue::Resolved(_) => {}
            }
            if state.resolver.method().is_none() {
                return config.action_non_existent.reports_enabled();
            }
            match state.guard.accessor() {
                Some(accessor) => accessor,
                None => return true,
            }
        };
        accessor()
    }

    /// Invoke the bound method, passing `parameter` if the method takes one.
    ///
    /// An unavailable action is a silent no-op unless its policy is
    /// `Throw`. Invoking before the target was ever set always fails.
    pub fn execute(&self, parameter: Parameter) -> Result<(), ActionError> {
        let inner = &self.inner;
        let (target, method) = {
            let state = lock(&inner.state);
            match state.resolver.target() {
                TargetValue::Unset => {
                    return Err(inner.fail(ActionError::TargetNotSet {
                        method: inner.method_name.clone(),
                        subject: inner.source.describe(),
                    }));
                }
                TargetValue::Absent if inner.config.target_null.throws() => {
                    return Err(inner.fail(ActionError::TargetNull {
                        method: inner.method_name.clone(),
                        subject: inner.source.describe(),
                    }));
                }
                TargetValue::Absent => return Ok(()),
                TargetValue::Resolved(target) => match state.resolver.method() {
                    Some(method) => (target.clone(), Arc::clone(method)),
                    None if inner.config.action_non_existent.throws() => {
                        return Err(inner.fail(ActionError::ActionMissing {
                            method: inner.method_name.clone(),
                            target_type: target.type_name(),
                        }));
                    }
                    None => return Ok(()),
                },
            }
        };

        let args = if method.parameter_count() == 1 {
            vec![parameter]
        } else {
            Vec::new()
        };
        method
            .invoke(&**target.object(), &args)
            .map_err(|source| ActionError::Invocation {
                method: inner.method_name.clone(),
                target_type: target.type_name(),
                source,
            })
    }

    /// Call `listener` on the UI thread whenever the enabled state may have
    /// changed. Dropping the returned guard removes the listener.
    pub fn subscribe_can_execute_changed<F>(&self, listener: F) -> ListenerSubscription
    where
        F: Fn(&CommandAction) + Send + Sync + 'static,
    {
        let strong: Listener = Arc::new(listener);
        lock(&self.inner.listeners).push(Arc::downgrade(&strong));
        ListenerSubscription { _guard: strong }
    }

    /// Number of live enabled-changed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.live_listeners().len()
    }
}

/// RAII guard for an enabled-changed listener.
pub struct ListenerSubscription {
    _guard: Listener,
}

impl ListenerSubscription {
    /// Remove the listener now instead of when the guard is dropped.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for ListenerSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSubscription").finish_non_exhaustive()
    }
}
