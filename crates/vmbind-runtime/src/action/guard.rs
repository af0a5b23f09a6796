//! Guard-property observation.
//!
//! An action named `Save` is gated by a `bool` property named `CanSave` on
//! the same target, when one exists. The observer binds a reusable accessor
//! for it once per target and, if the target raises property changes,
//! subscribes to that one property through a [`WeakEventManager`].
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Guard property is not `bool` | warning, treated as no guard |
//! | Target does not notify | warning, guard read on every poll but changes are not pushed |

use std::sync::Arc;

use tracing::{debug, warn};
use vmbind_core::{EventBinding, PropertyChangedArgs, WeakEventManager, WeakSubscription};

use super::target::TargetRef;

/// Prefix joined to the method name to form the guard property name.
pub const GUARD_PREFIX: &str = "Can";

/// Zero-argument accessor bound to one target's guard property.
pub type GuardAccessor = Arc<dyn Fn() -> bool + Send + Sync>;

/// Keeps the guard accessor and its change subscription in step with the
/// current target.
pub struct GuardObserver {
    method_name: String,
    guard_name: String,
    accessor: Option<GuardAccessor>,
    subscription: Option<WeakSubscription>,
    events: WeakEventManager,
}

impl std::fmt::Debug for GuardObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardObserver")
            .field("guard_name", &self.guard_name)
            .field("has_accessor", &self.accessor.is_some())
            .field("observed", &self.is_observed())
            .finish()
    }
}

impl GuardObserver {
    #[must_use]
    pub fn new(method_name: impl Into<String>) -> Self {
        let method_name = method_name.into();
        Self {
            guard_name: format!("{GUARD_PREFIX}{method_name}"),
            method_name,
            accessor: None,
            subscription: None,
            events: WeakEventManager::new(),
        }
    }

    #[must_use]
    pub fn guard_name(&self) -> &str {
        &self.guard_name
    }

    /// Accessor for the current target's guard, if it has one.
    #[must_use]
    pub fn accessor(&self) -> Option<GuardAccessor> {
        self.accessor.clone()
    }

    /// Whether guard changes are pushed by the current target.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.subscription.as_ref().is_some_and(EventBinding::is_bound)
    }

    /// Read the guard now.
    #[must_use]
    pub fn poll(&self) -> Option<bool> {
        self.accessor.as_ref().map(|accessor| accessor())
    }

    /// Drop the previous binding and bind to `target`'s guard property.
    ///
    /// `on_change` runs (on the notifying thread) whenever the target raises
    /// a change for the guard property.
    pub fn rebind<F>(&mut self, target: Option<&TargetRef>, on_change: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.unbind();
        let Some(target) = target else {
            return;
        };

        self.accessor = self.bind_accessor(target);
        if self.accessor.is_none() {
            return;
        }

        match target.notifier() {
            Some(notifier) => {
                let subscription = self.events.add_handler(
                    notifier,
                    &self.guard_name,
                    move |_args: &PropertyChangedArgs| on_change(),
                );
                debug!(guard = %self.guard_name, target = target.type_name(), "guard observed");
                self.subscription = Some(subscription);
            }
            None => warn!(
                guard = %self.guard_name,
                action = %self.method_name,
                target = target.type_name(),
                "found guard property for action, but the target doesn't notify property changes, so changes won't be observed"
            ),
        }
    }

    fn bind_accessor(&self, target: &TargetRef) -> Option<GuardAccessor> {
        let property = target.descriptor().property(&self.guard_name)?;
        let Some(getter) = property.getter::<bool>() else {
            warn!(
                guard = %self.guard_name,
                action = %self.method_name,
                target = target.type_name(),
                found = property.value_type_name(),
                "found guard property for action, but its type wasn't bool; ignoring it"
            );
            return None;
        };
        let object = Arc::clone(target.object());
        Some(Arc::new(move || getter(&*object).unwrap_or(false)))
    }

    /// Remove the accessor and the change subscription.
    pub fn unbind(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unbind();
        }
        self.accessor = None;
    }
}
