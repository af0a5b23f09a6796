#![forbid(unsafe_code)]

//! Weak event bindings owned by the observer.
//!
//! # Design
//!
//! A [`WeakEventManager`] lives inside the observing object. Every binding
//! it creates is a registration that owns the handler strongly, while the
//! notifying source only sees a `Weak` handler and the registration only
//! sees a `Weak` source. Nothing in the graph keeps the other side alive:
//!
//! ```text
//! observer ──owns──▶ WeakEventManager ──owns──▶ handler
//!                         │ weak                   ▲ weak
//!                         ▼                        │
//!                      source ──owns──▶ PropertyChangedEvent
//! ```
//!
//! - Dropping the source makes its registrations stale; the manager reclaims
//!   them on its next access ([`WeakEventManager::sweep`], `bind_weak`,
//!   `add_handler`, `len`).
//! - Dropping the manager unbinds everything it owns; entries left in live
//!   sources are dead weak handlers and get pruned on their next raise.
//!
//! # Failure Modes
//!
//! - **Callback captures its owner strongly**: the owner can never be freed
//!   (the manager is inside it). Capture a `Weak` instead.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::logging::trace;
use crate::notify::{
    EventBinding, Handler, HandlerId, NotifyPropertyChanged, PropertyChanged, PropertyChangedArgs,
    value_handler,
};

struct Registration {
    source: Weak<dyn NotifyPropertyChanged>,
    property_name: String,
    /// The only strong reference to the handler.
    _handler: Handler,
    id: HandlerId,
    active: AtomicBool,
}

impl Registration {
    fn detach(&self) {
        if self.active.swap(false, Ordering::AcqRel)
            && let Some(source) = self.source.upgrade()
        {
            source.property_changed().remove_handler(self.id);
        }
    }

    fn is_stale(&self) -> bool {
        !self.active.load(Ordering::Acquire) || self.source.strong_count() == 0
    }
}

type Registry = Mutex<Vec<Arc<Registration>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<Arc<Registration>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of weak bindings, owned by the observing side.
pub struct WeakEventManager {
    registry: Arc<Registry>,
}

impl Default for WeakEventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WeakEventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventManager")
            .field("bindings", &lock(&self.registry).len())
            .finish()
    }
}

impl WeakEventManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Call `callback` with the value returned by `getter` whenever
    /// `property_name` (or "everything") changes on `source`.
    ///
    /// Neither `source` nor anything captured by `callback` is kept alive by
    /// `source`; the callback lives until this manager drops it.
    pub fn bind_weak<S, V, G, F>(
        &self,
        source: &Arc<S>,
        property_name: &str,
        getter: G,
        callback: F,
    ) -> WeakSubscription
    where
        S: NotifyPropertyChanged + 'static,
        G: Fn(&S) -> V + Send + Sync + 'static,
        F: Fn(PropertyChanged<V>) + Send + Sync + 'static,
    {
        let handler = value_handler(Arc::downgrade(source), property_name, getter, callback);
        let source: Arc<dyn NotifyPropertyChanged> = Arc::clone(source) as _;
        self.register(&source, property_name, handler)
    }

    /// Register a raw handler for `property_name` on `source`. The empty
    /// name listens to every property.
    pub fn add_handler<F>(
        &self,
        source: &Arc<dyn NotifyPropertyChanged>,
        property_name: &str,
        handler: F,
    ) -> WeakSubscription
    where
        F: Fn(&PropertyChangedArgs) + Send + Sync + 'static,
    {
        self.register(source, property_name, Arc::new(handler))
    }

    fn register(
        &self,
        source: &Arc<dyn NotifyPropertyChanged>,
        property_name: &str,
        handler: Handler,
    ) -> WeakSubscription {
        self.sweep();
        let id = source
            .property_changed()
            .add_weak_handler(property_name, &handler);
        let registration = Arc::new(Registration {
            source: Arc::downgrade(source),
            property_name: property_name.to_owned(),
            _handler: handler,
            id,
            active: AtomicBool::new(true),
        });
        let subscription = WeakSubscription {
            registration: Arc::downgrade(&registration),
            registry: Arc::downgrade(&self.registry),
        };
        lock(&self.registry).push(registration);
        subscription
    }

    /// Drop registrations that were unbound or whose source is gone.
    ///
    /// Returns the number of registrations reclaimed.
    pub fn sweep(&self) -> usize {
        let stale: Vec<Arc<Registration>> = {
            let mut registry = lock(&self.registry);
            let (stale, live): (Vec<_>, Vec<_>) =
                registry.drain(..).partition(|r| r.is_stale());
            *registry = live;
            stale
        };
        for registration in &stale {
            registration.detach();
        }
        if !stale.is_empty() {
            trace!(reclaimed = stale.len(), "weak event registrations swept");
        }
        stale.len()
    }

    /// Number of live registrations (sweeps first).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sweep();
        lock(&self.registry).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unbind every registration owned by this manager.
    pub fn unbind_all(&self) {
        let all: Vec<Arc<Registration>> = lock(&self.registry).drain(..).collect();
        for registration in &all {
            registration.detach();
        }
    }
}

impl Drop for WeakEventManager {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

/// Handle to a binding created by a [`WeakEventManager`].
///
/// The handle does not own the binding; dropping it leaves the binding in
/// place. Use [`EventBinding::unbind`] to remove it.
#[derive(Clone)]
pub struct WeakSubscription {
    registration: Weak<Registration>,
    registry: Weak<Registry>,
}

impl fmt::Debug for WeakSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSubscription")
            .field("property_name", &self.property_name())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl WeakSubscription {
    /// The property filter, or `None` once the registration was reclaimed.
    #[must_use]
    pub fn property_name(&self) -> Option<String> {
        self.registration
            .upgrade()
            .map(|r| r.property_name.clone())
    }
}

impl EventBinding for WeakSubscription {
    fn unbind(&self) {
        let Some(registration) = self.registration.upgrade() else {
            return;
        };
        registration.detach();
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).retain(|r| !Arc::ptr_eq(r, &registration));
        }
    }

    fn is_bound(&self) -> bool {
        self.registration
            .upgrade()
            .is_some_and(|r| !r.is_stale())
    }
}
