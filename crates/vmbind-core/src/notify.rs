#![forbid(unsafe_code)]

//! Property-change notification and strong bindings.
//!
//! # Design
//!
//! A notifying object owns a [`PropertyChangedEvent`] and exposes it through
//! [`NotifyPropertyChanged`]. Handlers are registered in one of two ways:
//!
//! - **Strong** ([`PropertyChangedEvent::add_handler`]): the event keeps the
//!   handler alive for as long as the source lives. [`PropertyChangedExt::bind`]
//!   uses this path. The returned [`PropertyBinding`] only holds a `Weak`
//!   reference to the source, so it never keeps the source alive.
//! - **Weak** ([`PropertyChangedEvent::add_weak_handler`]): the event stores a
//!   `Weak` handler; somebody else (normally a
//!   [`WeakEventManager`](crate::weak_event::WeakEventManager)) owns it.
//!
//! # Filter semantics
//!
//! A handler registered with filter `"Foo"` receives events named `"Foo"`
//! and events carrying the empty "everything changed" name. A handler
//! registered with the empty filter receives every event.
//!
//! # Failure Modes
//!
//! - **Re-entrant raise**: handlers run outside the internal lock, so a
//!   handler may raise further events or (un)register handlers.
//! - **Dead weak handlers**: pruned lazily on the next `raise()`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Handler invoked with the arguments of each matching notification.
pub type Handler = Arc<dyn Fn(&PropertyChangedArgs) + Send + Sync>;
type WeakHandler = Weak<dyn Fn(&PropertyChangedArgs) + Send + Sync>;

/// Identifier of a handler registered on a [`PropertyChangedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Arguments of a property-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChangedArgs {
    property_name: String,
}

impl PropertyChangedArgs {
    /// Notification for a single named property.
    #[must_use]
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
        }
    }

    /// Notification meaning "every property may have changed".
    #[must_use]
    pub fn all() -> Self {
        Self::new(String::new())
    }

    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Whether this is an "everything changed" notification.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.property_name.is_empty()
    }

    /// Whether a handler registered with `filter` should receive this event.
    #[must_use]
    pub fn matches(&self, filter: &str) -> bool {
        filter.is_empty() || self.is_all() || self.property_name == filter
    }
}

/// Typed payload delivered to value bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChanged<V> {
    /// The bound property name (also for "everything changed" events).
    pub property_name: String,
    /// Value read from the source after the change.
    pub new_value: V,
}

enum Slot {
    Strong(Handler),
    Weak(WeakHandler),
}

impl Slot {
    fn live(&self) -> Option<Handler> {
        match self {
            Self::Strong(handler) => Some(Arc::clone(handler)),
            Self::Weak(handler) => handler.upgrade(),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            Self::Strong(_) => false,
            Self::Weak(handler) => handler.strong_count() == 0,
        }
    }
}

struct Entry {
    id: HandlerId,
    filter: String,
    slot: Slot,
}

/// Handler list owned by a notifying object.
pub struct PropertyChangedEvent {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Default for PropertyChangedEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyChangedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChangedEvent")
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

impl PropertyChangedEvent {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, filter: String, slot: Slot) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Entry { id, filter, slot });
        id
    }

    /// Register a handler that this event keeps alive.
    pub fn add_handler(&self, filter: impl Into<String>, handler: Handler) -> HandlerId {
        self.push(filter.into(), Slot::Strong(handler))
    }

    /// Register a handler owned elsewhere. The event only keeps a `Weak`
    /// reference; once the owner drops it, it is never called again.
    pub fn add_weak_handler(&self, filter: impl Into<String>, handler: &Handler) -> HandlerId {
        self.push(filter.into(), Slot::Weak(Arc::downgrade(handler)))
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Number of registered handlers, including dead weak ones not yet pruned.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `args` to every live matching handler in registration order.
    pub fn raise(&self, args: &PropertyChangedArgs) {
        // Collect live handlers first so none run while the lock is held.
        let handlers: Vec<Handler> = {
            let mut entries = self.lock();
            entries.retain(|e| !e.slot.is_dead());
            entries
                .iter()
                .filter(|e| args.matches(&e.filter))
                .filter_map(|e| e.slot.live())
                .collect()
        };

        for handler in &handlers {
            handler(args);
        }
    }
}

/// Implemented by objects that announce property changes.
pub trait NotifyPropertyChanged: Send + Sync {
    /// The event handlers subscribe to.
    fn property_changed(&self) -> &PropertyChangedEvent;

    /// Announce that `property_name` changed.
    fn notify_of_property_change(&self, property_name: &str) {
        self.property_changed()
            .raise(&PropertyChangedArgs::new(property_name));
    }

    /// Announce that every property may have changed.
    fn notify_all(&self) {
        self.property_changed().raise(&PropertyChangedArgs::all());
    }

    /// Store `value` in `slot` and announce `property_name` if it changed.
    ///
    /// Returns whether a notification was raised.
    fn set_and_notify<T: PartialEq>(&self, slot: &Mutex<T>, value: T, property_name: &str) -> bool
    where
        Self: Sized,
    {
        {
            let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify_of_property_change(property_name);
        true
    }
}

/// A registration that can be torn down.
pub trait EventBinding {
    /// Stop delivering notifications. Calling this more than once is a no-op.
    fn unbind(&self);

    /// Whether notifications can still be delivered through this binding.
    fn is_bound(&self) -> bool;
}

/// Strong binding created by [`PropertyChangedExt::bind`].
///
/// The source keeps the callback alive; this handle only references the
/// source weakly.
pub struct PropertyBinding {
    source: Weak<dyn NotifyPropertyChanged>,
    property_name: String,
    id: HandlerId,
    bound: AtomicBool,
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("property_name", &self.property_name)
            .field("id", &self.id)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl PropertyBinding {
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }
}

impl EventBinding for PropertyBinding {
    fn unbind(&self) {
        if self.bound.swap(false, Ordering::AcqRel)
            && let Some(source) = self.source.upgrade()
        {
            source.property_changed().remove_handler(self.id);
        }
    }

    fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire) && self.source.strong_count() > 0
    }
}

/// Build a handler that reads the bound property from a weakly held source
/// and forwards it to `callback`.
pub(crate) fn value_handler<S, V, G, F>(
    source: Weak<S>,
    property_name: &str,
    getter: G,
    callback: F,
) -> Handler
where
    S: Send + Sync + 'static,
    G: Fn(&S) -> V + Send + Sync + 'static,
    F: Fn(PropertyChanged<V>) + Send + Sync + 'static,
{
    let property_name = property_name.to_owned();
    Arc::new(move |_args: &PropertyChangedArgs| {
        if let Some(source) = source.upgrade() {
            let new_value = getter(&source);
            callback(PropertyChanged {
                property_name: property_name.clone(),
                new_value,
            });
        }
    })
}

/// Value bindings for any shared notifier.
pub trait PropertyChangedExt: NotifyPropertyChanged + Sized + 'static {
    /// Call `callback` with the value returned by `getter` whenever
    /// `property_name` (or "everything") changes on this object.
    ///
    /// This is a strong binding: the callback lives as long as `self`.
    fn bind<V, G, F>(self: &Arc<Self>, property_name: &str, getter: G, callback: F) -> PropertyBinding
    where
        G: Fn(&Self) -> V + Send + Sync + 'static,
        F: Fn(PropertyChanged<V>) + Send + Sync + 'static,
    {
        let handler = value_handler(Arc::downgrade(self), property_name, getter, callback);
        let id = self.property_changed().add_handler(property_name, handler);
        let weak: Weak<Self> = Arc::downgrade(self);
        let source: Weak<dyn NotifyPropertyChanged> = weak;
        PropertyBinding {
            source,
            property_name: property_name.to_owned(),
            id,
            bound: AtomicBool::new(true),
        }
    }
}

impl<T: NotifyPropertyChanged + 'static> PropertyChangedExt for T {}
