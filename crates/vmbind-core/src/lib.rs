#![forbid(unsafe_code)]

//! Core: property-change notification, weak event bindings, and UI executors.
//!
//! # Role in vmbind
//! `vmbind-core` is the observation layer. It owns the notification
//! primitives that presentation objects raise, the binding registries that
//! let observers listen without extending anybody's lifetime, and the
//! executor abstraction used to marshal callbacks onto the UI thread.
//!
//! # Primary responsibilities
//! - **PropertyChangedEvent**: per-notifier handler list, strong or weak.
//! - **PropertyBinding**: strong binding; the source retains the callback.
//! - **WeakEventManager**: weak bindings owned by the observer side.
//! - **UiExecutor**: `post`/`schedule` onto one logical UI thread.
//!
//! # How it fits in the system
//! The runtime (`vmbind-runtime`) builds command actions on top of these
//! pieces: guard properties are observed through a [`WeakEventManager`],
//! and enabled-changed broadcasts go through a [`UiExecutor`].

pub mod executor;
pub mod logging;
pub mod notify;
pub mod weak_event;

pub use executor::{ImmediateExecutor, Task, UiExecutor, UiQueue};
pub use notify::{
    EventBinding, Handler, HandlerId, NotifyPropertyChanged, PropertyBinding, PropertyChanged,
    PropertyChangedArgs, PropertyChangedEvent, PropertyChangedExt,
};
pub use weak_event::{WeakEventManager, WeakSubscription};
