//! Targets, target values, and the subject-side target attribute.
//!
//! # Design
//!
//! A view-side [`Subject`] carries a [`TargetAttribute`]: a shared,
//! version-tracked [`TargetValue`] cell whose subscribers are stored as
//! `Weak` callbacks and pruned lazily. The host (element tree, inheritance)
//! writes the attribute; actions subscribe to it.
//!
//! [`TargetValue`] replaces a magic "not yet set" sentinel with an explicit
//! tag:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `Unset` | the host has not assigned the attribute yet |
//! | `Absent` | explicitly no target (null) |
//! | `Resolved` | a target object |
//!
//! # Invariants
//!
//! 1. `version` increments exactly once per value-changing `set`.
//! 2. Setting a value equal to the current one (same variant, same object
//!    identity) is a no-op.
//! 3. Subscribers are notified in registration order; all of them run even
//!    if one fails, and the first failure is returned.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use vmbind_core::NotifyPropertyChanged;

use super::describe::{ActionTarget, AnyObject, TypeDescriptor, descriptor_of};
use super::error::ActionError;

/// Shared handle to a target object together with its descriptor.
#[derive(Clone)]
pub struct TargetRef {
    object: Arc<AnyObject>,
    descriptor: Arc<TypeDescriptor>,
    notifier: Option<Arc<dyn NotifyPropertyChanged>>,
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("type", &self.type_name())
            .field("notifies", &self.notifier.is_some())
            .finish()
    }
}

impl TargetRef {
    #[must_use]
    pub fn new<T: ActionTarget>(target: Arc<T>) -> Self {
        let notifier = Arc::clone(&target).as_notifier();
        Self {
            object: target,
            descriptor: descriptor_of::<T>(),
            notifier,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    #[must_use]
    pub fn object(&self) -> &Arc<AnyObject> {
        &self.object
    }

    /// Property-change view of the target, if it notifies.
    #[must_use]
    pub fn notifier(&self) -> Option<&Arc<dyn NotifyPropertyChanged>> {
        self.notifier.as_ref()
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }

    /// The target as `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }
}

impl<T: ActionTarget> From<Arc<T>> for TargetRef {
    fn from(target: Arc<T>) -> Self {
        Self::new(target)
    }
}

/// Value of a target attribute.
#[derive(Debug, Clone, Default)]
pub enum TargetValue {
    /// Never assigned by the host.
    #[default]
    Unset,
    /// Explicitly no target.
    Absent,
    Resolved(TargetRef),
}

impl TargetValue {
    #[must_use]
    pub fn resolved<T: ActionTarget>(target: Arc<T>) -> Self {
        Self::Resolved(TargetRef::new(target))
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn as_target(&self) -> Option<&TargetRef> {
        match self {
            Self::Resolved(target) => Some(target),
            _ => None,
        }
    }

    /// Same variant and, for resolved values, the same object.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) | (Self::Absent, Self::Absent) => true,
            (Self::Resolved(a), Self::Resolved(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<TargetRef> for TargetValue {
    fn from(target: TargetRef) -> Self {
        Self::Resolved(target)
    }
}

impl From<Option<TargetRef>> for TargetValue {
    fn from(target: Option<TargetRef>) -> Self {
        target.map_or(Self::Absent, Self::Resolved)
    }
}

type Callback = Arc<dyn Fn(&TargetValue) -> Result<(), ActionError> + Send + Sync>;
type WeakCallback = Weak<dyn Fn(&TargetValue) -> Result<(), ActionError> + Send + Sync>;

struct AttributeInner {
    value: TargetValue,
    version: u64,
    subscribers: Vec<WeakCallback>,
}

/// Shared, version-tracked target value with change notification.
///
/// Cloning creates another handle to the same cell.
#[derive(Clone)]
pub struct TargetAttribute {
    inner: Arc<Mutex<AttributeInner>>,
}

impl Default for TargetAttribute {
    fn default() -> Self {
        Self::new(TargetValue::Unset)
    }
}

impl fmt::Debug for TargetAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TargetAttribute")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl TargetAttribute {
    #[must_use]
    pub fn new(value: TargetValue) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AttributeInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AttributeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self) -> TargetValue {
        self.lock().value.clone()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Assign a new value and notify subscribers if it changed.
    ///
    /// Returns the first error raised by a subscriber.
    pub fn set(&self, value: impl Into<TargetValue>) -> Result<(), ActionError> {
        let value = value.into();
        {
            let mut inner = self.lock();
            if inner.value.same_as(&value) {
                return Ok(());
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify()
    }

    /// Call `callback` with the new value after every change.
    ///
    /// The attribute only keeps the callback weakly; dropping the returned
    /// [`AttributeSubscription`] unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> AttributeSubscription
    where
        F: Fn(&TargetValue) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        let strong: Callback = Arc::new(callback);
        self.lock().subscribers.push(Arc::downgrade(&strong));
        AttributeSubscription { _guard: strong }
    }

    fn notify(&self) -> Result<(), ActionError> {
        let (callbacks, value): (Vec<Callback>, TargetValue) = {
            let mut inner = self.lock();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks = inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (callbacks, inner.value.clone())
        };

        let mut first_error = None;
        for callback in &callbacks {
            if let Err(err) = callback(&value) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// RAII guard for a [`TargetAttribute`] subscriber.
pub struct AttributeSubscription {
    _guard: Callback,
}

impl fmt::Debug for AttributeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSubscription").finish_non_exhaustive()
    }
}

/// A view-side object that carries an action target attribute.
pub trait Subject: Send + Sync {
    /// The attribute holding this subject's resolved action target.
    fn action_target(&self) -> &TargetAttribute;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "element"
    }
}

/// Minimal concrete [`Subject`].
#[derive(Debug, Default)]
pub struct Element {
    name: String,
    action_target: TargetAttribute,
}

impl Element {
    /// Element whose target attribute is still unset.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_target(name, TargetValue::Unset)
    }

    #[must_use]
    pub fn with_target(name: impl Into<String>, target: impl Into<TargetValue>) -> Self {
        Self {
            name: name.into(),
            action_target: TargetAttribute::new(target.into()),
        }
    }
}

impl Subject for Element {
    fn action_target(&self) -> &TargetAttribute {
        &self.action_target
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Secondary source consulted when the subject has no target.
#[derive(Clone)]
pub enum BackupSubject {
    /// Another subject; its target attribute is read the same way.
    Subject(Arc<dyn Subject>),
    /// A plain target object used directly.
    Target(TargetRef),
}

impl fmt::Debug for BackupSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject(subject) => f.debug_tuple("Subject").field(&subject.name()).finish(),
            Self::Target(target) => f.debug_tuple("Target").field(target).finish(),
        }
    }
}

impl BackupSubject {
    fn target_value(&self) -> TargetValue {
        match self {
            Self::Subject(subject) => subject.action_target().get(),
            Self::Target(target) => TargetValue::Resolved(target.clone()),
        }
    }
}

/// Where an action reads its target from.
#[derive(Clone)]
pub(crate) enum TargetSource {
    Subject {
        subject: Arc<dyn Subject>,
        backup: Option<BackupSubject>,
    },
    Explicit(TargetValue),
}

impl TargetSource {
    /// Current target: the subject's attribute, falling back to the backup
    /// when the subject's target is absent.
    pub(crate) fn current(&self) -> TargetValue {
        match self {
            Self::Explicit(value) => value.clone(),
            Self::Subject { subject, backup } => match subject.action_target().get() {
                TargetValue::Absent => backup
                    .as_ref()
                    .map_or(TargetValue::Absent, BackupSubject::target_value),
                value => value,
            },
        }
    }

    /// Attributes whose changes can alter [`current`](Self::current).
    pub(crate) fn attributes(&self) -> Vec<TargetAttribute> {
        match self {
            Self::Explicit(_) => Vec::new(),
            Self::Subject { subject, backup } => {
                let mut attributes = vec![subject.action_target().clone()];
                if let Some(BackupSubject::Subject(backup)) = backup {
                    attributes.push(backup.action_target().clone());
                }
                attributes
            }
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Explicit(_) => "explicit target".to_owned(),
            Self::Subject { subject, .. } => subject.name().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::describe::TypeDescriptorBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Plain;

    impl ActionTarget for Plain {
        fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self> {
            builder
        }
    }

    fn plain() -> TargetRef {
        TargetRef::new(Arc::new(Plain))
    }

    #[test]
    fn identity_not_structure() {
        let a = plain();
        let b = plain();
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert!(TargetValue::from(a.clone()).same_as(&TargetValue::Resolved(a)));
        assert!(!TargetValue::Unset.same_as(&TargetValue::Absent));
        assert!(TargetValue::from(None).is_absent());
    }

    #[test]
    fn downcast_recovers_concrete_target() {
        let target = plain();
        assert!(target.downcast::<Plain>().is_some());
        assert!(target.downcast::<u8>().is_none());
        assert!(target.notifier().is_none());
    }

    #[test]
    fn set_same_value_is_noop() {
        let attr = TargetAttribute::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = attr.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let target = plain();
        attr.set(target.clone()).unwrap();
        attr.set(target).unwrap();
        attr.set(TargetValue::Absent).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(attr.version(), 2);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let attr = TargetAttribute::default();
        let sub = attr.subscribe(|_| Ok(()));
        assert_eq!(attr.subscriber_count(), 1);
        drop(sub);
        attr.set(TargetValue::Absent).unwrap();
        assert_eq!(attr.subscriber_count(), 0);
    }

    #[test]
    fn set_returns_first_error_after_notifying_all() {
        let attr = TargetAttribute::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _a = attr.subscribe(|_| {
            Err(ActionError::TargetNull {
                method: "A".into(),
                subject: "s".into(),
            })
        });
        let _b = attr.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = attr.set(TargetValue::Absent).unwrap_err();
        assert!(matches!(err, ActionError::TargetNull { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn source_falls_back_to_backup_only_when_absent() {
        let subject = Arc::new(Element::with_target("button", TargetValue::Absent));
        let backup = Arc::new(Element::with_target("window", plain()));
        let source = TargetSource::Subject {
            subject: subject.clone(),
            backup: Some(BackupSubject::Subject(backup.clone())),
        };
        assert!(source.current().as_target().is_some());
        assert_eq!(source.attributes().len(), 2);
        assert_eq!(source.describe(), "button");

        subject.action_target().set(TargetValue::Unset).unwrap();
        assert!(source.current().is_unset());

        let own = plain();
        subject.action_target().set(own.clone()).unwrap();
        assert!(source.current().as_target().unwrap().ptr_eq(&own));
    }

    #[test]
    fn plain_backup_is_used_directly() {
        let target = plain();
        let source = TargetSource::Subject {
            subject: Arc::new(Element::with_target("menu-item", TargetValue::Absent)),
            backup: Some(BackupSubject::Target(target.clone())),
        };
        assert!(source.current().as_target().unwrap().ptr_eq(&target));
        assert_eq!(source.attributes().len(), 1);
    }
}
