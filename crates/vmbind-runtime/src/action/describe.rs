//! Name-based method and property tables for action targets.
//!
//! Actions find their method and guard property by name on an object whose
//! concrete type is only known at runtime. Each target type registers a
//! [`TypeDescriptor`] once, through [`ActionTarget::describe`]; lookups are
//! then plain map reads.
//!
//! # Invariants
//!
//! 1. A descriptor is built at most once per concrete type per process
//!    (cached by `TypeId` in [`descriptor_of`]).
//! 2. Property getters are typed: [`PropertyInfo::getter`] only succeeds
//!    for the exact declared value type.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vmbind_runtime::action::{ActionTarget, TypeDescriptorBuilder, descriptor_of};
//!
//! struct Counter;
//!
//! impl ActionTarget for Counter {
//!     fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self> {
//!         builder
//!             .method0("Reset", |_c: &Counter| {})
//!             .property("CanReset", |_c: &Counter| true)
//!     }
//! }
//!
//! let desc = descriptor_of::<Counter>();
//! assert_eq!(desc.type_name(), "Counter");
//! assert_eq!(desc.method("Reset").map(|m| m.parameter_count()), Some(0));
//! assert!(desc.property("CanReset").is_some_and(|p| p.is::<bool>()));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use vmbind_core::NotifyPropertyChanged;

use super::error::BoxError;

/// Type-erased target object.
pub type AnyObject = dyn Any + Send + Sync;

/// Argument handed to a one-parameter action method.
#[derive(Clone, Default)]
pub struct Parameter(Option<Arc<AnyObject>>);

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Parameter(..)"),
            None => f.write_str("Parameter(None)"),
        }
    }
}

impl Parameter {
    /// No argument.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the argument as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

/// Conversion of a method's return value into an invocation result.
pub trait IntoInvokeResult {
    fn into_invoke_result(self) -> Result<(), BoxError>;
}

impl IntoInvokeResult for () {
    fn into_invoke_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoInvokeResult for Result<(), E> {
    fn into_invoke_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

type Invoker = Box<dyn Fn(&AnyObject, &[Parameter]) -> Result<(), BoxError> + Send + Sync>;

/// A named method on a target type.
pub struct MethodInfo {
    name: String,
    parameters: Vec<String>,
    invoker: Invoker,
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl MethodInfo {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, in order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Call the method on `object`. Missing arguments are passed as
    /// [`Parameter::none`].
    pub fn invoke(&self, object: &AnyObject, args: &[Parameter]) -> Result<(), BoxError> {
        (self.invoker)(object, args)
    }
}

struct TypedGetter<V>(Box<dyn Fn(&AnyObject) -> Option<V> + Send + Sync>);

/// Typed read access to a property, shareable across threads.
pub type Getter<V> = Arc<dyn Fn(&AnyObject) -> Option<V> + Send + Sync>;

/// A named, typed property on a target type.
pub struct PropertyInfo {
    name: String,
    value_type: TypeId,
    value_type_name: &'static str,
    getter: Arc<AnyObject>,
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("value_type", &self.value_type_name)
            .finish_non_exhaustive()
    }
}

impl PropertyInfo {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the declared value type.
    #[must_use]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }

    /// Whether the declared value type is exactly `V`.
    #[must_use]
    pub fn is<V: 'static>(&self) -> bool {
        self.value_type == TypeId::of::<V>()
    }

    /// Typed getter, if the declared value type is exactly `V`.
    #[must_use]
    pub fn getter<V: Send + 'static>(&self) -> Option<Getter<V>> {
        let typed = Arc::clone(&self.getter)
            .downcast::<TypedGetter<V>>()
            .ok()?;
        Some(Arc::new(move |object: &AnyObject| (typed.0)(object)))
    }
}

/// Method and property table of one concrete target type.
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    methods: HashMap<String, Arc<MethodInfo>>,
    properties: HashMap<String, Arc<PropertyInfo>>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        let mut properties: Vec<_> = self.properties.keys().collect();
        properties.sort();
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("methods", &methods)
            .field("properties", &properties)
            .finish()
    }
}

impl TypeDescriptor {
    /// `TypeId` of the described target type.
    #[must_use]
    pub fn target_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Short (unqualified) type name, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<Arc<MethodInfo>> {
        self.methods.get(name).cloned()
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<Arc<PropertyInfo>> {
        self.properties.get(name).cloned()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Builder for the [`TypeDescriptor`] of `T`.
pub struct TypeDescriptorBuilder<T> {
    methods: HashMap<String, Arc<MethodInfo>>,
    properties: HashMap<String, Arc<PropertyInfo>>,
    _target: PhantomData<fn(&T)>,
}

impl<T: Send + Sync + 'static> Default for TypeDescriptorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> TypeDescriptorBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            properties: HashMap::new(),
            _target: PhantomData,
        }
    }

    /// Register a method with any number of named parameters.
    ///
    /// Registering the same name twice keeps the last registration.
    #[must_use]
    pub fn method<R, F>(mut self, name: &str, parameters: &[&str], f: F) -> Self
    where
        R: IntoInvokeResult,
        F: Fn(&T, &[Parameter]) -> R + Send + Sync + 'static,
    {
        let arity = parameters.len();
        let invoker: Invoker = Box::new(move |object: &AnyObject, args: &[Parameter]| {
            let target = object
                .downcast_ref::<T>()
                .ok_or_else(|| BoxError::from(format!("receiver is not a {}", short_type_name::<T>())))?;
            let mut padded = args.to_vec();
            padded.resize(arity, Parameter::none());
            f(target, &padded).into_invoke_result()
        });
        self.methods.insert(
            name.to_owned(),
            Arc::new(MethodInfo {
                name: name.to_owned(),
                parameters: parameters.iter().map(|p| (*p).to_owned()).collect(),
                invoker,
            }),
        );
        self
    }

    /// Register a method taking no parameters.
    #[must_use]
    pub fn method0<R, F>(self, name: &str, f: F) -> Self
    where
        R: IntoInvokeResult,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.method(name, &[], move |target: &T, _args: &[Parameter]| f(target))
    }

    /// Register a method taking one parameter.
    #[must_use]
    pub fn method1<R, F>(self, name: &str, parameter: &str, f: F) -> Self
    where
        R: IntoInvokeResult,
        F: Fn(&T, Parameter) -> R + Send + Sync + 'static,
    {
        self.method(name, &[parameter], move |target: &T, args: &[Parameter]| {
            f(target, args.first().cloned().unwrap_or_default())
        })
    }

    /// Register a readable property of type `V`.
    #[must_use]
    pub fn property<V, G>(mut self, name: &str, getter: G) -> Self
    where
        V: Send + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let typed = TypedGetter::<V>(Box::new(move |object: &AnyObject| {
            object.downcast_ref::<T>().map(&getter)
        }));
        self.properties.insert(
            name.to_owned(),
            Arc::new(PropertyInfo {
                name: name.to_owned(),
                value_type: TypeId::of::<V>(),
                value_type_name: short_type_name::<V>(),
                getter: Arc::new(typed),
            }),
        );
        self
    }

    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
            methods: self.methods,
            properties: self.properties,
        }
    }
}

/// An object actions can be bound to.
pub trait ActionTarget: Send + Sync + Sized + 'static {
    /// Declare the methods and properties reachable by name.
    fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self>;

    /// Change-notification view of this object, if it raises property
    /// changes. Notifying targets return `Some(self)`.
    fn as_notifier(self: Arc<Self>) -> Option<Arc<dyn NotifyPropertyChanged>> {
        None
    }
}

type DescriptorCache = RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>;

static DESCRIPTORS: OnceLock<DescriptorCache> = OnceLock::new();

/// Cached descriptor of `T`, built on first use.
pub fn descriptor_of<T: ActionTarget>() -> Arc<TypeDescriptor> {
    let cache = DESCRIPTORS.get_or_init(DescriptorCache::default);
    let key = TypeId::of::<T>();
    if let Some(found) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Arc::clone(found);
    }

    // Build outside the lock; `describe` is user code.
    let built = Arc::new(T::describe(TypeDescriptorBuilder::new()).build());
    let mut cache = cache.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(cache.entry(key).or_insert(built))
}
