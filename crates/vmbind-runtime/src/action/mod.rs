#![forbid(unsafe_code)]

//! Command actions for vmbind.
//!
//! A [`CommandAction`] binds a method name (`Save`) to whatever target its
//! subject currently resolves to, and reports an enabled state driven by
//! the target's `CanSave` guard property:
//!
//! - [`TargetAttribute`] / [`Subject`]: where targets come from.
//! - [`ActionTarget`] / [`TypeDescriptor`]: name-based method and property
//!   tables, registered once per target type.
//! - [`ActionResolver`]: target-to-method binding with signature checks.
//! - [`GuardObserver`]: guard accessor plus weak change subscription.
//! - [`ActionConfig`]: what to do when the target or method is missing.
//!
//! # Invariants
//!
//! 1. An action never keeps its target alive through its guard
//!    subscription; only the accessor of the current target is held.
//! 2. Enabled-changed listeners run through the action's [`UiExecutor`].
//! 3. A rejected target (bad signature) leaves the previous binding intact.
//!
//! [`UiExecutor`]: vmbind_core::UiExecutor

pub mod behaviour;
pub mod command;
pub mod describe;
pub mod error;
pub mod guard;
pub mod resolver;
pub mod target;

pub use behaviour::{ActionConfig, ActionUnavailableBehaviour, ParseBehaviourError};
pub use command::{CommandAction, ListenerSubscription};
pub use describe::{
    ActionTarget, AnyObject, Getter, IntoInvokeResult, MethodInfo, Parameter, PropertyInfo,
    TypeDescriptor, TypeDescriptorBuilder, descriptor_of,
};
pub use error::{ActionError, BoxError};
pub use guard::{GUARD_PREFIX, GuardAccessor, GuardObserver};
pub use resolver::{ActionResolver, MAX_ACTION_PARAMETERS, Resolution};
pub use target::{
    AttributeSubscription, BackupSubject, Element, Subject, TargetAttribute, TargetRef,
    TargetValue,
};
