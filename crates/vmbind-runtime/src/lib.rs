#![forbid(unsafe_code)]

//! Runtime: name-bound command actions with guard-driven enabled state.
//!
//! # Role in vmbind
//! `vmbind-runtime` is where view-side triggers meet presentation objects.
//! A button asks a [`CommandAction`] whether it may run and asks it to run;
//! the action finds the method by name on the current target and keeps its
//! enabled state in step with the target's guard property.
//!
//! # How it fits in the system
//! Property-change observation, weak bindings and UI-thread marshalling come
//! from `vmbind-core`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use vmbind_runtime::action::{
//!     ActionConfig, ActionTarget, CommandAction, Element, Parameter, Subject,
//!     TypeDescriptorBuilder,
//! };
//! use vmbind_core::ImmediateExecutor;
//!
//! #[derive(Default)]
//! struct Document {
//!     saved: AtomicBool,
//! }
//!
//! impl ActionTarget for Document {
//!     fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self> {
//!         builder.method0("Save", |d: &Document| d.saved.store(true, Ordering::SeqCst))
//!     }
//! }
//!
//! let doc = Arc::new(Document::default());
//! let button = Arc::new(Element::new("save-button"));
//! let subject: Arc<dyn Subject> = button.clone();
//! let action = CommandAction::new(
//!     subject,
//!     None,
//!     "Save",
//!     ActionConfig::default(),
//!     Arc::new(ImmediateExecutor),
//! )?;
//!
//! button.action_target().set(vmbind_runtime::action::TargetRef::new(doc.clone()))?;
//! assert!(action.can_execute());
//! action.execute(Parameter::none())?;
//! assert!(doc.saved.load(Ordering::SeqCst));
//! # Ok::<(), vmbind_runtime::action::ActionError>(())
//! ```

pub mod action;

pub use action::{
    ActionConfig, ActionError, ActionTarget, ActionUnavailableBehaviour, BackupSubject,
    CommandAction, Element, Parameter, Subject, TargetAttribute, TargetRef, TargetValue,
};
