//! Target and method resolution.

use std::any::TypeId;
use std::sync::Arc;

use tracing::{debug, error};

use super::describe::MethodInfo;
use super::error::ActionError;
use super::target::{TargetRef, TargetValue};

/// Largest parameter count an action method may declare.
pub const MAX_ACTION_PARAMETERS: usize = 1;

/// Outcome of [`ActionResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Same target as before; nothing was recomputed.
    Unchanged,
    /// The target changed and the method binding was recomputed.
    Changed,
}

/// Tracks the current target of an action and the method bound on it.
///
/// The method lookup is reused while successive targets share a concrete
/// type, and recomputed whenever the type changes.
#[derive(Debug)]
pub struct ActionResolver {
    method_name: String,
    target: TargetValue,
    method: Option<Arc<MethodInfo>>,
    /// Last lookup, keyed by the concrete type it was made on.
    cached: Option<(TypeId, Option<Arc<MethodInfo>>)>,
}

impl ActionResolver {
    #[must_use]
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            target: TargetValue::Unset,
            method: None,
            cached: None,
        }
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[must_use]
    pub fn target(&self) -> &TargetValue {
        &self.target
    }

    /// The bound method, if the current target declares it.
    #[must_use]
    pub fn method(&self) -> Option<&Arc<MethodInfo>> {
        self.method.as_ref()
    }

    /// Switch to `target`.
    ///
    /// A method with too many parameters is rejected with
    /// [`ActionError::InvalidSignature`]; the previous target and method
    /// stay in place.
    pub fn resolve(&mut self, target: TargetValue) -> Result<Resolution, ActionError> {
        if target.same_as(&self.target) {
            return Ok(Resolution::Unchanged);
        }

        let method = match &target {
            TargetValue::Resolved(resolved) => self.lookup(resolved)?,
            TargetValue::Unset | TargetValue::Absent => None,
        };

        debug!(
            method = %self.method_name,
            target = ?target,
            bound = method.is_some(),
            "action target changed"
        );
        self.method = method;
        self.target = target;
        Ok(Resolution::Changed)
    }

    fn lookup(&mut self, target: &TargetRef) -> Result<Option<Arc<MethodInfo>>, ActionError> {
        let descriptor = target.descriptor();
        let cached = self
            .cached
            .as_ref()
            .filter(|(type_id, _)| *type_id == descriptor.target_type_id())
            .map(|(_, method)| method.clone());
        let method = match cached {
            Some(method) => method,
            None => {
                let method = descriptor.method(&self.method_name);
                self.cached = Some((descriptor.target_type_id(), method.clone()));
                method
            }
        };

        if let Some(method) = &method
            && method.parameter_count() > MAX_ACTION_PARAMETERS
        {
            let err = ActionError::InvalidSignature {
                method: self.method_name.clone(),
                target_type: descriptor.type_name(),
                parameter_count: method.parameter_count(),
            };
            error!(error = %err, "invalid action signature");
            return Err(err);
        }
        Ok(method)
    }
}
