//! Errors raised while resolving or invoking an action.

use std::fmt;

/// Boxed error returned by target methods.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from action resolution and invocation.
#[derive(Debug)]
pub enum ActionError {
    /// The target method takes more than one parameter.
    InvalidSignature {
        method: String,
        target_type: &'static str,
        parameter_count: usize,
    },
    /// The action was invoked before its target attribute was ever set.
    TargetNotSet { method: String, subject: String },
    /// The resolved target is null and the policy is `Throw`.
    TargetNull { method: String, subject: String },
    /// The target has no such method and the policy is `Throw`.
    ActionMissing {
        method: String,
        target_type: &'static str,
    },
    /// The target method itself failed.
    Invocation {
        method: String,
        target_type: &'static str,
        source: BoxError,
    },
}

impl ActionError {
    /// Whether this error is a configuration bug rather than a failure
    /// raised by the target method.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Invocation { .. })
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature {
                method,
                target_type,
                parameter_count,
            } => write!(
                f,
                "method {method} on {target_type} must have zero or one parameters, found {parameter_count}"
            ),
            Self::TargetNotSet { method, subject } => write!(
                f,
                "action target on {subject} was never set (method name is {method})"
            ),
            Self::TargetNull { method, subject } => write!(
                f,
                "action target on {subject} is null (method name is {method})"
            ),
            Self::ActionMissing {
                method,
                target_type,
            } => write!(f, "unable to find method {method} on {target_type}"),
            Self::Invocation {
                method,
                target_type,
                source,
            } => write!(f, "method {method} on {target_type} failed: {source}"),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invocation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
