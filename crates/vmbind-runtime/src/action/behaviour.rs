//! Policies for unavailable actions, and per-action configuration.

use std::fmt;
use std::str::FromStr;

/// What an action does when its target is null or lacks the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionUnavailableBehaviour {
    /// Report enabled; invoking is a silent no-op.
    Enable,
    /// Report disabled; invoking is a silent no-op.
    Disable,
    /// Report enabled; invoking fails loudly.
    Throw,
}

impl ActionUnavailableBehaviour {
    /// Enabled state reported while the action is unavailable.
    #[must_use]
    pub fn reports_enabled(self) -> bool {
        self != Self::Disable
    }

    /// Whether invoking an unavailable action is an error.
    #[must_use]
    pub fn throws(self) -> bool {
        self == Self::Throw
    }
}

impl fmt::Display for ActionUnavailableBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Throw => "throw",
        })
    }
}

/// Error returned when parsing an [`ActionUnavailableBehaviour`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBehaviourError {
    input: String,
}

impl fmt::Display for ParseBehaviourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown action behaviour '{}' (expected enable, disable or throw)",
            self.input
        )
    }
}

impl std::error::Error for ParseBehaviourError {}

impl FromStr for ActionUnavailableBehaviour {
    type Err = ParseBehaviourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "throw" => Ok(Self::Throw),
            _ => Err(ParseBehaviourError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Configuration for a command action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionConfig {
    /// Behaviour when the resolved target is null.
    pub target_null: ActionUnavailableBehaviour,
    /// Behaviour when the target has no method of the given name.
    pub action_non_existent: ActionUnavailableBehaviour,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            target_null: ActionUnavailableBehaviour::Disable,
            action_non_existent: ActionUnavailableBehaviour::Throw,
        }
    }
}

impl ActionConfig {
    #[must_use]
    pub fn new(
        target_null: ActionUnavailableBehaviour,
        action_non_existent: ActionUnavailableBehaviour,
    ) -> Self {
        Self {
            target_null,
            action_non_existent,
        }
    }

    /// Set the behaviour for a null target.
    #[must_use]
    pub fn with_target_null(mut self, behaviour: ActionUnavailableBehaviour) -> Self {
        self.target_null = behaviour;
        self
    }

    /// Set the behaviour for a missing method.
    #[must_use]
    pub fn with_action_non_existent(mut self, behaviour: ActionUnavailableBehaviour) -> Self {
        self.action_non_existent = behaviour;
        self
    }
}
