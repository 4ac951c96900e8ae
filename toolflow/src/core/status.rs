//! Tool call status and confirmation outcome enums.

use crate::errors::OrchestrationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Resolving the tool and checking argument shape.
    Validating,
    /// Waiting for a confirmation outcome.
    AwaitingApproval,
    /// The tool is running.
    Executing,
    /// The tool finished successfully.
    Success,
    /// Resolution or execution failed.
    Error,
    /// The call was cancelled.
    Cancelled,
}

impl Default for ToolCallStatus {
    fn default() -> Self {
        Self::Validating
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::AwaitingApproval => write!(f, "awaiting_approval"),
            Self::Executing => write!(f, "executing"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl ToolCallStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }

    /// Returns true if the call still counts as live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving to `next` follows the lifecycle graph.
    ///
    /// `validating → awaiting_approval | executing | error | cancelled`,
    /// `awaiting_approval → executing | cancelled`,
    /// `executing → success | error | cancelled`. Terminal states never move.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Validating => matches!(
                next,
                Self::AwaitingApproval | Self::Executing | Self::Error | Self::Cancelled
            ),
            Self::AwaitingApproval => matches!(next, Self::Executing | Self::Cancelled),
            Self::Executing => matches!(next, Self::Success | Self::Error | Self::Cancelled),
            Self::Success | Self::Error | Self::Cancelled => false,
        }
    }
}

/// The caller's decision for one pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// Run this call only.
    ProceedOnce,
    /// Run this call and trust the tool for the rest of the session.
    ProceedAlways,
    /// The caller will edit the arguments and confirm again.
    ModifyWithEditor,
    /// Do not run the call.
    Cancel,
}

impl ConfirmationOutcome {
    /// All recognized outcomes.
    pub const ALL: [Self; 4] = [
        Self::ProceedOnce,
        Self::ProceedAlways,
        Self::ModifyWithEditor,
        Self::Cancel,
    ];

    /// Returns true for outcomes that let the call run.
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::ProceedOnce | Self::ProceedAlways)
    }
}

impl fmt::Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProceedOnce => write!(f, "proceed_once"),
            Self::ProceedAlways => write!(f, "proceed_always"),
            Self::ModifyWithEditor => write!(f, "modify_with_editor"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

impl FromStr for ConfirmationOutcome {
    type Err = OrchestrationError;

    /// Accepts snake_case, kebab-case and camelCase spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "proceedonce" => Ok(Self::ProceedOnce),
            "proceedalways" => Ok(Self::ProceedAlways),
            "modifywitheditor" => Ok(Self::ModifyWithEditor),
            "cancel" => Ok(Self::Cancel),
            _ => Err(OrchestrationError::invalid_argument(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ToolCallStatus::Validating.to_string(), "validating");
        assert_eq!(ToolCallStatus::AwaitingApproval.to_string(), "awaiting_approval");
        assert_eq!(ToolCallStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(ToolCallStatus::Success.is_terminal());
        assert!(ToolCallStatus::Error.is_terminal());
        assert!(ToolCallStatus::Cancelled.is_terminal());
        assert!(!ToolCallStatus::Validating.is_terminal());
        assert!(!ToolCallStatus::AwaitingApproval.is_terminal());
        assert!(!ToolCallStatus::Executing.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use ToolCallStatus::*;

        assert!(Validating.can_transition_to(AwaitingApproval));
        assert!(Validating.can_transition_to(Executing));
        assert!(AwaitingApproval.can_transition_to(Cancelled));
        assert!(Executing.can_transition_to(Success));

        assert!(!Executing.can_transition_to(AwaitingApproval));
        assert!(!AwaitingApproval.can_transition_to(Validating));
        assert!(!AwaitingApproval.can_transition_to(Success));
        for terminal in [Success, Error, Cancelled] {
            for next in [Validating, AwaitingApproval, Executing, Success, Error, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&ToolCallStatus::AwaitingApproval).unwrap();
        assert_eq!(json, r#""awaiting_approval""#);

        let back: ToolCallStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ToolCallStatus::AwaitingApproval);
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!(
            "proceed_once".parse::<ConfirmationOutcome>().unwrap(),
            ConfirmationOutcome::ProceedOnce
        );
        assert_eq!(
            "proceedAlways".parse::<ConfirmationOutcome>().unwrap(),
            ConfirmationOutcome::ProceedAlways
        );
        assert_eq!(
            "modify-with-editor".parse::<ConfirmationOutcome>().unwrap(),
            ConfirmationOutcome::ModifyWithEditor
        );
        assert_eq!(
            " CANCEL ".parse::<ConfirmationOutcome>().unwrap(),
            ConfirmationOutcome::Cancel
        );
    }

    #[test]
    fn test_outcome_parse_rejects_unknown() {
        let err = "approve".parse::<ConfirmationOutcome>().unwrap_err();
        assert_eq!(err, OrchestrationError::invalid_argument("approve"));
    }

    #[test]
    fn test_outcome_display_round_trips_through_parse() {
        for outcome in ConfirmationOutcome::ALL {
            assert_eq!(outcome.to_string().parse::<ConfirmationOutcome>().unwrap(), outcome);
        }
    }
}
