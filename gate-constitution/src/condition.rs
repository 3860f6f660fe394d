//! Named predicates over an action descriptor.
//!
//! The vocabulary is closed: rules can only name these conditions, and a
//! rule holds when every one of its conditions holds.

use std::fmt::{self, Display, Formatter};

use gate_primitives::ActionDescriptor;
use serde::{Deserialize, Serialize};

/// A boolean predicate evaluated against an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Risk level is `high` or `critical`.
    RiskIsHigh,
    /// The action touches personal data.
    InvolvesUserData,
    /// End users observe the action's effects.
    AffectsUsers,
    /// The action is explicitly marked as not explainable.
    NotExplainable,
    /// The action narrows user choices.
    ReducesAutonomy,
    /// The change cannot be rolled back.
    PermanentChange,
    /// A previous attempt failed.
    ActionFailed,
    /// The action is explicitly marked as not logged.
    NotLogged,
    /// The action consumes an unusual amount of resources.
    HighResourceUsage,
    /// The action is explicitly marked as not necessary.
    Unnecessary,
}

impl Condition {
    /// Evaluates the predicate.
    #[must_use]
    pub fn holds(self, action: &ActionDescriptor) -> bool {
        let flags = action.flags();
        match self {
            Self::RiskIsHigh => action.risk_level().is_high(),
            Self::InvolvesUserData => flags.involves_user_data,
            Self::AffectsUsers => flags.affects_users,
            Self::NotExplainable => flags.explainable == Some(false),
            Self::ReducesAutonomy => flags.reduces_autonomy,
            Self::PermanentChange => flags.permanent_change,
            Self::ActionFailed => flags.failed,
            Self::NotLogged => flags.logged == Some(false),
            Self::HighResourceUsage => flags.high_resource_usage,
            Self::Unnecessary => flags.necessary == Some(false),
        }
    }

    /// Canonical snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RiskIsHigh => "risk_is_high",
            Self::InvolvesUserData => "involves_user_data",
            Self::AffectsUsers => "affects_users",
            Self::NotExplainable => "not_explainable",
            Self::ReducesAutonomy => "reduces_autonomy",
            Self::PermanentChange => "permanent_change",
            Self::ActionFailed => "action_failed",
            Self::NotLogged => "not_logged",
            Self::HighResourceUsage => "high_resource_usage",
            Self::Unnecessary => "unnecessary",
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` when every condition holds. An empty list never holds.
#[must_use]
pub fn all_hold(conditions: &[Condition], action: &ActionDescriptor) -> bool {
    !conditions.is_empty() && conditions.iter().all(|condition| condition.holds(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_primitives::RiskLevel;

    #[test]
    fn tri_state_conditions_need_explicit_false() {
        let mut action = ActionDescriptor::new("sample");
        assert!(!Condition::NotLogged.holds(&action));

        action.flags_mut().logged = Some(true);
        assert!(!Condition::NotLogged.holds(&action));

        action.flags_mut().logged = Some(false);
        assert!(Condition::NotLogged.holds(&action));
    }

    #[test]
    fn conditions_combine_with_and() {
        let mut action = ActionDescriptor::new("sample").with_risk_level(RiskLevel::Critical);
        let conditions = [Condition::RiskIsHigh, Condition::PermanentChange];
        assert!(!all_hold(&conditions, &action));

        action.flags_mut().permanent_change = true;
        assert!(all_hold(&conditions, &action));
        assert!(!all_hold(&[], &action));
    }

    #[test]
    fn unknown_condition_names_fail_to_deserialize() {
        let parsed: Result<Condition, _> = serde_json::from_str("\"risk_level == 'high'\"");
        assert!(parsed.is_err());
        let parsed: Condition = serde_json::from_str("\"not_logged\"").unwrap();
        assert_eq!(parsed, Condition::NotLogged);
    }
}
