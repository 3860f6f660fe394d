//! Constitutional validation for proposed agent actions.
//!
//! A [`Constitution`] checks an [`ActionDescriptor`](gate_primitives::ActionDescriptor)
//! in four passes: fundamental principles, core rules, governance-tier
//! requirements, and advisory ethical guidelines. Core rules are lists of
//! named [`Condition`]s combined with AND; there is no OR or NOT.

#![warn(missing_docs, clippy::pedantic)]

pub mod condition;
pub mod engine;
pub mod rules;
pub mod validation;

pub use condition::Condition;
pub use engine::{Constitution, ConstitutionError, ConstitutionResult};
pub use rules::{
    ConstitutionalRule, EthicalGuideline, GovernanceTierSpec, GuidelineKind, Principle,
    PrincipleKind, RequiredAction, RuleSet, RuleSetOverrides, ToggleOverride,
};
pub use validation::{
    ConstitutionalReview, INVALID_GOVERNANCE_TIER, Severity, VALIDATION_ERROR, ValidationResult,
    Violation, Warning,
};
