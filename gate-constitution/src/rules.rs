//! Rule set: principles, core rules, governance tiers, and ethical guidelines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::engine::{ConstitutionError, ConstitutionResult};

/// What a matched core rule demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    /// The action must not proceed.
    Block,
    /// The action must be deferred to a higher authority.
    Escalate,
    /// The action needs further analysis before it can proceed.
    RequireAnalysis,
}

/// Named rule: if every condition holds, the rule is violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstitutionalRule {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    conditions: Vec<Condition>,
    required_action: RequiredAction,
}

impl ConstitutionalRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConstitutionError::InvalidRule`] when the id is empty or no
    /// conditions are given.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        conditions: Vec<Condition>,
        required_action: RequiredAction,
    ) -> ConstitutionResult<Self> {
        let rule = Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            conditions,
            required_action,
        };
        rule.validate()?;
        Ok(rule)
    }

    fn validate(&self) -> ConstitutionResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConstitutionError::InvalidRule("rule id cannot be empty"));
        }
        if self.conditions.is_empty() {
            return Err(ConstitutionError::InvalidRule(
                "rule must name at least one condition",
            ));
        }
        Ok(())
    }

    /// Rule identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Conditions combined with AND.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Action demanded when the rule matches.
    #[must_use]
    pub fn required_action(&self) -> RequiredAction {
        self.required_action
    }
}

/// Requirements attached to a governance tier.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceTierSpec {
    /// Tier name, lowercase.
    pub name: String,
    /// Actions must carry a prior human approval.
    #[serde(default)]
    pub approval_required: bool,
    /// Actions must be marked verified.
    #[serde(default)]
    pub verification_required: bool,
    /// Actions go before the committee.
    #[serde(default)]
    pub parliamentary_review: bool,
    /// Actions must be marked as constitutionally reviewed.
    #[serde(default)]
    pub constitutional_review: bool,
}

impl GovernanceTierSpec {
    fn new(name: &str, approval: bool, verification: bool, parliament: bool, review: bool) -> Self {
        Self {
            name: name.to_owned(),
            approval_required: approval,
            verification_required: verification,
            parliamentary_review: parliament,
            constitutional_review: review,
        }
    }
}

/// Fundamental principles checked before any core rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipleKind {
    /// Harmful actions need safety measures.
    Safety,
    /// Actions must be explainable.
    Transparency,
    /// Actions must not reduce user autonomy without consent.
    Autonomy,
}

impl PrincipleKind {
    /// Identifier used on violations.
    #[must_use]
    pub const fn rule_id(self) -> &'static str {
        match self {
            Self::Safety => "safety_principle",
            Self::Transparency => "transparency_principle",
            Self::Autonomy => "autonomy_principle",
        }
    }
}

/// A principle with its operator-facing description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principle {
    /// Which hard-coded check the principle drives.
    pub kind: PrincipleKind,
    /// Operator-facing description.
    pub description: String,
    /// Disabled principles are skipped.
    pub enabled: bool,
}

/// Advisory ethical checks; they only ever produce warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidelineKind {
    /// Personal data should only be touched with consent.
    Privacy,
    /// User-facing changes should be reviewed for fairness.
    Fairness,
}

impl GuidelineKind {
    /// Identifier used on warnings.
    #[must_use]
    pub const fn guideline_id(self) -> &'static str {
        match self {
            Self::Privacy => "privacy_guideline",
            Self::Fairness => "fairness_guideline",
        }
    }
}

/// An ethical guideline with its operator-facing description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthicalGuideline {
    /// Which hard-coded check the guideline drives.
    pub kind: GuidelineKind,
    /// Operator-facing description.
    pub description: String,
    /// Disabled guidelines are skipped.
    pub enabled: bool,
}

/// Complete, read-only rule set held by a constitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    principles: Vec<Principle>,
    core_rules: Vec<ConstitutionalRule>,
    governance_tiers: BTreeMap<String, GovernanceTierSpec>,
    ethical_guidelines: Vec<EthicalGuideline>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let principles = vec![
            principle(
                PrincipleKind::Safety,
                "Actions that could cause harm must carry safety measures",
            ),
            principle(
                PrincipleKind::Transparency,
                "Actions must be explainable to the people they affect",
            ),
            principle(
                PrincipleKind::Autonomy,
                "Actions must not reduce user autonomy without consent",
            ),
        ];

        let core_rules = vec![
            rule(
                "protect_user_data",
                "Protect user data",
                "Access to user data must be logged",
                &[Condition::InvolvesUserData, Condition::NotLogged],
                RequiredAction::Block,
            ),
            rule(
                "opaque_high_risk",
                "No opaque high-risk actions",
                "High-risk actions must be explainable",
                &[Condition::RiskIsHigh, Condition::NotExplainable],
                RequiredAction::Block,
            ),
            rule(
                "irreversible_high_risk",
                "Irreversible high-risk changes",
                "Permanent high-risk changes need a higher authority",
                &[Condition::RiskIsHigh, Condition::PermanentChange],
                RequiredAction::Escalate,
            ),
            rule(
                "user_autonomy",
                "Preserve user autonomy",
                "User-facing changes that reduce autonomy need a higher authority",
                &[Condition::ReducesAutonomy, Condition::AffectsUsers],
                RequiredAction::Escalate,
            ),
            rule(
                "failure_analysis",
                "Analyse failures",
                "Retrying a failed action requires root-cause analysis",
                &[Condition::ActionFailed],
                RequiredAction::RequireAnalysis,
            ),
            rule(
                "resource_stewardship",
                "Resource stewardship",
                "Unnecessary actions must not consume significant resources",
                &[Condition::HighResourceUsage, Condition::Unnecessary],
                RequiredAction::Block,
            ),
        ];

        let governance_tiers = [
            GovernanceTierSpec::new("low", false, false, false, false),
            GovernanceTierSpec::new("standard", false, false, false, false),
            GovernanceTierSpec::new("high", false, false, true, false),
            GovernanceTierSpec::new("critical", true, true, true, true),
        ]
        .into_iter()
        .map(|tier| (tier.name.clone(), tier))
        .collect();

        let ethical_guidelines = vec![
            EthicalGuideline {
                kind: GuidelineKind::Privacy,
                description: "Personal data should only be processed with user consent".into(),
                enabled: true,
            },
            EthicalGuideline {
                kind: GuidelineKind::Fairness,
                description: "User-facing changes should be reviewed for fair treatment".into(),
                enabled: true,
            },
        ];

        Self {
            principles,
            core_rules,
            governance_tiers,
            ethical_guidelines,
        }
    }
}

fn principle(kind: PrincipleKind, description: &str) -> Principle {
    Principle {
        kind,
        description: description.to_owned(),
        enabled: true,
    }
}

fn rule(
    id: &str,
    name: &str,
    description: &str,
    conditions: &[Condition],
    required_action: RequiredAction,
) -> ConstitutionalRule {
    ConstitutionalRule {
        id: id.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
        conditions: conditions.to_vec(),
        required_action,
    }
}

impl RuleSet {
    /// Enabled principles.
    pub fn principles(&self) -> impl Iterator<Item = &Principle> {
        self.principles.iter().filter(|principle| principle.enabled)
    }

    /// Core rules in evaluation order.
    #[must_use]
    pub fn core_rules(&self) -> &[ConstitutionalRule] {
        &self.core_rules
    }

    /// Looks up a core rule by id.
    #[must_use]
    pub fn core_rule(&self, id: &str) -> Option<&ConstitutionalRule> {
        self.core_rules.iter().find(|rule| rule.id == id)
    }

    /// Looks up a governance tier.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&GovernanceTierSpec> {
        self.governance_tiers.get(name)
    }

    /// All governance tiers keyed by name.
    #[must_use]
    pub fn tiers(&self) -> &BTreeMap<String, GovernanceTierSpec> {
        &self.governance_tiers
    }

    /// Enabled ethical guidelines.
    pub fn ethical_guidelines(&self) -> impl Iterator<Item = &EthicalGuideline> {
        self.ethical_guidelines
            .iter()
            .filter(|guideline| guideline.enabled)
    }

    /// Merges externally supplied overrides over this rule set.
    ///
    /// Rules and tiers with a matching id/name are replaced, new ones are
    /// appended, and listed rule ids are removed. Principles and guidelines
    /// can only be toggled or re-described since their checks are built in.
    ///
    /// # Errors
    ///
    /// Returns [`ConstitutionError::InvalidRule`] when the merged set contains
    /// an invalid rule or tier.
    pub fn merge(mut self, overrides: RuleSetOverrides) -> ConstitutionResult<Self> {
        for rule in overrides.core_rules {
            rule.validate()?;
            match self.core_rules.iter_mut().find(|existing| existing.id == rule.id) {
                Some(existing) => *existing = rule,
                None => self.core_rules.push(rule),
            }
        }

        self.core_rules
            .retain(|rule| !overrides.disabled_rules.contains(&rule.id));

        for mut tier in overrides.governance_tiers {
            tier.name = tier.name.trim().to_ascii_lowercase();
            if tier.name.is_empty() {
                return Err(ConstitutionError::InvalidRule("tier name cannot be empty"));
            }
            self.governance_tiers.insert(tier.name.clone(), tier);
        }

        for item in overrides.principles {
            if let Some(principle) = self.principles.iter_mut().find(|p| p.kind == item.kind) {
                apply_toggle(&mut principle.enabled, &mut principle.description, item);
            }
        }

        for item in overrides.ethical_guidelines {
            if let Some(guideline) = self
                .ethical_guidelines
                .iter_mut()
                .find(|g| g.kind == item.kind)
            {
                apply_toggle(&mut guideline.enabled, &mut guideline.description, item);
            }
        }

        Ok(self)
    }
}

fn apply_toggle<K>(enabled: &mut bool, description: &mut String, item: ToggleOverride<K>) {
    if let Some(flag) = item.enabled {
        *enabled = flag;
    }
    if let Some(text) = item.description {
        *description = text;
    }
}

/// Toggle or re-describe a built-in principle or guideline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOverride<K> {
    /// Which built-in entry to change.
    pub kind: K,
    /// New enable switch, if any.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// New description, if any.
    #[serde(default)]
    pub description: Option<String>,
}

/// Declarative overrides merged over the built-in rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetOverrides {
    /// Rules to add or replace by id.
    pub core_rules: Vec<ConstitutionalRule>,
    /// Rule ids to remove.
    pub disabled_rules: Vec<String>,
    /// Tiers to add or replace by name.
    pub governance_tiers: Vec<GovernanceTierSpec>,
    /// Principle toggles.
    pub principles: Vec<ToggleOverride<PrincipleKind>>,
    /// Guideline toggles.
    pub ethical_guidelines: Vec<ToggleOverride<GuidelineKind>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_cover_standard_tiers() {
        let rules = RuleSet::default();
        for tier in ["low", "standard", "high", "critical"] {
            assert!(rules.tier(tier).is_some(), "missing tier {tier}");
        }
        assert!(rules.tier("critical").unwrap().parliamentary_review);
        assert!(!rules.tier("low").unwrap().approval_required);
    }

    #[test]
    fn overrides_replace_append_and_disable() {
        let overrides: RuleSetOverrides = serde_json::from_value(json!({
            "core_rules": [
                {
                    "id": "protect_user_data",
                    "name": "Protect user data",
                    "conditions": ["involves_user_data"],
                    "required_action": "escalate"
                },
                {
                    "id": "no_blind_deletes",
                    "name": "No blind deletes",
                    "conditions": ["permanent_change", "not_logged"],
                    "required_action": "block"
                }
            ],
            "disabled_rules": ["failure_analysis"],
            "governance_tiers": [{ "name": "Sandbox" }],
            "principles": [{ "kind": "autonomy", "enabled": false }]
        }))
        .unwrap();

        let rules = RuleSet::default().merge(overrides).unwrap();

        let replaced = rules.core_rule("protect_user_data").unwrap();
        assert_eq!(replaced.required_action(), RequiredAction::Escalate);
        assert_eq!(replaced.conditions(), [Condition::InvolvesUserData]);
        assert!(rules.core_rule("no_blind_deletes").is_some());
        assert!(rules.core_rule("failure_analysis").is_none());
        assert!(rules.tier("sandbox").is_some());
        assert!(rules.principles().all(|p| p.kind != PrincipleKind::Autonomy));
    }

    #[test]
    fn empty_condition_list_is_rejected() {
        let overrides = RuleSetOverrides {
            core_rules: vec![rule("bad", "Bad", "", &[], RequiredAction::Block)],
            ..RuleSetOverrides::default()
        };
        let err = RuleSet::default().merge(overrides).unwrap_err();
        assert!(matches!(err, ConstitutionError::InvalidRule(_)));
    }
}
