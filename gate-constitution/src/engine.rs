//! Constitution: validation and review of action descriptors.

use std::fmt;
use std::sync::Arc;

use gate_primitives::{ActionDescriptor, Error as PrimitiveError};
use gate_telemetry::{AuditRecord, AuditSink, append_or_warn};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::condition::all_hold;
use crate::rules::{GuidelineKind, PrincipleKind, RequiredAction, RuleSet, RuleSetOverrides};
use crate::validation::{
    ConstitutionalReview, INVALID_GOVERNANCE_TIER, Severity, ValidationResult, Violation, Warning,
};

/// Errors surfaced by the constitution.
#[derive(Debug, Error)]
pub enum ConstitutionError {
    /// Rule configuration error.
    #[error("invalid constitutional rule: {0}")]
    InvalidRule(&'static str),
    /// The action descriptor could not be evaluated.
    #[error(transparent)]
    Descriptor(#[from] PrimitiveError),
}

/// Result alias for constitution operations.
pub type ConstitutionResult<T> = Result<T, ConstitutionError>;

/// Single source of truth for whether an action is constitutionally
/// permissible. The rule set is immutable once constructed.
#[derive(Clone)]
pub struct Constitution {
    rules: Arc<RuleSet>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl fmt::Debug for Constitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constitution")
            .field("core_rules", &self.rules.core_rules().len())
            .field("tiers", &self.rules.tiers().len())
            .field("audit_configured", &self.audit.is_some())
            .finish()
    }
}

impl Default for Constitution {
    fn default() -> Self {
        Self {
            rules: Arc::new(RuleSet::default()),
            audit: None,
        }
    }
}

impl Constitution {
    /// Creates a constitution from an explicit rule set.
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
            audit: None,
        }
    }

    /// Creates a constitution from the built-in rules merged with overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConstitutionError::InvalidRule`] when an override is invalid.
    pub fn with_overrides(overrides: RuleSetOverrides) -> ConstitutionResult<Self> {
        Ok(Self::new(RuleSet::default().merge(overrides)?))
    }

    /// Installs the audit sink that receives violation records.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Returns the active rule set.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validates an action. Never fails: an evaluation error is reported as a
    /// single `validation_error` violation.
    ///
    /// `context` may override descriptor flags by name.
    #[must_use]
    pub fn validate(&self, action: &ActionDescriptor, context: &Map<String, Value>) -> ValidationResult {
        match self.try_validate(action, context) {
            Ok(result) => result,
            Err(err) => {
                warn!(action = %action.label(), %err, "constitutional evaluation failed");
                ValidationResult::evaluation_error(action.governance_tier().clone(), &err.to_string())
            }
        }
    }

    /// Validates an action and decides whether it needs the committee or a
    /// higher authority.
    pub async fn review(
        &self,
        action: &ActionDescriptor,
        context: &Map<String, Value>,
    ) -> ConstitutionalReview {
        let validation = self.validate(action, context);

        let tier_wants_parliament = self
            .rules
            .tier(validation.governance_tier().as_str())
            .is_some_and(|tier| tier.parliamentary_review);
        let requires_parliament = validation.has_high_severity() || tier_wants_parliament;
        let requires_escalation = validation
            .violations()
            .iter()
            .any(|v| v.required_action == Some(RequiredAction::Escalate));

        let mut recommendations: Vec<String> = validation
            .violations()
            .iter()
            .map(|v| format!("resolve `{}`: {}", v.rule_id, v.message))
            .collect();
        recommendations.extend(
            validation
                .warnings()
                .iter()
                .map(|w| format!("consider `{}`: {}", w.guideline_id, w.message)),
        );
        if requires_escalation {
            recommendations.push("escalate to a human operator".into());
        }
        if requires_parliament {
            recommendations.push("submit for parliamentary review".into());
        }

        if !validation.passed() {
            let record = AuditRecord::new("constitution", "rule_violation", action.label())
                .with_payload(json!({
                    "tier": validation.governance_tier().as_str(),
                    "violations": validation.violations(),
                }))
                .with_result("violation");
            append_or_warn(self.audit.as_ref(), record).await;
        }

        ConstitutionalReview {
            validation,
            requires_parliament,
            requires_escalation,
            recommendations,
        }
    }

    fn try_validate(
        &self,
        action: &ActionDescriptor,
        context: &Map<String, Value>,
    ) -> ConstitutionResult<ValidationResult> {
        let action = apply_context(action, context)?;
        let mut violations = Vec::new();

        self.check_principles(&action, &mut violations);
        self.check_core_rules(&action, &mut violations);
        self.check_tier(&action, &mut violations);
        let warnings = self.check_guidelines(&action);

        Ok(ValidationResult::new(
            action.governance_tier().clone(),
            violations,
            warnings,
        ))
    }

    fn check_principles(&self, action: &ActionDescriptor, violations: &mut Vec<Violation>) {
        let flags = action.flags();
        for principle in self.rules.principles() {
            let finding = match principle.kind {
                PrincipleKind::Safety if flags.could_cause_harm && !flags.safety_measures => Some((
                    "action could cause harm and declares no safety measures",
                    Severity::High,
                )),
                PrincipleKind::Transparency if flags.explainable == Some(false) => {
                    Some(("action rationale cannot be explained", Severity::Medium))
                }
                PrincipleKind::Autonomy if flags.reduces_autonomy && !flags.user_consent => Some((
                    "action reduces user autonomy without consent",
                    Severity::Medium,
                )),
                _ => None,
            };

            if let Some((message, severity)) = finding {
                debug!(principle = principle.kind.rule_id(), action = %action.label(), "principle violated");
                violations.push(Violation::new(principle.kind.rule_id(), message, severity));
            }
        }
    }

    fn check_core_rules(&self, action: &ActionDescriptor, violations: &mut Vec<Violation>) {
        for rule in self.rules.core_rules() {
            if !all_hold(rule.conditions(), action) {
                continue;
            }

            debug!(rule = rule.id(), action = %action.label(), "constitutional rule matched");
            let severity = match rule.required_action() {
                RequiredAction::Block => Severity::High,
                RequiredAction::Escalate | RequiredAction::RequireAnalysis => Severity::Medium,
            };
            let message = if rule.description().is_empty() {
                format!("rule `{}` matched", rule.name())
            } else {
                rule.description().to_owned()
            };
            violations.push(Violation {
                rule_id: rule.id().to_owned(),
                message,
                severity,
                required_action: Some(rule.required_action()),
            });
        }
    }

    fn check_tier(&self, action: &ActionDescriptor, violations: &mut Vec<Violation>) {
        let tier_name = action.governance_tier();
        let Some(tier) = self.rules.tier(tier_name.as_str()) else {
            violations.push(Violation::new(
                INVALID_GOVERNANCE_TIER,
                format!("unknown governance tier `{tier_name}`"),
                Severity::High,
            ));
            return;
        };

        let flags = action.flags();
        let requirements = [
            (
                tier.approval_required && !flags.approved,
                "approval_required",
                "tier requires prior approval",
            ),
            (
                tier.verification_required && !flags.verified,
                "verification_required",
                "tier requires prior verification",
            ),
            (
                tier.constitutional_review && !flags.constitutionally_reviewed,
                "constitutional_review_required",
                "tier requires constitutional review",
            ),
        ];
        for (missing, rule_id, message) in requirements {
            if missing {
                violations.push(Violation::new(
                    rule_id,
                    format!("{message} (tier `{tier_name}`)"),
                    Severity::Medium,
                ));
            }
        }
    }

    fn check_guidelines(&self, action: &ActionDescriptor) -> Vec<Warning> {
        let flags = action.flags();
        self.rules
            .ethical_guidelines()
            .filter_map(|guideline| {
                let message = match guideline.kind {
                    GuidelineKind::Privacy if flags.involves_user_data && !flags.user_consent => {
                        "user data processed without recorded consent"
                    }
                    GuidelineKind::Fairness if flags.affects_users && !flags.fairness_reviewed => {
                        "user-facing change has not been reviewed for fairness"
                    }
                    _ => return None,
                };
                Some(Warning {
                    guideline_id: guideline.kind.guideline_id().to_owned(),
                    message: message.to_owned(),
                })
            })
            .collect()
    }
}

fn apply_context(
    action: &ActionDescriptor,
    context: &Map<String, Value>,
) -> ConstitutionResult<ActionDescriptor> {
    let mut effective = action.clone();
    // The descriptor's own context applies first; the caller's map wins.
    for (key, value) in action.context().iter().chain(context) {
        effective.flags_mut().apply_override(key, value)?;
    }
    Ok(effective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_primitives::RiskLevel;
    use gate_telemetry::MemoryAuditSink;
    use proptest::prelude::*;

    fn no_context() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn low_risk_low_tier_passes() {
        let constitution = Constitution::default();
        let action = ActionDescriptor::new("read_docs")
            .with_risk_level(RiskLevel::Low)
            .with_tier("low");

        let result = constitution.validate(&action, &no_context());
        assert!(result.passed());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn harm_without_safety_is_high_violation() {
        let constitution = Constitution::default();
        let mut action = ActionDescriptor::new("drop_table").with_tier("high");
        action.flags_mut().could_cause_harm = true;

        let result = constitution.validate(&action, &no_context());
        assert!(!result.passed());
        let violation = result
            .violations()
            .iter()
            .find(|v| v.rule_id == "safety_principle")
            .expect("safety violation");
        assert_eq!(violation.severity, Severity::High);
    }

    #[test]
    fn unknown_tier_yields_single_tier_violation() {
        let constitution = Constitution::default();
        let action = ActionDescriptor::new("noop").with_tier("galactic");

        let result = constitution.validate(&action, &no_context());
        assert!(result.has_violation(INVALID_GOVERNANCE_TIER));
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].severity, Severity::High);
    }

    #[test]
    fn block_rules_are_high_and_others_medium() {
        let constitution = Constitution::default();
        let mut action = ActionDescriptor::new("export_profiles");
        action.flags_mut().involves_user_data = true;
        action.flags_mut().logged = Some(false);
        action.flags_mut().failed = true;

        let result = constitution.validate(&action, &no_context());
        let by_id = |id: &str| result.violations().iter().find(|v| v.rule_id == id).unwrap();
        assert_eq!(by_id("protect_user_data").severity, Severity::High);
        assert_eq!(by_id("failure_analysis").severity, Severity::Medium);
    }

    #[test]
    fn critical_tier_demands_prior_marks() {
        let constitution = Constitution::default();
        let mut action = ActionDescriptor::new("rotate_keys").with_tier("critical");

        let result = constitution.validate(&action, &no_context());
        assert!(result.has_violation("approval_required"));
        assert!(result.has_violation("verification_required"));
        assert!(result.has_violation("constitutional_review_required"));

        action.flags_mut().approved = true;
        action.flags_mut().verified = true;
        action.flags_mut().constitutionally_reviewed = true;
        assert!(constitution.validate(&action, &no_context()).passed());
    }

    #[test]
    fn guidelines_only_warn() {
        let constitution = Constitution::default();
        let mut action = ActionDescriptor::new("ab_test");
        action.flags_mut().affects_users = true;
        action.flags_mut().involves_user_data = true;

        let result = constitution.validate(&action, &no_context());
        assert!(result.passed());
        assert_eq!(result.warnings().len(), 2);
    }

    #[test]
    fn context_overrides_flags() {
        let constitution = Constitution::default();
        let mut action = ActionDescriptor::new("restrict_feature");
        action.flags_mut().reduces_autonomy = true;
        assert!(constitution.validate(&action, &no_context()).has_violation("autonomy_principle"));

        let mut context = Map::new();
        context.insert("user_consent".into(), Value::Bool(true));
        assert!(constitution.validate(&action, &context).passed());
    }

    #[test]
    fn descriptor_context_overrides_flags_before_caller_context() {
        let constitution = Constitution::default();
        let action =
            ActionDescriptor::new("wipe_cache").with_context("could_cause_harm", Value::Bool(true));
        assert!(constitution.validate(&action, &no_context()).has_violation("safety_principle"));

        let mut context = Map::new();
        context.insert("could_cause_harm".into(), Value::Bool(false));
        assert!(constitution.validate(&action, &context).passed());
    }

    #[test]
    fn malformed_context_becomes_validation_error() {
        let constitution = Constitution::default();
        let action = ActionDescriptor::new("noop");
        let mut context = Map::new();
        context.insert("approved".into(), Value::from("definitely"));

        let result = constitution.validate(&action, &context);
        assert!(!result.passed());
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].rule_id, crate::validation::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn review_flags_parliament_and_escalation() {
        let sink = Arc::new(MemoryAuditSink::new());
        let constitution = Constitution::default().with_audit_sink(sink.clone());

        let action = ActionDescriptor::new("tune_model").with_tier("high");
        let review = constitution.review(&action, &no_context()).await;
        assert!(review.validation.passed());
        assert!(review.requires_parliament);
        assert!(!review.requires_escalation);

        let mut action = ActionDescriptor::new("purge_backups").with_risk_level(RiskLevel::High);
        action.flags_mut().permanent_change = true;
        let review = constitution.review(&action, &no_context()).await;
        assert!(!review.validation.passed());
        assert!(review.requires_escalation);
        assert!(!review.requires_parliament);
        assert!(review.recommendations.iter().any(|r| r.contains("irreversible_high_risk")));
        assert_eq!(sink.records_for("rule_violation").await.len(), 1);
    }

    fn arb_action() -> impl Strategy<Value = ActionDescriptor> {
        (
            prop_oneof![
                Just(RiskLevel::Low),
                Just(RiskLevel::Medium),
                Just(RiskLevel::High),
                Just(RiskLevel::Critical),
            ],
            any::<[bool; 8]>(),
            prop_oneof![Just("low"), Just("standard"), Just("high"), Just("critical")],
        )
            .prop_map(|(risk, bits, tier)| {
                let mut action = ActionDescriptor::new("generated")
                    .with_risk_level(risk)
                    .with_tier(tier);
                let flags = action.flags_mut();
                flags.could_cause_harm = bits[0];
                flags.safety_measures = bits[1];
                flags.affects_users = bits[2];
                flags.reduces_autonomy = bits[3];
                flags.permanent_change = bits[4];
                flags.involves_user_data = bits[5];
                flags.high_resource_usage = bits[6];
                flags.explainable = Some(bits[7]);
                action
            })
    }

    proptest! {
        #[test]
        fn harmless_actions_never_violate_safety(action in arb_action()) {
            prop_assume!(action.risk_level() != RiskLevel::High);
            prop_assume!(!action.flags().could_cause_harm);
            let result = Constitution::default().validate(&action, &Map::new());
            prop_assert!(!result.has_violation("safety_principle"));
        }

        #[test]
        fn unmitigated_harm_always_violates_safety(mut action in arb_action()) {
            action.flags_mut().could_cause_harm = true;
            action.flags_mut().safety_measures = false;
            let result = Constitution::default().validate(&action, &Map::new());
            prop_assert!(result
                .violations()
                .iter()
                .any(|v| v.rule_id == "safety_principle" && v.severity == Severity::High));
        }
    }
}
