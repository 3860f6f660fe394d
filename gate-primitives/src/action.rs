//! Action descriptors: the proposed autonomous action under review.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::evidence::Evidence;

const DEFAULT_TIER: &str = "standard";
const DEFAULT_ACTION_NAME: &str = "unnamed_action";

/// Coarse risk classification attached to an action. Deserialization goes
/// through [`FromStr`], so `"HIGH"` and `"high"` are the same level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RiskLevel {
    /// Routine action with negligible blast radius.
    Low,
    /// Default classification.
    #[default]
    Medium,
    /// Action with significant potential impact.
    High,
    /// Action with severe or irreversible potential impact.
    Critical,
}

impl RiskLevel {
    /// Returns `true` for `high` and `critical`.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::UnknownRiskLevel(other.to_owned())),
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RiskLevel> for String {
    fn from(value: RiskLevel) -> Self {
        value.as_str().to_owned()
    }
}

/// Name of a governance tier. Tiers are table-driven, so any name is
/// representable; the constitution decides whether it exists.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TierName(String);

impl TierName {
    /// Creates a tier name, normalised to lowercase.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_ascii_lowercase())
    }

    /// Returns the tier name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the `high` and `critical` tiers.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        matches!(self.0.as_str(), "high" | "critical")
    }

    /// Returns `true` for the `critical` tier.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.0 == "critical"
    }
}

impl Default for TierName {
    fn default() -> Self {
        Self(DEFAULT_TIER.to_owned())
    }
}

impl Display for TierName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TierName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<TierName> for String {
    fn from(value: TierName) -> Self {
        value.0
    }
}

impl From<&str> for TierName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Boolean facts asserted about an action. Missing flags deserialize as
/// `false`; the tri-state flags stay `None` when not asserted either way.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionFlags {
    /// The action could cause harm if it misbehaves.
    pub could_cause_harm: bool,
    /// Mitigations (rollback, sandboxing, rate limits) are in place.
    pub safety_measures: bool,
    /// End users observe the effects of the action.
    pub affects_users: bool,
    /// The action narrows choices otherwise available to users.
    pub reduces_autonomy: bool,
    /// Affected users consented to the action.
    pub user_consent: bool,
    /// The change cannot be rolled back.
    pub permanent_change: bool,
    /// The action reads or writes personal data.
    pub involves_user_data: bool,
    /// The action consumes an unusual amount of compute or storage.
    pub high_resource_usage: bool,
    /// A previous attempt of this action failed.
    pub failed: bool,
    /// A human already approved the action.
    pub approved: bool,
    /// The action was verified out of band.
    pub verified: bool,
    /// The action already went through constitutional review.
    pub constitutionally_reviewed: bool,
    /// The action was reviewed for fair treatment of user groups.
    pub fairness_reviewed: bool,
    /// Whether the action's rationale can be explained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explainable: Option<bool>,
    /// Whether the action is recorded in an operational log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged: Option<bool>,
    /// Whether the action is needed to reach its goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub necessary: Option<bool>,
}

impl ActionFlags {
    /// Applies a named override, typically taken from a request context map.
    ///
    /// Returns `Ok(false)` when `name` is not a known flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescriptor`] when `name` is a known flag and
    /// `value` is not a boolean (or `null` for tri-state flags).
    pub fn apply_override(&mut self, name: &str, value: &Value) -> Result<bool> {
        if let Some(slot) = self.tri_state_mut(name) {
            *slot = match value {
                Value::Bool(flag) => Some(*flag),
                Value::Null => None,
                _ => return Err(malformed(name, value)),
            };
            return Ok(true);
        }

        let Some(slot) = self.flag_mut(name) else {
            return Ok(false);
        };
        let Value::Bool(flag) = value else {
            return Err(malformed(name, value));
        };
        *slot = *flag;
        Ok(true)
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        let slot = match name {
            "could_cause_harm" => &mut self.could_cause_harm,
            "safety_measures" => &mut self.safety_measures,
            "affects_users" => &mut self.affects_users,
            "reduces_autonomy" => &mut self.reduces_autonomy,
            "user_consent" => &mut self.user_consent,
            "permanent_change" => &mut self.permanent_change,
            "involves_user_data" => &mut self.involves_user_data,
            "high_resource_usage" => &mut self.high_resource_usage,
            "failed" => &mut self.failed,
            "approved" => &mut self.approved,
            "verified" => &mut self.verified,
            "constitutionally_reviewed" => &mut self.constitutionally_reviewed,
            "fairness_reviewed" => &mut self.fairness_reviewed,
            _ => return None,
        };
        Some(slot)
    }

    fn tri_state_mut(&mut self, name: &str) -> Option<&mut Option<bool>> {
        match name {
            "explainable" => Some(&mut self.explainable),
            "logged" => Some(&mut self.logged),
            "necessary" => Some(&mut self.necessary),
            _ => None,
        }
    }
}

fn malformed(name: &str, value: &Value) -> Error {
    Error::MalformedDescriptor {
        field: name.to_owned(),
        reason: format!("expected a boolean, got `{value}`"),
    }
}

/// Inputs consumed by the verification stage when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationInputs {
    /// Source fragment to analyse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Language of [`code`](Self::code); defaults to Rust.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Claim to check against [`evidence`](Self::evidence).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    /// Evidence backing the hypothesis.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
    /// Minimum mean evidence score for the hypothesis to pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    /// Test suite exercising [`target_code`](Self::target_code).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_code: Option<String>,
    /// Code under test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_code: Option<String>,
}

impl VerificationInputs {
    /// Returns `true` when no verification input is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.hypothesis.is_none()
            && self.test_code.is_none()
            && self.target_code.is_none()
    }
}

/// The structured description of a proposed autonomous action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDescriptor {
    id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    action_type: String,
    risk_level: RiskLevel,
    governance_tier: TierName,
    #[serde(flatten)]
    flags: ActionFlags,
    verification: VerificationInputs,
    #[serde(skip_serializing_if = "Map::is_empty")]
    context: Map<String, Value>,
}

impl Default for ActionDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_NAME)
    }
}

impl ActionDescriptor {
    /// Creates a descriptor with medium risk in the standard tier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            action_type: String::new(),
            risk_level: RiskLevel::default(),
            governance_tier: TierName::default(),
            flags: ActionFlags::default(),
            verification: VerificationInputs::default(),
            context: Map::new(),
        }
    }

    /// Parses a descriptor from a loosely-typed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescriptor`] when a known field has the wrong
    /// shape. Unknown fields are ignored and missing ones take defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|err| Error::MalformedDescriptor {
            field: "descriptor".into(),
            reason: err.to_string(),
        })
    }

    /// Sets the caller-supplied action identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the action type, e.g. `deploy_code`.
    #[must_use]
    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = action_type.into();
        self
    }

    /// Sets the risk level.
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Sets the governance tier.
    #[must_use]
    pub fn with_tier(mut self, tier: impl Into<TierName>) -> Self {
        self.governance_tier = tier.into();
        self
    }

    /// Replaces the flag set.
    #[must_use]
    pub fn with_flags(mut self, flags: ActionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the verification inputs.
    #[must_use]
    pub fn with_verification(mut self, inputs: VerificationInputs) -> Self {
        self.verification = inputs;
        self
    }

    /// Adds a free-form context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Caller-supplied identifier, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action type; empty when not supplied.
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Risk level.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Governance tier.
    #[must_use]
    pub fn governance_tier(&self) -> &TierName {
        &self.governance_tier
    }

    /// Asserted flags.
    #[must_use]
    pub fn flags(&self) -> &ActionFlags {
        &self.flags
    }

    /// Mutable access to the asserted flags.
    pub fn flags_mut(&mut self) -> &mut ActionFlags {
        &mut self.flags
    }

    /// Verification inputs.
    #[must_use]
    pub fn verification(&self) -> &VerificationInputs {
        &self.verification
    }

    /// Free-form context map. Boolean entries named after a flag override
    /// that flag during constitutional validation, below the caller's context.
    #[must_use]
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Returns `true` when the action type mentions code or deployment.
    #[must_use]
    pub fn touches_code(&self) -> bool {
        let kind = self.action_type.to_ascii_lowercase();
        kind.contains("code") || kind.contains("deploy")
    }

    /// Label used in logs and audit records.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} ({id})", self.name),
            None => self.name.clone(),
        }
    }
}
