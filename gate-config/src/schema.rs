//! Strongly typed configuration schemas.

use std::time::Duration;

use gate_constitution::{RuleSet, RuleSetOverrides};
use gate_parliament::ParliamentConfig;
use gate_verification::VerificationConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Timing of the gate's wait for a parliamentary decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Delay between vote status checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Total time to wait for a vote before escalating, in milliseconds.
    pub wait_budget_ms: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            wait_budget_ms: 24 * 60 * 60 * 1_000,
        }
    }
}

impl GateSettings {
    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero durations or a poll interval longer than the budget.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 || self.wait_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms and wait_budget_ms must be greater than zero",
            ));
        }
        if self.poll_interval_ms > self.wait_budget_ms {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must not exceed wait_budget_ms",
            ));
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait budget as a [`Duration`].
    #[must_use]
    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }
}

/// Complete governance configuration; every section is optional in source documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceSettings {
    /// Overrides merged over the built-in constitution.
    pub constitution: RuleSetOverrides,
    /// Verification engine tunables.
    pub verification: VerificationConfig,
    /// Committee configuration.
    pub parliament: ParliamentConfig,
    /// Gate timing.
    pub gate: GateSettings,
}

impl GovernanceSettings {
    /// Validates every section, including that the constitution overrides merge cleanly.
    ///
    /// # Errors
    ///
    /// Returns the first section error encountered.
    pub fn validate(&self) -> ConfigResult<()> {
        self.verification.validate()?;
        self.parliament.validate()?;
        self.gate.validate()?;
        self.rule_set().map(|_| ())
    }

    /// Built-in rule set with [`constitution`](Self::constitution) merged over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Constitution`] for malformed overrides.
    pub fn rule_set(&self) -> ConfigResult<RuleSet> {
        Ok(RuleSet::default().merge(self.constitution.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = GovernanceSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.gate.wait_budget(), Duration::from_secs(86_400));
    }

    #[test]
    fn poll_interval_cannot_exceed_budget() {
        let gate = GateSettings {
            poll_interval_ms: 10,
            wait_budget_ms: 5,
        };
        assert!(matches!(gate.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_parliament_section_is_reported() {
        let mut settings = GovernanceSettings::default();
        settings.parliament.rules.approval_threshold = 2.0;
        assert!(matches!(settings.validate(), Err(ConfigError::Parliament(_))));
    }
}
