//! Committee roster.

use std::fmt;

use gate_primitives::MemberId;
use serde::{Deserialize, Serialize};

use crate::error::{ParliamentError, ParliamentResult};

/// Area of expertise a member votes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    /// Security review.
    Security,
    /// Ethics review.
    Ethics,
    /// Product innovation.
    Innovation,
    /// Risk management.
    Risk,
    /// Regulatory compliance.
    Compliance,
    /// User experience.
    Usability,
    /// Runtime performance.
    Performance,
}

impl Specialty {
    /// Every specialty, in default roster order.
    pub const ALL: [Specialty; 7] = [
        Self::Security,
        Self::Ethics,
        Self::Innovation,
        Self::Risk,
        Self::Compliance,
        Self::Usability,
        Self::Performance,
    ];

    /// Stable identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Ethics => "ethics",
            Self::Innovation => "innovation",
            Self::Risk => "risk",
            Self::Compliance => "compliance",
            Self::Usability => "usability",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A voting member of the committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parliamentarian {
    id: MemberId,
    name: String,
    specialty: Specialty,
    trust_score: f64,
}

impl Parliamentarian {
    /// Creates a member.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::InvalidConfig`] unless `trust_score` is in `(0, 1]`.
    pub fn new(
        name: impl Into<String>,
        specialty: Specialty,
        trust_score: f64,
    ) -> ParliamentResult<Self> {
        if !(trust_score > 0.0 && trust_score <= 1.0) {
            return Err(ParliamentError::InvalidConfig(
                "trust_score must be within (0, 1]",
            ));
        }
        Ok(Self {
            id: MemberId::random(),
            name: name.into(),
            specialty,
            trust_score,
        })
    }

    /// Full-trust member named after its specialty.
    #[must_use]
    pub fn specialist(specialty: Specialty) -> Self {
        Self {
            id: MemberId::random(),
            name: format!("{specialty} specialist"),
            specialty,
            trust_score: 1.0,
        }
    }

    /// Member identifier.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Area of expertise.
    #[must_use]
    pub fn specialty(&self) -> Specialty {
        self.specialty
    }

    /// Trust score in `(0, 1]`.
    #[must_use]
    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }

    /// Weight of this member's vote; equal to the trust score.
    #[must_use]
    pub fn voting_power(&self) -> f64 {
        self.trust_score
    }
}

/// Seven full-trust members, one per [`Specialty`].
#[must_use]
pub fn default_roster() -> Vec<Parliamentarian> {
    Specialty::ALL
        .into_iter()
        .map(Parliamentarian::specialist)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_has_one_member_per_specialty() {
        let roster = default_roster();
        assert_eq!(roster.len(), 7);
        for specialty in Specialty::ALL {
            assert_eq!(roster.iter().filter(|m| m.specialty() == specialty).count(), 1);
        }
        assert!(roster.iter().all(|m| (m.voting_power() - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn rejects_out_of_range_trust() {
        assert!(Parliamentarian::new("nobody", Specialty::Risk, 0.0).is_err());
        assert!(Parliamentarian::new("overconfident", Specialty::Risk, 1.2).is_err());
        assert!(Parliamentarian::new("careful", Specialty::Risk, 0.4).is_ok());
    }
}
